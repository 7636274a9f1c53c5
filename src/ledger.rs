//! Completion Ledger
//!
//! The set of (tracker, day) completion facts. Writes go to the store first
//! and touch memory only once the store has accepted them.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::{CalendarDay, CompletionRecord, DomainError, DomainResult, TrackerId};
use crate::repository::{Loaded, RecordRepository};

pub struct CompletionLedger<S> {
    store: Arc<S>,
    records: HashSet<CompletionRecord>,
    counts: HashMap<TrackerId, usize>,
}

impl<S: RecordRepository> CompletionLedger<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            records: HashSet::new(),
            counts: HashMap::new(),
        }
    }

    /// Flip the completion state of a tracker for the day containing `date`.
    ///
    /// Returns the new state. On a storage error nothing changes.
    pub async fn toggle(&mut self, tracker_id: TrackerId, date: impl CalendarDay) -> DomainResult<bool> {
        let record = CompletionRecord::new(tracker_id, date);

        if self.records.contains(&record) {
            self.store.remove_record(&record).await?;
            self.records.remove(&record);
            if let Some(count) = self.counts.get_mut(&tracker_id) {
                *count -= 1;
                if *count == 0 {
                    self.counts.remove(&tracker_id);
                }
            }
            debug!(tracker = %tracker_id, day = %record.day, "completion removed");
            Ok(false)
        } else {
            self.store.insert_record(&record).await?;
            self.records.insert(record);
            *self.counts.entry(tracker_id).or_insert(0) += 1;
            debug!(tracker = %tracker_id, day = %record.day, "completion recorded");
            Ok(true)
        }
    }

    pub fn is_completed(&self, tracker_id: TrackerId, date: impl CalendarDay) -> bool {
        self.records.contains(&CompletionRecord::new(tracker_id, date))
    }

    /// Completions of one tracker across all days.
    pub fn completion_count(&self, tracker_id: TrackerId) -> usize {
        self.counts.get(&tracker_id).copied().unwrap_or(0)
    }

    pub fn all_records(&self) -> &HashSet<CompletionRecord> {
        &self.records
    }

    /// Completions of every tracker, the number shown on the statistics screen.
    pub fn total_completions(&self) -> usize {
        self.records.len()
    }

    /// Forget every record of a tracker that was deleted from the store.
    pub(crate) fn purge_tracker(&mut self, tracker_id: TrackerId) -> usize {
        let before = self.records.len();
        self.records.retain(|r| r.tracker_id != tracker_id);
        self.counts.remove(&tracker_id);
        before - self.records.len()
    }

    /// Replace the in-memory set with freshly loaded records.
    ///
    /// Records of trackers that `is_known` rejects are dropped so no record
    /// outlives its tracker. Returns the decoding errors plus one
    /// `TrackerNotFound` per orphan.
    pub(crate) fn replace(
        &mut self,
        loaded: Loaded<CompletionRecord>,
        is_known: impl Fn(TrackerId) -> bool,
    ) -> Vec<DomainError> {
        let mut rejected = loaded.rejected;
        self.records.clear();
        self.counts.clear();

        for record in loaded.items {
            if !is_known(record.tracker_id) {
                warn!(tracker = %record.tracker_id, day = %record.day, "dropping orphan completion record");
                rejected.push(DomainError::TrackerNotFound(record.tracker_id));
                continue;
            }
            if self.records.insert(record) {
                *self.counts.entry(record.tracker_id).or_insert(0) += 1;
            }
        }
        rejected
    }
}
