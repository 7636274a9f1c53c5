//! Query Engine
//!
//! Turns the current facts and view parameters into the ordered, sectioned
//! list of visible trackers.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

use crate::catalog::TrackerCatalog;
use crate::domain::{
    CategoryId, Color, Tracker, TrackerCategory, TrackerId, ViewParameters, Weekday,
};
use crate::ledger::CompletionLedger;
use crate::repository::{RecordRepository, Repository};

/// How trackers are bucketed into sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionGrouping {
    /// One section per distinct category title. Categories sharing a title
    /// share a section.
    #[default]
    Title,
    /// One section per category, even when titles repeat.
    Identity,
}

/// Read access to trackers and categories.
pub trait TrackerFacts {
    fn trackers(&self) -> Box<dyn Iterator<Item = &Tracker> + '_>;

    fn category(&self, id: CategoryId) -> Option<&TrackerCategory>;
}

/// Read access to completion facts.
pub trait CompletionFacts {
    fn is_completed_on(&self, tracker_id: TrackerId, day: NaiveDate) -> bool;

    fn completions(&self, tracker_id: TrackerId) -> usize;
}

impl<S> TrackerFacts for TrackerCatalog<S>
where
    S: Repository<Tracker> + Repository<TrackerCategory>,
{
    fn trackers(&self) -> Box<dyn Iterator<Item = &Tracker> + '_> {
        Box::new(self.all_trackers())
    }

    fn category(&self, id: CategoryId) -> Option<&TrackerCategory> {
        TrackerCatalog::category(self, id)
    }
}

impl<S: RecordRepository> CompletionFacts for CompletionLedger<S> {
    fn is_completed_on(&self, tracker_id: TrackerId, day: NaiveDate) -> bool {
        self.is_completed(tracker_id, day)
    }

    fn completions(&self, tracker_id: TrackerId) -> usize {
        self.completion_count(tracker_id)
    }
}

/// Row coordinate inside a projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IndexPath {
    pub section: usize,
    pub row: usize,
}

impl IndexPath {
    pub const fn new(section: usize, row: usize) -> Self {
        Self { section, row }
    }
}

/// A tracker as the list shows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectedTracker {
    pub id: TrackerId,
    pub title: String,
    pub emoji: String,
    pub color: Color,
    /// Completed on the projection's reference day
    pub completed: bool,
    pub completion_count: usize,
    pub created_at: DateTime<Utc>,
}

impl ProjectedTracker {
    fn new(tracker: &Tracker, completed: bool, completion_count: usize) -> Self {
        Self {
            id: tracker.id,
            title: tracker.title.clone(),
            emoji: tracker.emoji.clone(),
            color: tracker.color,
            completed,
            completion_count,
            created_at: tracker.created_at,
        }
    }

    /// Same content on screen. Position is not part of it.
    pub fn same_display(&self, other: &ProjectedTracker) -> bool {
        self.title == other.title
            && self.emoji == other.emoji
            && self.color == other.color
            && self.completed == other.completed
            && self.completion_count == other.completion_count
    }
}

/// What makes two sections "the same section" across projections.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionKey {
    Title(String),
    Category(CategoryId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    pub key: SectionKey,
    pub title: String,
    pub rows: Vec<ProjectedTracker>,
}

/// The visible trackers, grouped and ordered. Replaced wholesale on every
/// recomputation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Projection {
    sections: Vec<Section>,
}

impl Projection {
    pub fn new(sections: Vec<Section>) -> Self {
        Self { sections }
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn number_of_sections(&self) -> usize {
        self.sections.len()
    }

    pub fn title_for_section(&self, section: usize) -> Option<&str> {
        self.sections.get(section).map(|s| s.title.as_str())
    }

    /// Zero for a section index that does not exist.
    pub fn number_of_items(&self, section: usize) -> usize {
        self.sections.get(section).map_or(0, |s| s.rows.len())
    }

    pub fn tracker_at(&self, path: IndexPath) -> Option<&ProjectedTracker> {
        self.sections.get(path.section)?.rows.get(path.row)
    }

    pub fn index_of(&self, id: TrackerId) -> Option<IndexPath> {
        self.rows()
            .find(|(_, row)| row.id == id)
            .map(|(path, _)| path)
    }

    /// Every row with its coordinate, in display order.
    pub fn rows(&self) -> impl Iterator<Item = (IndexPath, &ProjectedTracker)> {
        self.sections.iter().enumerate().flat_map(|(s, section)| {
            section
                .rows
                .iter()
                .enumerate()
                .map(move |(r, row)| (IndexPath::new(s, r), row))
        })
    }

    pub fn tracker_ids(&self) -> Vec<TrackerId> {
        self.rows().map(|(_, row)| row.id).collect()
    }

    /// `(title, ids)` pairs, the compact form used in logs and tests.
    pub fn outline(&self) -> Vec<(String, Vec<TrackerId>)> {
        self.sections
            .iter()
            .map(|s| (s.title.clone(), s.rows.iter().map(|r| r.id).collect()))
            .collect()
    }
}

/// Section ordering: title first, then category creation for identity
/// grouping so equal titles stay in a stable order.
type SectionOrder = (String, Option<(DateTime<Utc>, CategoryId)>);

/// Compute the projection for `params`.
///
/// 1. schedule contains the reference date's weekday (when `params.weekday` is set)
/// 2. completion state for the reference day passes `params.filter`
/// 3. title contains the search text, case-insensitively (when set)
/// 4. grouped by category, sections by title, rows by creation time then id
pub fn project(
    facts: &impl TrackerFacts,
    completions: &impl CompletionFacts,
    params: &ViewParameters,
    grouping: SectionGrouping,
) -> Projection {
    let day = params.reference_date;
    // `weekday` only switches the restriction on; the day itself always
    // comes from the reference date
    let scheduled_on = params.weekday.map(|_| Weekday::of(&day));
    let needle = params.search_needle();
    let mut buckets: BTreeMap<SectionOrder, Section> = BTreeMap::new();

    for tracker in facts.trackers() {
        if let Some(weekday) = scheduled_on {
            if !tracker.is_scheduled_on(weekday) {
                continue;
            }
        }

        let completed = completions.is_completed_on(tracker.id, day);
        if !params.filter.admits(completed) {
            continue;
        }

        if let Some(needle) = &needle {
            if !tracker.title.to_lowercase().contains(needle.as_str()) {
                continue;
            }
        }

        let Some(category) = facts.category(tracker.category_id) else {
            warn!(tracker = %tracker.id, category = %tracker.category_id, "skipping tracker with unknown category");
            continue;
        };

        let (order, key) = match grouping {
            SectionGrouping::Title => (
                (category.title.clone(), None),
                SectionKey::Title(category.title.clone()),
            ),
            SectionGrouping::Identity => (
                (category.title.clone(), Some((category.created_at, category.id))),
                SectionKey::Category(category.id),
            ),
        };

        buckets
            .entry(order)
            .or_insert_with(|| Section {
                key,
                title: category.title.clone(),
                rows: Vec::new(),
            })
            .rows
            .push(ProjectedTracker::new(
                tracker,
                completed,
                completions.completions(tracker.id),
            ));
    }

    let sections = buckets
        .into_values()
        .map(|mut section| {
            section
                .rows
                .sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
            section
        })
        .collect();

    Projection { sections }
}
