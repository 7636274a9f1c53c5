//! Tracker Catalog
//!
//! Canonical trackers and categories, mirrored in memory over a store.
//! Every mutation validates against memory, writes to the store, and only
//! then updates memory.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::domain::{
    CategoryId, DomainError, DomainResult, Tracker, TrackerCategory, TrackerDraft, TrackerId,
    Weekday,
};
use crate::repository::{Loaded, Repository};

pub struct TrackerCatalog<S> {
    store: Arc<S>,
    trackers: HashMap<TrackerId, Tracker>,
    categories: HashMap<CategoryId, TrackerCategory>,
}

impl<S> TrackerCatalog<S>
where
    S: Repository<Tracker> + Repository<TrackerCategory>,
{
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            trackers: HashMap::new(),
            categories: HashMap::new(),
        }
    }

    pub async fn add_category(
        &mut self,
        title: impl Into<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<TrackerCategory> {
        let category = TrackerCategory::new(title, now);
        Repository::<TrackerCategory>::create(&*self.store, &category).await?;
        info!(category = %category.id, title = %category.title, "category added");
        self.categories.insert(category.id, category.clone());
        Ok(category)
    }

    pub async fn add_tracker(&mut self, draft: TrackerDraft, now: DateTime<Utc>) -> DomainResult<Tracker> {
        self.require_category(draft.category_id)?;
        let tracker = Tracker::from_draft(draft, now);
        Repository::<Tracker>::create(&*self.store, &tracker).await?;
        info!(tracker = %tracker.id, title = %tracker.title, "tracker added");
        self.trackers.insert(tracker.id, tracker.clone());
        Ok(tracker)
    }

    /// Replace the editable fields of a tracker. Returns the stored result.
    pub async fn edit_tracker(&mut self, id: TrackerId, draft: TrackerDraft) -> DomainResult<Tracker> {
        let existing = self.trackers.get(&id).ok_or(DomainError::TrackerNotFound(id))?;
        self.require_category(draft.category_id)?;
        let edited = existing.edited(draft);
        Repository::<Tracker>::update(&*self.store, &edited).await?;
        info!(tracker = %id, "tracker edited");
        self.trackers.insert(id, edited.clone());
        Ok(edited)
    }

    /// Remove a tracker. The store drops its completion records in the same
    /// operation; the caller must purge them from the ledger.
    pub async fn delete_tracker(&mut self, id: TrackerId) -> DomainResult<Tracker> {
        if !self.trackers.contains_key(&id) {
            return Err(DomainError::TrackerNotFound(id));
        }
        Repository::<Tracker>::delete(&*self.store, id).await?;
        info!(tracker = %id, "tracker deleted");
        self.trackers.remove(&id).ok_or(DomainError::TrackerNotFound(id))
    }

    pub fn tracker(&self, id: TrackerId) -> Option<&Tracker> {
        self.trackers.get(&id)
    }

    pub fn all_trackers(&self) -> impl Iterator<Item = &Tracker> {
        self.trackers.values()
    }

    pub fn tracker_count(&self) -> usize {
        self.trackers.len()
    }

    pub fn category(&self, id: CategoryId) -> Option<&TrackerCategory> {
        self.categories.get(&id)
    }

    pub fn category_of(&self, tracker_id: TrackerId) -> Option<&TrackerCategory> {
        self.trackers
            .get(&tracker_id)
            .and_then(|t| self.categories.get(&t.category_id))
    }

    /// Categories in creation order, as the category picker lists them.
    pub fn categories(&self) -> Vec<&TrackerCategory> {
        let mut categories: Vec<_> = self.categories.values().collect();
        categories.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        categories
    }

    /// Whether anything at all is scheduled on `weekday`, regardless of
    /// filter or search. Distinguishes "nothing planned" from "nothing found".
    pub fn has_any_tracker(&self, weekday: Weekday) -> bool {
        self.trackers.values().any(|t| t.is_scheduled_on(weekday))
    }

    /// Replace memory with freshly loaded facts.
    ///
    /// Trackers whose category did not load are dropped as well. Returns all
    /// rejections.
    pub(crate) fn replace(
        &mut self,
        categories: Loaded<TrackerCategory>,
        trackers: Loaded<Tracker>,
    ) -> Vec<DomainError> {
        let mut rejected = categories.rejected;
        rejected.extend(trackers.rejected);

        self.categories = categories.items.into_iter().map(|c| (c.id, c)).collect();
        self.trackers.clear();
        for tracker in trackers.items {
            if !self.categories.contains_key(&tracker.category_id) {
                warn!(tracker = %tracker.id, category = %tracker.category_id, "dropping tracker without category");
                rejected.push(DomainError::CategoryNotFound(tracker.category_id));
                continue;
            }
            self.trackers.insert(tracker.id, tracker);
        }
        rejected
    }

    fn require_category(&self, id: CategoryId) -> DomainResult<()> {
        if self.categories.contains_key(&id) {
            Ok(())
        } else {
            Err(DomainError::CategoryNotFound(id))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MemoryStore;
    use chrono::{Duration, TimeZone};

    fn at(minute: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap() + Duration::minutes(minute)
    }

    fn catalog() -> TrackerCatalog<MemoryStore> {
        TrackerCatalog::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_add_tracker_requires_category() {
        let mut catalog = catalog();
        let missing = CategoryId::new();
        let err = catalog
            .add_tracker(TrackerDraft::new("Run", missing), at(0))
            .await
            .unwrap_err();
        assert_eq!(err, DomainError::CategoryNotFound(missing));
        assert_eq!(catalog.tracker_count(), 0);
    }

    #[tokio::test]
    async fn test_add_and_lookup() {
        let mut catalog = catalog();
        let health = catalog.add_category("Health", at(0)).await.unwrap();
        let run = catalog
            .add_tracker(TrackerDraft::new("Run", health.id).schedule([Weekday::Monday]), at(1))
            .await
            .unwrap();

        assert_eq!(run.created_at, at(1));
        assert_eq!(catalog.tracker(run.id), Some(&run));
        assert_eq!(catalog.category_of(run.id), Some(&health));
        assert!(catalog.has_any_tracker(Weekday::Monday));
        assert!(!catalog.has_any_tracker(Weekday::Tuesday));
    }

    #[tokio::test]
    async fn test_edit_tracker() {
        let mut catalog = catalog();
        let health = catalog.add_category("Health", at(0)).await.unwrap();
        let work = catalog.add_category("Work", at(1)).await.unwrap();
        let run = catalog.add_tracker(TrackerDraft::new("Run", health.id), at(2)).await.unwrap();

        let edited = catalog
            .edit_tracker(run.id, TrackerDraft::new("Commute", work.id).emoji("🚲"))
            .await
            .unwrap();
        assert_eq!(edited.id, run.id);
        assert_eq!(edited.created_at, run.created_at);
        assert_eq!(catalog.category_of(run.id), Some(&work));

        let unknown = TrackerId::new();
        assert_eq!(
            catalog.edit_tracker(unknown, TrackerDraft::new("x", work.id)).await,
            Err(DomainError::TrackerNotFound(unknown))
        );
        let missing = CategoryId::new();
        assert_eq!(
            catalog.edit_tracker(run.id, TrackerDraft::new("x", missing)).await,
            Err(DomainError::CategoryNotFound(missing))
        );
        assert_eq!(catalog.tracker(run.id).unwrap().title, "Commute");
    }

    #[tokio::test]
    async fn test_delete_tracker() {
        let mut catalog = catalog();
        let health = catalog.add_category("Health", at(0)).await.unwrap();
        let run = catalog.add_tracker(TrackerDraft::new("Run", health.id), at(1)).await.unwrap();

        assert_eq!(catalog.delete_tracker(run.id).await, Ok(run.clone()));
        assert_eq!(
            catalog.delete_tracker(run.id).await,
            Err(DomainError::TrackerNotFound(run.id))
        );
        assert!(catalog.category_of(run.id).is_none());
    }

    #[tokio::test]
    async fn test_categories_in_creation_order() {
        let mut catalog = catalog();
        catalog.add_category("Work", at(0)).await.unwrap();
        catalog.add_category("Art", at(5)).await.unwrap();
        catalog.add_category("Health", at(2)).await.unwrap();

        let titles: Vec<_> = catalog.categories().iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["Work", "Health", "Art"]);
    }

    #[test]
    fn test_replace_drops_trackers_without_category() {
        let mut catalog = catalog();
        let health = TrackerCategory::new("Health", at(0));
        let kept = Tracker::from_draft(TrackerDraft::new("Run", health.id), at(1));
        let lost_category = CategoryId::new();
        let orphan = Tracker::from_draft(TrackerDraft::new("Lost", lost_category), at(2));

        let rejected = catalog.replace(
            vec![health.clone()].into_iter().collect(),
            Loaded {
                items: vec![kept.clone(), orphan],
                rejected: vec![DomainError::decoding("tracker", "title")],
            },
        );

        assert_eq!(rejected.len(), 2);
        assert!(rejected.contains(&DomainError::CategoryNotFound(lost_category)));
        assert_eq!(catalog.tracker_count(), 1);
        assert_eq!(catalog.tracker(kept.id), Some(&kept));
    }
}
