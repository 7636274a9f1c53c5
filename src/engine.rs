//! Tracker Engine
//!
//! Owns the facts, the view parameters and the diff state. Every successful
//! mutation recomputes the projection and queues exactly one event; a failed
//! mutation changes nothing and queues nothing.

use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::catalog::TrackerCatalog;
use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::domain::{
    CalendarDay, CategoryId, DomainError, DomainResult, FilterKind, Tracker, TrackerCategory,
    TrackerDraft, TrackerId, ViewParameters, Weekday,
};
use crate::ledger::CompletionLedger;
use crate::notify::{ChangeOutbox, ChangeSubscription};
use crate::projection::{
    project, ChangeCause, DiffEngine, IndexPath, ProjectedTracker, Projection, SectionGrouping,
};
use crate::repository::{Repository, SqliteStore, TrackerStore};

pub struct TrackerEngine<S> {
    store: Arc<S>,
    catalog: TrackerCatalog<S>,
    ledger: CompletionLedger<S>,
    params: ViewParameters,
    grouping: SectionGrouping,
    diff: DiffEngine,
    outbox: ChangeOutbox,
    clock: Arc<dyn Clock>,
}

impl TrackerEngine<SqliteStore> {
    /// Open the SQLite database named by the config (in-memory when no path
    /// is set).
    pub async fn from_config(config: &EngineConfig, clock: Arc<dyn Clock>) -> DomainResult<Self> {
        let store = match &config.database.path {
            Some(path) => SqliteStore::open(path)?,
            None => SqliteStore::open_in_memory()?,
        };
        Self::open(Arc::new(store), config.grouping, clock).await
    }
}

impl<S: TrackerStore> TrackerEngine<S> {
    /// Load every fact from the store and queue the first full reload. The
    /// view starts on the clock's today.
    pub async fn open(store: Arc<S>, grouping: SectionGrouping, clock: Arc<dyn Clock>) -> DomainResult<Self> {
        let mut engine = Self {
            catalog: TrackerCatalog::new(Arc::clone(&store)),
            ledger: CompletionLedger::new(Arc::clone(&store)),
            store,
            params: ViewParameters::for_date(clock.today()),
            grouping,
            diff: DiffEngine::new(),
            outbox: ChangeOutbox::new(),
            clock,
        };
        engine.load().await?;
        engine.recompute(ChangeCause::Parameters);
        Ok(engine)
    }

    /// Attach the single consumer. Events published before this call are
    /// still delivered, starting at the latest full reload.
    pub fn subscribe(&self) -> Option<ChangeSubscription> {
        self.outbox.subscribe()
    }

    /// Reload all facts from the store, picking up changes made behind the
    /// engine's back. Returns how many stored rows were skipped.
    pub async fn refresh(&mut self) -> DomainResult<usize> {
        let skipped = self.load().await?;
        self.recompute(ChangeCause::Facts);
        Ok(skipped)
    }

    pub async fn add_category(&mut self, title: impl Into<String>) -> DomainResult<TrackerCategory> {
        let category = self.catalog.add_category(title, self.clock.now()).await?;
        self.recompute(ChangeCause::Facts);
        Ok(category)
    }

    pub async fn add_tracker(&mut self, draft: TrackerDraft) -> DomainResult<Tracker> {
        let tracker = self.catalog.add_tracker(draft, self.clock.now()).await?;
        self.recompute(ChangeCause::Facts);
        Ok(tracker)
    }

    pub async fn edit_tracker(&mut self, id: TrackerId, draft: TrackerDraft) -> DomainResult<Tracker> {
        let tracker = self.catalog.edit_tracker(id, draft).await?;
        self.recompute(ChangeCause::Facts);
        Ok(tracker)
    }

    /// Delete a tracker together with all of its completions.
    pub async fn delete_tracker(&mut self, id: TrackerId) -> DomainResult<Tracker> {
        let tracker = self.catalog.delete_tracker(id).await?;
        let purged = self.ledger.purge_tracker(id);
        debug!(tracker = %id, purged, "completions purged with tracker");
        self.recompute(ChangeCause::Facts);
        Ok(tracker)
    }

    /// Flip completion for the day containing `date`. Days after the clock's
    /// today are refused. Returns the new state.
    pub async fn toggle_completion(&mut self, id: TrackerId, date: impl CalendarDay) -> DomainResult<bool> {
        if self.catalog.tracker(id).is_none() {
            return Err(DomainError::TrackerNotFound(id));
        }
        let day = date.calendar_day();
        if day > self.clock.today() {
            return Err(DomainError::FutureCompletion(day));
        }
        let completed = self.ledger.toggle(id, day).await?;
        self.recompute(ChangeCause::Facts);
        Ok(completed)
    }

    /// Replace the view parameters. Always a full reload, even when nothing
    /// differs.
    pub fn set_view_parameters(&mut self, params: ViewParameters) {
        self.params = params;
        self.recompute(ChangeCause::Parameters);
    }

    pub fn select_date(&mut self, date: impl CalendarDay) {
        let params = self.params.with_date(date);
        self.set_view_parameters(params);
    }

    /// `Today` also moves the reference date to the clock's today.
    pub fn set_filter(&mut self, filter: FilterKind) {
        let mut params = self.params.with_filter(filter);
        if filter == FilterKind::Today {
            params = params.with_date(self.clock.today());
        }
        self.set_view_parameters(params);
    }

    pub fn set_search(&mut self, text: Option<&str>) {
        let params = self.params.with_search(text);
        self.set_view_parameters(params);
    }

    pub fn params(&self) -> &ViewParameters {
        &self.params
    }

    pub fn grouping(&self) -> SectionGrouping {
        self.grouping
    }

    /// The last computed projection. `None` only before the first load.
    pub fn projection(&self) -> Option<&Projection> {
        self.diff.last()
    }

    pub fn number_of_sections(&self) -> usize {
        self.projection().map_or(0, Projection::number_of_sections)
    }

    pub fn title_for_section(&self, section: usize) -> Option<&str> {
        self.projection()?.title_for_section(section)
    }

    pub fn number_of_items(&self, section: usize) -> usize {
        self.projection().map_or(0, |p| p.number_of_items(section))
    }

    pub fn tracker_at(&self, section: usize, row: usize) -> Option<&ProjectedTracker> {
        self.projection()?.tracker_at(IndexPath::new(section, row))
    }

    pub fn tracker(&self, id: TrackerId) -> Option<&Tracker> {
        self.catalog.tracker(id)
    }

    pub fn category(&self, id: CategoryId) -> Option<&TrackerCategory> {
        self.catalog.category(id)
    }

    pub fn category_of(&self, id: TrackerId) -> Option<&TrackerCategory> {
        self.catalog.category_of(id)
    }

    pub fn categories(&self) -> Vec<&TrackerCategory> {
        self.catalog.categories()
    }

    pub fn has_any_tracker(&self, weekday: Weekday) -> bool {
        self.catalog.has_any_tracker(weekday)
    }

    pub fn is_completed(&self, id: TrackerId, date: impl CalendarDay) -> bool {
        self.ledger.is_completed(id, date)
    }

    pub fn completion_count(&self, id: TrackerId) -> usize {
        self.ledger.completion_count(id)
    }

    pub fn total_completions(&self) -> usize {
        self.ledger.total_completions()
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    /// Fetch everything first so a failing list leaves memory untouched.
    async fn load(&mut self) -> DomainResult<usize> {
        let categories = Repository::<TrackerCategory>::list(&*self.store).await?;
        let trackers = Repository::<Tracker>::list(&*self.store).await?;
        let records = self.store.list_records().await?;

        let mut rejected = self.catalog.replace(categories, trackers);
        let catalog = &self.catalog;
        rejected.extend(self.ledger.replace(records, |id| catalog.tracker(id).is_some()));

        for error in &rejected {
            warn!(%error, "skipping unreadable stored row");
        }
        debug!(
            trackers = self.catalog.tracker_count(),
            completions = self.ledger.total_completions(),
            skipped = rejected.len(),
            "facts loaded"
        );
        Ok(rejected.len())
    }

    fn recompute(&mut self, cause: ChangeCause) {
        let projection = project(&self.catalog, &self.ledger, &self.params, self.grouping);
        debug!(
            ?cause,
            sections = projection.number_of_sections(),
            rows = projection.rows().count(),
            "projection recomputed"
        );
        let event = self.diff.advance(projection, cause);
        self.outbox.publish(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::projection::{ChangeEvent, RowMove, StructuralUpdate};
    use crate::repository::MemoryStore;
    use chrono::{Duration, TimeZone, Utc};

    /// Monday 2024-01-01, noon UTC.
    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::ticking(
            Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
            Duration::seconds(1),
        ))
    }

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    async fn engine() -> (TrackerEngine<MemoryStore>, ChangeSubscription) {
        let engine = TrackerEngine::open(Arc::new(MemoryStore::new()), SectionGrouping::Title, clock())
            .await
            .unwrap();
        let mut sub = engine.subscribe().unwrap();
        assert!(sub.try_recv().unwrap().is_full_reload());
        (engine, sub)
    }

    fn next_update(sub: &mut ChangeSubscription) -> StructuralUpdate {
        match sub.try_recv() {
            Some(ChangeEvent::StructuralUpdate(update)) => update,
            other => panic!("expected a structural update, got {other:?}"),
        }
    }

    fn every_day() -> [Weekday; 7] {
        Weekday::ORDERED
    }

    #[tokio::test]
    async fn test_open_empty() {
        let (engine, mut sub) = engine().await;
        assert_eq!(engine.projection(), Some(&Projection::default()));
        assert_eq!(engine.number_of_sections(), 0);
        assert_eq!(engine.number_of_items(3), 0);
        assert!(engine.tracker_at(0, 0).is_none());
        assert!(engine.title_for_section(0).is_none());
        assert_eq!(engine.params().weekday, Some(Weekday::Monday));
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_completed_filter_is_a_full_reload() {
        let (mut engine, mut sub) = engine().await;
        let health = engine.add_category("Health").await.unwrap();
        let work = engine.add_category("Work").await.unwrap();
        let run = engine
            .add_tracker(TrackerDraft::new("Run", health.id).schedule(every_day()))
            .await
            .unwrap();
        engine
            .add_tracker(TrackerDraft::new("Emails", work.id).schedule(every_day()))
            .await
            .unwrap();
        engine.toggle_completion(run.id, monday()).await.unwrap();
        assert_eq!(sub.drain().len(), 5);

        engine.set_filter(FilterKind::Completed);
        match sub.try_recv() {
            Some(ChangeEvent::FullReload(projection)) => {
                assert_eq!(projection.outline(), vec![("Health".to_string(), vec![run.id])]);
            }
            other => panic!("expected a full reload, got {other:?}"),
        }
        assert_eq!(engine.title_for_section(0), Some("Health"));
        assert!(engine.tracker_at(0, 0).unwrap().completed);
    }

    #[tokio::test]
    async fn test_move_to_new_category_deletes_and_inserts() {
        let (mut engine, mut sub) = engine().await;
        let health = engine.add_category("Health").await.unwrap();
        let work = engine.add_category("Work").await.unwrap();
        engine
            .add_tracker(TrackerDraft::new("Run", health.id).schedule(every_day()))
            .await
            .unwrap();
        let emails = engine
            .add_tracker(TrackerDraft::new("Emails", work.id).schedule(every_day()))
            .await
            .unwrap();
        let personal = engine.add_category("Personal").await.unwrap();
        sub.drain();

        // Health, Personal, Work: Emails leaves Work, which empties
        let draft = TrackerDraft::from(&emails);
        let draft = TrackerDraft { category_id: personal.id, ..draft };
        engine.edit_tracker(emails.id, draft).await.unwrap();

        let update = next_update(&mut sub);
        assert_eq!(update.deleted_sections, vec![1]);
        assert_eq!(update.inserted_sections, vec![1]);
        assert_eq!(update.deleted_rows, vec![IndexPath::new(1, 0)]);
        assert_eq!(update.inserted_rows, vec![IndexPath::new(1, 0)]);
        assert!(update.moved_rows.is_empty());
        assert_eq!(engine.title_for_section(1), Some("Personal"));
        assert_eq!(engine.category_of(emails.id), Some(&personal));
    }

    #[tokio::test]
    async fn test_delete_cascades_and_shifts_rows() {
        let (mut engine, mut sub) = engine().await;
        let health = engine.add_category("Health").await.unwrap();
        let run = engine
            .add_tracker(TrackerDraft::new("Run", health.id).schedule(every_day()))
            .await
            .unwrap();
        let swim = engine
            .add_tracker(TrackerDraft::new("Swim", health.id).schedule(every_day()))
            .await
            .unwrap();
        engine.toggle_completion(run.id, monday()).await.unwrap();
        engine
            .toggle_completion(run.id, monday().pred_opt().unwrap())
            .await
            .unwrap();
        assert_eq!(engine.total_completions(), 2);
        sub.drain();

        engine.delete_tracker(run.id).await.unwrap();
        assert_eq!(engine.total_completions(), 0);
        assert_eq!(engine.completion_count(run.id), 0);
        assert!(engine.category_of(run.id).is_none());

        let update = next_update(&mut sub);
        assert_eq!(update.deleted_rows, vec![IndexPath::new(0, 0)]);
        assert_eq!(
            update.moved_rows,
            vec![RowMove {
                from: IndexPath::new(0, 1),
                to: IndexPath::new(0, 0)
            }]
        );
        assert_eq!(engine.tracker_at(0, 0).map(|t| t.id), Some(swim.id));
    }

    #[tokio::test]
    async fn test_every_parameter_change_reloads() {
        let (mut engine, mut sub) = engine().await;
        let health = engine.add_category("Health").await.unwrap();
        engine
            .add_tracker(TrackerDraft::new("Run", health.id).schedule([Weekday::Tuesday]))
            .await
            .unwrap();
        sub.drain();
        assert_eq!(engine.number_of_sections(), 0);
        assert!(engine.has_any_tracker(Weekday::Tuesday));
        assert!(!engine.has_any_tracker(Weekday::Monday));

        engine.select_date(monday().succ_opt().unwrap());
        engine.set_search(Some("ru"));
        engine.set_search(Some("ru"));
        let params = engine.params().clone();
        engine.set_view_parameters(params);

        // a later full reload supersedes the undelivered ones
        let events = sub.drain();
        assert_eq!(events.len(), 1);
        assert!(events[0].is_full_reload());
        assert_eq!(engine.number_of_items(0), 1);
        assert_eq!(engine.params().weekday, Some(Weekday::Tuesday));
    }

    #[tokio::test]
    async fn test_today_filter_returns_to_today() {
        let (mut engine, _sub) = engine().await;
        engine.select_date(monday() - Duration::days(3));
        assert_eq!(engine.params().weekday, Some(Weekday::Friday));

        engine.set_filter(FilterKind::Today);
        assert_eq!(engine.params().reference_date, monday());
        assert_eq!(engine.params().weekday, Some(Weekday::Monday));
    }

    #[tokio::test]
    async fn test_failed_mutations_do_not_notify() {
        let (mut engine, mut sub) = engine().await;
        let health = engine.add_category("Health").await.unwrap();
        let run = engine
            .add_tracker(TrackerDraft::new("Run", health.id))
            .await
            .unwrap();
        sub.drain();

        let unknown = TrackerId::new();
        assert_eq!(
            engine.toggle_completion(unknown, monday()).await,
            Err(DomainError::TrackerNotFound(unknown))
        );
        assert_eq!(
            engine.delete_tracker(unknown).await,
            Err(DomainError::TrackerNotFound(unknown))
        );
        let missing = CategoryId::new();
        assert_eq!(
            engine.add_tracker(TrackerDraft::new("Swim", missing)).await,
            Err(DomainError::CategoryNotFound(missing))
        );
        let tomorrow = monday().succ_opt().unwrap();
        assert_eq!(
            engine.toggle_completion(run.id, tomorrow).await,
            Err(DomainError::FutureCompletion(tomorrow))
        );

        assert!(sub.try_recv().is_none());
        assert!(!engine.is_completed(run.id, tomorrow));
    }

    #[tokio::test]
    async fn test_storage_failure_leaves_state_and_queue_alone() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let mut engine = TrackerEngine::open(Arc::clone(&store), SectionGrouping::Title, clock())
            .await
            .unwrap();
        let health = engine.add_category("Health").await.unwrap();
        let run = engine
            .add_tracker(TrackerDraft::new("Run", health.id).schedule(every_day()))
            .await
            .unwrap();
        let mut sub = engine.subscribe().unwrap();
        sub.drain();

        store
            .connection()
            .lock()
            .await
            .execute("DROP TABLE completion_records", [])
            .unwrap();

        let err = engine.toggle_completion(run.id, monday()).await.unwrap_err();
        assert!(err.is_storage());
        assert!(!engine.is_completed(run.id, monday()));
        assert!(!engine.tracker_at(0, 0).unwrap().completed);
        assert!(sub.try_recv().is_none());

        // a failing reload keeps the facts that were already in memory
        assert!(engine.refresh().await.unwrap_err().is_storage());
        assert_eq!(engine.tracker(run.id), Some(&run));
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_refresh_picks_up_external_rows_and_skips_corrupt_ones() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let mut engine = TrackerEngine::open(Arc::clone(&store), SectionGrouping::Title, clock())
            .await
            .unwrap();
        let health = engine.add_category("Health").await.unwrap();
        let mut sub = engine.subscribe().unwrap();
        sub.drain();

        let external = Tracker::from_draft(
            TrackerDraft::new("Stretch", health.id).schedule(every_day()),
            Utc.with_ymd_and_hms(2024, 1, 1, 6, 0, 0).unwrap(),
        );
        Repository::<Tracker>::create(&*store, &external).await.unwrap();
        store
            .connection()
            .lock()
            .await
            .execute(
                "INSERT INTO trackers (id, category_id, title, color, emoji, schedule, created_at)
                 VALUES ('6f1c0f0e-0000-4000-8000-000000000009', ?1, 'Broken', 'teal', 'x', 127, 0)",
                [health.id.to_string()],
            )
            .unwrap();

        assert_eq!(engine.refresh().await.unwrap(), 1);
        let update = next_update(&mut sub);
        assert_eq!(update.inserted_sections, vec![0]);
        assert_eq!(update.inserted_rows, vec![IndexPath::new(0, 0)]);
        assert_eq!(engine.tracker_at(0, 0).map(|t| t.id), Some(external.id));
    }

    #[tokio::test]
    async fn test_refresh_after_sub_millisecond_clock_changes_nothing() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap() + Duration::nanoseconds(123_456_789);
        let clock = Arc::new(ManualClock::ticking(start, Duration::nanoseconds(100)));
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let mut engine = TrackerEngine::open(store, SectionGrouping::Title, clock).await.unwrap();
        let health = engine.add_category("Health").await.unwrap();
        let mut added = Vec::new();
        for title in ["A", "B", "C", "D", "E", "F", "G", "H"] {
            let draft = TrackerDraft::new(title, health.id).schedule(every_day());
            added.push(engine.add_tracker(draft).await.unwrap());
        }
        let mut sub = engine.subscribe().unwrap();
        sub.drain();

        assert_eq!(engine.refresh().await.unwrap(), 0);
        assert!(next_update(&mut sub).is_empty());
        assert_eq!(engine.category(health.id), Some(&health));
        for tracker in &added {
            assert_eq!(engine.tracker(tracker.id), Some(tracker));
        }
        let shown: Vec<_> = (0..engine.number_of_items(0))
            .filter_map(|row| engine.tracker_at(0, row).map(|t| t.id))
            .collect();
        let expected: Vec<_> = added.iter().map(|t| t.id).collect();
        assert_eq!(shown, expected);
    }

    #[tokio::test]
    async fn test_reopen_restores_state() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = EngineConfig::default();
        config.database.path = Some(dir.path().join("habits.db"));

        let run = {
            let mut engine = TrackerEngine::from_config(&config, clock()).await.unwrap();
            let health = engine.add_category("Health").await.unwrap();
            let run = engine
                .add_tracker(TrackerDraft::new("Run", health.id).schedule(every_day()))
                .await
                .unwrap();
            engine.toggle_completion(run.id, monday()).await.unwrap();
            run
        };

        let engine = TrackerEngine::from_config(&config, clock()).await.unwrap();
        assert_eq!(engine.tracker(run.id), Some(&run));
        assert!(engine.is_completed(run.id, monday()));
        assert_eq!(engine.tracker_at(0, 0).map(|t| t.completion_count), Some(1));
    }

    #[tokio::test]
    async fn test_identity_grouping_splits_equal_titles() {
        let mut engine = TrackerEngine::open(Arc::new(MemoryStore::new()), SectionGrouping::Identity, clock())
            .await
            .unwrap();
        let first = engine.add_category("Home").await.unwrap();
        let second = engine.add_category("Home").await.unwrap();
        engine
            .add_tracker(TrackerDraft::new("Dishes", first.id).schedule(every_day()))
            .await
            .unwrap();
        engine
            .add_tracker(TrackerDraft::new("Laundry", second.id).schedule(every_day()))
            .await
            .unwrap();

        assert_eq!(engine.grouping(), SectionGrouping::Identity);
        assert_eq!(engine.number_of_sections(), 2);
        assert_eq!(engine.title_for_section(1), Some("Home"));
        assert_eq!(engine.categories(), vec![&first, &second]);
    }
}
