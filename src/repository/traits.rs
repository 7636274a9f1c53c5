//! Repository Layer - Core Traits
//!
//! Defines the abstract interfaces for durable storage of trackers,
//! categories and completion records.
//! Implementations can use SQLite, in-memory, etc.

use async_trait::async_trait;

use crate::domain::{
    CompletionRecord, DomainError, DomainResult, Entity, Tracker, TrackerCategory,
};

/// Result of a bulk load.
///
/// Rows that could not be decoded end up in `rejected` instead of failing
/// the whole load.
#[derive(Debug, Clone, PartialEq)]
pub struct Loaded<T> {
    pub items: Vec<T>,
    pub rejected: Vec<DomainError>,
}

impl<T> Default for Loaded<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            rejected: Vec::new(),
        }
    }
}

impl<T> Loaded<T> {
    pub fn push(&mut self, decoded: DomainResult<T>) {
        match decoded {
            Ok(item) => self.items.push(item),
            Err(err) => self.rejected.push(err),
        }
    }
}

impl<T> FromIterator<T> for Loaded<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
            rejected: Vec::new(),
        }
    }
}

/// Core repository trait for CRUD operations
///
/// Generic over any Entity type.
/// All operations are async to support various backends.
#[async_trait]
pub trait Repository<T: Entity>: Send + Sync {
    /// Persist a new entity
    async fn create(&self, entity: &T) -> DomainResult<()>;

    /// Find entity by ID
    async fn find_by_id(&self, id: T::Id) -> DomainResult<Option<T>>;

    /// List all entities
    async fn list(&self) -> DomainResult<Loaded<T>>;

    /// Update an existing entity
    async fn update(&self, entity: &T) -> DomainResult<()>;

    /// Delete entity by ID.
    ///
    /// For trackers this also removes every completion record that
    /// references the tracker, atomically.
    async fn delete(&self, id: T::Id) -> DomainResult<()>;
}

/// Completion records are facts without editable fields: they are only
/// inserted and removed.
#[async_trait]
pub trait RecordRepository: Send + Sync {
    async fn insert_record(&self, record: &CompletionRecord) -> DomainResult<()>;

    async fn remove_record(&self, record: &CompletionRecord) -> DomainResult<()>;

    async fn list_records(&self) -> DomainResult<Loaded<CompletionRecord>>;
}

/// Everything the engine needs from a backend.
pub trait TrackerStore:
    Repository<Tracker> + Repository<TrackerCategory> + RecordRepository
{
}

impl<S> TrackerStore for S where
    S: Repository<Tracker> + Repository<TrackerCategory> + RecordRepository
{
}
