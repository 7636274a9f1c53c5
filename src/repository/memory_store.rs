//! In-memory store
//!
//! Keeps the same contract as the SQLite store, including the foreign key
//! checks and the cascading tracker delete.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::traits::{Loaded, RecordRepository, Repository};
use crate::domain::{
    CategoryId, CompletionRecord, DomainError, DomainResult, Tracker, TrackerCategory, TrackerId,
};

#[derive(Debug, Default)]
struct Tables {
    categories: HashMap<CategoryId, TrackerCategory>,
    trackers: HashMap<TrackerId, Tracker>,
    records: HashSet<CompletionRecord>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn constraint(msg: impl Into<String>) -> DomainError {
    DomainError::StorageFailure(msg.into())
}

#[async_trait]
impl Repository<TrackerCategory> for MemoryStore {
    async fn create(&self, entity: &TrackerCategory) -> DomainResult<()> {
        let mut tables = self.tables.lock().await;
        if tables.categories.contains_key(&entity.id) {
            return Err(constraint(format!("category {} already exists", entity.id)));
        }
        tables.categories.insert(entity.id, entity.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: CategoryId) -> DomainResult<Option<TrackerCategory>> {
        Ok(self.tables.lock().await.categories.get(&id).cloned())
    }

    async fn list(&self) -> DomainResult<Loaded<TrackerCategory>> {
        Ok(self.tables.lock().await.categories.values().cloned().collect())
    }

    async fn update(&self, entity: &TrackerCategory) -> DomainResult<()> {
        let mut tables = self.tables.lock().await;
        match tables.categories.get_mut(&entity.id) {
            Some(existing) => {
                *existing = entity.clone();
                Ok(())
            }
            None => Err(DomainError::CategoryNotFound(entity.id)),
        }
    }

    async fn delete(&self, id: CategoryId) -> DomainResult<()> {
        let mut tables = self.tables.lock().await;
        if tables.trackers.values().any(|t| t.category_id == id) {
            return Err(constraint(format!("category {} still has trackers", id)));
        }
        tables.categories.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl Repository<Tracker> for MemoryStore {
    async fn create(&self, entity: &Tracker) -> DomainResult<()> {
        let mut tables = self.tables.lock().await;
        if !tables.categories.contains_key(&entity.category_id) {
            return Err(constraint(format!("unknown category {}", entity.category_id)));
        }
        if tables.trackers.contains_key(&entity.id) {
            return Err(constraint(format!("tracker {} already exists", entity.id)));
        }
        tables.trackers.insert(entity.id, entity.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: TrackerId) -> DomainResult<Option<Tracker>> {
        Ok(self.tables.lock().await.trackers.get(&id).cloned())
    }

    async fn list(&self) -> DomainResult<Loaded<Tracker>> {
        Ok(self.tables.lock().await.trackers.values().cloned().collect())
    }

    async fn update(&self, entity: &Tracker) -> DomainResult<()> {
        let mut tables = self.tables.lock().await;
        if !tables.categories.contains_key(&entity.category_id) {
            return Err(constraint(format!("unknown category {}", entity.category_id)));
        }
        match tables.trackers.get_mut(&entity.id) {
            Some(existing) => {
                *existing = entity.clone();
                Ok(())
            }
            None => Err(DomainError::TrackerNotFound(entity.id)),
        }
    }

    async fn delete(&self, id: TrackerId) -> DomainResult<()> {
        let mut tables = self.tables.lock().await;
        tables.records.retain(|r| r.tracker_id != id);
        tables.trackers.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl RecordRepository for MemoryStore {
    async fn insert_record(&self, record: &CompletionRecord) -> DomainResult<()> {
        let mut tables = self.tables.lock().await;
        if !tables.trackers.contains_key(&record.tracker_id) {
            return Err(constraint(format!("unknown tracker {}", record.tracker_id)));
        }
        if !tables.records.insert(*record) {
            return Err(constraint(format!(
                "record for {} on {} already exists",
                record.tracker_id, record.day
            )));
        }
        Ok(())
    }

    async fn remove_record(&self, record: &CompletionRecord) -> DomainResult<()> {
        self.tables.lock().await.records.remove(record);
        Ok(())
    }

    async fn list_records(&self) -> DomainResult<Loaded<CompletionRecord>> {
        Ok(self.tables.lock().await.records.iter().copied().collect())
    }
}
