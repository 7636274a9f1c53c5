//! Domain Layer - Core Entity Trait
//!
//! This trait defines the basic contract for all stored entities.
//! All entities must have a unique ID and be thread-safe.

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

use super::category::CategoryId;
use super::tracker::TrackerId;

/// Core trait for all domain entities
pub trait Entity: Sized + Send + Sync + Clone {
    /// The type of the entity's unique identifier
    type Id: Copy + Eq + std::hash::Hash + Send + Sync + std::fmt::Debug;

    /// Returns the entity's unique identifier
    fn id(&self) -> Self::Id;
}

/// Common result type for domain operations
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level errors
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum DomainError {
    #[error("Tracker not found: {0}")]
    TrackerNotFound(TrackerId),

    #[error("Category not found: {0}")]
    CategoryNotFound(CategoryId),

    /// The underlying store rejected the operation.
    #[error("Storage failure: {0}")]
    StorageFailure(String),

    /// A persisted record is missing a required field or holds garbage in it.
    #[error("Decoding failure: {entity}.{field}")]
    DecodingFailure {
        entity: &'static str,
        field: &'static str,
    },

    #[error("Cannot complete a tracker for a future day: {0}")]
    FutureCompletion(NaiveDate),
}

impl DomainError {
    pub fn decoding(entity: &'static str, field: &'static str) -> Self {
        DomainError::DecodingFailure { entity, field }
    }

    /// Whether the failure came from the store rather than from the request.
    pub fn is_storage(&self) -> bool {
        matches!(self, DomainError::StorageFailure(_))
    }
}

impl From<rusqlite::Error> for DomainError {
    fn from(err: rusqlite::Error) -> Self {
        DomainError::StorageFailure(err.to_string())
    }
}
