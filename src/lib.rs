//! Tracker Core
//!
//! Layered architecture:
//! - domain: Core entities and value types
//! - repository: Storage traits, SQLite and in-memory stores
//! - catalog / ledger: In-memory facts kept in step with the store
//! - projection: Query and diff engines
//! - engine: Mutations, view parameters and change events

pub mod catalog;
pub mod clock;
pub mod config;
pub mod domain;
pub mod engine;
pub mod ledger;
pub mod logging;
pub mod notify;
pub mod projection;
pub mod repository;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, EngineConfig};
pub use domain::{
    CalendarDay, CategoryId, Color, CompletionRecord, DomainError, DomainResult, FilterKind,
    Tracker, TrackerCategory, TrackerDraft, TrackerId, ViewParameters, Weekday,
};
pub use engine::TrackerEngine;
pub use notify::{ChangeOutbox, ChangeSubscription};
pub use projection::{
    ChangeEvent, IndexPath, ProjectedTracker, Projection, SectionGrouping, StructuralUpdate,
};
pub use repository::{MemoryStore, SqliteStore, TrackerStore};
