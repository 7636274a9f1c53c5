//! Domain Layer
//!
//! Contains all domain entities and core abstractions.
//! This layer knows nothing about storage or notification.

mod category;
mod entity;
mod record;
mod tracker;
mod view;
mod weekday;

pub use category::{CategoryId, TrackerCategory};
pub use entity::{DomainError, DomainResult, Entity};
pub use record::{CalendarDay, CompletionRecord};
pub use tracker::{Color, ParseColorError, Tracker, TrackerDraft, TrackerId};
pub use view::{FilterKind, ViewParameters};
pub use weekday::Weekday;
