//! Projection Layer
//!
//! The query engine computes what the list shows; the diff engine turns
//! consecutive results into change events.

mod diff;
mod query;

pub use diff::{ChangeCause, ChangeEvent, DiffEngine, RowMove, StructuralUpdate};
pub use query::{
    project, CompletionFacts, IndexPath, ProjectedTracker, Projection, Section, SectionGrouping,
    SectionKey, TrackerFacts,
};
