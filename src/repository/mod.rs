//! Repository Layer
//!
//! Data access abstractions and implementations.

mod db;
mod memory_store;
mod sqlite_store;
mod traits;


pub use db::init_db;
pub use memory_store::MemoryStore;
pub use sqlite_store::SqliteStore;
pub use traits::{Loaded, RecordRepository, Repository, TrackerStore};
