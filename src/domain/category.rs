//! Tracker Category Entity
//!
//! Categories group trackers and become list sections.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::entity::Entity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryId(pub Uuid);

impl CategoryId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CategoryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A named bucket of trackers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerCategory {
    pub id: CategoryId,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

impl TrackerCategory {
    /// `created_at` is cut to whole milliseconds.
    pub fn new(title: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: CategoryId::new(),
            title: title.into(),
            created_at: created_at.trunc_subsecs(3),
        }
    }
}

impl Entity for TrackerCategory {
    type Id = CategoryId;

    fn id(&self) -> Self::Id {
        self.id
    }
}
