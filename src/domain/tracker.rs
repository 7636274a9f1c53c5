//! Tracker Entity
//!
//! A recurring habit scheduled on a set of weekdays.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::category::CategoryId;
use super::entity::Entity;
use super::weekday::Weekday;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackerId(pub Uuid);

impl TrackerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TrackerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TrackerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// RGBA color, 8 bits per channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 0xFF }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// `#RRGGBBAA`
    pub fn to_hex(&self) -> String {
        format!("#{:02X}{:02X}{:02X}{:02X}", self.r, self.g, self.b, self.a)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid color literal: {0}")]
pub struct ParseColorError(String);

impl FromStr for Color {
    type Err = ParseColorError;

    /// Accepts `#RRGGBB` or `#RRGGBBAA`, the leading `#` is optional.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim().trim_start_matches('#');
        if !(hex.len() == 6 || hex.len() == 8) || !hex.is_ascii() {
            return Err(ParseColorError(s.to_string()));
        }
        let channel = |i: usize| {
            u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| ParseColorError(s.to_string()))
        };
        let a = if hex.len() == 8 { channel(6)? } else { 0xFF };
        Ok(Color::rgba(channel(0)?, channel(2)?, channel(4)?, a))
    }
}

impl Serialize for Color {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let literal = String::deserialize(deserializer)?;
        literal.parse().map_err(serde::de::Error::custom)
    }
}

/// A recurring habit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tracker {
    /// Unique identifier, never changes
    pub id: TrackerId,
    pub title: String,
    pub color: Color,
    pub emoji: String,
    /// May be empty; only the creation flow insists on at least one day
    pub schedule: BTreeSet<Weekday>,
    pub created_at: DateTime<Utc>,
    pub category_id: CategoryId,
}

impl Tracker {
    /// Build a tracker with a fresh identity from user input.
    /// `created_at` is cut to whole milliseconds, the precision the store keeps.
    pub fn from_draft(draft: TrackerDraft, created_at: DateTime<Utc>) -> Self {
        Self {
            id: TrackerId::new(),
            title: draft.title,
            color: draft.color,
            emoji: draft.emoji,
            schedule: draft.schedule,
            created_at: created_at.trunc_subsecs(3),
            category_id: draft.category_id,
        }
    }

    /// Copy of this tracker with the editable fields replaced.
    /// `id` and `created_at` are kept.
    pub fn edited(&self, draft: TrackerDraft) -> Self {
        Self {
            id: self.id,
            title: draft.title,
            color: draft.color,
            emoji: draft.emoji,
            schedule: draft.schedule,
            created_at: self.created_at,
            category_id: draft.category_id,
        }
    }

    pub fn is_scheduled_on(&self, weekday: Weekday) -> bool {
        self.schedule.contains(&weekday)
    }
}

impl Entity for Tracker {
    type Id = TrackerId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

/// The user-editable part of a tracker, used for both create and edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerDraft {
    pub title: String,
    pub color: Color,
    pub emoji: String,
    pub schedule: BTreeSet<Weekday>,
    pub category_id: CategoryId,
}

impl TrackerDraft {
    pub fn new(title: impl Into<String>, category_id: CategoryId) -> Self {
        Self {
            title: title.into(),
            color: Color::rgb(0xAE, 0xAF, 0xB4),
            emoji: String::new(),
            schedule: BTreeSet::new(),
            category_id,
        }
    }

    pub fn color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    pub fn emoji(mut self, emoji: impl Into<String>) -> Self {
        self.emoji = emoji.into();
        self
    }

    pub fn schedule(mut self, days: impl IntoIterator<Item = Weekday>) -> Self {
        self.schedule = days.into_iter().collect();
        self
    }
}

impl From<&Tracker> for TrackerDraft {
    fn from(tracker: &Tracker) -> Self {
        Self {
            title: tracker.title.clone(),
            color: tracker.color,
            emoji: tracker.emoji.clone(),
            schedule: tracker.schedule.clone(),
            category_id: tracker.category_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_parsing() {
        assert_eq!("#FF8000".parse::<Color>(), Ok(Color::rgb(0xFF, 0x80, 0x00)));
        assert_eq!("33cc6680".parse::<Color>(), Ok(Color::rgba(0x33, 0xCC, 0x66, 0x80)));
        assert!("#FF80".parse::<Color>().is_err());
        assert!("#GG0000".parse::<Color>().is_err());
        assert_eq!(Color::rgb(1, 2, 3).to_hex(), "#010203FF");
    }

    #[test]
    fn test_edit_keeps_identity() {
        let category = CategoryId::new();
        let created = Utc::now();
        let tracker = Tracker::from_draft(
            TrackerDraft::new("Run", category).emoji("🏃").schedule([Weekday::Monday]),
            created,
        );

        let other = CategoryId::new();
        let edited = tracker.edited(TrackerDraft::new("Walk", other).schedule([]));

        assert_eq!(edited.id, tracker.id);
        assert_eq!(edited.created_at, created);
        assert_eq!(edited.title, "Walk");
        assert_eq!(edited.category_id, other);
        assert!(edited.schedule.is_empty());
        assert!(tracker.is_scheduled_on(Weekday::Monday));
    }

    #[test]
    fn test_creation_time_kept_to_milliseconds() {
        let created = DateTime::from_timestamp(1_704_110_400, 123_456_789).unwrap();
        let tracker = Tracker::from_draft(TrackerDraft::new("Run", CategoryId::new()), created);
        assert_eq!(tracker.created_at.timestamp_subsec_nanos(), 123_000_000);
        assert_eq!(
            DateTime::from_timestamp_millis(tracker.created_at.timestamp_millis()),
            Some(tracker.created_at)
        );
    }
}
