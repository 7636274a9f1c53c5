//! Completion Record
//!
//! The fact that a tracker was completed on a calendar day.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone};
use serde::{Deserialize, Serialize};

use super::entity::Entity;
use super::tracker::TrackerId;

/// Anything that can be truncated to a calendar day.
pub trait CalendarDay {
    fn calendar_day(&self) -> NaiveDate;
}

impl CalendarDay for NaiveDate {
    fn calendar_day(&self) -> NaiveDate {
        *self
    }
}

impl CalendarDay for NaiveDateTime {
    fn calendar_day(&self) -> NaiveDate {
        self.date()
    }
}

/// The day is taken in the timestamp's own time zone.
impl<Tz: TimeZone> CalendarDay for DateTime<Tz> {
    fn calendar_day(&self) -> NaiveDate {
        self.date_naive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CompletionRecord {
    pub tracker_id: TrackerId,
    pub day: NaiveDate,
}

impl CompletionRecord {
    pub fn new(tracker_id: TrackerId, date: impl CalendarDay) -> Self {
        Self {
            tracker_id,
            day: date.calendar_day(),
        }
    }
}

/// Records are identified by their content; a pair can exist only once.
impl Entity for CompletionRecord {
    type Id = (TrackerId, NaiveDate);

    fn id(&self) -> Self::Id {
        (self.tracker_id, self.day)
    }
}
