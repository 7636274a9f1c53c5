//! View Parameters
//!
//! What the list is currently looking at: a day, a filter and a search query.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::record::CalendarDay;
use super::weekday::Weekday;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    #[default]
    All,
    /// Same predicate as `All`; the caller moves the reference date to today.
    Today,
    Completed,
    Unfinished,
}

impl FilterKind {
    pub const ALL: [FilterKind; 4] = [
        FilterKind::All,
        FilterKind::Today,
        FilterKind::Completed,
        FilterKind::Unfinished,
    ];

    pub fn title(self) -> &'static str {
        match self {
            FilterKind::All => "All trackers",
            FilterKind::Today => "Trackers for today",
            FilterKind::Completed => "Completed",
            FilterKind::Unfinished => "Not completed",
        }
    }

    /// Whether a tracker with the given completion state for the reference
    /// day passes this filter.
    pub fn admits(self, completed: bool) -> bool {
        match self {
            FilterKind::All | FilterKind::Today => true,
            FilterKind::Completed => completed,
            FilterKind::Unfinished => !completed,
        }
    }
}

/// Immutable value; every change produces a new one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ViewParameters {
    /// `None` disables the schedule restriction
    pub weekday: Option<Weekday>,
    pub filter: FilterKind,
    pub reference_date: NaiveDate,
    pub search_text: Option<String>,
}

impl ViewParameters {
    /// Parameters for a selected day: weekday restriction on, no filter, no search.
    pub fn for_date(date: impl CalendarDay) -> Self {
        let reference_date = date.calendar_day();
        Self {
            weekday: Some(Weekday::of(&reference_date)),
            filter: FilterKind::All,
            reference_date,
            search_text: None,
        }
    }

    /// Moves to another day. The weekday restriction follows the new day if
    /// it was enabled.
    pub fn with_date(&self, date: impl CalendarDay) -> Self {
        let reference_date = date.calendar_day();
        Self {
            weekday: self.weekday.map(|_| Weekday::of(&reference_date)),
            reference_date,
            ..self.clone()
        }
    }

    pub fn with_filter(&self, filter: FilterKind) -> Self {
        Self {
            filter,
            ..self.clone()
        }
    }

    /// Empty text clears the search. Anything else, surrounding spaces
    /// included, is matched as typed.
    pub fn with_search(&self, text: Option<&str>) -> Self {
        let search_text = text.filter(|t| !t.is_empty()).map(str::to_string);
        Self {
            search_text,
            ..self.clone()
        }
    }

    pub fn without_weekday(&self) -> Self {
        Self {
            weekday: None,
            ..self.clone()
        }
    }

    /// Lowercased search needle, if a search is active.
    pub fn search_needle(&self) -> Option<String> {
        self.search_text
            .as_deref()
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase)
    }
}
