//! Service calendars and their expansion into concrete service days.
//!
//! A feed declares when each service runs with a weekly pattern over a
//! date range (`calendar.txt`) plus per-date exceptions
//! (`calendar_dates.txt`). [`resolve_service_days`] turns both into the
//! flat list of (feed, service, date) activations that sight queries join
//! against.

use std::collections::{BTreeSet, HashSet};

use chrono::{Datelike, NaiveDate, Weekday};

/// A service of a given feed. Service ids are only unique within a feed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FeededService {
    pub feed_id: String,
    pub service_id: String,
}

impl FeededService {
    pub fn new(feed_id: impl Into<String>, service_id: impl Into<String>) -> Self {
        Self {
            feed_id: feed_id.into(),
            service_id: service_id.into(),
        }
    }
}

/// One concrete day on which a service runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceDay {
    pub date: NaiveDate,
    pub feed_id: String,
    pub service_id: String,
}

impl ServiceDay {
    pub fn service(&self) -> FeededService {
        FeededService::new(self.feed_id.clone(), self.service_id.clone())
    }
}

/// A weekly running pattern between two dates, both inclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Calendar {
    pub feed_id: String,
    pub service_id: String,
    /// Running days, indexed from Monday.
    pub weekdays: [bool; 7],
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl Calendar {
    pub fn runs_on(&self, weekday: Weekday) -> bool {
        self.weekdays[weekday.num_days_from_monday() as usize]
    }
}

/// Whether a calendar exception adds or removes a service day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExceptionType {
    Added,
    Removed,
}

impl TryFrom<u8> for ExceptionType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(ExceptionType::Added),
            2 => Ok(ExceptionType::Removed),
            other => Err(other),
        }
    }
}

/// A single-date exception to a service's calendar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarDate {
    pub feed_id: String,
    pub service_id: String,
    pub date: NaiveDate,
    pub exception: ExceptionType,
}

/// Expand calendars and exceptions into sorted, deduplicated service days.
///
/// An added exception produces a service day even when no calendar row
/// mentions the service. A removed exception suppresses the calendar's day
/// regardless of its weekday pattern.
pub fn resolve_service_days(calendars: &[Calendar], exceptions: &[CalendarDate]) -> Vec<ServiceDay> {
    let mut days = BTreeSet::new();
    let mut removed = HashSet::new();

    for exception in exceptions {
        let day = ServiceDay {
            date: exception.date,
            feed_id: exception.feed_id.clone(),
            service_id: exception.service_id.clone(),
        };
        match exception.exception {
            ExceptionType::Added => {
                days.insert(day);
            }
            ExceptionType::Removed => {
                removed.insert(day);
            }
        }
    }

    for calendar in calendars {
        for date in calendar.start_date.iter_days() {
            if date > calendar.end_date {
                break;
            }
            if !calendar.runs_on(date.weekday()) {
                continue;
            }
            let day = ServiceDay {
                date,
                feed_id: calendar.feed_id.clone(),
                service_id: calendar.service_id.clone(),
            };
            if !removed.contains(&day) {
                days.insert(day);
            }
        }
    }

    days.into_iter().collect()
}
