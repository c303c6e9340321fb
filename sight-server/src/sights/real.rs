//! Sights bound to calendar dates.
//!
//! Detectors work in service time, which only means something once a
//! service date is known. A service running on three dates in the query
//! window gives three real sights for each of its detected trips.

use std::sync::Arc;

use chrono::{DateTime, Days, NaiveDate};
use chrono_tz::Tz;

use super::{MovingTrainSight, TrainSight};
use crate::domain::{ServiceTime, Stop, StopTime, TimeError};
use crate::geometry::Point;

/// A stop time resolved to absolute instants.
#[derive(Debug, Clone)]
pub struct RealStopTime {
    pub stop: Arc<Stop>,
    pub sequence: u32,
    pub arrival: Option<DateTime<Tz>>,
    pub departure: Option<DateTime<Tz>>,
}

impl RealStopTime {
    pub fn resolve(stop_time: &StopTime, date: NaiveDate, tz: Tz) -> Result<Self, TimeError> {
        let at = |t: Option<ServiceTime>| t.map(|t| t.on_date(date, tz)).transpose();
        Ok(Self {
            stop: Arc::clone(&stop_time.stop),
            sequence: stop_time.sequence,
            arrival: at(stop_time.arrival())?,
            departure: at(stop_time.departure())?,
        })
    }
}

/// A stationary sight on a given service date.
#[derive(Debug, Clone)]
pub struct RealTrainSight {
    pub sight: TrainSight,
    pub date: NaiveDate,
    pub timestamp: DateTime<Tz>,
    pub before: RealStopTime,
    pub after: RealStopTime,
    pub first: RealStopTime,
    pub last: RealStopTime,
}

impl RealTrainSight {
    pub fn new(sight: TrainSight, date: NaiveDate, tz: Tz) -> Result<Self, TimeError> {
        Ok(Self {
            timestamp: sight.passing_time.on_date(date, tz)?,
            before: RealStopTime::resolve(sight.before(), date, tz)?,
            after: RealStopTime::resolve(sight.after(), date, tz)?,
            first: RealStopTime::resolve(sight.first(), date, tz)?,
            last: RealStopTime::resolve(sight.last(), date, tz)?,
            sight,
            date,
        })
    }

    /// Every stop time of the sighted trip on this date.
    pub fn stop_times(&self) -> Result<Vec<RealStopTime>, TimeError> {
        let tz = self.timestamp.timezone();
        self.sight
            .trip
            .stop_times()
            .iter()
            .map(|st| RealStopTime::resolve(st, self.date, tz))
            .collect()
    }
}

/// A moving sight on a given service date.
#[derive(Debug, Clone)]
pub struct RealMovingTrainSight {
    pub sight: MovingTrainSight,
    pub date: NaiveDate,
    pub timestamp: DateTime<Tz>,
    pub first: RealStopTime,
    pub last: RealStopTime,
}

impl RealMovingTrainSight {
    pub fn new(sight: MovingTrainSight, date: NaiveDate, tz: Tz) -> Result<Self, TimeError> {
        Ok(Self {
            timestamp: sight.passing.time.on_date(date, tz)?,
            first: RealStopTime::resolve(sight.first(), date, tz)?,
            last: RealStopTime::resolve(sight.last(), date, tz)?,
            sight,
            date,
        })
    }

    pub fn position(&self) -> Point {
        self.sight.passing.position
    }
}

/// Service dates to query for `day_count` days from `start`.
///
/// Starts the day before so that trips of yesterday's services still
/// running past midnight are included. Returns `None` at the edges of the
/// representable calendar.
///
/// ```
/// use chrono::NaiveDate;
/// use sight_server::sights::date_window;
///
/// let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
/// let (from, to) = date_window(2, start).unwrap();
/// assert_eq!(from, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
/// assert_eq!(to, NaiveDate::from_ymd_opt(2024, 3, 3).unwrap());
/// ```
pub fn date_window(day_count: u32, start: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
    let from = start.checked_sub_days(Days::new(1))?;
    let to = start.checked_add_days(Days::new(u64::from(day_count)))?;
    Some((from, to))
}
