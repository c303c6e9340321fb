//! Timetable time handling for GTFS feeds.
//!
//! GTFS provides stop times as "HH:MM:SS" strings measured from the start
//! of the service day. Hours may exceed 23 for trips running past midnight,
//! so these values are offsets rather than wall-clock times. This module
//! provides a type for working with those offsets and for binding them to a
//! concrete calendar date in a given time zone.

use chrono::{DateTime, Duration, NaiveDate, TimeZone};
use chrono_tz::Tz;
use std::fmt;
use std::ops::{Add, Sub};

/// Error returned when parsing or resolving an invalid time.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid time: {reason}")]
pub struct TimeError {
    reason: &'static str,
}

impl TimeError {
    fn new(reason: &'static str) -> Self {
        Self { reason }
    }
}

/// An offset from the midnight that starts a service day.
///
/// Two stop times at "25:10:00" and "01:10:00" are a day apart: the first
/// belongs to the previous service day's trip running past midnight.
///
/// # Examples
///
/// ```
/// use sight_server::domain::ServiceTime;
///
/// let t = ServiceTime::parse_hms("25:10:00").unwrap();
/// assert_eq!(t.to_string(), "25:10:00");
/// assert!(t > ServiceTime::parse_hms("23:59:59").unwrap());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ServiceTime(Duration);

impl ServiceTime {
    /// Create a time from an offset since the service day's midnight.
    pub fn from_offset(offset: Duration) -> Self {
        Self(offset)
    }

    /// Create a time from hours, minutes and seconds.
    pub fn from_hms(hours: u32, minutes: u32, seconds: u32) -> Self {
        Self(
            Duration::hours(hours as i64)
                + Duration::minutes(minutes as i64)
                + Duration::seconds(seconds as i64),
        )
    }

    /// Parse a time from "HH:MM:SS" format.
    ///
    /// Single-digit hours are accepted ("8:05:00"), as are hours past 23.
    ///
    /// # Examples
    ///
    /// ```
    /// use sight_server::domain::ServiceTime;
    ///
    /// assert!(ServiceTime::parse_hms("08:00:00").is_ok());
    /// assert!(ServiceTime::parse_hms("8:00:00").is_ok());
    /// assert!(ServiceTime::parse_hms("26:15:30").is_ok());
    ///
    /// assert!(ServiceTime::parse_hms("08:00").is_err());
    /// assert!(ServiceTime::parse_hms("08:60:00").is_err());
    /// assert!(ServiceTime::parse_hms("ab:cd:ef").is_err());
    /// ```
    pub fn parse_hms(s: &str) -> Result<Self, TimeError> {
        let mut parts = s.trim().split(':');
        let (Some(h), Some(m), Some(sec), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(TimeError::new("expected HH:MM:SS format"));
        };

        let hours = parse_digits(h, 1..=3).ok_or_else(|| TimeError::new("invalid hour digits"))?;
        let minutes =
            parse_digits(m, 2..=2).ok_or_else(|| TimeError::new("invalid minute digits"))?;
        if minutes > 59 {
            return Err(TimeError::new("minute must be 0-59"));
        }
        let seconds =
            parse_digits(sec, 2..=2).ok_or_else(|| TimeError::new("invalid second digits"))?;
        if seconds > 59 {
            return Err(TimeError::new("second must be 0-59"));
        }

        Ok(Self::from_hms(hours, minutes, seconds))
    }

    /// Returns the offset since the service day's midnight.
    pub fn offset(&self) -> Duration {
        self.0
    }

    /// Returns the offset in (possibly fractional) seconds.
    pub fn as_secs_f64(&self) -> f64 {
        self.0.num_milliseconds() as f64 / 1000.0
    }

    /// Returns the time halfway between `self` and `other`.
    pub fn midpoint(&self, other: Self) -> Self {
        Self(self.0 + (other.0 - self.0) / 2)
    }

    /// Bind this offset to a concrete service date in the given zone.
    ///
    /// The offset is counted from local noon minus twelve hours rather than
    /// from local midnight, so that days with a daylight-saving transition
    /// during the night still place "08:00:00" at 08:00 local time.
    ///
    /// # Examples
    ///
    /// ```
    /// use sight_server::domain::ServiceTime;
    /// use chrono::{NaiveDate, Timelike};
    ///
    /// let date = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(); // DST starts in Paris
    /// let t = ServiceTime::parse_hms("08:00:00").unwrap();
    /// let at = t.on_date(date, chrono_tz::Europe::Paris).unwrap();
    /// assert_eq!(at.hour(), 8);
    /// ```
    pub fn on_date(&self, date: NaiveDate, tz: Tz) -> Result<DateTime<Tz>, TimeError> {
        let noon = date
            .and_hms_opt(12, 0, 0)
            .ok_or_else(|| TimeError::new("invalid service date"))?;
        let anchored = tz
            .from_local_datetime(&noon)
            .earliest()
            .ok_or_else(|| TimeError::new("local noon does not exist on service date"))?;
        anchored
            .checked_sub_signed(Duration::hours(12))
            .and_then(|midnight| midnight.checked_add_signed(self.0))
            .ok_or_else(|| TimeError::new("time overflow"))
    }
}

impl Add<Duration> for ServiceTime {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        Self(self.0 + rhs)
    }
}

impl Sub<Duration> for ServiceTime {
    type Output = Self;

    fn sub(self, rhs: Duration) -> Self::Output {
        Self(self.0 - rhs)
    }
}

impl Sub for ServiceTime {
    type Output = Duration;

    fn sub(self, rhs: Self) -> Self::Output {
        self.0 - rhs.0
    }
}

impl fmt::Debug for ServiceTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServiceTime({self})")
    }
}

impl fmt::Display for ServiceTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total = self.0.num_seconds();
        let sign = if total < 0 { "-" } else { "" };
        let total = total.abs();
        write!(
            f,
            "{sign}{:02}:{:02}:{:02}",
            total / 3600,
            (total % 3600) / 60,
            total % 60
        )
    }
}

/// Parse a run of ASCII digits whose length falls in `len`.
fn parse_digits(s: &str, len: std::ops::RangeInclusive<usize>) -> Option<u32> {
    if !len.contains(&s.len()) || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}
