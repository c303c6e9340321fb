//! Domain error types.
//!
//! These errors represent malformed timetable data reaching the domain
//! layer. They indicate ingestion bugs upstream, so callers abort the
//! query rather than skipping the offending trip.

use super::StopKey;

/// Domain-level errors for validation and data consistency.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DomainError {
    /// A stop time carries neither an arrival nor a departure
    #[error("stop time {sequence} of trip {trip_id} has no arrival and no departure time")]
    MissingTime { trip_id: String, sequence: u32 },

    /// Consecutive stop times go backwards in time
    #[error("negative travel time of {seconds}s from {from} to {to}")]
    NegativeTravelTime {
        from: StopKey,
        to: StopKey,
        seconds: i64,
    },

    /// A trip without any stop times
    #[error("trip {0} has no stop times")]
    EmptyTrip(String),
}
