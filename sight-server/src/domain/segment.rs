//! Travel between two consecutive timetabled stops.

use std::sync::{Arc, OnceLock};

use chrono::Duration;

use super::{DomainError, Stop};

/// Directed travel from `source` to `target` taking `travel_time`.
///
/// The great-circle length of the hop is computed on first use and cached
/// on this instance.
#[derive(Debug, Clone)]
pub struct Segment {
    source: Arc<Stop>,
    target: Arc<Stop>,
    travel_time: Duration,
    distance: OnceLock<f64>,
}

impl Segment {
    /// Create a segment, rejecting negative travel times.
    pub fn new(source: Arc<Stop>, target: Arc<Stop>, travel_time: Duration) -> Result<Self, DomainError> {
        if travel_time < Duration::zero() {
            return Err(DomainError::NegativeTravelTime {
                from: source.key(),
                to: target.key(),
                seconds: travel_time.num_seconds(),
            });
        }
        Ok(Self {
            source,
            target,
            travel_time,
            distance: OnceLock::new(),
        })
    }

    pub fn source(&self) -> &Arc<Stop> {
        &self.source
    }

    pub fn target(&self) -> &Arc<Stop> {
        &self.target
    }

    pub fn travel_time(&self) -> Duration {
        self.travel_time
    }

    /// Length of the hop in kilometres.
    pub fn distance(&self) -> f64 {
        *self
            .distance
            .get_or_init(|| self.source.location.distance_to(self.target.location))
    }

    /// The same hop with the endpoints swapped.
    pub fn reversed(&self) -> Self {
        Self {
            source: Arc::clone(&self.target),
            target: Arc::clone(&self.source),
            travel_time: self.travel_time,
            distance: self.distance.clone(),
        }
    }

    /// The same hop with a different (non-negative) travel time.
    pub fn with_travel_time(&self, travel_time: Duration) -> Result<Self, DomainError> {
        let mut segment = Self::new(Arc::clone(&self.source), Arc::clone(&self.target), travel_time)?;
        segment.distance = self.distance.clone();
        Ok(segment)
    }
}
