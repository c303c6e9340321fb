//! Trips, their stop times, and the piecewise-linear trajectory they imply.

use std::sync::Arc;

use chrono::Duration;

use super::{DomainError, Route, Segment, ServiceTime, Stop};
use crate::geometry::Point;

/// A single scheduled visit of a trip at a stop.
///
/// At least one of arrival and departure is always present; the accessors
/// fall back to the other one when a time is missing.
#[derive(Debug, Clone, PartialEq)]
pub struct StopTime {
    pub stop: Arc<Stop>,
    pub sequence: u32,
    arrival: Option<ServiceTime>,
    departure: Option<ServiceTime>,
}

impl StopTime {
    /// Create a stop time for `trip_id`.
    ///
    /// Returns [`DomainError::MissingTime`] when both times are absent.
    pub fn new(
        trip_id: &str,
        stop: Arc<Stop>,
        sequence: u32,
        arrival: Option<ServiceTime>,
        departure: Option<ServiceTime>,
    ) -> Result<Self, DomainError> {
        if arrival.is_none() && departure.is_none() {
            return Err(DomainError::MissingTime {
                trip_id: trip_id.to_string(),
                sequence,
            });
        }
        Ok(Self {
            stop,
            sequence,
            arrival,
            departure,
        })
    }

    pub fn arrival(&self) -> Option<ServiceTime> {
        self.arrival
    }

    pub fn departure(&self) -> Option<ServiceTime> {
        self.departure
    }

    /// Arrival time, or the departure time if no arrival is scheduled.
    pub fn arrival_or_departure(&self) -> ServiceTime {
        self.arrival.or(self.departure).unwrap_or_default()
    }

    /// Departure time, or the arrival time if no departure is scheduled.
    pub fn departure_or_arrival(&self) -> ServiceTime {
        self.departure.or(self.arrival).unwrap_or_default()
    }

    pub fn location(&self) -> Point {
        self.stop.location
    }
}

/// An axis-aligned box in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    /// The smallest box spanning both points.
    pub fn spanning(a: Point, b: Point) -> Self {
        Self {
            min_lat: a.lat.min(b.lat),
            max_lat: a.lat.max(b.lat),
            min_lon: a.lon.min(b.lon),
            max_lon: a.lon.max(b.lon),
        }
    }

    /// The smallest box spanning all points, or `None` if there are none.
    pub fn from_points(points: impl IntoIterator<Item = Point>) -> Option<Self> {
        let mut points = points.into_iter();
        let first = points.next()?;
        Some(points.fold(Self::spanning(first, first), |bbox, p| Self {
            min_lat: bbox.min_lat.min(p.lat),
            max_lat: bbox.max_lat.max(p.lat),
            min_lon: bbox.min_lon.min(p.lon),
            max_lon: bbox.max_lon.max(p.lon),
        }))
    }

    /// Whether the two boxes overlap once `other` is widened by `grace` degrees.
    pub fn intersects(&self, other: &BoundingBox, grace: f64) -> bool {
        self.max_lat >= other.min_lat - grace
            && self.min_lat <= other.max_lat + grace
            && self.max_lon >= other.min_lon - grace
            && self.min_lon <= other.max_lon + grace
    }

    pub fn contains(&self, point: Point) -> bool {
        (self.min_lat..=self.max_lat).contains(&point.lat)
            && (self.min_lon..=self.max_lon).contains(&point.lon)
    }
}

/// A trip with its validated, sequence-ordered stop times.
#[derive(Debug, Clone)]
pub struct Trip {
    pub feed_id: String,
    pub trip_id: String,
    pub service_id: String,
    pub route: Arc<Route>,
    pub headsign: String,
    pub short_name: String,
    stop_times: Vec<StopTime>,
    bounds: BoundingBox,
}

impl Trip {
    /// Create a trip, ordering stop times by sequence.
    ///
    /// Fails if there are no stop times or if the schedule ever goes
    /// backwards in time, whether between two stops or during a dwell.
    pub fn new(
        feed_id: impl Into<String>,
        trip_id: impl Into<String>,
        service_id: impl Into<String>,
        route: Arc<Route>,
        mut stop_times: Vec<StopTime>,
    ) -> Result<Self, DomainError> {
        let trip_id = trip_id.into();
        stop_times.sort_by_key(|st| st.sequence);

        let bounds = BoundingBox::from_points(stop_times.iter().map(StopTime::location))
            .ok_or_else(|| DomainError::EmptyTrip(trip_id.clone()))?;

        for st in &stop_times {
            check_order(st, st.arrival_or_departure(), st, st.departure_or_arrival())?;
        }
        for pair in stop_times.windows(2) {
            check_order(
                &pair[0],
                pair[0].departure_or_arrival(),
                &pair[1],
                pair[1].arrival_or_departure(),
            )?;
        }

        Ok(Self {
            feed_id: feed_id.into(),
            trip_id,
            service_id: service_id.into(),
            route,
            headsign: String::new(),
            short_name: String::new(),
            stop_times,
            bounds,
        })
    }

    pub fn with_headsign(mut self, headsign: impl Into<String>) -> Self {
        self.headsign = headsign.into();
        self
    }

    pub fn with_short_name(mut self, short_name: impl Into<String>) -> Self {
        self.short_name = short_name.into();
        self
    }

    pub fn stop_times(&self) -> &[StopTime] {
        &self.stop_times
    }

    pub fn bounds(&self) -> BoundingBox {
        self.bounds
    }

    pub fn first(&self) -> &StopTime {
        // Non-empty by construction.
        &self.stop_times[0]
    }

    pub fn last(&self) -> &StopTime {
        &self.stop_times[self.stop_times.len() - 1]
    }

    /// Time the trip leaves its first stop.
    pub fn departure(&self) -> ServiceTime {
        self.first().departure_or_arrival()
    }

    /// Time the trip reaches its last stop.
    pub fn arrival(&self) -> ServiceTime {
        self.last().arrival_or_departure()
    }

    /// Whether `t` falls within the trip's running time widened by `grace`.
    pub fn is_active_at(&self, t: ServiceTime, grace: Duration) -> bool {
        self.departure() - grace <= t && t <= self.arrival() + grace
    }

    /// The consecutive stop pairs of this trip as segments.
    pub fn segments(&self) -> Result<Vec<Segment>, DomainError> {
        self.stop_times
            .windows(2)
            .map(|pair| {
                Segment::new(
                    Arc::clone(&pair[0].stop),
                    Arc::clone(&pair[1].stop),
                    pair[1].arrival_or_departure() - pair[0].departure_or_arrival(),
                )
            })
            .collect()
    }

    /// Every scheduled arrival and departure instant, in stop order.
    pub fn instants(&self) -> impl Iterator<Item = ServiceTime> + '_ {
        self.stop_times
            .iter()
            .flat_map(|st| [st.arrival_or_departure(), st.departure_or_arrival()])
    }

    /// Estimated position at `t`.
    ///
    /// The trip waits at its first stop before departure and at its last
    /// stop after arrival; in between it moves in a straight line at
    /// constant speed from one stop to the next.
    pub fn position_at(&self, t: ServiceTime) -> Point {
        let mut previous: Option<&StopTime> = None;
        for st in &self.stop_times {
            let arrival = st.arrival_or_departure();
            if t < arrival {
                let Some(before) = previous else {
                    return st.location();
                };
                let start = before.departure_or_arrival();
                let total = (arrival - start).num_milliseconds();
                if total <= 0 {
                    return st.location();
                }
                let proportion = (t - start).num_milliseconds() as f64 / total as f64;
                return before.location().lerp(st.location(), proportion);
            }
            if t < st.departure_or_arrival() {
                return st.location();
            }
            previous = Some(st);
        }
        self.last().location()
    }

    /// Whether the trip has not moved `horizon` after `t`.
    pub fn is_stationary_at(&self, t: ServiceTime, horizon: Duration) -> bool {
        self.position_at(t) == self.position_at(t + horizon)
    }
}

fn check_order(
    from: &StopTime,
    start: ServiceTime,
    to: &StopTime,
    end: ServiceTime,
) -> Result<(), DomainError> {
    let travel = end - start;
    if travel < Duration::zero() {
        return Err(DomainError::NegativeTravelTime {
            from: from.stop.key(),
            to: to.stop.key(),
            seconds: travel.num_seconds(),
        });
    }
    Ok(())
}
