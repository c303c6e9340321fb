//! Sights from aboard a moving train.
//!
//! Both trains move in straight lines between their timetabled instants,
//! so between two consecutive instants of either timetable the displacement
//! from the observer's train to the other is linear in time. The search
//! bisects each such interval a fixed number of times towards the end
//! where the trains are closer. This is an approximation: an approach
//! closest strictly inside an interval can be missed, but results are
//! deterministic for a given depth.

use std::sync::Arc;

use chrono::Duration;
use tracing::trace;

use super::SightConfig;
use crate::domain::{FeededService, ServiceTime, StopTime, Trip};
use crate::geometry::Point;

/// A position at an instant.
///
/// During the search the position is a displacement between two trains;
/// in a finished sight it is an absolute coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InterpolationPoint {
    pub position: Point,
    pub time: ServiceTime,
}

impl InterpolationPoint {
    pub fn new(position: Point, time: ServiceTime) -> Self {
        Self { position, time }
    }

    /// The point halfway in both space and time.
    pub fn halfway(&self, other: &Self) -> Self {
        Self {
            position: self.position.lerp(other.position, 0.5),
            time: self.time.midpoint(other.time),
        }
    }

    /// Approximate the closest approach to the origin between `self` and
    /// `other` by `depth` halvings, keeping the half whose bound is closer.
    pub fn closest_with(&self, other: &Self, depth: u32) -> Self {
        let (mut low, mut high) = (*self, *other);
        for _ in 0..depth {
            let half = low.halfway(&high);
            if low.position.norm_squared() < high.position.norm_squared() {
                high = half;
            } else {
                low = half;
            }
        }
        low.halfway(&high)
    }
}

/// Another trip's closest approach to the observer's train.
#[derive(Debug, Clone)]
pub struct MovingTrainSight {
    pub trip: Arc<Trip>,
    /// Where and when the other train passes.
    pub passing: InterpolationPoint,
    pub distance_km: f64,
    /// Whether the other train is still moving at that instant.
    pub candidate_moving: bool,
    pub route_name: String,
}

impl MovingTrainSight {
    pub fn first(&self) -> &StopTime {
        self.trip.first()
    }

    pub fn last(&self) -> &StopTime {
        self.trip.last()
    }

    pub fn service(&self) -> FeededService {
        FeededService::new(self.trip.feed_id.clone(), self.trip.service_id.clone())
    }
}

/// Best displacement found so far.
#[derive(Debug, Clone, Copy)]
struct Approach {
    relative: InterpolationPoint,
    distance_squared: f64,
    moving: bool,
}

impl Approach {
    /// Moving trains win over stationary ones unless more than a factor of
    /// four further away (squared distances, so twice as far).
    fn beats(&self, best: &Approach) -> bool {
        match (self.moving, best.moving) {
            (true, false) => self.distance_squared <= 4.0 * best.distance_squared,
            (false, true) => 4.0 * self.distance_squared < best.distance_squared,
            _ => self.distance_squared < best.distance_squared,
        }
    }
}

/// Finds closest approaches between a reference trip and candidates.
pub struct MovingDetector<'a> {
    config: &'a SightConfig,
}

impl<'a> MovingDetector<'a> {
    pub fn new(config: &'a SightConfig) -> Self {
        Self { config }
    }

    /// Find the closest approach of `candidate` to an observer riding
    /// `reference`, which runs `lateness` behind its timetable.
    ///
    /// Returns `None` when the trips never run at the same time or never
    /// come within the distance threshold.
    pub fn detect(&self, reference: &Trip, lateness: Duration, candidate: &Arc<Trip>) -> Option<MovingTrainSight> {
        let grace = self.config.moving_grace();
        let (ref_start, ref_end) = (reference.departure() + lateness, reference.arrival() + lateness);
        if candidate.departure() - grace > ref_end || candidate.arrival() + grace < ref_start {
            return None;
        }

        let mut instants: Vec<ServiceTime> = reference
            .instants()
            .map(|t| t + lateness)
            .chain(candidate.instants())
            .filter(|t| (ref_start..=ref_end).contains(t))
            .collect();
        instants.sort();
        instants.dedup();

        let relative_at = |t: ServiceTime| {
            let ours = reference.position_at(t - lateness);
            InterpolationPoint::new(candidate.position_at(t).offset_from(ours), t)
        };

        let mut best: Option<Approach> = None;
        for pair in instants.windows(2) {
            let closest = relative_at(pair[0]).closest_with(&relative_at(pair[1]), self.config.bisection_depth);
            let approach = Approach {
                relative: closest,
                distance_squared: closest.position.norm_squared(),
                moving: !candidate.is_stationary_at(closest.time, self.config.stationary_horizon()),
            };
            if best.is_none_or(|best| approach.beats(&best)) {
                best = Some(approach);
            }
        }
        let best = best?;

        let ours = reference.position_at(best.relative.time - lateness);
        let theirs = ours.translate(best.relative.position);
        let distance_km = ours.distance_to(theirs);
        if distance_km > self.config.moving_threshold_km {
            return None;
        }
        if !candidate.is_active_at(best.relative.time, grace) {
            return None;
        }

        trace!(
            trip = %candidate.trip_id,
            time = %best.relative.time,
            distance_km,
            moving = best.moving,
            "Moving sight"
        );
        Some(MovingTrainSight {
            trip: Arc::clone(candidate),
            passing: InterpolationPoint::new(theirs, best.relative.time),
            distance_km,
            candidate_moving: best.moving,
            route_name: candidate.route.display_name().to_string(),
        })
    }
}
