//! Sights from a fixed observation point.
//!
//! Walking a trip stop pair by stop pair, each hop is broken into the
//! finer hops the network map knows about. A train is seen on a hop when,
//! looking from the observer, it sweeps across most of the horizon, or
//! when it calls at a stop close to the observer. Sweeps are judged on the
//! finer hops, so a fast train bending around the observer between two
//! distant calls is still seen.

use std::sync::Arc;

use tracing::trace;

use super::{SightConfig, SightError};
use crate::domain::{FeededService, ServiceTime, StopTime, Trip};
use crate::geometry::Point;
use crate::network::NetworkMap;

/// A trip seen from a fixed point, in service time.
#[derive(Debug, Clone)]
pub struct TrainSight {
    pub trip: Arc<Trip>,
    /// Index of the stop time the train last left before passing.
    before: usize,
    /// Estimated passing time, between the bracketing stop times.
    pub passing_time: ServiceTime,
    pub route_name: String,
}

impl TrainSight {
    /// Stop time the train leaves before passing the observer.
    pub fn before(&self) -> &StopTime {
        &self.trip.stop_times()[self.before]
    }

    /// Stop time the train reaches after passing the observer.
    pub fn after(&self) -> &StopTime {
        &self.trip.stop_times()[self.before + 1]
    }

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

/// Decides whether trips are visible from an observation point.
pub struct StationaryDetector<'a> {
    map: &'a NetworkMap,
    config: &'a SightConfig,
}

impl<'a> StationaryDetector<'a> {
    pub fn new(map: &'a NetworkMap, config: &'a SightConfig) -> Self {
        Self { map, config }
    }

    /// Find where, if anywhere, `trip` is seen from `observer`.
    ///
    /// Returns the first qualifying stop pair in the direction of travel.
    /// Trips of non-rail routes are never seen.
    pub fn detect(&self, observer: Point, trip: &Arc<Trip>) -> Result<Option<TrainSight>, SightError> {
        if !trip.route.route_type.is_rail() {
            return Ok(None);
        }

        let proximity_km = self.config.proximity_km(trip.route.route_type);
        let is_close = |p: Point| p.distance_to(observer) < proximity_km;
        let favorable = self.config.favorable_bearing();

        let stop_times = trip.stop_times();
        for (i, segment) in trip.segments()?.iter().enumerate() {
            let (before, after) = (&stop_times[i], &stop_times[i + 1]);

            let trajectory = self.map.decompose_trip_segment(segment)?;
            let mut has_close_stop = is_close(after.location())
                || trajectory
                    .first()
                    .is_some_and(|hop| is_close(hop.source().location));

            for hop in &trajectory {
                let start = hop.source().location.bearing_from(observer);
                let end = hop.target().location.bearing_from(observer);
                let sweeps = !end.is_diff_less_than(start, favorable);
                has_close_stop = has_close_stop || is_close(hop.target().location);

                if sweeps || has_close_stop {
                    trace!(
                        trip = %trip.trip_id,
                        from = %before.stop.name,
                        to = %after.stop.name,
                        hop_from = %hop.source().name,
                        hop_to = %hop.target().name,
                        swing = end.diff(start).to_degrees(),
                        near_line = self.near_line(observer, before, after),
                        has_close_stop,
                        "Sight"
                    );
                    return Ok(Some(TrainSight {
                        trip: Arc::clone(trip),
                        before: i,
                        passing_time: passing_time(before, after, observer),
                        route_name: trip.route.display_name().to_string(),
                    }));
                }
            }
        }
        Ok(None)
    }

    /// Whether `observer` lies within the grace margins of the stop pair's
    /// straight line.
    fn near_line(&self, observer: Point, before: &StopTime, after: &StopTime) -> bool {
        let offset = observer.line_offset(before.location(), after.location());
        offset.absolute <= self.config.out_of_bounds_grace_absolute
            || offset.relative <= self.config.out_of_bounds_grace_relative
    }
}

/// Interpolate when the train passes `observer` between two stop times.
///
/// The observer's position along the hop is read from longitude, or from
/// latitude when the longitude reading falls outside the hop (or the hop
/// has no east-west extent). A hop with no extent at all passes at its
/// departure.
pub fn passing_time(before: &StopTime, after: &StopTime, observer: Point) -> ServiceTime {
    let start = before.departure_or_arrival();
    let total = after.arrival_or_departure() - start;
    let (a, b) = (before.location(), after.location());

    let lon_proportion = (observer.lon - a.lon) / (b.lon - a.lon);
    let lat_proportion = (observer.lat - a.lat) / (b.lat - a.lat);
    let proportion = if (0.0..=1.0).contains(&lon_proportion) {
        lon_proportion
    } else if lat_proportion.is_finite() {
        lat_proportion.clamp(0.0, 1.0)
    } else {
        0.0
    };

    let offset_ms = (total.num_milliseconds() as f64 * proportion).round() as i64;
    start + chrono::Duration::milliseconds(offset_ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Route, RouteType, Stop};
    use crate::network::NetworkConfig;

    fn route(route_type: RouteType) -> Arc<Route> {
        Arc::new(Route {
            feed_id: "1".into(),
            route_id: "R".into(),
            short_name: String::new(),
            long_name: "Ligne A".into(),
            route_type,
        })
    }

    fn stop(id: &str, lat: f64, lon: f64) -> Arc<Stop> {
        Arc::new(Stop::new("1", id, id, Point::new(lat, lon)))
    }

    fn t(h: u32, m: u32) -> ServiceTime {
        ServiceTime::from_hms(h, m, 0)
    }

    fn trip_with(route_type: RouteType, calls: &[(Arc<Stop>, ServiceTime)]) -> Arc<Trip> {
        let stop_times = calls
            .iter()
            .enumerate()
            .map(|(i, (stop, at))| StopTime::new("T1", Arc::clone(stop), i as u32, Some(*at), Some(*at)).unwrap())
            .collect();
        Arc::new(Trip::new("1", "T1", "S1", route(route_type), stop_times).unwrap())
    }

    fn detect(observer: Point, trip: &Arc<Trip>) -> Option<TrainSight> {
        let map = NetworkMap::from_trips([trip.as_ref()], NetworkConfig::default()).unwrap();
        let config = SightConfig::default();
        StationaryDetector::new(&map, &config).detect(observer, trip).unwrap()
    }

    #[test]
    fn train_crossing_in_front_is_seen() {
        let trip = trip_with(
            RouteType::HeavyRail,
            &[(stop("A", 0.0, 0.0), t(8, 0)), (stop("B", 0.0, 2.0), t(8, 20))],
        );
        let sight = detect(Point::new(0.01, 1.0), &trip).unwrap();

        assert_eq!(sight.before().stop.stop_id, "A");
        assert_eq!(sight.after().stop.stop_id, "B");
        assert_eq!(sight.passing_time, t(8, 10));
        assert_eq!(sight.route_name, "Ligne A");
    }

    #[test]
    fn train_passing_through_observer_at_midpoint() {
        let trip = trip_with(
            RouteType::HeavyRail,
            &[(stop("A", 0.0, 0.0), t(8, 0)), (stop("B", 0.0, 2.0), t(8, 20))],
        );
        let sight = detect(Point::new(0.0, 1.0), &trip).unwrap();
        assert_eq!(sight.passing_time, t(8, 10));
    }

    #[test]
    fn far_away_trip_is_not_seen() {
        let trip = trip_with(
            RouteType::HeavyRail,
            &[(stop("A", 0.0, 0.0), t(8, 0)), (stop("B", 0.0, 2.0), t(8, 20))],
        );
        // Off to the side of A: small swing, no nearby stop
        assert!(detect(Point::new(0.5, -1.0), &trip).is_none());
    }

    #[test]
    fn express_seen_sweeping_on_decomposed_hop() {
        let (a, b, c) = (stop("A", 0.0, 0.0), stop("B", 1.0, 1.0), stop("C", 0.0, 2.0));
        let local = trip_with(
            RouteType::HeavyRail,
            &[(a.clone(), t(8, 0)), (b, t(8, 30)), (c.clone(), t(9, 0))],
        );
        let express = trip_with(RouteType::HeavyRail, &[(a, t(8, 0)), (c, t(8, 40))]);

        let map = NetworkMap::from_trips([local.as_ref(), express.as_ref()], NetworkConfig::default()).unwrap();
        let config = SightConfig::default();
        let detector = StationaryDetector::new(&map, &config);
        let express_hop = &express.segments().unwrap()[0];
        assert_eq!(map.decompose_trip_segment(express_hop).unwrap().len(), 2);

        // On the B-C line, far from the straight A-C line the express calls along
        let observer = Point::new(0.5, 1.5);

        let sight = detector.detect(observer, &local).unwrap().unwrap();
        assert_eq!(sight.before().stop.stop_id, "B");
        assert_eq!(sight.passing_time, t(8, 45));

        let sight = detector.detect(observer, &express).unwrap().unwrap();
        assert_eq!(sight.before().stop.stop_id, "A");
        assert_eq!(sight.after().stop.stop_id, "C");
        assert_eq!(sight.passing_time, t(8, 30));
    }

    #[test]
    fn nearby_stop_is_always_a_sight() {
        let trip = trip_with(
            RouteType::HeavyRail,
            &[
                (stop("A", 0.0, 0.0), t(8, 0)),
                (stop("B", 0.0, 1.0), t(8, 10)),
                (stop("C", 1.0, 1.0), t(8, 20)),
            ],
        );
        // 0.3 km north of B: the A-B hop only swings a quarter turn
        let sight = detect(Point::new(0.0027, 1.0), &trip).unwrap();
        assert_eq!(sight.after().stop.stop_id, "B");
    }

    #[test]
    fn tram_uses_tighter_proximity() {
        let calls = [
            (stop("A", 0.0, 0.0), t(8, 0)),
            (stop("B", 0.0, 1.0), t(8, 10)),
            (stop("C", 1.0, 1.0), t(8, 20)),
        ];
        let observer = Point::new(0.0027, 1.0);
        assert!(detect(observer, &trip_with(RouteType::HeavyRail, &calls)).is_some());
        // Too far from B for a tram stop; seen sweeping past on B-C instead
        let tram = detect(observer, &trip_with(RouteType::Tram, &calls)).unwrap();
        assert_eq!(tram.after().stop.stop_id, "C");
    }

    #[test]
    fn buses_are_never_seen() {
        let trip = trip_with(
            RouteType::Bus,
            &[(stop("A", 0.0, 0.0), t(8, 0)), (stop("B", 0.0, 2.0), t(8, 20))],
        );
        assert!(detect(Point::new(0.0, 1.0), &trip).is_none());
    }

    #[test]
    fn passing_time_falls_back_to_latitude() {
        let a = StopTime::new("T", stop("A", 0.0, 0.0), 1, None, Some(t(8, 0))).unwrap();
        let b = StopTime::new("T", stop("B", 2.0, 0.0), 2, Some(t(8, 20)), None).unwrap();
        assert_eq!(passing_time(&a, &b, Point::new(0.5, 0.1)), t(8, 5));
    }

    #[test]
    fn passing_time_on_degenerate_hop() {
        let a = StopTime::new("T", stop("A", 1.0, 1.0), 1, None, Some(t(8, 0))).unwrap();
        let b = StopTime::new("T", stop("B", 1.0, 1.0), 2, Some(t(8, 20)), None).unwrap();
        assert_eq!(passing_time(&a, &b, Point::new(1.0, 1.0)), t(8, 0));
    }
}
