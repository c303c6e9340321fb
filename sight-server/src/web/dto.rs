//! Data transfer objects for web requests and responses.

use serde::{Deserialize, Serialize};

use crate::domain::Stop;
use crate::sights::{RealMovingTrainSight, RealStopTime, RealTrainSight};

/// Request for the trains visible from a fixed point.
///
/// Either `start` (and optionally `end`) or `days` selects the dates.
#[derive(Debug, Deserialize)]
pub struct SightsRequest {
    pub lat: f64,
    pub lon: f64,

    /// First service date, YYYY-MM-DD
    pub start: Option<String>,

    /// Last service date, YYYY-MM-DD (defaults to `start`)
    pub end: Option<String>,

    /// Number of days from `start` (or today), including yesterday's
    /// late-running services
    pub days: Option<u32>,
}

/// Request for the trains seen from aboard a trip.
#[derive(Debug, Deserialize)]
pub struct TripSightsRequest {
    /// Service date, YYYY-MM-DD
    pub date: String,

    /// Minutes the observer's train runs late
    #[serde(default)]
    pub lateness_mins: i64,
}

/// Request to search stops by name.
#[derive(Debug, Deserialize)]
pub struct StopSearchRequest {
    pub q: String,
}

/// A stop time with absolute times.
#[derive(Debug, Serialize)]
pub struct StopTimeResult {
    pub stop_id: String,
    pub name: String,
    pub lat: f64,
    pub lon: f64,

    /// RFC 3339 arrival time
    pub arrival: Option<String>,

    /// RFC 3339 departure time
    pub departure: Option<String>,
}

/// A train seen from a fixed point.
#[derive(Debug, Serialize)]
pub struct SightResult {
    pub feed_id: String,
    pub trip_id: String,
    pub route_name: String,
    pub headsign: String,

    /// Service date the trip runs on
    pub date: String,

    /// When the train passes, RFC 3339
    pub timestamp: String,

    /// Passing time as a service-day offset (may exceed 24:00:00)
    pub passing_time: String,

    pub before: StopTimeResult,
    pub after: StopTimeResult,
    pub first: StopTimeResult,
    pub last: StopTimeResult,
}

/// Response for a fixed-point query.
#[derive(Debug, Serialize)]
pub struct SightsResponse {
    pub start: String,
    pub end: String,
    pub sights: Vec<SightResult>,
}

/// A train seen from aboard another train.
#[derive(Debug, Serialize)]
pub struct MovingSightResult {
    pub feed_id: String,
    pub trip_id: String,
    pub route_name: String,
    pub headsign: String,
    pub date: String,
    pub timestamp: String,

    /// Where the other train is at the closest approach
    pub lat: f64,
    pub lon: f64,

    pub distance_km: f64,

    /// False when the other train is standing at a stop
    pub moving: bool,

    pub first: StopTimeResult,
    pub last: StopTimeResult,
}

/// Response for a trip query.
#[derive(Debug, Serialize)]
pub struct TripSightsResponse {
    pub feed_id: String,
    pub trip_id: String,
    pub date: String,
    pub lateness_mins: i64,
    pub sights: Vec<MovingSightResult>,
}

/// A stop in search results.
#[derive(Debug, Serialize)]
pub struct StopResult {
    pub feed_id: String,
    pub stop_id: String,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub parent_station: Option<String>,
}

/// Response for stop search.
#[derive(Debug, Serialize)]
pub struct StopSearchResponse {
    pub stops: Vec<StopResult>,
}

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
}

// Conversion implementations

impl StopTimeResult {
    /// Create from a resolved stop time.
    pub fn from_stop_time(stop_time: &RealStopTime) -> Self {
        Self {
            stop_id: stop_time.stop.stop_id.clone(),
            name: stop_time.stop.name.clone(),
            lat: stop_time.stop.location.lat,
            lon: stop_time.stop.location.lon,
            arrival: stop_time.arrival.map(|t| t.to_rfc3339()),
            departure: stop_time.departure.map(|t| t.to_rfc3339()),
        }
    }
}

impl SightResult {
    /// Create from a dated stationary sight.
    pub fn from_sight(real: &RealTrainSight) -> Self {
        let trip = &real.sight.trip;
        Self {
            feed_id: trip.feed_id.clone(),
            trip_id: trip.trip_id.clone(),
            route_name: real.sight.route_name.clone(),
            headsign: trip.headsign.clone(),
            date: real.date.to_string(),
            timestamp: real.timestamp.to_rfc3339(),
            passing_time: real.sight.passing_time.to_string(),
            before: StopTimeResult::from_stop_time(&real.before),
            after: StopTimeResult::from_stop_time(&real.after),
            first: StopTimeResult::from_stop_time(&real.first),
            last: StopTimeResult::from_stop_time(&real.last),
        }
    }
}

impl MovingSightResult {
    /// Create from a dated moving sight.
    pub fn from_sight(real: &RealMovingTrainSight) -> Self {
        let trip = &real.sight.trip;
        let position = real.position();
        Self {
            feed_id: trip.feed_id.clone(),
            trip_id: trip.trip_id.clone(),
            route_name: real.sight.route_name.clone(),
            headsign: trip.headsign.clone(),
            date: real.date.to_string(),
            timestamp: real.timestamp.to_rfc3339(),
            lat: position.lat,
            lon: position.lon,
            distance_km: real.sight.distance_km,
            moving: real.sight.candidate_moving,
            first: StopTimeResult::from_stop_time(&real.first),
            last: StopTimeResult::from_stop_time(&real.last),
        }
    }
}

impl StopResult {
    /// Create from a domain Stop.
    pub fn from_stop(stop: &Stop) -> Self {
        Self {
            feed_id: stop.feed_id.clone(),
            stop_id: stop.stop_id.clone(),
            name: stop.name.clone(),
            lat: stop.location.lat,
            lon: stop.location.lon,
            parent_station: stop.parent_station.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Route, RouteType, ServiceTime, StopTime, Trip};
    use crate::geometry::Point;
    use crate::network::{NetworkConfig, NetworkMap};
    use crate::sights::{SightConfig, StationaryDetector};
    use chrono::NaiveDate;
    use chrono_tz::Europe::Paris;
    use std::sync::Arc;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()
    }

    fn t(h: u32, m: u32) -> ServiceTime {
        ServiceTime::from_hms(h, m, 0)
    }

    fn make_test_sight() -> RealTrainSight {
        let route = Arc::new(Route {
            feed_id: "1".into(),
            route_id: "R".into(),
            short_name: "TER".into(),
            long_name: "Lyon - Grenoble".into(),
            route_type: RouteType::HeavyRail,
        });
        let a = Arc::new(Stop::new("1", "A", "Lyon", Point::new(0.0, 0.0)));
        let b = Arc::new(Stop::new("1", "B", "Grenoble", Point::new(0.0, 2.0)));
        let stop_times = vec![
            StopTime::new("T1", a, 1, None, Some(t(8, 0))).unwrap(),
            StopTime::new("T1", b, 2, Some(t(8, 20)), None).unwrap(),
        ];
        let trip = Trip::new("1", "T1", "S1", route, stop_times)
            .unwrap()
            .with_headsign("Grenoble");
        let trip = Arc::new(trip);
        let map = NetworkMap::from_trips([trip.as_ref()], NetworkConfig::default()).unwrap();
        let config = SightConfig::default();
        let sight = StationaryDetector::new(&map, &config)
            .detect(Point::new(0.01, 1.0), &trip)
            .unwrap()
            .unwrap();
        RealTrainSight::new(sight, date(), Paris).unwrap()
    }

    #[test]
    fn sight_result_from_sight() {
        let result = SightResult::from_sight(&make_test_sight());

        assert_eq!(result.feed_id, "1");
        assert_eq!(result.trip_id, "T1");
        assert_eq!(result.route_name, "TER");
        assert_eq!(result.headsign, "Grenoble");
        assert_eq!(result.date, "2024-06-03");
        assert_eq!(result.passing_time, "08:10:00");
        assert_eq!(result.timestamp, "2024-06-03T08:10:00+02:00");
    }

    #[test]
    fn stop_time_fields() {
        let result = SightResult::from_sight(&make_test_sight());

        assert_eq!(result.first.name, "Lyon");
        assert_eq!(result.first.arrival, None);
        assert_eq!(
            result.first.departure,
            Some("2024-06-03T08:00:00+02:00".to_string())
        );

        assert_eq!(result.last.name, "Grenoble");
        assert_eq!(
            result.last.arrival,
            Some("2024-06-03T08:20:00+02:00".to_string())
        );
        assert_eq!(result.last.departure, None);
        assert_eq!(result.last.lon, 2.0);
    }

    #[test]
    fn stop_result_keeps_parent() {
        let mut stop = Stop::new("2", "P1", "Gare de Lyon", Point::new(48.84, 2.37));
        stop.parent_station = Some("GDL".into());
        let result = StopResult::from_stop(&stop);

        assert_eq!(result.feed_id, "2");
        assert_eq!(result.parent_station, Some("GDL".to_string()));
    }

    #[test]
    fn trip_request_lateness_defaults_to_zero() {
        let req: TripSightsRequest = serde_json::from_str(r#"{"date": "2024-06-03"}"#).unwrap();
        assert_eq!(req.lateness_mins, 0);
    }
}
