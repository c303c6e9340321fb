//! Sight detection configuration.

use chrono::Duration;
use chrono_tz::Tz;

use super::SightError;
use crate::domain::RouteType;
use crate::geometry::Bearing;
use crate::network::NetworkConfig;

/// Configuration parameters for sight detection.
#[derive(Debug, Clone)]
pub struct SightConfig {
    /// IANA zone sights are timestamped in.
    pub time_zone: String,

    /// How far the observer may sit from a stop pair's line and still see
    /// a sweeping train, in degrees.
    pub out_of_bounds_grace_absolute: f64,

    /// The same margin as a fraction of the stop pair's length.
    pub out_of_bounds_grace_relative: f64,

    /// Bearing swing (degrees) across a hop that counts as the train
    /// passing in front of the observer.
    pub favorable_bearing_degrees: f64,

    /// A heavy-rail stop this close to the observer (km) is always a sight.
    pub heavy_rail_proximity_km: f64,

    /// A tram stop this close to the observer (km) is always a sight.
    pub tram_proximity_km: f64,

    /// Closest approaches further than this (km) are not moving sights.
    pub moving_threshold_km: f64,

    /// Slack around a candidate's running time for moving sights (minutes).
    pub moving_grace_mins: i64,

    /// Halvings per bisection when searching for a closest approach.
    pub bisection_depth: u32,

    /// A train that has not moved this long after an instant is considered
    /// stationary at it (minutes).
    pub stationary_horizon_mins: i64,

    pub network: NetworkConfig,
}

impl SightConfig {
    /// Default configuration observing from the given zone.
    pub fn new(time_zone: impl Into<String>) -> Self {
        Self {
            time_zone: time_zone.into(),
            ..Self::default()
        }
    }

    pub fn with_moving_threshold_km(mut self, km: f64) -> Self {
        self.moving_threshold_km = km;
        self
    }

    pub fn with_network(mut self, network: NetworkConfig) -> Self {
        self.network = network;
        self
    }

    /// Parse the configured time zone.
    pub fn tz(&self) -> Result<Tz, SightError> {
        self.time_zone
            .parse()
            .map_err(|_| SightError::InvalidTimeZone(self.time_zone.clone()))
    }

    pub fn favorable_bearing(&self) -> Bearing {
        Bearing::from_degrees(self.favorable_bearing_degrees)
    }

    /// Proximity threshold for stops served by `route_type`.
    pub fn proximity_km(&self, route_type: RouteType) -> f64 {
        match route_type {
            RouteType::Tram => self.tram_proximity_km,
            _ => self.heavy_rail_proximity_km,
        }
    }

    /// Returns the moving grace period as a Duration.
    pub fn moving_grace(&self) -> Duration {
        Duration::minutes(self.moving_grace_mins)
    }

    /// Returns the stationary horizon as a Duration.
    pub fn stationary_horizon(&self) -> Duration {
        Duration::minutes(self.stationary_horizon_mins)
    }
}

impl Default for SightConfig {
    fn default() -> Self {
        Self {
            time_zone: "Europe/Paris".to_string(),
            out_of_bounds_grace_absolute: 0.009 * 15.0, // about 15 km
            out_of_bounds_grace_relative: 0.10,
            favorable_bearing_degrees: 150.0,
            heavy_rail_proximity_km: 0.6,
            tram_proximity_km: 0.2,
            moving_threshold_km: 15.0,
            moving_grace_mins: 5,
            bisection_depth: 10,
            stationary_horizon_mins: 60,
            network: NetworkConfig::default(),
        }
    }
}
