//! Stop types.

use std::fmt;

use crate::geometry::Point;

/// Identifies a stop across feeds: stop ids are only unique within a feed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StopKey {
    pub feed_id: String,
    pub stop_id: String,
}

impl StopKey {
    /// Create a key from a feed id and a stop id.
    pub fn new(feed_id: impl Into<String>, stop_id: impl Into<String>) -> Self {
        Self {
            feed_id: feed_id.into(),
            stop_id: stop_id.into(),
        }
    }
}

impl fmt::Display for StopKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.feed_id, self.stop_id)
    }
}

/// A stop or platform from a feed's `stops.txt`.
#[derive(Debug, Clone, PartialEq)]
pub struct Stop {
    pub feed_id: String,
    pub stop_id: String,
    pub name: String,
    pub location: Point,
    /// Station grouping this platform, if the feed declares one
    pub parent_station: Option<String>,
}

impl Stop {
    /// Creates a stop without a parent station.
    pub fn new(
        feed_id: impl Into<String>,
        stop_id: impl Into<String>,
        name: impl Into<String>,
        location: Point,
    ) -> Self {
        Self {
            feed_id: feed_id.into(),
            stop_id: stop_id.into(),
            name: name.into(),
            location,
            parent_station: None,
        }
    }

    /// Returns the feed-qualified key of this stop.
    pub fn key(&self) -> StopKey {
        StopKey::new(self.feed_id.clone(), self.stop_id.clone())
    }

    /// Distance to a point in kilometres.
    pub fn distance_to(&self, point: Point) -> f64 {
        self.location.distance_to(point)
    }
}
