//! Geographic primitives used by sight detection.
//!
//! Distances are great-circle (haversine) distances in kilometres. Bearings
//! and point-to-line distances work directly on latitude/longitude degrees,
//! a planar approximation that holds at the few-kilometre scale sights are
//! detected at. Nothing here handles the poles or the antimeridian.

use std::f64::consts::PI;
use std::fmt;

/// Mean Earth radius in kilometres.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// A geographic coordinate in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub lat: f64,
    pub lon: f64,
}

impl Point {
    /// Create a point from latitude and longitude.
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Great-circle distance to `other` in kilometres.
    ///
    /// # Examples
    ///
    /// ```
    /// use sight_server::geometry::Point;
    ///
    /// let a = Point::new(0.0, 0.0);
    /// let b = Point::new(0.0, 1.0);
    /// let km = a.distance_to(b);
    /// assert!((km - 111.19).abs() < 0.01);
    /// ```
    pub fn distance_to(&self, other: Point) -> f64 {
        let lat1 = self.lat.to_radians();
        let lat2 = other.lat.to_radians();
        let dlat = (other.lat - self.lat).to_radians();
        let dlon = (other.lon - self.lon).to_radians();

        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
        EARTH_RADIUS_KM * c
    }

    /// Bearing of `self` as seen from `observer`.
    pub fn bearing_from(&self, observer: Point) -> Bearing {
        Bearing((self.lat - observer.lat).atan2(self.lon - observer.lon))
    }

    /// Component-wise difference `self - origin`, used as a displacement.
    pub fn offset_from(&self, origin: Point) -> Point {
        Point::new(self.lat - origin.lat, self.lon - origin.lon)
    }

    /// Component-wise sum, applying a displacement.
    pub fn translate(&self, offset: Point) -> Point {
        Point::new(self.lat + offset.lat, self.lon + offset.lon)
    }

    /// The point a fraction `t` of the way from `self` to `other`.
    pub fn lerp(&self, other: Point, t: f64) -> Point {
        Point::new(
            self.lat + t * (other.lat - self.lat),
            self.lon + t * (other.lon - self.lon),
        )
    }

    /// Squared length of this point seen as a displacement, in degrees².
    pub fn norm_squared(&self) -> f64 {
        self.lat * self.lat + self.lon * self.lon
    }

    /// Distance from `self` to the infinite line through `a` and `b`.
    ///
    /// Returns the distance in degrees together with that distance as a
    /// fraction of the length of `a`–`b`. A degenerate line (`a == b`)
    /// falls back to the plain distance to `a`, with an infinite fraction.
    ///
    /// # Examples
    ///
    /// ```
    /// use sight_server::geometry::Point;
    ///
    /// let offset = Point::new(0.5, 1.0).line_offset(Point::new(0.0, 0.0), Point::new(0.0, 2.0));
    /// assert!((offset.absolute - 0.5).abs() < 1e-12);
    /// assert!((offset.relative - 0.25).abs() < 1e-12);
    /// ```
    pub fn line_offset(&self, a: Point, b: Point) -> LineOffset {
        let (x0, y0) = (self.lat, self.lon);
        let (x1, y1) = (a.lat, a.lon);
        let (x2, y2) = (b.lat, b.lon);

        let length_squared = (x2 - x1).powi(2) + (y2 - y1).powi(2);
        if length_squared == 0.0 {
            return LineOffset {
                absolute: self.offset_from(a).norm_squared().sqrt(),
                relative: f64::INFINITY,
            };
        }

        let numerator = ((x2 - x1) * (y0 - y1) - (x0 - x1) * (y2 - y1)).abs();
        LineOffset {
            absolute: numerator / length_squared.sqrt(),
            relative: numerator / length_squared,
        }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lat, self.lon)
    }
}

/// Perpendicular offset of a point from a line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineOffset {
    /// Distance in degrees.
    pub absolute: f64,
    /// Distance as a fraction of the line's defining segment length.
    pub relative: f64,
}

/// An angle in radians, in (−π, π].
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct Bearing(pub f64);

impl Bearing {
    /// Create a bearing from degrees.
    pub fn from_degrees(degrees: f64) -> Self {
        Self(degrees.to_radians())
    }

    /// Returns the angle in radians.
    pub fn radians(&self) -> f64 {
        self.0
    }

    /// Shortest-arc angular difference, always in [0, π].
    pub fn diff(&self, other: Bearing) -> f64 {
        let raw = (self.0 - other.0).rem_euclid(2.0 * PI);
        if raw > PI { 2.0 * PI - raw } else { raw }
    }

    /// Whether the shortest-arc difference is strictly below `threshold`.
    pub fn is_diff_less_than(&self, other: Bearing, threshold: Bearing) -> bool {
        self.diff(other) < threshold.0
    }
}
