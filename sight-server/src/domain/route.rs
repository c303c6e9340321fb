//! Route types and GTFS route-type simplification.

use std::collections::HashMap;

use serde::Deserialize;

/// The core GTFS route types.
///
/// Extended (3-digit) route types are folded into these by
/// [`RouteTypeMapping`] at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteType {
    Tram,
    Subway,
    HeavyRail,
    Bus,
    Ferry,
    CableTram,
    AerialLift,
    Funicular,
    Trolleybus,
    Monorail,
    Other(u16),
}

impl RouteType {
    /// Interpret a core GTFS `route_type` code.
    pub fn from_code(code: u16) -> Self {
        match code {
            0 => RouteType::Tram,
            1 => RouteType::Subway,
            2 => RouteType::HeavyRail,
            3 => RouteType::Bus,
            4 => RouteType::Ferry,
            5 => RouteType::CableTram,
            6 => RouteType::AerialLift,
            7 => RouteType::Funicular,
            11 => RouteType::Trolleybus,
            12 => RouteType::Monorail,
            other => RouteType::Other(other),
        }
    }

    /// Returns the GTFS code for this type.
    pub fn code(&self) -> u16 {
        match self {
            RouteType::Tram => 0,
            RouteType::Subway => 1,
            RouteType::HeavyRail => 2,
            RouteType::Bus => 3,
            RouteType::Ferry => 4,
            RouteType::CableTram => 5,
            RouteType::AerialLift => 6,
            RouteType::Funicular => 7,
            RouteType::Trolleybus => 11,
            RouteType::Monorail => 12,
            RouteType::Other(code) => *code,
        }
    }

    /// Whether trips of this type take part in sight detection.
    ///
    /// Subway and monorail are not included yet.
    pub fn is_rail(&self) -> bool {
        matches!(self, RouteType::Tram | RouteType::HeavyRail)
    }
}

/// Maps extended route-type categories (`code / 100`) to core types.
///
/// See <https://developers.google.com/transit/gtfs/reference/extended-route-types>.
/// Categories missing from the table (air, taxi, miscellaneous, ...) are
/// kept as-is. Feeds disagree on how they use the extended codes, so the
/// table can be replaced from the loader configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "HashMap<u16, u16>")]
pub struct RouteTypeMapping {
    categories: HashMap<u16, RouteType>,
}

impl RouteTypeMapping {
    /// Create a mapping from (category, core code) pairs.
    pub fn new(categories: impl IntoIterator<Item = (u16, u16)>) -> Self {
        Self {
            categories: categories
                .into_iter()
                .map(|(category, code)| (category, RouteType::from_code(code)))
                .collect(),
        }
    }

    /// Simplify a raw `route_type` code.
    ///
    /// # Examples
    ///
    /// ```
    /// use sight_server::domain::{RouteType, RouteTypeMapping};
    ///
    /// let mapping = RouteTypeMapping::default();
    /// assert_eq!(mapping.simplify(2), RouteType::HeavyRail);
    /// assert_eq!(mapping.simplify(102), RouteType::HeavyRail);
    /// assert_eq!(mapping.simplify(900), RouteType::Tram);
    /// assert_eq!(mapping.simplify(1100), RouteType::Other(1100));
    /// ```
    pub fn simplify(&self, code: u16) -> RouteType {
        if code < 100 {
            return RouteType::from_code(code);
        }
        self.categories
            .get(&(code / 100))
            .copied()
            .unwrap_or(RouteType::Other(code))
    }
}

impl From<HashMap<u16, u16>> for RouteTypeMapping {
    fn from(categories: HashMap<u16, u16>) -> Self {
        Self::new(categories)
    }
}

impl Default for RouteTypeMapping {
    fn default() -> Self {
        Self::new([
            (1, 2),   // railway
            (2, 3),   // coach
            (4, 1),   // urban railway
            (7, 3),   // bus
            (8, 11),  // trolleybus
            (9, 0),   // tram
            (10, 4),  // water transport
            (12, 4),  // ferry
            (13, 6),  // aerial lift
            (14, 7),  // funicular
        ])
    }
}

/// A route from a feed's `routes.txt`.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub feed_id: String,
    pub route_id: String,
    pub short_name: String,
    pub long_name: String,
    pub route_type: RouteType,
}

impl Route {
    /// Name shown to users: the short name, else the long name.
    pub fn display_name(&self) -> &str {
        if self.short_name.is_empty() {
            &self.long_name
        } else {
            &self.short_name
        }
    }
}
