//! Rows of the GTFS text files.
//!
//! Only the columns the sight engine uses are read; unknown columns are
//! ignored and optional columns default to empty.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct RouteRecord {
    pub route_id: String,
    #[serde(default)]
    pub route_short_name: String,
    #[serde(default)]
    pub route_long_name: String,
    pub route_type: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TripRecord {
    pub route_id: String,
    pub service_id: String,
    pub trip_id: String,
    #[serde(default)]
    pub trip_headsign: String,
    #[serde(default)]
    pub trip_short_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StopTimeRecord {
    pub trip_id: String,
    #[serde(default)]
    pub arrival_time: String,
    #[serde(default)]
    pub departure_time: String,
    pub stop_id: String,
    pub stop_sequence: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StopRecord {
    pub stop_id: String,
    #[serde(default)]
    pub stop_name: String,
    /// Kept as text: some feeds leave coordinates empty on stations.
    #[serde(default)]
    pub stop_lat: String,
    #[serde(default)]
    pub stop_lon: String,
    #[serde(default)]
    pub parent_station: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CalendarRecord {
    pub service_id: String,
    pub monday: u8,
    pub tuesday: u8,
    pub wednesday: u8,
    pub thursday: u8,
    pub friday: u8,
    pub saturday: u8,
    pub sunday: u8,
    pub start_date: String,
    pub end_date: String,
}

impl CalendarRecord {
    /// Running days, from Monday.
    pub fn weekdays(&self) -> [bool; 7] {
        [
            self.monday,
            self.tuesday,
            self.wednesday,
            self.thursday,
            self.friday,
            self.saturday,
            self.sunday,
        ]
        .map(|flag| flag == 1)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CalendarDateRecord {
    pub service_id: String,
    pub date: String,
    pub exception_type: u8,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedInfoRecord {
    #[serde(default)]
    pub feed_publisher_name: String,
    #[serde(default)]
    pub feed_publisher_url: String,
    #[serde(default)]
    pub feed_lang: String,
    #[serde(default)]
    pub feed_version: String,
}
