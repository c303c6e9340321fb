//! Timetable storage.
//!
//! The sight engine reads trips, service days and feed metadata through the
//! [`TransitStore`] trait. [`MemoryStore`] is the in-process implementation
//! the server loads feeds into; writes arrive through a [`BatchWriter`]
//! that applies a configurable [`WriteDiscipline`].

mod config;
mod error;
mod memory;
mod writer;

use std::sync::Arc;

use chrono::NaiveDate;

use crate::domain::{BoundingBox, Feed, Route, ServiceDay, Stop, Trip};
use crate::geometry::Point;

pub use config::{StoreConfig, WriteDisciplineKind};
pub use error::StoreError;
pub use memory::MemoryStore;
pub use writer::{BatchWriter, ExclusiveWrites, UncontendedWrites, WriteBatch, WriteDiscipline};

/// Read access to loaded timetable data.
///
/// This abstraction allows the sight engine to be tested with mock data.
pub trait TransitStore: Send + Sync {
    /// Number of trips fetched per page by [`Self::trips_intersecting`].
    fn page_size(&self) -> usize;

    /// One page of trips whose bounding box intersects `area`, widened by
    /// the store's grace margin. Pages are stable across calls.
    fn trips_intersecting_page(
        &self,
        area: &BoundingBox,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Arc<Trip>>, StoreError>;

    /// Service days between two dates, both inclusive.
    fn services_between_dates(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<ServiceDay>, StoreError>;

    fn trip(&self, feed_id: &str, trip_id: &str) -> Result<Arc<Trip>, StoreError>;

    fn route(&self, feed_id: &str, route_id: &str) -> Result<Arc<Route>, StoreError>;

    fn feed(&self, feed_id: &str) -> Result<Feed, StoreError>;

    /// Up to 20 stops whose name contains `name`, ignoring case.
    fn stops_like(&self, name: &str) -> Result<Vec<Arc<Stop>>, StoreError>;

    /// All trips whose bounding box intersects `area`, fetched page by page.
    fn trips_intersecting(&self, area: &BoundingBox) -> Result<Vec<Arc<Trip>>, StoreError> {
        let limit = self.page_size().max(1);
        let mut trips = Vec::new();
        loop {
            let page = self.trips_intersecting_page(area, trips.len(), limit)?;
            if page.is_empty() {
                break;
            }
            trips.extend(page);
        }
        Ok(trips)
    }

    /// All trips whose bounding box contains `point`.
    fn trips_containing(&self, point: Point) -> Result<Vec<Arc<Trip>>, StoreError> {
        self.trips_intersecting(&BoundingBox::spanning(point, point))
    }

    fn services_on_date(&self, date: NaiveDate) -> Result<Vec<ServiceDay>, StoreError> {
        self.services_between_dates(date, date)
    }
}
