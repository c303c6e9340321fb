//! In-memory timetable store.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, RwLock};

use chrono::NaiveDate;

use super::{StoreConfig, StoreError, TransitStore, WriteBatch};
use crate::domain::{BoundingBox, Feed, Route, ServiceDay, Stop, StopKey, Trip};

const STOP_SEARCH_LIMIT: usize = 20;

#[derive(Debug, Default)]
struct Tables {
    feeds: BTreeMap<String, Feed>,
    routes: HashMap<(String, String), Arc<Route>>,
    /// Keyed by (feed, trip) so that pages come out in a stable order.
    trips: BTreeMap<(String, String), Arc<Trip>>,
    stops: BTreeMap<StopKey, Arc<Stop>>,
    service_days: BTreeSet<ServiceDay>,
}

/// Timetable tables behind a read-write lock.
#[derive(Debug)]
pub struct MemoryStore {
    config: StoreConfig,
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            tables: RwLock::new(Tables::default()),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Insert the records of `batch`, replacing any with the same key.
    pub fn apply(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let mut tables = self.tables.write()?;
        match batch {
            WriteBatch::Feed(feed) => {
                tables.feeds.insert(feed.feed_id.clone(), feed);
            }
            WriteBatch::Routes(routes) => {
                for route in routes {
                    tables
                        .routes
                        .insert((route.feed_id.clone(), route.route_id.clone()), route);
                }
            }
            WriteBatch::Trips(trips) => {
                for trip in trips {
                    tables
                        .trips
                        .insert((trip.feed_id.clone(), trip.trip_id.clone()), trip);
                }
            }
            WriteBatch::Stops(stops) => {
                for stop in stops {
                    tables.stops.insert(stop.key(), stop);
                }
            }
            WriteBatch::ServiceDays(days) => {
                tables.service_days.extend(days);
            }
        }
        Ok(())
    }

    /// Number of (feeds, trips, stops, service days) held.
    pub fn counts(&self) -> Result<(usize, usize, usize, usize), StoreError> {
        let tables = self.tables.read()?;
        Ok((
            tables.feeds.len(),
            tables.trips.len(),
            tables.stops.len(),
            tables.service_days.len(),
        ))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

impl TransitStore for MemoryStore {
    fn page_size(&self) -> usize {
        self.config.page_size
    }

    fn trips_intersecting_page(
        &self,
        area: &BoundingBox,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Arc<Trip>>, StoreError> {
        let tables = self.tables.read()?;
        Ok(tables
            .trips
            .values()
            .filter(|trip| trip.bounds().intersects(area, self.config.grace_degrees))
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    fn services_between_dates(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<ServiceDay>, StoreError> {
        let tables = self.tables.read()?;
        Ok(tables
            .service_days
            .iter()
            .filter(|day| start <= day.date && day.date <= end)
            .cloned()
            .collect())
    }

    fn trip(&self, feed_id: &str, trip_id: &str) -> Result<Arc<Trip>, StoreError> {
        let tables = self.tables.read()?;
        tables
            .trips
            .get(&(feed_id.to_string(), trip_id.to_string()))
            .cloned()
            .ok_or_else(|| StoreError::not_found("trip", format!("{feed_id}:{trip_id}")))
    }

    fn route(&self, feed_id: &str, route_id: &str) -> Result<Arc<Route>, StoreError> {
        let tables = self.tables.read()?;
        tables
            .routes
            .get(&(feed_id.to_string(), route_id.to_string()))
            .cloned()
            .ok_or_else(|| StoreError::not_found("route", format!("{feed_id}:{route_id}")))
    }

    fn feed(&self, feed_id: &str) -> Result<Feed, StoreError> {
        let tables = self.tables.read()?;
        tables
            .feeds
            .get(feed_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("feed", feed_id))
    }

    fn stops_like(&self, name: &str) -> Result<Vec<Arc<Stop>>, StoreError> {
        let needle = name.to_uppercase();
        let tables = self.tables.read()?;
        Ok(tables
            .stops
            .values()
            .filter(|stop| stop.name.to_uppercase().contains(&needle))
            .take(STOP_SEARCH_LIMIT)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RouteType, ServiceTime, StopTime};
    use crate::geometry::Point;

    fn route() -> Arc<Route> {
        Arc::new(Route {
            feed_id: "1".into(),
            route_id: "R".into(),
            short_name: "TER".into(),
            long_name: String::new(),
            route_type: RouteType::HeavyRail,
        })
    }

    fn trip(id: &str, from: Point, to: Point) -> Arc<Trip> {
        let a = Arc::new(Stop::new("1", format!("{id}-a"), "Alpha", from));
        let b = Arc::new(Stop::new("1", format!("{id}-b"), "Beta", to));
        let stop_times = vec![
            StopTime::new(id, a, 1, None, Some(ServiceTime::from_hms(8, 0, 0))).unwrap(),
            StopTime::new(id, b, 2, Some(ServiceTime::from_hms(8, 20, 0)), None).unwrap(),
        ];
        Arc::new(Trip::new("1", id, "S", route(), stop_times).unwrap())
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn day(d: u32, service: &str) -> ServiceDay {
        ServiceDay {
            date: date(d),
            feed_id: "1".into(),
            service_id: service.into(),
        }
    }

    #[test]
    fn bounding_box_lookup_with_grace() {
        let store = MemoryStore::default();
        store
            .apply(WriteBatch::Trips(vec![
                trip("T1", Point::new(0.0, 0.0), Point::new(0.0, 2.0)),
                trip("T2", Point::new(1.0, 0.0), Point::new(1.0, 2.0)),
            ]))
            .unwrap();

        let hits = store.trips_containing(Point::new(0.01, 1.0)).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].trip_id, "T1");

        let hits = store.trips_containing(Point::new(0.5, 1.0)).unwrap();
        assert!(hits.is_empty());

        let area = BoundingBox::spanning(Point::new(0.0, 1.0), Point::new(1.0, 1.0));
        assert_eq!(store.trips_intersecting(&area).unwrap().len(), 2);
    }

    #[test]
    fn pages_cover_every_trip_once() {
        let store = MemoryStore::new(StoreConfig::new(0.018, 3, Default::default()));
        let trips = (0..10)
            .map(|i| trip(&format!("T{i:02}"), Point::new(0.0, 0.0), Point::new(0.0, 1.0)))
            .collect();
        store.apply(WriteBatch::Trips(trips)).unwrap();

        let area = BoundingBox::spanning(Point::new(0.0, 0.5), Point::new(0.0, 0.5));
        let first = store.trips_intersecting_page(&area, 0, 3).unwrap();
        assert_eq!(first.len(), 3);
        assert_eq!(first[0].trip_id, "T00");

        let all = store.trips_intersecting(&area).unwrap();
        let mut ids: Vec<_> = all.iter().map(|t| t.trip_id.clone()).collect();
        ids.dedup();
        assert_eq!(ids.len(), 10);
    }

    #[test]
    fn service_days_inclusive_range() {
        let store = MemoryStore::default();
        store
            .apply(WriteBatch::ServiceDays(vec![day(4, "A"), day(5, "A"), day(6, "B"), day(7, "A")]))
            .unwrap();

        let days = store.services_between_dates(date(5), date(6)).unwrap();
        assert_eq!(days, [day(5, "A"), day(6, "B")]);
        assert_eq!(store.services_on_date(date(7)).unwrap(), [day(7, "A")]);
    }

    #[test]
    fn lookups_by_key() {
        let store = MemoryStore::default();
        store.apply(WriteBatch::Feed(Feed::new("1", "SNCF"))).unwrap();
        store.apply(WriteBatch::Routes(vec![route()])).unwrap();
        store
            .apply(WriteBatch::Trips(vec![trip("T1", Point::new(0.0, 0.0), Point::new(0.0, 1.0))]))
            .unwrap();

        assert_eq!(store.feed("1").unwrap().display_name, "SNCF");
        assert_eq!(store.route("1", "R").unwrap().short_name, "TER");
        assert_eq!(store.trip("1", "T1").unwrap().trip_id, "T1");

        let err = store.trip("2", "T1").unwrap_err();
        assert_eq!(err.to_string(), "trip 2:T1 not found");
        assert!(matches!(store.feed("9"), Err(StoreError::NotFound { kind: "feed", .. })));
    }

    #[test]
    fn stop_search_ignores_case() {
        let store = MemoryStore::default();
        store
            .apply(WriteBatch::Stops(vec![
                Arc::new(Stop::new("1", "A", "Lyon Part-Dieu", Point::new(45.76, 4.86))),
                Arc::new(Stop::new("1", "B", "Paris Gare de Lyon", Point::new(48.84, 2.37))),
                Arc::new(Stop::new("1", "C", "Marseille", Point::new(43.30, 5.38))),
            ]))
            .unwrap();

        let hits = store.stops_like("lyon").unwrap();
        assert_eq!(hits.len(), 2);
        assert!(store.stops_like("nowhere").unwrap().is_empty());
        assert_eq!(store.counts().unwrap(), (0, 0, 3, 0));
    }
}
