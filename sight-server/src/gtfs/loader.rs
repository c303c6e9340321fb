//! GTFS directory parsing and store loading.

use std::collections::{HashMap, HashSet};
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::records::{
    CalendarDateRecord, CalendarRecord, FeedInfoRecord, RouteRecord, StopRecord, StopTimeRecord, TripRecord,
};
use super::{FeedEntry, LoadError, LoaderConfig};
use crate::domain::{
    Calendar, CalendarDate, ExceptionType, Feed, Route, RouteType, RouteTypeMapping, ServiceDay, ServiceTime, Stop,
    StopTime, Trip, resolve_service_days,
};
use crate::geometry::Point;
use crate::store::{BatchWriter, MemoryStore, WriteBatch};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Everything kept from one feed, ready to write.
#[derive(Debug, Clone)]
pub struct ParsedFeed {
    pub feed: Feed,
    pub routes: Vec<Arc<Route>>,
    pub trips: Vec<Arc<Trip>>,
    pub stops: Vec<Arc<Stop>>,
    pub service_days: Vec<ServiceDay>,
}

impl ParsedFeed {
    pub fn into_batches(self) -> Vec<WriteBatch> {
        vec![
            WriteBatch::Feed(self.feed),
            WriteBatch::Routes(self.routes),
            WriteBatch::Stops(self.stops),
            WriteBatch::Trips(self.trips),
            WriteBatch::ServiceDays(self.service_days),
        ]
    }
}

/// Outcome of [`load_feeds`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadSummary {
    pub feeds: usize,
    pub records: usize,
}

/// Parse every active feed concurrently and write them into `store`.
///
/// Returns once every record has been written. The first failing feed
/// aborts the load.
pub async fn load_feeds(config: &LoaderConfig, store: Arc<MemoryStore>) -> Result<LoadSummary, LoadError> {
    let mut parsing = JoinSet::new();
    for (feed_id, entry) in config.active_feeds() {
        let entry = entry.clone();
        let mapping = config.route_types.clone();
        parsing.spawn_blocking(move || parse_feed(&feed_id, &entry, &mapping));
    }

    let mut writer = BatchWriter::new(store);
    let mut feeds = 0;
    while let Some(joined) = parsing.join_next().await {
        let parsed = joined.map_err(|e| LoadError::Task(e.to_string()))??;
        info!(
            feed = %parsed.feed.feed_id,
            name = %parsed.feed.display_name,
            routes = parsed.routes.len(),
            trips = parsed.trips.len(),
            stops = parsed.stops.len(),
            service_days = parsed.service_days.len(),
            "Parsed feed"
        );
        for batch in parsed.into_batches() {
            writer.submit(batch);
        }
        feeds += 1;
    }

    info!(feeds, "Waiting for writes to complete");
    let records = writer.finish().await?;
    Ok(LoadSummary { feeds, records })
}

/// Parse the extracted GTFS directory of one feed.
///
/// Bus routes are dropped, and with them their trips, services and stop
/// times. Stops are all kept so that parent stations without stop times
/// remain available.
pub fn parse_feed(feed_id: &str, entry: &FeedEntry, mapping: &RouteTypeMapping) -> Result<ParsedFeed, LoadError> {
    let dir = entry.path.as_path();
    debug!(feed = feed_id, path = %dir.display(), "Parsing feed");

    let routes = parse_routes(dir, feed_id, mapping)?;
    let trip_records: Vec<TripRecord> = required::<TripRecord>(dir, "trips.txt")?
        .into_iter()
        .filter(|trip| routes.contains_key(&trip.route_id))
        .collect();
    let services: HashSet<&str> = trip_records.iter().map(|t| t.service_id.as_str()).collect();

    let service_days = parse_service_days(dir, feed_id, &services)?;
    let stop_times = parse_stop_times(dir, &trip_records)?;
    let stops = parse_stops(dir, feed_id)?;
    let feed = parse_feed_info(dir, feed_id, &entry.display_name)?;
    let trips = assemble_trips(feed_id, trip_records, stop_times, &routes, &stops)?;

    let mut routes: Vec<Arc<Route>> = routes.into_values().collect();
    routes.sort_by(|a, b| a.route_id.cmp(&b.route_id));
    let mut stops: Vec<Arc<Stop>> = stops.into_values().collect();
    stops.sort_by(|a, b| a.stop_id.cmp(&b.stop_id));

    Ok(ParsedFeed {
        feed,
        routes,
        trips,
        stops,
        service_days,
    })
}

/// Read a GTFS text file, or `None` if it does not exist.
fn read_records<T: DeserializeOwned>(dir: &Path, file: &'static str) -> Result<Option<Vec<T>>, LoadError> {
    let path = dir.join(file);
    let bytes = match std::fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(source) => return Err(LoadError::Io { path, source }),
    };
    let content = bytes.strip_prefix(UTF8_BOM).unwrap_or(&bytes[..]);

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(content);
    let records = reader
        .deserialize()
        .collect::<Result<Vec<T>, _>>()
        .map_err(LoadError::csv(file))?;
    Ok(Some(records))
}

fn required<T: DeserializeOwned>(dir: &Path, file: &'static str) -> Result<Vec<T>, LoadError> {
    read_records(dir, file)?.ok_or_else(|| LoadError::Io {
        path: dir.join(file),
        source: ErrorKind::NotFound.into(),
    })
}

fn parse_routes(
    dir: &Path,
    feed_id: &str,
    mapping: &RouteTypeMapping,
) -> Result<HashMap<String, Arc<Route>>, LoadError> {
    let records: Vec<RouteRecord> = required(dir, "routes.txt")?;
    let total = records.len();
    let routes: HashMap<String, Arc<Route>> = records
        .into_iter()
        .filter_map(|record| {
            let route_type = mapping.simplify(record.route_type);
            (route_type != RouteType::Bus).then(|| {
                let route = Route {
                    feed_id: feed_id.to_string(),
                    route_id: record.route_id.clone(),
                    short_name: record.route_short_name,
                    long_name: record.route_long_name,
                    route_type,
                };
                (record.route_id, Arc::new(route))
            })
        })
        .collect();
    debug!(feed = feed_id, kept = routes.len(), total, "Routes");
    Ok(routes)
}

fn parse_date(file: &'static str, field: &'static str, value: &str) -> Result<NaiveDate, LoadError> {
    NaiveDate::parse_from_str(value, "%Y%m%d").map_err(|_| LoadError::invalid(file, field, value))
}

fn parse_service_days(dir: &Path, feed_id: &str, services: &HashSet<&str>) -> Result<Vec<ServiceDay>, LoadError> {
    let calendars = read_records::<CalendarRecord>(dir, "calendar.txt")?
        .unwrap_or_default()
        .into_iter()
        .filter(|record| services.contains(record.service_id.as_str()))
        .map(|record| {
            Ok(Calendar {
                feed_id: feed_id.to_string(),
                weekdays: record.weekdays(),
                start_date: parse_date("calendar.txt", "start_date", &record.start_date)?,
                end_date: parse_date("calendar.txt", "end_date", &record.end_date)?,
                service_id: record.service_id,
            })
        })
        .collect::<Result<Vec<_>, LoadError>>()?;

    let exceptions = read_records::<CalendarDateRecord>(dir, "calendar_dates.txt")?
        .unwrap_or_default()
        .into_iter()
        .filter(|record| services.contains(record.service_id.as_str()))
        .map(|record| {
            let exception = ExceptionType::try_from(record.exception_type).map_err(|code| {
                LoadError::invalid("calendar_dates.txt", "exception_type", code.to_string())
            })?;
            Ok(CalendarDate {
                feed_id: feed_id.to_string(),
                date: parse_date("calendar_dates.txt", "date", &record.date)?,
                service_id: record.service_id,
                exception,
            })
        })
        .collect::<Result<Vec<_>, LoadError>>()?;

    let days = resolve_service_days(&calendars, &exceptions);
    debug!(
        feed = feed_id,
        calendars = calendars.len(),
        exceptions = exceptions.len(),
        days = days.len(),
        "Service days"
    );
    Ok(days)
}

/// A stop time row with parsed times, before stops are resolved.
#[derive(Debug)]
struct PendingStopTime {
    stop_id: String,
    sequence: u32,
    arrival: Option<ServiceTime>,
    departure: Option<ServiceTime>,
}

fn parse_time(field: &'static str, value: &str) -> Result<Option<ServiceTime>, LoadError> {
    if value.is_empty() {
        return Ok(None);
    }
    ServiceTime::parse_hms(value)
        .map(Some)
        .map_err(|_| LoadError::invalid("stop_times.txt", field, value))
}

fn parse_stop_times(
    dir: &Path,
    trips: &[TripRecord],
) -> Result<HashMap<String, Vec<PendingStopTime>>, LoadError> {
    let kept: HashSet<&str> = trips.iter().map(|t| t.trip_id.as_str()).collect();
    let mut by_trip: HashMap<String, Vec<PendingStopTime>> = HashMap::new();
    for record in required::<StopTimeRecord>(dir, "stop_times.txt")? {
        if !kept.contains(record.trip_id.as_str()) {
            continue;
        }
        let pending = PendingStopTime {
            arrival: parse_time("arrival_time", &record.arrival_time)?,
            departure: parse_time("departure_time", &record.departure_time)?,
            stop_id: record.stop_id,
            sequence: record.stop_sequence,
        };
        by_trip.entry(record.trip_id).or_default().push(pending);
    }
    Ok(by_trip)
}

fn parse_coordinate(field: &'static str, value: &str) -> Result<f64, LoadError> {
    value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| LoadError::invalid("stops.txt", field, value))
}

fn parse_stops(dir: &Path, feed_id: &str) -> Result<HashMap<String, Arc<Stop>>, LoadError> {
    let mut stops = HashMap::new();
    let mut unplaced = 0usize;
    for record in required::<StopRecord>(dir, "stops.txt")? {
        // Generic nodes and boarding areas may omit coordinates.
        if record.stop_lat.is_empty() && record.stop_lon.is_empty() {
            unplaced += 1;
            continue;
        }
        let location = Point::new(
            parse_coordinate("stop_lat", &record.stop_lat)?,
            parse_coordinate("stop_lon", &record.stop_lon)?,
        );
        let mut stop = Stop::new(feed_id, record.stop_id.clone(), record.stop_name, location);
        if !record.parent_station.is_empty() {
            stop.parent_station = Some(record.parent_station);
        }
        stops.insert(record.stop_id, Arc::new(stop));
    }
    if unplaced > 0 {
        debug!(feed = feed_id, unplaced, "Skipped stops without coordinates");
    }
    Ok(stops)
}

fn parse_feed_info(dir: &Path, feed_id: &str, display_name: &str) -> Result<Feed, LoadError> {
    let info = read_records::<FeedInfoRecord>(dir, "feed_info.txt")?
        .and_then(|records| records.into_iter().next())
        .unwrap_or_default();
    Ok(Feed {
        feed_id: feed_id.to_string(),
        display_name: display_name.to_string(),
        publisher_name: info.feed_publisher_name,
        publisher_url: info.feed_publisher_url,
        lang: info.feed_lang,
        version: info.feed_version,
    })
}

fn assemble_trips(
    feed_id: &str,
    records: Vec<TripRecord>,
    mut stop_times: HashMap<String, Vec<PendingStopTime>>,
    routes: &HashMap<String, Arc<Route>>,
    stops: &HashMap<String, Arc<Stop>>,
) -> Result<Vec<Arc<Trip>>, LoadError> {
    let mut trips = Vec::with_capacity(records.len());
    let mut empty = 0usize;
    for record in records {
        let Some(pending) = stop_times.remove(&record.trip_id) else {
            empty += 1;
            continue;
        };
        let Some(route) = routes.get(&record.route_id) else {
            continue;
        };

        let calls = pending
            .into_iter()
            .map(|p| {
                let stop = stops.get(&p.stop_id).ok_or_else(|| LoadError::UnknownStop {
                    trip_id: record.trip_id.clone(),
                    stop_id: p.stop_id.clone(),
                })?;
                Ok(StopTime::new(
                    &record.trip_id,
                    Arc::clone(stop),
                    p.sequence,
                    p.arrival,
                    p.departure,
                )?)
            })
            .collect::<Result<Vec<_>, LoadError>>()?;

        let trip = Trip::new(feed_id, &record.trip_id, &record.service_id, Arc::clone(route), calls)?
            .with_headsign(record.trip_headsign)
            .with_short_name(record.trip_short_name);
        trips.push(Arc::new(trip));
    }
    if empty > 0 {
        warn!(feed = feed_id, trips = empty, "Skipped trips without stop times");
    }
    trips.sort_by(|a, b| a.trip_id.cmp(&b.trip_id));
    Ok(trips)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{StoreConfig, TransitStore, WriteDisciplineKind};
    use std::fs;
    use tempfile::TempDir;

    const ROUTES: &str = "route_id,route_short_name,route_long_name,route_type
R1,TER,,2
B1,12,,3
X1,,Regio Express,106
C1,,Coach,200
";

    const TRIPS: &str = "route_id,service_id,trip_id,trip_headsign
R1,WEEK,T1,Lyon
B1,BUS,T2,Depot
X1,WEEK,T3,
C1,COACH,T4,
";

    const STOP_TIMES: &str = "trip_id,arrival_time,departure_time,stop_id,stop_sequence
T1, 08:00:00 , 08:00:00 ,A,1
T1,08:20:00,,B,2
T2,09:00:00,09:00:00,A,1
T2,09:20:00,09:20:00,B,2
T3,25:00:00,25:00:00,B,2
T3,24:40:00,24:40:00,A,1
T4,10:00:00,10:00:00,A,1
";

    const STOPS: &str = "stop_id,stop_name,stop_lat,stop_lon,parent_station
A,Alpha,45.0,4.0,STA
B,Bravo,45.0,4.5,
STA,Alpha station,45.0,4.0,
N,Node,,,
";

    const CALENDAR: &str =
        "service_id,monday,tuesday,wednesday,thursday,friday,saturday,sunday,start_date,end_date
WEEK,1,1,1,1,1,0,0,20240603,20240609
BUS,1,1,1,1,1,1,1,20240603,20240609
";

    const CALENDAR_DATES: &str = "service_id,date,exception_type
WEEK,20240605,2
WEEK,20240608,1
";

    fn write_feed(files: &[(&str, &str)]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for (name, content) in files {
            fs::write(dir.path().join(name), content).unwrap();
        }
        dir
    }

    fn full_feed() -> TempDir {
        write_feed(&[
            ("routes.txt", ROUTES),
            ("trips.txt", TRIPS),
            ("stop_times.txt", STOP_TIMES),
            ("stops.txt", STOPS),
            ("calendar.txt", CALENDAR),
            ("calendar_dates.txt", CALENDAR_DATES),
        ])
    }

    fn entry(dir: &TempDir) -> FeedEntry {
        FeedEntry {
            active: true,
            path: dir.path().to_path_buf(),
            display_name: "Test".into(),
        }
    }

    fn parse(dir: &TempDir) -> Result<ParsedFeed, LoadError> {
        parse_feed("1", &entry(dir), &RouteTypeMapping::default())
    }

    #[test]
    fn buses_and_their_trips_are_dropped() {
        let dir = full_feed();
        let feed = parse(&dir).unwrap();

        let routes: Vec<&str> = feed.routes.iter().map(|r| r.route_id.as_str()).collect();
        assert_eq!(routes, vec!["R1", "X1"]);
        assert_eq!(feed.routes[1].route_type, RouteType::HeavyRail);

        let trips: Vec<&str> = feed.trips.iter().map(|t| t.trip_id.as_str()).collect();
        assert_eq!(trips, vec!["T1", "T3"]);
    }

    #[test]
    fn trips_are_assembled_in_sequence_order() {
        let dir = full_feed();
        let feed = parse(&dir).unwrap();

        let t1 = &feed.trips[0];
        assert_eq!(t1.headsign, "Lyon");
        assert_eq!(t1.route.short_name, "TER");
        assert_eq!(t1.departure(), ServiceTime::from_hms(8, 0, 0));
        assert_eq!(t1.last().departure(), None);

        let t3 = &feed.trips[1];
        let order: Vec<&str> = t3.stop_times().iter().map(|st| st.stop.stop_id.as_str()).collect();
        assert_eq!(order, vec!["A", "B"]);
        assert_eq!(t3.arrival(), ServiceTime::from_hms(25, 0, 0));
    }

    #[test]
    fn service_days_apply_exceptions() {
        let dir = full_feed();
        let feed = parse(&dir).unwrap();

        let days: Vec<u32> = feed
            .service_days
            .iter()
            .map(|day| {
                assert_eq!(day.service_id, "WEEK");
                chrono::Datelike::day(&day.date)
            })
            .collect();
        assert_eq!(days, vec![3, 4, 6, 7, 8]);
    }

    #[test]
    fn stops_keep_parents_and_skip_unplaced_nodes() {
        let dir = full_feed();
        let feed = parse(&dir).unwrap();

        let ids: Vec<&str> = feed.stops.iter().map(|s| s.stop_id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B", "STA"]);
        assert_eq!(feed.stops[0].parent_station.as_deref(), Some("STA"));
        assert_eq!(feed.stops[1].parent_station, None);
    }

    #[test]
    fn feed_info_is_synthesized_when_absent() {
        let dir = full_feed();
        let feed = parse(&dir).unwrap().feed;
        assert_eq!(feed, Feed::new("1", "Test"));

        fs::write(
            dir.path().join("feed_info.txt"),
            "feed_publisher_name,feed_publisher_url,feed_lang,feed_version\nSNCF,https://sncf.com,fr,2024.1\n",
        )
        .unwrap();
        let feed = parse(&dir).unwrap().feed;
        assert_eq!(feed.publisher_name, "SNCF");
        assert_eq!(feed.display_name, "Test");
        assert_eq!(feed.version, "2024.1");
    }

    #[test]
    fn byte_order_mark_is_ignored() {
        let dir = full_feed();
        let mut routes = UTF8_BOM.to_vec();
        routes.extend_from_slice(ROUTES.as_bytes());
        fs::write(dir.path().join("routes.txt"), routes).unwrap();

        assert_eq!(parse(&dir).unwrap().routes.len(), 2);
    }

    #[test]
    fn calendars_are_optional() {
        let dir = write_feed(&[
            ("routes.txt", ROUTES),
            ("trips.txt", TRIPS),
            ("stop_times.txt", STOP_TIMES),
            ("stops.txt", STOPS),
        ]);
        let feed = parse(&dir).unwrap();
        assert!(feed.service_days.is_empty());
        assert_eq!(feed.trips.len(), 2);
    }

    #[test]
    fn missing_required_file() {
        let dir = write_feed(&[("routes.txt", ROUTES)]);
        assert!(matches!(parse(&dir), Err(LoadError::Io { .. })));
    }

    #[test]
    fn stop_time_without_any_time_is_fatal() {
        let dir = full_feed();
        fs::write(
            dir.path().join("stop_times.txt"),
            "trip_id,arrival_time,departure_time,stop_id,stop_sequence\nT1,,,A,1\nT1,08:20:00,08:20:00,B,2\n",
        )
        .unwrap();
        assert!(matches!(
            parse(&dir),
            Err(LoadError::Domain(crate::domain::DomainError::MissingTime { sequence: 1, .. }))
        ));
    }

    #[test]
    fn bad_values_are_reported() {
        let dir = full_feed();
        fs::write(
            dir.path().join("stop_times.txt"),
            "trip_id,arrival_time,departure_time,stop_id,stop_sequence\nT1,8h00,,A,1\n",
        )
        .unwrap();
        assert!(matches!(
            parse(&dir),
            Err(LoadError::InvalidField {
                field: "arrival_time",
                ..
            })
        ));

        let dir = full_feed();
        fs::write(
            dir.path().join("stop_times.txt"),
            "trip_id,arrival_time,departure_time,stop_id,stop_sequence\nT1,08:00:00,08:00:00,Z,1\n",
        )
        .unwrap();
        assert!(matches!(parse(&dir), Err(LoadError::UnknownStop { .. })));
    }

    #[tokio::test]
    async fn feeds_load_into_the_store() {
        let first = full_feed();
        let second = full_feed();
        let config = LoaderConfig {
            feeds: vec![
                entry(&first),
                FeedEntry {
                    active: false,
                    ..entry(&second)
                },
                entry(&second),
            ],
            route_types: RouteTypeMapping::default(),
        };
        let store = Arc::new(MemoryStore::new(StoreConfig::new(0.018, 2, WriteDisciplineKind::Exclusive)));

        let summary = load_feeds(&config, Arc::clone(&store)).await.unwrap();

        assert_eq!(summary.feeds, 2);
        // Per feed: 1 feed, 2 routes, 3 stops, 2 trips, 5 service days
        assert_eq!(summary.records, 2 * 13);
        assert_eq!(store.counts().unwrap(), (2, 4, 6, 10));
        assert!(store.feed("1").is_ok());
        assert!(store.feed("2").is_err());
        assert_eq!(store.trip("3", "T1").unwrap().feed_id, "3");
    }

    #[tokio::test]
    async fn failing_feed_fails_the_load() {
        let broken = write_feed(&[("routes.txt", ROUTES)]);
        let config = LoaderConfig {
            feeds: vec![entry(&broken)],
            route_types: RouteTypeMapping::default(),
        };
        let result = load_feeds(&config, Arc::new(MemoryStore::default())).await;
        assert!(matches!(result, Err(LoadError::Io { .. })));
    }
}
