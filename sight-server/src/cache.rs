//! Caching layer for sight queries.
//!
//! Timetables do not change once loaded, so a query answered once can be
//! answered again from memory. Results are keyed by the exact query
//! parameters; queries themselves are CPU-bound and run on the blocking
//! pool.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use moka::future::Cache as MokaCache;

use crate::geometry::Point;
use crate::sights::{RealMovingTrainSight, RealTrainSight, SightEngine, SightError};
use crate::store::TransitStore;

/// Observation point (as coordinate bits), first and last service date.
type StationaryKey = (u64, u64, NaiveDate, NaiveDate);

/// Feed, trip, service date and lateness in minutes.
type MovingKey = (String, String, NaiveDate, i64);

type StationaryEntry = Arc<Vec<RealTrainSight>>;
type MovingEntry = Arc<Vec<RealMovingTrainSight>>;

/// Configuration for the cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// TTL for cached entries.
    pub ttl: Duration,

    /// Maximum number of cached entries per query kind.
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(60 * 60),
            max_capacity: 1000,
        }
    }
}

/// Sight engine with cached query results.
pub struct CachedSightEngine<S> {
    engine: Arc<SightEngine<S>>,
    stationary: MokaCache<StationaryKey, StationaryEntry>,
    moving: MokaCache<MovingKey, MovingEntry>,
}

impl<S: TransitStore + 'static> CachedSightEngine<S> {
    /// Create a new cached engine.
    pub fn new(engine: SightEngine<S>, config: &CacheConfig) -> Self {
        Self {
            engine: Arc::new(engine),
            stationary: MokaCache::builder()
                .time_to_live(config.ttl)
                .max_capacity(config.max_capacity)
                .build(),
            moving: MokaCache::builder()
                .time_to_live(config.ttl)
                .max_capacity(config.max_capacity)
                .build(),
        }
    }

    /// Access the underlying engine for operations that bypass the cache.
    pub fn engine(&self) -> &SightEngine<S> {
        &self.engine
    }

    /// Stationary sights, using the cache if available.
    pub async fn real_train_sights(
        &self,
        observer: Point,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<StationaryEntry, SightError> {
        let key = (observer.lat.to_bits(), observer.lon.to_bits(), start, end);
        if let Some(cached) = self.stationary.get(&key).await {
            return Ok(cached);
        }

        let engine = Arc::clone(&self.engine);
        let sights = tokio::task::spawn_blocking(move || engine.get_real_train_sights(observer, start, end))
            .await
            .map_err(|e| SightError::Task(e.to_string()))??;

        let entry = Arc::new(sights);
        self.stationary.insert(key, entry.clone()).await;
        Ok(entry)
    }

    /// Moving sights from a trip, using the cache if available.
    pub async fn sights_from_trip(
        &self,
        feed_id: &str,
        trip_id: &str,
        date: NaiveDate,
        lateness: chrono::Duration,
    ) -> Result<MovingEntry, SightError> {
        let key = (feed_id.to_string(), trip_id.to_string(), date, lateness.num_minutes());
        if let Some(cached) = self.moving.get(&key).await {
            return Ok(cached);
        }

        let engine = Arc::clone(&self.engine);
        let (feed, trip) = (key.0.clone(), key.1.clone());
        let sights =
            tokio::task::spawn_blocking(move || engine.get_sights_from_trip_key(&feed, &trip, date, lateness))
                .await
                .map_err(|e| SightError::Task(e.to_string()))??;

        let entry = Arc::new(sights);
        self.moving.insert(key, entry.clone()).await;
        Ok(entry)
    }

    /// Get cache statistics.
    pub fn cache_entry_count(&self) -> u64 {
        self.stationary.entry_count() + self.moving.entry_count()
    }

    /// Invalidate all cached entries.
    pub fn invalidate_cache(&self) {
        self.stationary.invalidate_all();
        self.moving.invalidate_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Route, RouteType, ServiceDay, ServiceTime, Stop, StopTime, Trip};
    use crate::sights::SightConfig;
    use crate::store::{MemoryStore, StoreError, WriteBatch};

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()
    }

    fn trip(id: &str, from: (f64, f64), to: (f64, f64)) -> Arc<Trip> {
        let route = Arc::new(Route {
            feed_id: "1".into(),
            route_id: "R".into(),
            short_name: "IC".into(),
            long_name: String::new(),
            route_type: RouteType::HeavyRail,
        });
        let call = |stop_id: &str, (lat, lon): (f64, f64), seq: u32, at: ServiceTime| {
            let stop_id = format!("{id}-{stop_id}");
            let stop = Arc::new(Stop::new("1", stop_id.clone(), stop_id, Point::new(lat, lon)));
            StopTime::new(id, stop, seq, Some(at), Some(at)).unwrap()
        };
        let stop_times = vec![
            call("P", from, 1, ServiceTime::from_hms(8, 0, 0)),
            call("Q", to, 2, ServiceTime::from_hms(8, 20, 0)),
        ];
        Arc::new(Trip::new("1", id, "S1", route, stop_times).unwrap())
    }

    fn cached_engine() -> CachedSightEngine<MemoryStore> {
        let store = MemoryStore::default();
        store
            .apply(WriteBatch::Trips(vec![
                trip("T1", (0.0, 0.0), (0.0, 2.0)),
                trip("T2", (0.0, 2.0), (0.0, 0.0)),
            ]))
            .unwrap();
        store
            .apply(WriteBatch::ServiceDays(vec![ServiceDay {
                date: date(),
                feed_id: "1".into(),
                service_id: "S1".into(),
            }]))
            .unwrap();
        let engine = SightEngine::new(Arc::new(store), SightConfig::default()).unwrap();
        CachedSightEngine::new(engine, &CacheConfig::default())
    }

    #[test]
    fn default_config() {
        let config = CacheConfig::default();
        assert_eq!(config.ttl, Duration::from_secs(3600));
        assert_eq!(config.max_capacity, 1000);
    }

    #[tokio::test]
    async fn stationary_results_are_reused() {
        let cached = cached_engine();
        let observer = Point::new(0.01, 1.0);

        let first = cached.real_train_sights(observer, date(), date()).await.unwrap();
        let second = cached.real_train_sights(observer, date(), date()).await.unwrap();

        assert_eq!(first.len(), 2);
        assert!(Arc::ptr_eq(&first, &second));

        let elsewhere = cached.real_train_sights(Point::new(0.01, 1.5), date(), date()).await.unwrap();
        assert!(!Arc::ptr_eq(&first, &elsewhere));
    }

    #[tokio::test]
    async fn moving_results_are_keyed_by_lateness() {
        let cached = cached_engine();
        let on_time = cached
            .sights_from_trip("1", "T1", date(), chrono::Duration::zero())
            .await
            .unwrap();
        let again = cached
            .sights_from_trip("1", "T1", date(), chrono::Duration::zero())
            .await
            .unwrap();
        let late = cached
            .sights_from_trip("1", "T1", date(), chrono::Duration::minutes(5))
            .await
            .unwrap();

        assert_eq!(on_time.len(), 1);
        assert!(Arc::ptr_eq(&on_time, &again));
        assert!(!Arc::ptr_eq(&on_time, &late));
    }

    #[tokio::test]
    async fn errors_are_not_cached() {
        let cached = cached_engine();
        let err = cached
            .sights_from_trip("1", "NOPE", date(), chrono::Duration::zero())
            .await
            .unwrap_err();
        assert!(matches!(err, SightError::Store(StoreError::NotFound { .. })));

        cached.moving.run_pending_tasks().await;
        assert_eq!(cached.moving.entry_count(), 0);
    }
}
