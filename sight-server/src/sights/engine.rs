//! Sight queries against a timetable store.
//!
//! The engine fetches candidate trips and service days from a
//! [`TransitStore`], runs a detector over each candidate and binds the
//! surviving sights to every date their service runs on.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use chrono_tz::Tz;
use tracing::debug;

use super::{
    MovingDetector, RealMovingTrainSight, RealTrainSight, SightConfig, SightError, StationaryDetector, TrainSight,
};
use crate::domain::{FeededService, ServiceDay, Trip};
use crate::geometry::Point;
use crate::network::NetworkMap;
use crate::store::TransitStore;

/// Answers sight queries.
pub struct SightEngine<S> {
    store: Arc<S>,
    config: SightConfig,
    tz: Tz,
}

impl<S: TransitStore> SightEngine<S> {
    /// Create an engine, failing if the configured time zone is unknown.
    pub fn new(store: Arc<S>, config: SightConfig) -> Result<Self, SightError> {
        let tz = config.tz()?;
        Ok(Self { store, config, tz })
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &SightConfig {
        &self.config
    }

    pub fn time_zone(&self) -> Tz {
        self.tz
    }

    /// Trains seen from `observer` on service dates `start..=end`, in
    /// chronological order.
    pub fn get_real_train_sights(
        &self,
        observer: Point,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RealTrainSight>, SightError> {
        let dates = services_by_date(self.store.services_between_dates(start, end)?);

        let candidates: Vec<Arc<Trip>> = self
            .store
            .trips_containing(observer)?
            .into_iter()
            .filter(|trip| trip.route.route_type.is_rail())
            .collect();
        debug!(
            %observer,
            candidates = candidates.len(),
            dates = dates.len(),
            "Stationary sight query"
        );

        let map = NetworkMap::from_trips(candidates.iter().map(Arc::as_ref), self.config.network.clone())?;
        let detector = StationaryDetector::new(&map, &self.config);

        let mut by_service: HashMap<FeededService, Vec<TrainSight>> = HashMap::new();
        for trip in &candidates {
            if let Some(sight) = detector.detect(observer, trip)? {
                by_service.entry(sight.service()).or_default().push(sight);
            }
        }

        let mut sights = Vec::new();
        for (date, services) in &dates {
            for service in services {
                for sight in by_service.get(service).into_iter().flatten() {
                    sights.push(RealTrainSight::new(sight.clone(), *date, self.tz)?);
                }
            }
        }
        sights.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.sight.trip.feed_id.cmp(&b.sight.trip.feed_id))
                .then_with(|| a.sight.trip.trip_id.cmp(&b.sight.trip.trip_id))
        });

        debug!(sights = sights.len(), "Stationary sight query complete");
        Ok(sights)
    }

    /// Trains seen from aboard `trip` on `date`, running `lateness` behind
    /// its timetable, in chronological order.
    ///
    /// Whether `trip` itself runs on `date` is not checked.
    pub fn get_sights_from_trip(
        &self,
        trip: &Arc<Trip>,
        date: NaiveDate,
        lateness: Duration,
    ) -> Result<Vec<RealMovingTrainSight>, SightError> {
        let running: HashSet<FeededService> = self
            .store
            .services_on_date(date)?
            .iter()
            .map(ServiceDay::service)
            .collect();

        let candidates = self.store.trips_intersecting(&trip.bounds())?;
        debug!(
            trip = %trip.trip_id,
            %date,
            lateness_mins = lateness.num_minutes(),
            candidates = candidates.len(),
            "Moving sight query"
        );

        let detector = MovingDetector::new(&self.config);
        let mut sights = Vec::new();
        for candidate in &candidates {
            let is_reference = candidate.feed_id == trip.feed_id && candidate.trip_id == trip.trip_id;
            if is_reference || !candidate.route.route_type.is_rail() {
                continue;
            }
            let service = FeededService::new(candidate.feed_id.clone(), candidate.service_id.clone());
            if !running.contains(&service) {
                continue;
            }
            if let Some(sight) = detector.detect(trip, lateness, candidate) {
                sights.push(RealMovingTrainSight::new(sight, date, self.tz)?);
            }
        }
        sights.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.sight.trip.feed_id.cmp(&b.sight.trip.feed_id))
                .then_with(|| a.sight.trip.trip_id.cmp(&b.sight.trip.trip_id))
        });

        debug!(sights = sights.len(), "Moving sight query complete");
        Ok(sights)
    }

    /// As [`Self::get_sights_from_trip`], looking the trip up first.
    pub fn get_sights_from_trip_key(
        &self,
        feed_id: &str,
        trip_id: &str,
        date: NaiveDate,
        lateness: Duration,
    ) -> Result<Vec<RealMovingTrainSight>, SightError> {
        let trip = self.store.trip(feed_id, trip_id)?;
        self.get_sights_from_trip(&trip, date, lateness)
    }
}

fn services_by_date(days: Vec<ServiceDay>) -> BTreeMap<NaiveDate, Vec<FeededService>> {
    let mut dates: BTreeMap<NaiveDate, Vec<FeededService>> = BTreeMap::new();
    for day in days {
        dates.entry(day.date).or_default().push(day.service());
    }
    dates
}
