//! HTTP route handlers.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use tracing::{error, warn};

use crate::geometry::Point;
use crate::sights::{SightError, date_window};
use crate::store::{StoreError, TransitStore};

use super::dto::*;
use super::state::AppState;

/// Longest lateness accepted on trip queries.
const MAX_LATENESS_MINS: i64 = 24 * 60;

/// Longest date range accepted on fixed-point queries.
const MAX_QUERY_DAYS: u32 = 31;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/sights", get(sights))
        .route("/api/trips/:feed_id/:trip_id/sights", get(trip_sights))
        .route("/api/stops/search", get(search_stops))
        .with_state(state)
}

/// Health check endpoint.
async fn health() -> &'static str {
    "ok"
}

/// Trains visible from a fixed point.
async fn sights(
    State(state): State<AppState>,
    Query(req): Query<SightsRequest>,
) -> Result<Json<SightsResponse>, AppError> {
    let observer = parse_point(req.lat, req.lon)?;
    let today = today_in(state.sights.engine().time_zone());
    let (start, end) = query_window(&req, today)?;

    let found = state.sights.real_train_sights(observer, start, end).await?;
    let sights = found.iter().map(SightResult::from_sight).collect();

    Ok(Json(SightsResponse {
        start: start.to_string(),
        end: end.to_string(),
        sights,
    }))
}

/// Trains seen from aboard a trip.
async fn trip_sights(
    State(state): State<AppState>,
    Path((feed_id, trip_id)): Path<(String, String)>,
    Query(req): Query<TripSightsRequest>,
) -> Result<Json<TripSightsResponse>, AppError> {
    let date = parse_date(&req.date)?;
    if req.lateness_mins.abs() > MAX_LATENESS_MINS {
        return Err(AppError::BadRequest {
            message: format!("Lateness must be within {MAX_LATENESS_MINS} minutes"),
        });
    }

    let found = state
        .sights
        .sights_from_trip(&feed_id, &trip_id, date, chrono::Duration::minutes(req.lateness_mins))
        .await?;
    let sights = found.iter().map(MovingSightResult::from_sight).collect();

    Ok(Json(TripSightsResponse {
        feed_id,
        trip_id,
        date: date.to_string(),
        lateness_mins: req.lateness_mins,
        sights,
    }))
}

/// Search stops by name.
async fn search_stops(
    State(state): State<AppState>,
    Query(req): Query<StopSearchRequest>,
) -> Result<Json<StopSearchResponse>, AppError> {
    let query = req.q.trim();
    if query.is_empty() {
        return Ok(Json(StopSearchResponse { stops: Vec::new() }));
    }

    let stops = state
        .sights
        .engine()
        .store()
        .stops_like(query)?
        .iter()
        .map(|stop| StopResult::from_stop(stop))
        .collect();

    Ok(Json(StopSearchResponse { stops }))
}

/// Current date in the engine's zone.
fn today_in(tz: Tz) -> NaiveDate {
    Utc::now().with_timezone(&tz).date_naive()
}

fn parse_point(lat: f64, lon: f64) -> Result<Point, AppError> {
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return Err(AppError::BadRequest {
            message: format!("Invalid coordinates: {lat}, {lon}"),
        });
    }
    Ok(Point::new(lat, lon))
}

fn parse_date(s: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| AppError::BadRequest {
        message: format!("Invalid date: {s}. Use YYYY-MM-DD"),
    })
}

/// Resolve the service dates a fixed-point query covers.
///
/// `days` takes precedence over `end` and widens the window to include
/// the day before `start`.
fn query_window(req: &SightsRequest, today: NaiveDate) -> Result<(NaiveDate, NaiveDate), AppError> {
    let start = req.start.as_deref().map(parse_date).transpose()?.unwrap_or(today);

    let (start, end) = match req.days {
        Some(days) => date_window(days, start).ok_or_else(|| AppError::BadRequest {
            message: format!("Date window of {days} days from {start} is out of range"),
        })?,
        None => {
            let end = req.end.as_deref().map(parse_date).transpose()?.unwrap_or(start);
            (start, end)
        }
    };

    if end < start {
        return Err(AppError::BadRequest {
            message: format!("End date {end} is before start date {start}"),
        });
    }
    if (end - start).num_days() > i64::from(MAX_QUERY_DAYS) {
        return Err(AppError::BadRequest {
            message: format!("Date range must not exceed {MAX_QUERY_DAYS} days"),
        });
    }
    Ok((start, end))
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    BadRequest { message: String },
    NotFound { message: String },
    Internal { message: String },
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { .. } => AppError::NotFound {
                message: e.to_string(),
            },
            _ => AppError::Internal {
                message: e.to_string(),
            },
        }
    }
}

impl From<SightError> for AppError {
    fn from(e: SightError) -> Self {
        match e {
            SightError::Store(store) => store.into(),
            _ => AppError::Internal {
                message: e.to_string(),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::BadRequest { message } => (StatusCode::BAD_REQUEST, message),
            AppError::NotFound { message } => (StatusCode::NOT_FOUND, message),
            AppError::Internal { message } => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };

        if status.is_server_error() {
            error!(status = %status, "{message}");
        } else {
            warn!(status = %status, "{message}");
        }

        let body = Json(ErrorResponse { error: message });
        (status, body).into_response()
    }
}
