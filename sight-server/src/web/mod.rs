//! Web layer for the sight engine.
//!
//! Provides JSON endpoints for fixed-point and on-board sight queries and
//! for stop lookup.

mod dto;
mod routes;
mod state;

pub use dto::*;
pub use routes::{AppError, create_router};
pub use state::AppState;
