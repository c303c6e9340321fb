//! Sight query errors.
//!
//! A query either completes or fails with one of these; no partial result
//! set is ever returned.

use crate::domain::{DomainError, TimeError};
use crate::network::NetworkError;
use crate::store::StoreError;

#[derive(Debug, Clone, thiserror::Error)]
pub enum SightError {
    #[error("unknown time zone: {0}")]
    InvalidTimeZone(String),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Time(#[from] TimeError),

    /// A query running on the blocking pool panicked or was cancelled
    #[error("query task failed: {0}")]
    Task(String),
}
