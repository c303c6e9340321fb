//! Store configuration.

use serde::Deserialize;

/// How concurrent batch writes reach the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteDisciplineKind {
    /// One writer at a time.
    #[default]
    Exclusive,
    /// Writers proceed without coordination.
    Uncontended,
}

/// Configuration for a [`MemoryStore`](super::MemoryStore).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Margin added around query boxes in bounding-box lookups (degrees).
    pub grace_degrees: f64,

    /// Number of trips fetched per page, and records per write batch.
    pub page_size: usize,

    pub write_discipline: WriteDisciplineKind,
}

impl StoreConfig {
    /// Create a new configuration with the given parameters.
    pub fn new(grace_degrees: f64, page_size: usize, write_discipline: WriteDisciplineKind) -> Self {
        Self {
            grace_degrees,
            page_size,
            write_discipline,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            grace_degrees: 0.009 * 2.0, // about 2 km
            page_size: 1000,
            write_discipline: WriteDisciplineKind::Exclusive,
        }
    }
}
