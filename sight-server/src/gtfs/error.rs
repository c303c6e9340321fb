//! Feed loading error types.

use std::path::PathBuf;

use crate::domain::DomainError;
use crate::store::StoreError;

/// Errors that can occur while loading GTFS feeds.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// Reading a file failed
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A GTFS text file is not valid CSV for its record type
    #[error("{file}: {source}")]
    Csv {
        file: &'static str,
        #[source]
        source: csv::Error,
    },

    /// The loader configuration is not valid JSON
    #[error("invalid loader config: {0}")]
    Config(#[from] serde_json::Error),

    /// A field failed to parse
    #[error("{file}: invalid {field} {value:?}")]
    InvalidField {
        file: &'static str,
        field: &'static str,
        value: String,
    },

    /// A stop time names a stop missing from stops.txt
    #[error("stop_times.txt: trip {trip_id} calls at unknown stop {stop_id}")]
    UnknownStop { trip_id: String, stop_id: String },

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// A feed parsing task panicked or was cancelled
    #[error("feed task failed: {0}")]
    Task(String),
}

impl LoadError {
    pub(crate) fn csv(file: &'static str) -> impl FnOnce(csv::Error) -> Self {
        move |source| LoadError::Csv { file, source }
    }

    pub(crate) fn invalid(file: &'static str, field: &'static str, value: impl Into<String>) -> Self {
        LoadError::InvalidField {
            file,
            field,
            value: value.into(),
        }
    }
}
