//! Loader configuration.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::LoadError;
use crate::domain::RouteTypeMapping;

/// Which feeds to load.
///
/// ```json
/// {
///   "feeds": [
///     { "active": true, "path": "feeds/sncf", "display_name": "SNCF" },
///     { "active": false, "path": "feeds/sbb", "display_name": "SBB" }
///   ],
///   "route_types": { "1": 2, "9": 0 }
/// }
/// ```
///
/// Feeds are numbered from 1 by their position in the list, inactive ones
/// included, so ids stay stable when a feed is switched off.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoaderConfig {
    pub feeds: Vec<FeedEntry>,

    /// Extended route type categories to core types; replaces the default
    /// table when given.
    #[serde(default)]
    pub route_types: RouteTypeMapping,
}

/// One feed: a directory holding the extracted GTFS text files.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedEntry {
    #[serde(default = "default_active")]
    pub active: bool,
    pub path: PathBuf,
    pub display_name: String,
}

fn default_active() -> bool {
    true
}

impl LoaderConfig {
    pub fn from_json(json: &str) -> Result<Self, LoadError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Active feeds with their ids.
    pub fn active_feeds(&self) -> impl Iterator<Item = (String, &FeedEntry)> {
        self.feeds
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.active)
            .map(|(i, entry)| ((i + 1).to_string(), entry))
    }
}
