//! GTFS feed loading.
//!
//! Feeds are read from extracted GTFS directories listed in a
//! [`LoaderConfig`]. Only rail-like routes survive parsing; everything the
//! sight engine needs is then written into a
//! [`MemoryStore`](crate::store::MemoryStore).

mod config;
mod error;
mod loader;
mod records;

pub use config::{FeedEntry, LoaderConfig};
pub use error::LoadError;
pub use loader::{LoadSummary, ParsedFeed, load_feeds, parse_feed};
