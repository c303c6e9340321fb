//! Rail network map.
//!
//! Timetables often list only a train's major stops, so a single scheduled
//! hop can span tens of kilometres. The network map learns the shorter
//! hops other trips make over the same ground and uses them to break long
//! hops into a finer trajectory.

mod config;
mod error;
mod map;

pub use config::NetworkConfig;
pub use error::NetworkError;
pub use map::{EdgeSummary, NetworkMap};
