//! Train sight server.
//!
//! Answers two questions from GTFS timetables: "which trains pass within
//! sight of this point?" and "which trains will I see from this train?"

pub mod cache;
pub mod domain;
pub mod geometry;
pub mod gtfs;
pub mod network;
pub mod sights;
pub mod store;
pub mod web;
