//! Domain types for the sight engine.
//!
//! This module contains the timetable model that sight detection works
//! on. All types enforce their invariants at construction time, so code
//! that receives these types can trust their validity: a stop time always
//! has a time, a trip always has stops, and a segment never runs
//! backwards.

mod calendar;
mod error;
mod feed;
mod route;
mod segment;
mod stop;
mod time;
mod trip;

pub use calendar::{
    Calendar, CalendarDate, ExceptionType, FeededService, ServiceDay, resolve_service_days,
};
pub use error::DomainError;
pub use feed::Feed;
pub use route::{Route, RouteType, RouteTypeMapping};
pub use segment::Segment;
pub use stop::{Stop, StopKey};
pub use time::{ServiceTime, TimeError};
pub use trip::{BoundingBox, StopTime, Trip};
