//! Train sight detection.
//!
//! Two questions are answered here:
//!
//! - Which trains pass in front of a fixed observation point, and when?
//!   See [`StationaryDetector`].
//! - Which trains does a passenger see from a given train? See
//!   [`MovingDetector`].
//!
//! [`SightEngine`] runs either detector over candidates fetched from a
//! [`TransitStore`](crate::store::TransitStore) and binds the results to
//! calendar dates.

mod config;
mod engine;
mod error;
mod moving;
mod real;
mod stationary;


pub use config::SightConfig;
pub use engine::SightEngine;
pub use error::SightError;
pub use moving::{InterpolationPoint, MovingDetector, MovingTrainSight};
pub use real::{RealMovingTrainSight, RealStopTime, RealTrainSight, date_window};
pub use stationary::{StationaryDetector, TrainSight, passing_time};
