pub mod batch;
pub mod cancellation;
pub mod catalog;
pub mod cometprop_errors;
pub mod config;
pub mod constants;
pub mod ephemeris;
pub mod kepler;
pub mod logging;
pub mod nbody;
pub mod orbit_type;
pub mod ref_system;
pub mod time;
pub mod two_body;

pub use batch::{BatchRequest, BatchScheduler, PropagationMethod, TrajectoryCache};
pub use catalog::{Catalog, CometRecord};
pub use cometprop_errors::{CometPropError, ErrorKind};
pub use config::CometPropConfig;
pub use orbit_type::{KeplerianElements, StateVector};
pub use two_body::TwoBodyPropagator;
