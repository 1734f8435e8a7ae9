//! Utility modules

pub mod inflight;
pub mod logging;

pub use inflight::{InFlightPermit, InFlightRegistry};
#[cfg(feature = "json-logging")]
pub use logging::init_json_logging;
pub use logging::{init_logging, init_logging_from_config};
