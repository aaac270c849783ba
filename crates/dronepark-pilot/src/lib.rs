//! DronePark pilot - telemetry-driven virtual-stick mission execution.
//!
//! Wraps the navigation controller from `dronepark-core` in a single-owner
//! control loop fed by one ordered event channel.

pub mod boundary;
pub mod config;
pub mod handle;
pub mod logging;
pub mod pilot;

pub use boundary::{CommandSink, ModeControl};
pub use config::{Config, LogFormat};
pub use handle::PilotHandle;
pub use pilot::{FlightPhase, OperatorCommand, Pilot, PilotError, PilotEvent, PilotStatus};
