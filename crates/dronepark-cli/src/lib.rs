//! DronePark CLI - command line tools for the waypoint pilot.
//!
//! This crate provides:
//! - fly_mission: fly a waypoint mission against a simulated vehicle

pub mod sim;

pub use sim::{run_simulation, SimulatedVehicle, SimulationConfig, SimulationReport};
