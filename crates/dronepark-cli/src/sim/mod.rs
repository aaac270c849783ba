//! Simulation module for flying missions without hardware.
//!
//! Provides a kinematic vehicle, mission sources, and the closed-loop
//! runner that ties them to the pilot.

mod missions;
mod runner;
mod vehicle;

pub use missions::{
    load_mission_file, parse_coordinate, parse_mission_json, parse_waypoints, random_mission,
    MissionFile, MissionPoint,
};
pub use runner::{run_simulation, SimulationConfig, SimulationReport, WaypointArrival};
pub use vehicle::SimulatedVehicle;
