//! Error types for mission handling and navigation.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MissionError {
    #[error("mission needs at least {required} waypoints, has {count}")]
    TooFewWaypoints { count: usize, required: usize },
    #[error("waypoint coordinate ({lat}, {lon}) is not a valid position")]
    InvalidWaypoint { lat: f64, lon: f64 },
}

/// Reasons a navigation tick produced no command.
///
/// None of these are fatal: the caller skips actuation for the tick and the
/// next telemetry event is handled independently.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NavigationError {
    #[error("no active target: mission empty or complete")]
    NoActiveTarget,
    #[error("no current position")]
    NoPosition,
    #[error("position ({lat}, {lon}) is not valid")]
    InvalidPosition { lat: f64, lon: f64 },
}
