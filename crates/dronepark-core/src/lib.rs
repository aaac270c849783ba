pub mod config;
pub mod error;
pub mod geo;
pub mod mission;
pub mod models;
pub mod navigation;

pub use config::{BearingMode, NavigationConfig, RampNormalization};
pub use error::{MissionError, NavigationError};
pub use geo::haversine_distance;
pub use mission::{MissionStore, MIN_FLIGHT_WAYPOINTS};
pub use models::{Coordinate, FlightCommand, PositionSample, Waypoint};
pub use navigation::{NavigationController, NavigationRunState, NavigationTick, TargetKey};
