//! Core data models for waypoint flight.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A geographic position in signed decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// True when both components are finite and within ±90 / ±180 degrees.
    ///
    /// Nothing in this crate enforces this; callers filter samples with it
    /// before handing them to the navigation controller.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }
}

/// A target the vehicle should pass through.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub coordinate: Coordinate,
    pub altitude_m: f64,
}

impl Waypoint {
    pub fn new(lat: f64, lon: f64, altitude_m: f64) -> Self {
        Self {
            coordinate: Coordinate::new(lat, lon),
            altitude_m,
        }
    }

    pub fn lat(&self) -> f64 {
        self.coordinate.lat
    }

    pub fn lon(&self) -> f64 {
        self.coordinate.lon
    }
}

/// Virtual-stick velocity command sent to the vehicle.
///
/// `pitch` carries the latitude (north/south) velocity and `roll` the
/// longitude (east/west) velocity. `yaw` is an angle in radians.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FlightCommand {
    pub pitch: f64,
    pub roll: f64,
    pub yaw: f64,
    pub vertical_throttle: f64,
}

impl FlightCommand {
    /// Horizontal speed magnitude of the command.
    pub fn horizontal_speed(&self) -> f64 {
        self.pitch.hypot(self.roll)
    }
}

/// Position update delivered by the vehicle telemetry feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionSample {
    pub coordinate: Coordinate,
    #[serde(default)]
    pub altitude_m: f64,
    /// Attitude yaw reported by the aircraft (degrees).
    #[serde(default)]
    pub heading_deg: f64,
    pub timestamp: DateTime<Utc>,
}

impl PositionSample {
    /// Create a sample stamped with the current time.
    pub fn new(lat: f64, lon: f64) -> Self {
        Self {
            coordinate: Coordinate::new(lat, lon),
            altitude_m: 0.0,
            heading_deg: 0.0,
            timestamp: Utc::now(),
        }
    }

    /// Set altitude and heading.
    pub fn with_attitude(mut self, altitude_m: f64, heading_deg: f64) -> Self {
        self.altitude_m = altitude_m;
        self.heading_deg = heading_deg;
        self
    }
}
