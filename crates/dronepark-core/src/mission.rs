//! Ordered waypoint store with a progress cursor.

use serde::{Deserialize, Serialize};

use crate::error::MissionError;
use crate::models::{Coordinate, Waypoint};

/// Fewest waypoints a mission may be started with.
pub const MIN_FLIGHT_WAYPOINTS: usize = 2;

/// Default altitude applied to waypoints added from bare coordinates.
pub const DEFAULT_MISSION_ALTITUDE_M: f64 = 20.0;

/// Waypoints in flight order plus the index of the current target.
///
/// The cursor is either a valid index or one past the end, which means the
/// mission is complete. `revision` changes every time the sequence is
/// rebuilt so holders of per-waypoint state can tell a reloaded index 0
/// apart from the previous one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissionStore {
    waypoints: Vec<Waypoint>,
    cursor: usize,
    revision: u64,
    altitude_m: f64,
}

impl Default for MissionStore {
    fn default() -> Self {
        Self::new(DEFAULT_MISSION_ALTITUDE_M)
    }
}

impl MissionStore {
    /// Create an empty mission flown at `altitude_m`.
    pub fn new(altitude_m: f64) -> Self {
        Self {
            waypoints: Vec::new(),
            cursor: 0,
            revision: 0,
            altitude_m,
        }
    }

    /// Add a waypoint at the end of the sequence.
    pub fn append(&mut self, waypoint: Waypoint) {
        self.waypoints.push(waypoint);
    }

    /// Add a waypoint at `coordinate` using the mission altitude.
    pub fn append_coordinate(&mut self, coordinate: Coordinate) -> Waypoint {
        let waypoint = Waypoint {
            coordinate,
            altitude_m: self.altitude_m,
        };
        self.append(waypoint);
        waypoint
    }

    /// Drop every waypoint and rewind the cursor.
    pub fn clear(&mut self) {
        self.waypoints.clear();
        self.cursor = 0;
        self.revision += 1;
    }

    /// Replace the whole sequence.
    pub fn load(&mut self, waypoints: impl IntoIterator<Item = Waypoint>) {
        self.clear();
        self.waypoints.extend(waypoints);
    }

    /// Waypoint under the cursor, or `None` when empty or complete.
    pub fn current_target(&self) -> Option<Waypoint> {
        self.waypoints.get(self.cursor).copied()
    }

    /// Move the cursor forward by one. Not clamped.
    pub fn advance(&mut self) {
        self.cursor += 1;
    }

    /// Reject missions too short to fly.
    pub fn ensure_flight_eligible(&self) -> Result<(), MissionError> {
        if self.waypoints.len() < MIN_FLIGHT_WAYPOINTS {
            return Err(MissionError::TooFewWaypoints {
                count: self.waypoints.len(),
                required: MIN_FLIGHT_WAYPOINTS,
            });
        }
        if let Some(bad) = self.waypoints.iter().find(|wp| !wp.coordinate.is_valid()) {
            return Err(MissionError::InvalidWaypoint {
                lat: bad.lat(),
                lon: bad.lon(),
            });
        }
        Ok(())
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn altitude_m(&self) -> f64 {
        self.altitude_m
    }

    pub fn set_altitude_m(&mut self, altitude_m: f64) {
        self.altitude_m = altitude_m;
    }

    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    /// True once the cursor has moved past the last waypoint.
    pub fn is_complete(&self) -> bool {
        !self.waypoints.is_empty() && self.cursor >= self.waypoints.len()
    }
}
