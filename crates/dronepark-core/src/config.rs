//! Tuning for the waypoint navigation controller.

use serde::{Deserialize, Serialize};

/// Speed ramp magnitude at the start of a leg (virtual-stick units).
pub const DEFAULT_BASE_SPEED: f64 = 8.0;
/// Floor applied to the ramp until an axis is aligned.
pub const DEFAULT_MIN_SPEED: f64 = 0.5;
/// Per-axis proximity threshold in degrees (~0.2 m at mid-latitudes).
pub const DEFAULT_EPSILON_DEG: f64 = 0.000002;

/// How the deceleration ramp is normalized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RampNormalization {
    /// Denominator is the running maximum of `abs(delta)` for the current
    /// waypoint, updated on every tick.
    #[default]
    RunningMax,
    /// Denominator is the first `abs(delta)` seen for the current waypoint and
    /// is never raised afterwards. Speeds are capped at `base_speed`.
    Snapshot,
}

/// How the yaw angle is derived from the remaining delta vector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BearingMode {
    /// `atan(lat_delta / lon_delta)`: saturates at ±π/2 when the longitude
    /// delta is zero and folds opposite quadrants onto each other.
    #[default]
    Atan,
    /// `atan2(lat_delta, lon_delta)`: full-circle angle of the delta vector.
    Atan2,
}

/// Configuration for the navigation controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationConfig {
    /// Velocity magnitude when an axis is at its normalizing distance
    pub base_speed: f64,
    /// Minimum velocity magnitude on an axis that is not yet aligned
    pub min_speed: f64,
    /// Axis is aligned when `abs(delta)` drops below this (degrees)
    pub epsilon_deg: f64,
    pub ramp_normalization: RampNormalization,
    pub bearing_mode: BearingMode,
    /// Emit per-tick deltas and velocities to the log
    pub debug_logging: bool,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            base_speed: DEFAULT_BASE_SPEED,
            min_speed: DEFAULT_MIN_SPEED,
            epsilon_deg: DEFAULT_EPSILON_DEG,
            ramp_normalization: RampNormalization::RunningMax,
            bearing_mode: BearingMode::Atan,
            debug_logging: false,
        }
    }
}
