//! Virtual-stick waypoint navigation.
//!
//! On every position sample the controller compares the vehicle against the
//! mission's current target and produces a velocity command. Each axis ramps
//! down linearly from `base_speed` at its normalizing distance toward
//! `min_speed`, and drops to zero once the axis is inside `epsilon_deg`.
//! When both axes are aligned the controller advances the mission.

use serde::{Deserialize, Serialize};

use crate::config::{BearingMode, NavigationConfig, RampNormalization};
use crate::error::NavigationError;
use crate::mission::MissionStore;
use crate::models::{Coordinate, FlightCommand, Waypoint};

/// Identifies which waypoint the run state was built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetKey {
    pub revision: u64,
    pub index: usize,
}

/// Per-waypoint ramp normalizers.
///
/// Holds the largest `abs(delta)` seen on each axis since the controller
/// started steering toward the current waypoint. Zero means unset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NavigationRunState {
    max_lon_delta: f64,
    max_lat_delta: f64,
    target: Option<TargetKey>,
}

impl NavigationRunState {
    /// Running maxima as `(longitude, latitude)` in degrees.
    pub fn max_deltas(&self) -> (f64, f64) {
        (self.max_lon_delta, self.max_lat_delta)
    }

    pub fn target(&self) -> Option<TargetKey> {
        self.target
    }

    /// Zero both maxima.
    pub fn reset(&mut self) {
        self.max_lon_delta = 0.0;
        self.max_lat_delta = 0.0;
    }

    /// Start tracking `key`, discarding maxima left over from another target.
    fn bind(&mut self, key: TargetKey) {
        if self.target != Some(key) {
            self.reset();
            self.target = Some(key);
        }
    }

    fn observe(&mut self, lon_abs: f64, lat_abs: f64, mode: RampNormalization) {
        match mode {
            RampNormalization::RunningMax => {
                self.max_lon_delta = self.max_lon_delta.max(lon_abs);
                self.max_lat_delta = self.max_lat_delta.max(lat_abs);
            }
            RampNormalization::Snapshot => {
                if self.max_lon_delta == 0.0 {
                    self.max_lon_delta = lon_abs;
                }
                if self.max_lat_delta == 0.0 {
                    self.max_lat_delta = lat_abs;
                }
            }
        }
    }
}

/// Result of one navigation step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NavigationTick {
    pub command: FlightCommand,
    /// Index of the waypoint this command steers toward
    pub waypoint_index: usize,
    /// `target.lon - position.lon` in degrees
    pub lon_delta: f64,
    /// `target.lat - position.lat` in degrees
    pub lat_delta: f64,
    pub lon_done: bool,
    pub lat_done: bool,
    /// The mission cursor moved past `waypoint_index` on this tick
    pub advanced: bool,
    /// Longitude delta was exactly zero, so an `atan` yaw saturated at ±π/2
    pub bearing_degenerate: bool,
}

impl NavigationTick {
    pub fn arrived(&self) -> bool {
        self.lon_done && self.lat_done
    }
}

/// Computes velocity commands and advances the mission on arrival.
#[derive(Debug, Clone, Default)]
pub struct NavigationController {
    config: NavigationConfig,
    run_state: NavigationRunState,
}

impl NavigationController {
    pub fn new(config: NavigationConfig) -> Self {
        Self {
            config,
            run_state: NavigationRunState::default(),
        }
    }

    pub fn config(&self) -> &NavigationConfig {
        &self.config
    }

    pub fn run_state(&self) -> &NavigationRunState {
        &self.run_state
    }

    /// Command for this sample, or `None` when there is nothing to fly to.
    pub fn compute_command(
        &mut self,
        position: Option<&Coordinate>,
        mission: &mut MissionStore,
    ) -> Option<FlightCommand> {
        self.try_compute(position, mission).ok().map(|tick| tick.command)
    }

    /// Run one navigation step against the mission's current target.
    ///
    /// The only place the mission cursor is advanced by navigation.
    pub fn try_compute(
        &mut self,
        position: Option<&Coordinate>,
        mission: &mut MissionStore,
    ) -> Result<NavigationTick, NavigationError> {
        let position = position.ok_or(NavigationError::NoPosition)?;
        if !position.is_valid() {
            return Err(NavigationError::InvalidPosition {
                lat: position.lat,
                lon: position.lon,
            });
        }
        let target = mission
            .current_target()
            .ok_or(NavigationError::NoActiveTarget)?;

        self.run_state.bind(TargetKey {
            revision: mission.revision(),
            index: mission.cursor(),
        });

        let mut tick = self.steer(position, &target);
        tick.waypoint_index = mission.cursor();

        if tick.arrived() {
            self.run_state.reset();
            mission.advance();
            tick.advanced = true;
        }

        Ok(tick)
    }

    /// Velocity law for one sample. Updates the ramp normalizers but never
    /// touches the mission.
    pub fn steer(&mut self, position: &Coordinate, target: &Waypoint) -> NavigationTick {
        let lon_delta = target.lon() - position.lon;
        let lat_delta = target.lat() - position.lat;

        self.run_state.observe(
            lon_delta.abs(),
            lat_delta.abs(),
            self.config.ramp_normalization,
        );
        let (max_lon, max_lat) = self.run_state.max_deltas();

        let lon_done = lon_delta.abs() < self.config.epsilon_deg;
        let lat_done = lat_delta.abs() < self.config.epsilon_deg;

        let roll = if lon_done {
            0.0
        } else {
            self.axis_velocity(lon_delta, max_lon)
        };
        let pitch = if lat_done {
            0.0
        } else {
            self.axis_velocity(lat_delta, max_lat)
        };

        let (yaw, bearing_degenerate) = self.yaw(lon_delta, lat_delta);

        NavigationTick {
            command: FlightCommand {
                pitch,
                roll,
                yaw,
                vertical_throttle: 0.0,
            },
            waypoint_index: 0,
            lon_delta,
            lat_delta,
            lon_done,
            lat_done,
            advanced: false,
            bearing_degenerate,
        }
    }

    /// Signed velocity that closes `delta`, ramped by `delta / max_delta`.
    fn axis_velocity(&self, delta: f64, max_delta: f64) -> f64 {
        let ratio = if max_delta > 0.0 {
            (delta.abs() / max_delta).min(1.0)
        } else {
            1.0
        };
        let speed = (self.config.base_speed * ratio).max(self.config.min_speed);
        if delta < 0.0 {
            -speed
        } else {
            speed
        }
    }

    fn yaw(&self, lon_delta: f64, lat_delta: f64) -> (f64, bool) {
        match self.config.bearing_mode {
            BearingMode::Atan => {
                let degenerate = lon_delta == 0.0;
                let angle = (lat_delta / lon_delta).atan();
                // 0/0 when sitting exactly on the target.
                let angle = if angle.is_nan() { 0.0 } else { angle };
                (angle, degenerate)
            }
            BearingMode::Atan2 => (lat_delta.atan2(lon_delta), false),
        }
    }
}
