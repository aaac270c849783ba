//! Pilot configuration from environment.

use std::env;
use std::str::FromStr;

use dronepark_core::config::{BearingMode, NavigationConfig, RampNormalization};
use dronepark_core::mission::DEFAULT_MISSION_ALTITUDE_M;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Capacity of the pilot event channel
    pub event_buffer: usize,
    /// Altitude applied to waypoints added from map taps
    pub mission_altitude_m: f64,
    pub navigation: NavigationConfig,
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            event_buffer: 64,
            mission_altitude_m: DEFAULT_MISSION_ALTITUDE_M,
            navigation: NavigationConfig::default(),
            log_format: LogFormat::Pretty,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. Unset or unparsable
    /// values fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let nav = defaults.navigation;
        let parse = |key: &str| {
            lookup(key)
                .and_then(|s| s.trim().parse::<f64>().ok())
                .filter(|v| v.is_finite() && *v > 0.0)
        };

        Self {
            event_buffer: lookup("DRONEPARK_EVENT_BUFFER")
                .and_then(|s| s.trim().parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.event_buffer),
            mission_altitude_m: parse("DRONEPARK_ALTITUDE_M").unwrap_or(defaults.mission_altitude_m),
            navigation: NavigationConfig {
                base_speed: parse("DRONEPARK_BASE_SPEED").unwrap_or(nav.base_speed),
                min_speed: parse("DRONEPARK_MIN_SPEED").unwrap_or(nav.min_speed),
                epsilon_deg: parse("DRONEPARK_EPSILON_DEG").unwrap_or(nav.epsilon_deg),
                ramp_normalization: lookup("DRONEPARK_RAMP")
                    .and_then(|s| parse_ramp(&s))
                    .unwrap_or(nav.ramp_normalization),
                bearing_mode: lookup("DRONEPARK_BEARING")
                    .and_then(|s| parse_bearing(&s))
                    .unwrap_or(nav.bearing_mode),
                debug_logging: lookup("DRONEPARK_DEBUG")
                    .map(|s| parse_flag(&s))
                    .unwrap_or(nav.debug_logging),
            },
            log_format: lookup("DRONEPARK_LOG_FORMAT")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.log_format),
        }
    }
}

pub fn parse_ramp(value: &str) -> Option<RampNormalization> {
    match value.trim().to_ascii_lowercase().as_str() {
        "running_max" | "running-max" => Some(RampNormalization::RunningMax),
        "snapshot" => Some(RampNormalization::Snapshot),
        _ => None,
    }
}

pub fn parse_bearing(value: &str) -> Option<BearingMode> {
    match value.trim().to_ascii_lowercase().as_str() {
        "atan" => Some(BearingMode::Atan),
        "atan2" => Some(BearingMode::Atan2),
        _ => None,
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
