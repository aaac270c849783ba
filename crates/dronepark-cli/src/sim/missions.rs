//! Mission sources for the simulator: flags, JSON files and random routes.

use std::path::Path;

use anyhow::{bail, Context, Result};
use dronepark_core::geo::offset_position;
use dronepark_core::{Coordinate, Waypoint};
use rand::Rng;
use serde::Deserialize;

/// On-disk mission format.
///
/// ```json
/// { "altitude_m": 25.0, "waypoints": [ { "lat": 33.68, "lon": -117.82 } ] }
/// ```
#[derive(Debug, Deserialize)]
pub struct MissionFile {
    #[serde(default)]
    pub altitude_m: Option<f64>,
    pub waypoints: Vec<MissionPoint>,
}

#[derive(Debug, Deserialize)]
pub struct MissionPoint {
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub altitude_m: Option<f64>,
}

/// Parse `LAT,LON` or `LAT,LON,ALT`.
pub fn parse_coordinate(value: &str) -> Result<(Coordinate, Option<f64>)> {
    let parts: Vec<&str> = value.split(',').map(str::trim).collect();
    if !(2..=3).contains(&parts.len()) {
        bail!("expected LAT,LON[,ALT], got '{value}'");
    }
    let lat: f64 = parts[0]
        .parse()
        .with_context(|| format!("invalid latitude in '{value}'"))?;
    let lon: f64 = parts[1]
        .parse()
        .with_context(|| format!("invalid longitude in '{value}'"))?;
    let altitude = match parts.get(2) {
        Some(alt) => Some(
            alt.parse::<f64>()
                .with_context(|| format!("invalid altitude in '{value}'"))?,
        ),
        None => None,
    };

    let coordinate = Coordinate::new(lat, lon);
    if !coordinate.is_valid() {
        bail!("coordinate out of range: '{value}'");
    }
    Ok((coordinate, altitude))
}

pub fn parse_waypoints(values: &[String], altitude_m: f64) -> Result<Vec<Waypoint>> {
    values
        .iter()
        .map(|value| {
            let (coordinate, altitude) = parse_coordinate(value)?;
            Ok(Waypoint {
                coordinate,
                altitude_m: altitude.unwrap_or(altitude_m),
            })
        })
        .collect()
}

pub fn load_mission_file(path: &Path, altitude_m: f64) -> Result<Vec<Waypoint>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read mission file {}", path.display()))?;
    parse_mission_json(&text, altitude_m)
        .with_context(|| format!("failed to parse mission file {}", path.display()))
}

pub fn parse_mission_json(text: &str, altitude_m: f64) -> Result<Vec<Waypoint>> {
    let file: MissionFile = serde_json::from_str(text)?;
    let default_alt = file.altitude_m.unwrap_or(altitude_m);
    Ok(file
        .waypoints
        .into_iter()
        .map(|p| Waypoint::new(p.lat, p.lon, p.altitude_m.unwrap_or(default_alt)))
        .collect())
}

/// `count` waypoints scattered within `radius_m` of `center`.
pub fn random_mission<R: Rng>(
    rng: &mut R,
    center: Coordinate,
    count: usize,
    radius_m: f64,
    altitude_m: f64,
) -> Result<Vec<Waypoint>> {
    if !radius_m.is_finite() || radius_m < 0.0 {
        bail!("radius must be a non-negative distance, got {radius_m}");
    }
    Ok((0..count)
        .map(|_| {
            let north = rng.random_range(-radius_m..=radius_m);
            let east = rng.random_range(-radius_m..=radius_m);
            Waypoint {
                coordinate: offset_position(&center, north, east),
                altitude_m,
            }
        })
        .collect())
}
