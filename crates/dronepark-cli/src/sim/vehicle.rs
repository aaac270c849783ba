//! Kinematic stand-in for a virtual-stick aircraft.

use dronepark_core::geo::{lat_to_meters, lon_to_meters, offset_position};
use dronepark_core::{Coordinate, FlightCommand, PositionSample};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Random horizontal gusts applied on every step.
struct Wind {
    max_gust_mps: f64,
    rng: StdRng,
}

impl Wind {
    fn gust(&mut self) -> (f64, f64) {
        let g = self.max_gust_mps;
        (self.rng.random_range(-g..g), self.rng.random_range(-g..g))
    }
}

/// Point-mass vehicle that follows velocity commands instantly.
///
/// `pitch` is read as north velocity and `roll` as east velocity, both in
/// m/s. Commands are ignored while virtual stick is disabled.
pub struct SimulatedVehicle {
    position: Coordinate,
    altitude_m: f64,
    heading_deg: f64,
    north_mps: f64,
    east_mps: f64,
    wind: Option<Wind>,
    distance_flown_m: f64,
}

impl SimulatedVehicle {
    pub fn new(start: Coordinate, altitude_m: f64) -> Self {
        Self {
            position: start,
            altitude_m,
            heading_deg: 0.0,
            north_mps: 0.0,
            east_mps: 0.0,
            wind: None,
            distance_flown_m: 0.0,
        }
    }

    /// Add gusts of up to `max_gust_mps` per axis. A fixed seed makes runs
    /// repeatable.
    pub fn with_wind(mut self, max_gust_mps: f64, seed: Option<u64>) -> Self {
        if max_gust_mps > 0.0 {
            let seed = seed.unwrap_or_else(rand::random);
            self.wind = Some(Wind {
                max_gust_mps,
                rng: StdRng::seed_from_u64(seed),
            });
        }
        self
    }

    pub fn position(&self) -> Coordinate {
        self.position
    }

    pub fn distance_flown_m(&self) -> f64 {
        self.distance_flown_m
    }

    pub fn apply_command(&mut self, command: &FlightCommand, stick_enabled: bool) {
        if stick_enabled {
            self.north_mps = command.pitch;
            self.east_mps = command.roll;
        } else {
            self.hover();
        }
    }

    pub fn hover(&mut self) {
        self.north_mps = 0.0;
        self.east_mps = 0.0;
    }

    /// Advance the simulation by `dt_s` seconds.
    pub fn step(&mut self, dt_s: f64) {
        let (gust_n, gust_e) = self.wind.as_mut().map(Wind::gust).unwrap_or((0.0, 0.0));
        let north_m = (self.north_mps + gust_n) * dt_s;
        let east_m = (self.east_mps + gust_e) * dt_s;

        self.position = offset_position(&self.position, north_m, east_m);
        self.distance_flown_m += north_m.hypot(east_m);

        if self.north_mps != 0.0 || self.east_mps != 0.0 {
            let heading = self.east_mps.atan2(self.north_mps).to_degrees();
            self.heading_deg = if heading < 0.0 { heading + 360.0 } else { heading };
        }
    }

    /// Telemetry sample for the current state.
    pub fn sample(&self) -> PositionSample {
        PositionSample::new(self.position.lat, self.position.lon)
            .with_attitude(self.altitude_m, self.heading_deg)
    }

    /// North/east offset in meters from the vehicle to `target`.
    pub fn offset_to(&self, target: &Coordinate) -> (f64, f64) {
        (
            lat_to_meters(target.lat - self.position.lat, self.position.lat),
            lon_to_meters(target.lon - self.position.lon, self.position.lat),
        )
    }
}
