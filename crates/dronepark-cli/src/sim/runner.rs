//! Closed-loop simulation: vehicle → pilot → vehicle.
//!
//! Each step pushes one sample through the pilot's event channel, waits for
//! the loop to publish its status for that sample, then applies whatever
//! command was dispatched before moving the vehicle.

use std::time::Duration;

use anyhow::{Context, Result};
use dronepark_core::geo::distance_m;
use dronepark_core::{Coordinate, FlightCommand, Waypoint};
use dronepark_pilot::{Config, FlightPhase, Pilot};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, watch};

use super::vehicle::SimulatedVehicle;

#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub start: Coordinate,
    /// Telemetry rate in Hz
    pub rate_hz: f64,
    pub max_time_s: f64,
    pub max_gust_mps: f64,
    pub seed: Option<u64>,
    /// Pace steps against the wall clock
    pub realtime: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            start: Coordinate::new(0.0, 0.0),
            rate_hz: 10.0,
            max_time_s: 600.0,
            max_gust_mps: 0.0,
            seed: None,
            realtime: false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WaypointArrival {
    pub index: usize,
    pub sim_time_s: f64,
    pub position: Coordinate,
    pub error_m: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub completed: bool,
    pub sim_time_s: f64,
    pub samples: u64,
    pub commands: u64,
    pub distance_flown_m: f64,
    pub final_position: Coordinate,
    pub arrivals: Vec<WaypointArrival>,
}

pub async fn run_simulation(
    pilot_config: &Config,
    sim: &SimulationConfig,
    waypoints: Vec<Waypoint>,
) -> Result<SimulationReport> {
    let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel::<FlightCommand>();
    let (stick_tx, stick_rx) = watch::channel(false);
    let (shutdown_tx, _) = broadcast::channel(1);

    let pilot = Pilot::new(pilot_config, cmd_tx, stick_tx);
    let (handle, join) = pilot.spawn(shutdown_tx.subscribe());

    let altitude_m = waypoints
        .first()
        .map(|wp| wp.altitude_m)
        .unwrap_or(pilot_config.mission_altitude_m);
    let mut vehicle = SimulatedVehicle::new(sim.start, altitude_m).with_wind(sim.max_gust_mps, sim.seed);

    handle.load_mission(waypoints.clone()).await?;
    handle.enable_virtual_stick().await?;
    handle.start_mission().await.context("mission rejected")?;

    let mut status_rx = handle.subscribe();
    status_rx.borrow_and_update();

    let dt_s = 1.0 / sim.rate_hz.max(0.1);
    let mut ticker = tokio::time::interval(Duration::from_secs_f64(dt_s));
    let mut sim_time_s = 0.0;
    let mut samples = 0u64;
    let mut commands = 0u64;
    let mut reached = 0u64;
    let mut arrivals = Vec::new();
    let mut completed = false;

    while sim_time_s <= sim.max_time_s {
        if sim.realtime {
            ticker.tick().await;
        }

        handle.push_position(vehicle.sample()).await?;
        samples += 1;
        status_rx
            .changed()
            .await
            .context("pilot stopped publishing status")?;
        let status = status_rx.borrow_and_update().clone();

        let mut latest = None;
        while let Ok(cmd) = cmd_rx.try_recv() {
            commands += 1;
            latest = Some(cmd);
        }
        if let Some(cmd) = latest {
            vehicle.apply_command(&cmd, *stick_rx.borrow());
        }

        while reached < status.waypoints_reached {
            let index = reached as usize;
            let position = vehicle.position();
            let error_m = waypoints
                .get(index)
                .map(|wp| distance_m(&position, &wp.coordinate))
                .unwrap_or_default();
            tracing::info!(index, sim_time_s, error_m, "Simulated vehicle reached waypoint");
            arrivals.push(WaypointArrival {
                index,
                sim_time_s,
                position,
                error_m,
            });
            reached += 1;
        }

        if status.phase == FlightPhase::Idle {
            completed = status.missions_completed > 0;
            vehicle.hover();
            break;
        }

        vehicle.step(dt_s);
        sim_time_s += dt_s;
    }

    if !completed {
        tracing::warn!(sim_time_s, "Simulation ended before mission completed");
        handle.stop_mission().await?;
    }

    let _ = shutdown_tx.send(());
    join.await.context("pilot task failed")?;

    Ok(SimulationReport {
        completed,
        sim_time_s,
        samples,
        commands,
        distance_flown_m: vehicle.distance_flown_m(),
        final_position: vehicle.position(),
        arrivals,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use dronepark_core::geo::offset_position;

    fn mission_around(center: Coordinate) -> Vec<Waypoint> {
        [(0.0, 0.0), (40.0, 0.0), (40.0, 30.0)]
            .iter()
            .map(|&(n, e)| Waypoint {
                coordinate: offset_position(&center, n, e),
                altitude_m: 20.0,
            })
            .collect()
    }

    #[tokio::test]
    async fn calm_air_mission_completes() {
        let center = Coordinate::new(33.6846, -117.8265);
        let sim = SimulationConfig {
            start: offset_position(&center, -20.0, -10.0),
            ..SimulationConfig::default()
        };

        let report = run_simulation(&Config::default(), &sim, mission_around(center))
            .await
            .unwrap();

        assert!(report.completed);
        assert_eq!(report.arrivals.len(), 3);
        for arrival in &report.arrivals {
            assert!(arrival.error_m < 0.5, "arrival error {}", arrival.error_m);
        }
        assert!(report.distance_flown_m > 90.0);
        assert!(report.commands <= report.samples);
    }

    #[tokio::test]
    async fn single_waypoint_is_rejected() {
        let sim = SimulationConfig::default();
        let result = run_simulation(
            &Config::default(),
            &sim,
            vec![Waypoint::new(0.0, 0.0, 20.0)],
        )
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn time_limit_stops_unfinished_mission() {
        let center = Coordinate::new(10.0, 10.0);
        let sim = SimulationConfig {
            start: center,
            max_time_s: 1.0,
            ..SimulationConfig::default()
        };
        let waypoints = vec![
            Waypoint {
                coordinate: offset_position(&center, 500.0, 0.0),
                altitude_m: 20.0,
            },
            Waypoint {
                coordinate: offset_position(&center, 500.0, 500.0),
                altitude_m: 20.0,
            },
        ];

        let report = run_simulation(&Config::default(), &sim, waypoints)
            .await
            .unwrap();
        assert!(!report.completed);
        assert!(report.arrivals.is_empty());
    }
}
