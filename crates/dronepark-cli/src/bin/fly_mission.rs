//! Fly a waypoint mission against the simulated vehicle.
//!
//! ```text
//! fly_mission --waypoint 33.6846,-117.8265 --waypoint 33.6850,-117.8265
//! fly_mission --mission route.json --gust 1.5 --seed 7
//! fly_mission --random 5 --radius 80 --json
//! ```

use std::path::PathBuf;

use anyhow::{bail, Result};
use chrono::Utc;
use clap::Parser;
use dronepark_cli::sim::{
    load_mission_file, parse_coordinate, parse_waypoints, random_mission, run_simulation,
    SimulationConfig,
};
use dronepark_core::geo::offset_position;
use dronepark_core::Coordinate;
use dronepark_pilot::config::{parse_bearing, parse_ramp};
use dronepark_pilot::logging::init_tracing;
use dronepark_pilot::Config;
use rand::rngs::StdRng;
use rand::SeedableRng;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Waypoint as LAT,LON[,ALT] (repeatable)
    #[arg(long = "waypoint", value_name = "LAT,LON", allow_hyphen_values = true)]
    waypoints: Vec<String>,

    /// JSON mission file
    #[arg(long, conflicts_with = "waypoints")]
    mission: Option<PathBuf>,

    /// Generate N random waypoints around --lat/--lon
    #[arg(long, value_name = "N", conflicts_with_all = ["waypoints", "mission"])]
    random: Option<usize>,

    /// Center latitude for random missions
    #[arg(long, default_value_t = 33.6846, allow_negative_numbers = true)]
    lat: f64,

    /// Center longitude for random missions
    #[arg(long, default_value_t = -117.8265, allow_negative_numbers = true)]
    lon: f64,

    /// Radius in meters for random missions
    #[arg(long, default_value_t = 100.0)]
    radius: f64,

    /// Default waypoint altitude in meters
    #[arg(long)]
    altitude: Option<f64>,

    /// Vehicle start as LAT,LON (default: 30m south of the first waypoint)
    #[arg(long, allow_hyphen_values = true)]
    start: Option<String>,

    /// Telemetry rate in Hz
    #[arg(long, default_value_t = 10.0)]
    rate: f64,

    /// Give up after this many simulated seconds
    #[arg(long, default_value_t = 600.0)]
    max_time: f64,

    /// Max wind gust per axis in m/s
    #[arg(long, default_value_t = 0.0)]
    gust: f64,

    /// RNG seed for wind and random missions
    #[arg(long)]
    seed: Option<u64>,

    /// Pace the simulation against the wall clock
    #[arg(long)]
    realtime: bool,

    /// Log every navigation tick
    #[arg(long)]
    debug: bool,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Ramp normalization: running_max or snapshot
    #[arg(long)]
    ramp: Option<String>,

    /// Bearing formula: atan or atan2
    #[arg(long)]
    bearing: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::from_env();
    if let Some(alt) = args.altitude {
        config.mission_altitude_m = alt;
    }
    if args.debug {
        config.navigation.debug_logging = true;
    }
    if let Some(ramp) = &args.ramp {
        match parse_ramp(ramp) {
            Some(mode) => config.navigation.ramp_normalization = mode,
            None => bail!("unknown ramp normalization '{ramp}'"),
        }
    }
    if let Some(bearing) = &args.bearing {
        match parse_bearing(bearing) {
            Some(mode) => config.navigation.bearing_mode = mode,
            None => bail!("unknown bearing mode '{bearing}'"),
        }
    }

    let directive = if args.debug {
        "dronepark_pilot=debug"
    } else {
        "dronepark_pilot=info"
    };
    init_tracing(config.log_format, directive)?;

    if args.random.is_some() && (!args.radius.is_finite() || args.radius < 0.0) {
        bail!("--radius must be a non-negative distance in meters");
    }

    let altitude_m = config.mission_altitude_m;
    let waypoints = if let Some(path) = &args.mission {
        load_mission_file(path, altitude_m)?
    } else if let Some(count) = args.random {
        let mut rng = match args.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let center = Coordinate::new(args.lat, args.lon);
        random_mission(&mut rng, center, count, args.radius, altitude_m)?
    } else {
        parse_waypoints(&args.waypoints, altitude_m)?
    };

    let Some(first) = waypoints.first() else {
        bail!("no waypoints given; use --waypoint, --mission or --random");
    };

    let start = match &args.start {
        Some(value) => parse_coordinate(value)?.0,
        None => offset_position(&first.coordinate, -30.0, 0.0),
    };

    let sim = SimulationConfig {
        start,
        rate_hz: args.rate,
        max_time_s: args.max_time,
        max_gust_mps: args.gust,
        seed: args.seed,
        realtime: args.realtime,
    };

    if !args.json {
        println!("Flying {} waypoints from {:.6}, {:.6}", waypoints.len(), start.lat, start.lon);
    }

    let started = Utc::now();
    let report = run_simulation(&config, &sim, waypoints).await?;
    let wall_ms = (Utc::now() - started).num_milliseconds();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for arrival in &report.arrivals {
        println!(
            "  waypoint {} reached at t={:.1}s (error {:.2}m)",
            arrival.index, arrival.sim_time_s, arrival.error_m
        );
    }
    println!(
        "{} after {:.1}s simulated ({}ms wall): {} samples, {} commands, {:.1}m flown",
        if report.completed { "Mission complete" } else { "Mission incomplete" },
        report.sim_time_s,
        wall_ms,
        report.samples,
        report.commands,
        report.distance_flown_m
    );
    println!(
        "Final position: {:.6}, {:.6}",
        report.final_position.lat, report.final_position.lon
    );

    Ok(())
}
