//! Mission execution loop.
//!
//! A single task owns the mission store and the navigation controller and
//! drains one ordered event channel. Position samples and operator commands
//! share that channel, so a clear issued mid-flight can never interleave
//! with a half-finished navigation step.

use std::fmt;

use chrono::{DateTime, Utc};
use dronepark_core::geo::distance_m;
use dronepark_core::{
    Coordinate, FlightCommand, MissionError, MissionStore, NavigationController, NavigationError,
    NavigationTick, PositionSample, Waypoint,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::boundary::{CommandSink, ModeControl};
use crate::config::Config;
use crate::handle::PilotHandle;

/// Mission execution state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlightPhase {
    /// Virtual stick disabled
    #[default]
    Idle,
    /// Virtual stick enabled, mission not running
    Armed,
    /// Generating one command per position sample
    Running,
}

impl fmt::Display for FlightPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FlightPhase::Idle => "idle",
            FlightPhase::Armed => "armed",
            FlightPhase::Running => "running",
        };
        f.write_str(name)
    }
}

/// Requests from the mission authoring and mode control side.
#[derive(Debug, Clone, PartialEq)]
pub enum OperatorCommand {
    /// Append a map tap at the mission altitude
    AddWaypoint(Coordinate),
    LoadMission(Vec<Waypoint>),
    ClearMission,
    SetAltitude(f64),
    EnableVirtualStick,
    StartMission,
    StopMission,
}

pub type OperatorReply = oneshot::Sender<Result<PilotStatus, PilotError>>;

#[derive(Debug)]
pub enum PilotEvent {
    Position(PositionSample),
    /// The telemetry feed disconnected
    FeedLost,
    Operator {
        command: OperatorCommand,
        reply: Option<OperatorReply>,
    },
}

#[derive(Debug, Error)]
pub enum PilotError {
    #[error(transparent)]
    Mission(#[from] MissionError),
    #[error("cannot {action} while {phase}")]
    InvalidTransition {
        action: &'static str,
        phase: FlightPhase,
    },
    #[error("altitude {0} m is not a positive finite value")]
    InvalidAltitude(f64),
    #[error("mode control failed: {0}")]
    ModeControl(String),
    #[error("pilot is not running")]
    ChannelClosed,
}

/// Snapshot published after every handled event.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PilotStatus {
    pub phase: FlightPhase,
    pub cursor: usize,
    pub waypoint_count: usize,
    pub mission_revision: u64,
    pub current_target: Option<Waypoint>,
    pub last_position: Option<Coordinate>,
    pub last_sample_at: Option<DateTime<Utc>>,
    /// Aircraft heading from the last valid sample (degrees)
    pub heading_deg: Option<f64>,
    pub distance_to_target_m: Option<f64>,
    pub last_command: Option<FlightCommand>,
    pub commands_sent: u64,
    pub waypoints_reached: u64,
    pub missions_completed: u64,
}

pub struct Pilot<S, M> {
    mission: MissionStore,
    controller: NavigationController,
    phase: FlightPhase,
    sink: S,
    mode: M,
    event_buffer: usize,
    last_sample: Option<PositionSample>,
    last_command: Option<FlightCommand>,
    commands_sent: u64,
    waypoints_reached: u64,
    missions_completed: u64,
    status_tx: watch::Sender<PilotStatus>,
}

impl<S: CommandSink, M: ModeControl> Pilot<S, M> {
    pub fn new(config: &Config, sink: S, mode: M) -> Self {
        let (status_tx, _) = watch::channel(PilotStatus::default());
        Self {
            mission: MissionStore::new(config.mission_altitude_m),
            controller: NavigationController::new(config.navigation.clone()),
            phase: FlightPhase::Idle,
            sink,
            mode,
            event_buffer: config.event_buffer,
            last_sample: None,
            last_command: None,
            commands_sent: 0,
            waypoints_reached: 0,
            missions_completed: 0,
            status_tx,
        }
    }

    pub fn phase(&self) -> FlightPhase {
        self.phase
    }

    pub fn mission(&self) -> &MissionStore {
        &self.mission
    }

    pub fn controller(&self) -> &NavigationController {
        &self.controller
    }

    pub fn subscribe(&self) -> watch::Receiver<PilotStatus> {
        self.status_tx.subscribe()
    }

    /// Handle one position sample. Returns the command dispatched, if any.
    pub fn on_position(&mut self, sample: PositionSample) -> Option<FlightCommand> {
        if !sample.coordinate.is_valid() {
            tracing::warn!(
                lat = sample.coordinate.lat,
                lon = sample.coordinate.lon,
                "Dropping invalid position sample"
            );
            return None;
        }

        let position = sample.coordinate;
        self.last_sample = Some(sample);

        if self.phase != FlightPhase::Running {
            return None;
        }

        match self.controller.try_compute(Some(&position), &mut self.mission) {
            Ok(tick) => {
                self.log_tick(&tick);
                self.dispatch(tick.command);

                if tick.advanced {
                    self.waypoints_reached += 1;
                    tracing::info!(
                        waypoint = tick.waypoint_index,
                        remaining = self.mission.len().saturating_sub(self.mission.cursor()),
                        "Waypoint reached"
                    );
                }

                if self.mission.current_target().is_none() {
                    self.finish_mission();
                }
                Some(tick.command)
            }
            Err(NavigationError::NoActiveTarget) => {
                self.finish_mission();
                None
            }
            Err(e) => {
                tracing::debug!(error = %e, "No command for this sample");
                None
            }
        }
    }

    pub fn on_feed_lost(&mut self) {
        if self.phase != FlightPhase::Idle {
            tracing::warn!(phase = %self.phase, "Position feed lost, stopping mission");
            self.disarm("position feed lost");
        }
    }

    /// Apply an operator command and return the resulting status.
    pub fn apply(&mut self, command: OperatorCommand) -> Result<PilotStatus, PilotError> {
        let edits_mission = matches!(
            command,
            OperatorCommand::AddWaypoint(_)
                | OperatorCommand::LoadMission(_)
                | OperatorCommand::ClearMission
        );

        match command {
            OperatorCommand::AddWaypoint(coordinate) => {
                if !coordinate.is_valid() {
                    return Err(MissionError::InvalidWaypoint {
                        lat: coordinate.lat,
                        lon: coordinate.lon,
                    }
                    .into());
                }
                let waypoint = self.mission.append_coordinate(coordinate);
                tracing::info!(
                    lat = waypoint.lat(),
                    lon = waypoint.lon(),
                    altitude_m = waypoint.altitude_m,
                    count = self.mission.len(),
                    "Waypoint added"
                );
            }
            OperatorCommand::LoadMission(waypoints) => {
                if let Some(bad) = waypoints.iter().find(|wp| !wp.coordinate.is_valid()) {
                    return Err(MissionError::InvalidWaypoint {
                        lat: bad.lat(),
                        lon: bad.lon(),
                    }
                    .into());
                }
                self.mission.load(waypoints);
                tracing::info!(count = self.mission.len(), "Mission loaded");
            }
            OperatorCommand::ClearMission => {
                self.mission.clear();
                tracing::info!(phase = %self.phase, "Mission cleared");
            }
            OperatorCommand::SetAltitude(altitude_m) => {
                if !altitude_m.is_finite() || altitude_m <= 0.0 {
                    return Err(PilotError::InvalidAltitude(altitude_m));
                }
                self.mission.set_altitude_m(altitude_m);
            }
            OperatorCommand::EnableVirtualStick => self.arm()?,
            OperatorCommand::StartMission => self.start()?,
            OperatorCommand::StopMission => self.disarm("operator stop"),
        }

        if edits_mission && self.phase == FlightPhase::Running {
            if let Err(e) = self.mission.ensure_flight_eligible() {
                self.phase = FlightPhase::Armed;
                tracing::warn!(error = %e, "Mission no longer flyable, holding until restarted");
            }
        }

        Ok(self.publish())
    }

    /// Spawn the control loop on the current runtime.
    pub fn spawn(self, shutdown: broadcast::Receiver<()>) -> (PilotHandle, JoinHandle<()>)
    where
        S: 'static,
        M: 'static,
    {
        let (events_tx, events_rx) = mpsc::channel(self.event_buffer);
        let handle = PilotHandle::new(events_tx, self.subscribe());
        let join = tokio::spawn(self.run(events_rx, shutdown));
        (handle, join)
    }

    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<PilotEvent>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        tracing::info!("Pilot loop started");
        self.publish();

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("Pilot loop shutting down");
                    break;
                }
                event = events.recv() => {
                    match event {
                        Some(event) => self.handle_event(event),
                        None => {
                            tracing::info!("Pilot event channel closed");
                            break;
                        }
                    }
                }
            }
        }

        self.disarm("pilot shutdown");
        self.publish();
    }

    fn handle_event(&mut self, event: PilotEvent) {
        match event {
            PilotEvent::Position(sample) => {
                self.on_position(sample);
                self.publish();
            }
            PilotEvent::FeedLost => {
                self.on_feed_lost();
                self.publish();
            }
            PilotEvent::Operator { command, reply } => {
                let result = self.apply(command);
                if let Err(e) = &result {
                    tracing::warn!(error = %e, "Operator command rejected");
                }
                if let Some(reply) = reply {
                    let _ = reply.send(result);
                }
            }
        }
    }

    fn arm(&mut self) -> Result<(), PilotError> {
        if self.phase != FlightPhase::Idle {
            return Ok(());
        }
        self.mode
            .set_virtual_stick(true)
            .map_err(|e| PilotError::ModeControl(format!("{e:#}")))?;
        self.phase = FlightPhase::Armed;
        tracing::info!("Virtual stick enabled");
        Ok(())
    }

    fn start(&mut self) -> Result<(), PilotError> {
        if self.phase != FlightPhase::Armed {
            return Err(PilotError::InvalidTransition {
                action: "start mission",
                phase: self.phase,
            });
        }
        self.mission.ensure_flight_eligible()?;

        if self.mission.is_complete() {
            let waypoints = self.mission.waypoints().to_vec();
            self.mission.load(waypoints);
            tracing::info!("Restarting completed mission from the first waypoint");
        }

        self.phase = FlightPhase::Running;
        tracing::info!(
            waypoints = self.mission.len(),
            cursor = self.mission.cursor(),
            "Mission started"
        );
        Ok(())
    }

    fn disarm(&mut self, reason: &str) {
        if self.phase == FlightPhase::Idle {
            return;
        }
        if let Err(e) = self.mode.set_virtual_stick(false) {
            tracing::error!(error = %e, "Failed to disable virtual stick");
        }
        self.phase = FlightPhase::Idle;
        tracing::info!(reason, "Virtual stick disabled");
    }

    fn finish_mission(&mut self) {
        if self.mission.is_complete() {
            self.missions_completed += 1;
            tracing::info!(waypoints = self.mission.len(), "Mission complete");
            self.disarm("mission complete");
        } else {
            tracing::warn!("No active target while running");
            self.disarm("no active target");
        }
    }

    fn dispatch(&mut self, command: FlightCommand) {
        match self.sink.dispatch(command) {
            Ok(()) => self.commands_sent += 1,
            Err(e) => tracing::warn!(error = %e, "Failed to dispatch flight command"),
        }
        self.last_command = Some(command);
    }

    fn log_tick(&self, tick: &NavigationTick) {
        if self.controller.config().debug_logging {
            tracing::debug!(
                waypoint = tick.waypoint_index,
                lat_delta = tick.lat_delta,
                lon_delta = tick.lon_delta,
                pitch = tick.command.pitch,
                roll = tick.command.roll,
                yaw = tick.command.yaw,
                "Navigation tick"
            );
        }
        if tick.bearing_degenerate {
            tracing::debug!(
                waypoint = tick.waypoint_index,
                "Longitude delta is zero, yaw saturated"
            );
        }
    }

    fn status(&self) -> PilotStatus {
        let current_target = self.mission.current_target();
        let last_position = self.last_sample.as_ref().map(|s| s.coordinate);
        PilotStatus {
            phase: self.phase,
            cursor: self.mission.cursor(),
            waypoint_count: self.mission.len(),
            mission_revision: self.mission.revision(),
            current_target,
            last_position,
            last_sample_at: self.last_sample.as_ref().map(|s| s.timestamp),
            heading_deg: self.last_sample.as_ref().map(|s| s.heading_deg),
            distance_to_target_m: last_position
                .zip(current_target)
                .map(|(pos, wp)| distance_m(&pos, &wp.coordinate)),
            last_command: self.last_command,
            commands_sent: self.commands_sent,
            waypoints_reached: self.waypoints_reached,
            missions_completed: self.missions_completed,
        }
    }

    fn publish(&self) -> PilotStatus {
        let status = self.status();
        self.status_tx.send_replace(status.clone());
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};
    use tokio::sync::mpsc::error::TryRecvError;

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    type TestPilot = Pilot<mpsc::UnboundedSender<FlightCommand>, watch::Sender<bool>>;

    fn pilot() -> (
        TestPilot,
        mpsc::UnboundedReceiver<FlightCommand>,
        watch::Receiver<bool>,
    ) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (mode_tx, mode_rx) = watch::channel(false);
        (Pilot::new(&Config::default(), cmd_tx, mode_tx), cmd_rx, mode_rx)
    }

    fn square_mission() -> Vec<Waypoint> {
        vec![
            Waypoint::new(0.0, 0.0, 20.0),
            Waypoint::new(0.0, 0.0001, 20.0),
        ]
    }

    #[test]
    fn start_requires_armed_phase() {
        let (mut pilot, _, _) = pilot();
        pilot.apply(OperatorCommand::LoadMission(square_mission())).unwrap();

        let err = pilot.apply(OperatorCommand::StartMission).unwrap_err();
        assert!(matches!(
            err,
            PilotError::InvalidTransition { phase: FlightPhase::Idle, .. }
        ));
    }

    #[test]
    fn start_rejects_single_waypoint_mission() {
        let (mut pilot, _, mode) = pilot();
        pilot
            .apply(OperatorCommand::AddWaypoint(Coordinate::new(1.0, 1.0)))
            .unwrap();
        pilot.apply(OperatorCommand::EnableVirtualStick).unwrap();
        assert!(*mode.borrow());

        let err = pilot.apply(OperatorCommand::StartMission).unwrap_err();
        assert!(matches!(
            err,
            PilotError::Mission(MissionError::TooFewWaypoints { count: 1, .. })
        ));
        assert_eq!(pilot.phase(), FlightPhase::Armed);
    }

    #[test]
    fn samples_are_ignored_unless_running() {
        let (mut pilot, mut commands, _) = pilot();
        pilot.apply(OperatorCommand::LoadMission(square_mission())).unwrap();
        pilot.apply(OperatorCommand::EnableVirtualStick).unwrap();

        assert!(pilot.on_position(PositionSample::new(0.0001, 0.0001)).is_none());
        assert_eq!(commands.try_recv(), Err(TryRecvError::Empty));
    }

    #[test]
    fn running_mission_dispatches_and_completes() {
        let (mut pilot, mut commands, mode) = pilot();
        pilot.apply(OperatorCommand::LoadMission(square_mission())).unwrap();
        pilot.apply(OperatorCommand::EnableVirtualStick).unwrap();
        pilot.apply(OperatorCommand::StartMission).unwrap();

        let cmd = pilot.on_position(PositionSample::new(0.00005, 0.0)).unwrap();
        assert!(cmd.pitch < 0.0);
        assert_eq!(commands.try_recv().unwrap(), cmd);

        // On the first waypoint, then on the second.
        pilot.on_position(PositionSample::new(0.0, 0.0)).unwrap();
        assert_eq!(pilot.mission().cursor(), 1);
        pilot.on_position(PositionSample::new(0.0, 0.0001)).unwrap();

        assert_eq!(pilot.phase(), FlightPhase::Idle);
        assert!(!*mode.borrow());
        let status = pilot.publish();
        assert_eq!(status.missions_completed, 1);
        assert_eq!(status.waypoints_reached, 2);
        assert_eq!(status.commands_sent, 3);
    }

    #[test]
    fn invalid_sample_is_dropped_without_command() {
        let (mut pilot, mut commands, _) = pilot();
        pilot.apply(OperatorCommand::LoadMission(square_mission())).unwrap();
        pilot.apply(OperatorCommand::EnableVirtualStick).unwrap();
        pilot.apply(OperatorCommand::StartMission).unwrap();

        assert!(pilot.on_position(PositionSample::new(f64::NAN, 0.0)).is_none());
        assert!(pilot.on_position(PositionSample::new(0.0, 200.0)).is_none());
        assert_eq!(commands.try_recv(), Err(TryRecvError::Empty));
        assert_eq!(pilot.phase(), FlightPhase::Running);
    }

    #[test]
    fn clear_while_running_holds_armed() {
        let (mut pilot, mut commands, mode) = pilot();
        pilot.apply(OperatorCommand::LoadMission(square_mission())).unwrap();
        pilot.apply(OperatorCommand::EnableVirtualStick).unwrap();
        pilot.apply(OperatorCommand::StartMission).unwrap();
        pilot.on_position(PositionSample::new(0.00005, 0.0));
        commands.try_recv().unwrap();

        let status = pilot.apply(OperatorCommand::ClearMission).unwrap();
        assert_eq!(status.phase, FlightPhase::Armed);
        assert!(pilot.on_position(PositionSample::new(0.00004, 0.0)).is_none());
        assert!(*mode.borrow());
        assert_eq!(commands.try_recv(), Err(TryRecvError::Empty));
    }

    #[test]
    fn single_tap_after_clear_is_not_flown() {
        let (mut pilot, mut commands, _) = pilot();
        pilot.apply(OperatorCommand::LoadMission(square_mission())).unwrap();
        pilot.apply(OperatorCommand::EnableVirtualStick).unwrap();
        pilot.apply(OperatorCommand::StartMission).unwrap();

        pilot.apply(OperatorCommand::ClearMission).unwrap();
        let status = pilot
            .apply(OperatorCommand::AddWaypoint(Coordinate::new(0.001, 0.001)))
            .unwrap();
        assert_eq!(status.phase, FlightPhase::Armed);
        assert_eq!(status.waypoint_count, 1);

        assert!(pilot.on_position(PositionSample::new(0.0, 0.0)).is_none());
        assert_eq!(commands.try_recv(), Err(TryRecvError::Empty));
        assert!(pilot.apply(OperatorCommand::StartMission).is_err());
    }

    #[test]
    fn loading_short_mission_while_running_stops_flying() {
        let (mut pilot, mut commands, _) = pilot();
        pilot.apply(OperatorCommand::LoadMission(square_mission())).unwrap();
        pilot.apply(OperatorCommand::EnableVirtualStick).unwrap();
        pilot.apply(OperatorCommand::StartMission).unwrap();

        let status = pilot
            .apply(OperatorCommand::LoadMission(vec![Waypoint::new(0.001, 0.0, 20.0)]))
            .unwrap();
        assert_eq!(status.phase, FlightPhase::Armed);
        assert!(pilot.on_position(PositionSample::new(0.0, 0.0)).is_none());
        assert_eq!(commands.try_recv(), Err(TryRecvError::Empty));
    }

    #[test]
    fn reloading_flyable_mission_keeps_running() {
        let (mut pilot, _, _) = pilot();
        pilot.apply(OperatorCommand::LoadMission(square_mission())).unwrap();
        pilot.apply(OperatorCommand::EnableVirtualStick).unwrap();
        pilot.apply(OperatorCommand::StartMission).unwrap();

        let status = pilot
            .apply(OperatorCommand::LoadMission(square_mission()))
            .unwrap();
        assert_eq!(status.phase, FlightPhase::Running);
    }

    #[test]
    fn altitude_must_be_positive_and_finite() {
        let (mut pilot, _, _) = pilot();
        for bad in [f64::NAN, f64::INFINITY, 0.0, -5.0] {
            assert!(matches!(
                pilot.apply(OperatorCommand::SetAltitude(bad)),
                Err(PilotError::InvalidAltitude(_))
            ));
        }
        pilot.apply(OperatorCommand::SetAltitude(35.0)).unwrap();
        assert_eq!(pilot.mission().altitude_m(), 35.0);
    }

    #[test]
    fn feed_loss_returns_to_idle() {
        let (mut pilot, _, mode) = pilot();
        pilot.apply(OperatorCommand::LoadMission(square_mission())).unwrap();
        pilot.apply(OperatorCommand::EnableVirtualStick).unwrap();
        pilot.apply(OperatorCommand::StartMission).unwrap();

        pilot.on_feed_lost();
        assert_eq!(pilot.phase(), FlightPhase::Idle);
        assert!(!*mode.borrow());
    }

    #[test]
    fn restart_after_completion_rewinds() {
        let (mut pilot, _, _) = pilot();
        pilot.apply(OperatorCommand::LoadMission(square_mission())).unwrap();
        pilot.apply(OperatorCommand::EnableVirtualStick).unwrap();
        pilot.apply(OperatorCommand::StartMission).unwrap();
        pilot.on_position(PositionSample::new(0.0, 0.0));
        pilot.on_position(PositionSample::new(0.0, 0.0001));
        assert!(pilot.mission().is_complete());

        pilot.apply(OperatorCommand::EnableVirtualStick).unwrap();
        let status = pilot.apply(OperatorCommand::StartMission).unwrap();
        assert_eq!(status.phase, FlightPhase::Running);
        assert_eq!(status.cursor, 0);
    }

    #[test]
    fn invalid_tap_is_rejected() {
        let (mut pilot, _, _) = pilot();
        let err = pilot
            .apply(OperatorCommand::AddWaypoint(Coordinate::new(95.0, 0.0)))
            .unwrap_err();
        assert!(matches!(
            err,
            PilotError::Mission(MissionError::InvalidWaypoint { .. })
        ));
        assert!(pilot.mission().is_empty());
    }

    #[test]
    fn degenerate_bearing_is_logged_at_debug() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let (mut pilot, _, _) = pilot();
            pilot.apply(OperatorCommand::LoadMission(square_mission())).unwrap();
            pilot.apply(OperatorCommand::EnableVirtualStick).unwrap();
            pilot.apply(OperatorCommand::StartMission).unwrap();
            // Due south of the first waypoint: longitude delta is exactly zero.
            pilot.on_position(PositionSample::new(-0.00005, 0.0)).unwrap();
        });

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        let line = output
            .lines()
            .find(|l| l.contains("yaw saturated"))
            .expect("degenerate bearing not logged");
        assert!(line.contains("DEBUG"));
    }
}
