//! Cloneable front end to a running pilot loop.

use dronepark_core::{Coordinate, PositionSample, Waypoint};
use tokio::sync::{mpsc, oneshot, watch};

use crate::pilot::{FlightPhase, OperatorCommand, PilotError, PilotEvent, PilotStatus};

/// Sends events to the pilot task and observes its status.
///
/// Telemetry adapters use [`PilotHandle::push_position`]; the operator side
/// uses the mission and mode methods, which wait for the loop to apply the
/// command and report the outcome.
#[derive(Clone)]
pub struct PilotHandle {
    events: mpsc::Sender<PilotEvent>,
    status: watch::Receiver<PilotStatus>,
}

impl PilotHandle {
    pub(crate) fn new(events: mpsc::Sender<PilotEvent>, status: watch::Receiver<PilotStatus>) -> Self {
        Self { events, status }
    }

    /// Queue a position sample behind any earlier events.
    pub async fn push_position(&self, sample: PositionSample) -> Result<(), PilotError> {
        self.events
            .send(PilotEvent::Position(sample))
            .await
            .map_err(|_| PilotError::ChannelClosed)
    }

    /// Report that the telemetry feed disconnected.
    pub async fn feed_lost(&self) -> Result<(), PilotError> {
        self.events
            .send(PilotEvent::FeedLost)
            .await
            .map_err(|_| PilotError::ChannelClosed)
    }

    /// Send an operator command and wait for the loop to apply it.
    pub async fn command(&self, command: OperatorCommand) -> Result<PilotStatus, PilotError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.events
            .send(PilotEvent::Operator {
                command,
                reply: Some(reply_tx),
            })
            .await
            .map_err(|_| PilotError::ChannelClosed)?;
        reply_rx.await.map_err(|_| PilotError::ChannelClosed)?
    }

    pub async fn add_waypoint(&self, coordinate: Coordinate) -> Result<PilotStatus, PilotError> {
        self.command(OperatorCommand::AddWaypoint(coordinate)).await
    }

    pub async fn load_mission(&self, waypoints: Vec<Waypoint>) -> Result<PilotStatus, PilotError> {
        self.command(OperatorCommand::LoadMission(waypoints)).await
    }

    pub async fn clear_mission(&self) -> Result<PilotStatus, PilotError> {
        self.command(OperatorCommand::ClearMission).await
    }

    pub async fn enable_virtual_stick(&self) -> Result<PilotStatus, PilotError> {
        self.command(OperatorCommand::EnableVirtualStick).await
    }

    pub async fn start_mission(&self) -> Result<PilotStatus, PilotError> {
        self.command(OperatorCommand::StartMission).await
    }

    pub async fn stop_mission(&self) -> Result<PilotStatus, PilotError> {
        self.command(OperatorCommand::StopMission).await
    }

    /// Latest published status.
    pub fn status(&self) -> PilotStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PilotStatus> {
        self.status.clone()
    }

    /// Wait until the loop reports `phase`.
    pub async fn wait_for_phase(&self, phase: FlightPhase) -> Result<PilotStatus, PilotError> {
        let mut status = self.status.clone();
        let snapshot = status
            .wait_for(|s| s.phase == phase)
            .await
            .map_err(|_| PilotError::ChannelClosed)?;
        Ok(snapshot.clone())
    }
}
