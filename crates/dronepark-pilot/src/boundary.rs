//! Seams to the vehicle link.
//!
//! The pilot never talks to a vendor SDK directly. It hands commands to a
//! [`CommandSink`] and toggles virtual-stick mode through [`ModeControl`].

use anyhow::{anyhow, Result};
use dronepark_core::FlightCommand;
use tokio::sync::{mpsc, watch};

/// Actuation channel. Fire-and-forget: no acknowledgement is expected.
pub trait CommandSink: Send {
    fn dispatch(&mut self, command: FlightCommand) -> Result<()>;
}

/// Enables or disables direct velocity actuation on the vehicle.
pub trait ModeControl: Send {
    fn set_virtual_stick(&mut self, enabled: bool) -> Result<()>;
}

impl CommandSink for mpsc::UnboundedSender<FlightCommand> {
    fn dispatch(&mut self, command: FlightCommand) -> Result<()> {
        self.send(command)
            .map_err(|_| anyhow!("command receiver dropped"))
    }
}

impl CommandSink for mpsc::Sender<FlightCommand> {
    fn dispatch(&mut self, command: FlightCommand) -> Result<()> {
        self.try_send(command).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => anyhow!("command channel full, command dropped"),
            mpsc::error::TrySendError::Closed(_) => anyhow!("command receiver dropped"),
        })
    }
}

impl ModeControl for watch::Sender<bool> {
    fn set_virtual_stick(&mut self, enabled: bool) -> Result<()> {
        self.send_replace(enabled);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounded_sink_reports_full_channel() {
        let (mut tx, _rx) = mpsc::channel::<FlightCommand>(1);
        assert!(tx.dispatch(FlightCommand::default()).is_ok());
        assert!(tx.dispatch(FlightCommand::default()).is_err());
    }

    #[test]
    fn unbounded_sink_fails_after_receiver_drop() {
        let (mut tx, rx) = mpsc::unbounded_channel::<FlightCommand>();
        drop(rx);
        assert!(tx.dispatch(FlightCommand::default()).is_err());
    }

    #[test]
    fn watch_mode_control_publishes_flag() {
        let (mut tx, rx) = watch::channel(false);
        tx.set_virtual_stick(true).unwrap();
        assert!(*rx.borrow());
    }
}
