//! Command state and dispatch.
//!
//! The normalizer (on the ingestion task) folds channel updates into a
//! [`CommandState`] cell; the publisher (on the timer task) snapshots it at
//! a fixed cadence and turns it into backend calls.
//!
//! ```text
//! ChannelUpdate ──► CommandWriter ──► watch cell ──► CommandPublisher ──► Backend
//!                   (ingest task)                    (timer task)
//! ```

pub mod power;
pub mod publisher;

pub use power::{PowerButtonMapper, PowerRequest};
pub use publisher::{CommandPublisher, PowerPhase, PublisherSettings};

use crate::profile::{Channel, ChannelUpdate};
use tokio::sync::watch;

/// Latest normalized command values.
///
/// `signed_power` folds throttle and brake into one signed cell: positive is
/// throttle percentage, negative is brake percentage magnitude, zero is
/// neutral. Steering is in degrees, already clamped by the profile.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CommandState {
    pub steering_deg: f32,
    pub signed_power: f32,
}

/// Creates the shared command cell and its single writer.
pub fn command_cell() -> (CommandWriter, watch::Receiver<CommandState>) {
    let (tx, rx) = watch::channel(CommandState::default());
    (
        CommandWriter {
            tx,
            current: CommandState::default(),
        },
        rx,
    )
}

/// Sole writer of the command cell.
///
/// Updates replace the whole snapshot through the watch channel, so the
/// reader can never observe a torn state.
pub struct CommandWriter {
    tx: watch::Sender<CommandState>,
    current: CommandState,
}

impl CommandWriter {
    /// Folds one channel update into the shared state.
    ///
    /// Throttle and brake both land in `signed_power`; the last update wins,
    /// whichever pedal (or combined-axis side) produced it.
    pub fn apply(&mut self, update: ChannelUpdate) {
        match update.channel {
            Channel::Steering => self.current.steering_deg = update.value,
            Channel::Throttle => self.current.signed_power = update.value,
            Channel::Brake => self.current.signed_power = -update.value,
        }
        self.tx.send_replace(self.current);
    }
}
