//! Rate-limited command publisher.
//!
//! Snapshots the command cell at a fixed cadence and dispatches backend
//! calls, tracking the last *dispatched* power direction so a throttle/brake
//! reversal always passes through an explicit zeroing command.
//!
//! # Power phases
//!
//! ```text
//!             throttle(p)                    braking(p)
//!          ┌─────────────► ACCELERATING ◄──┐
//!          │                    │          │
//!       NEUTRAL ◄── throttle(0) ┘          │
//!          │ ▲                             │
//!          │ └── braking(0) ── BRAKING ◄───┘
//! ```
//!
//! A sign crossing dispatches only the zeroing call for the previous channel
//! in that tick; the new direction resumes on a later tick. The backend
//! therefore never sees accelerate and brake commands without a neutral
//! frame between them.

use super::{CommandState, PowerRequest};
use crate::backend::VehicleBackend;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Last dispatched power direction, independent of the momentary sign of
/// the raw value in the command cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PowerPhase {
    #[default]
    Neutral,
    Accelerating,
    Braking,
}

#[derive(Debug, Clone)]
pub struct PublisherSettings {
    /// Publish cadence in Hz.
    pub publish_rate_hz: u32,
}

impl Default for PublisherSettings {
    fn default() -> Self {
        Self { publish_rate_hz: 30 }
    }
}

impl PublisherSettings {
    pub fn period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.publish_rate_hz))
    }
}

/// Owns the backend and performs all calls on it.
///
/// Power requests from the button mapper are serviced by the same task loop
/// as the publish ticks, so no two backend calls are ever in flight at once.
pub struct CommandPublisher {
    state_rx: watch::Receiver<CommandState>,
    backend: Box<dyn VehicleBackend>,
    settings: PublisherSettings,
    phase: PowerPhase,
}

impl CommandPublisher {
    pub fn new(
        state_rx: watch::Receiver<CommandState>,
        backend: Box<dyn VehicleBackend>,
        settings: PublisherSettings,
    ) -> Self {
        Self {
            state_rx,
            backend,
            settings,
            phase: PowerPhase::Neutral,
        }
    }

    /// Dispatches one tick's worth of backend calls.
    ///
    /// Steering goes out every tick, changed or not. The power dispatch
    /// follows the phase machine above.
    pub async fn publish_tick(&mut self) {
        let snapshot = *self.state_rx.borrow();

        self.backend.steering(snapshot.steering_deg).await;

        let power = snapshot.signed_power;
        if power == 0.0 {
            match self.phase {
                PowerPhase::Neutral => {}
                PowerPhase::Accelerating => {
                    self.backend.throttle(0.0).await;
                    self.phase = PowerPhase::Neutral;
                }
                PowerPhase::Braking => {
                    self.backend.braking(0.0).await;
                    self.phase = PowerPhase::Neutral;
                }
            }
        } else if power > 0.0 {
            match self.phase {
                // Sign crossing: only the old channel is zeroed this tick.
                PowerPhase::Braking => {
                    debug!("Power sign crossed to throttle, inserting neutral frame");
                    self.backend.braking(0.0).await;
                    self.phase = PowerPhase::Neutral;
                }
                _ => {
                    self.backend.throttle(power).await;
                    self.phase = PowerPhase::Accelerating;
                }
            }
        } else {
            match self.phase {
                PowerPhase::Accelerating => {
                    debug!("Power sign crossed to brake, inserting neutral frame");
                    self.backend.throttle(0.0).await;
                    self.phase = PowerPhase::Neutral;
                }
                _ => {
                    self.backend.braking(-power).await;
                    self.phase = PowerPhase::Braking;
                }
            }
        }
    }

    async fn service_power_request(&mut self, request: PowerRequest) {
        match request {
            PowerRequest::On => {
                // Power-on failures are surfaced once, never retried here.
                if let Err(e) = self.backend.turn_on().await {
                    warn!("Backend power-on failed: {}", e);
                }
            }
            PowerRequest::Off => self.backend.turn_off().await,
        }
    }

    /// Runs until cancelled, then forces the backend off before returning.
    ///
    /// The first tick fires one period after startup; late ticks are
    /// absorbed, never replayed in a burst.
    pub async fn run(
        mut self,
        mut power_rx: mpsc::Receiver<PowerRequest>,
        cancel: CancellationToken,
    ) {
        let period = self.settings.period();
        info!(
            "Publishing commands at {} Hz (every {:?})",
            self.settings.publish_rate_hz, period
        );

        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => self.publish_tick().await,
                Some(request) = power_rx.recv() => self.service_power_request(request).await,
            }
        }

        // The backend must not outlive the pipeline powered on, no matter
        // which task initiated the shutdown.
        self.backend.turn_off().await;
        info!("Publisher stopped");
    }
}
