//! Diagnostic backend: records every call, actuates nothing.

use super::{BackendError, PowerState, VehicleBackend};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// One observed backend invocation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BackendCall {
    Steering(f32),
    Throttle(f32),
    Braking(f32),
    TurnOn,
    TurnOff,
}

/// Shared record of every call a [`LoggingBackend`] received, in order.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<BackendCall>>>,
}

impl CallLog {
    fn record(&self, call: BackendCall) {
        self.calls.lock().expect("call log mutex poisoned").push(call);
    }

    pub fn snapshot(&self) -> Vec<BackendCall> {
        self.calls.lock().expect("call log mutex poisoned").clone()
    }
}

/// Backend that logs and records commands instead of actuating.
///
/// `turn_on` starts a trivial heartbeat task so the lifecycle contract is
/// exercised end to end; `turn_off` signals it and joins it before
/// returning.
pub struct LoggingBackend {
    power: PowerState,
    log: CallLog,
    heartbeat_interval: Duration,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task_handle: Option<JoinHandle<()>>,
}

impl LoggingBackend {
    pub fn new() -> Self {
        Self::with_heartbeat_interval(Duration::from_secs(1))
    }

    pub fn with_heartbeat_interval(heartbeat_interval: Duration) -> Self {
        Self {
            power: PowerState::Off,
            log: CallLog::default(),
            heartbeat_interval,
            shutdown_tx: None,
            task_handle: None,
        }
    }

    /// Handle onto the recorded calls, shared with this backend.
    pub fn call_log(&self) -> CallLog {
        self.log.clone()
    }
}

impl Default for LoggingBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VehicleBackend for LoggingBackend {
    async fn steering(&mut self, angle_deg: f32) {
        self.log.record(BackendCall::Steering(angle_deg));
        debug!("steering {:.2} deg", angle_deg);
    }

    async fn throttle(&mut self, percentage: f32) {
        self.log.record(BackendCall::Throttle(percentage));
        debug!("throttle {:.1} %", percentage);
    }

    async fn braking(&mut self, percentage: f32) {
        self.log.record(BackendCall::Braking(percentage));
        debug!("braking {:.1} %", percentage);
    }

    async fn turn_on(&mut self) -> Result<(), BackendError> {
        self.log.record(BackendCall::TurnOn);

        if self.power == PowerState::On {
            debug!("turn_on ignored, backend already on");
            return Ok(());
        }

        let heartbeat_interval = self.heartbeat_interval;
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        let task_handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(heartbeat_interval);
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = ticker.tick() => debug!("backend heartbeat"),
                }
            }
        });

        self.shutdown_tx = Some(shutdown_tx);
        self.task_handle = Some(task_handle);
        self.power = PowerState::On;
        info!("Logging backend powered on");
        Ok(())
    }

    async fn turn_off(&mut self) {
        self.log.record(BackendCall::TurnOff);

        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            if shutdown_tx.send(()).is_err() {
                warn!("Heartbeat task already terminated");
            }
        }
        if let Some(task_handle) = self.task_handle.take() {
            // Best effort: a panicked heartbeat must not block shutdown.
            if let Err(e) = task_handle.await {
                warn!("Heartbeat task panicked: {}", e);
            }
        }

        if self.power == PowerState::On {
            info!("Logging backend powered off");
        } else {
            debug!("turn_off on an already-off backend");
        }
        self.power = PowerState::Off;
    }

    fn power_state(&self) -> PowerState {
        self.power
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn turn_on_is_idempotent() {
        let mut backend = LoggingBackend::with_heartbeat_interval(Duration::from_millis(5));

        backend.turn_on().await.unwrap();
        backend.turn_on().await.unwrap();
        assert_eq!(backend.power_state(), PowerState::On);

        backend.turn_off().await;
    }

    #[tokio::test]
    async fn turn_off_joins_the_heartbeat_task() {
        let mut backend = LoggingBackend::with_heartbeat_interval(Duration::from_millis(5));

        backend.turn_on().await.unwrap();
        assert!(backend.task_handle.is_some());

        backend.turn_off().await;
        assert!(backend.task_handle.is_none());
        assert!(backend.shutdown_tx.is_none());
        assert_eq!(backend.power_state(), PowerState::Off);
    }

    #[tokio::test]
    async fn turn_off_twice_matches_turn_off_once() {
        let mut backend = LoggingBackend::with_heartbeat_interval(Duration::from_millis(5));

        backend.turn_on().await.unwrap();
        backend.turn_off().await;
        backend.turn_off().await;

        assert_eq!(backend.power_state(), PowerState::Off);
        assert!(backend.task_handle.is_none());
    }

    #[tokio::test]
    async fn every_call_is_recorded_in_order() {
        let mut backend = LoggingBackend::new();
        let log = backend.call_log();

        backend.steering(-12.5).await;
        backend.throttle(40.0).await;
        backend.braking(0.0).await;

        assert_eq!(
            log.snapshot(),
            vec![
                BackendCall::Steering(-12.5),
                BackendCall::Throttle(40.0),
                BackendCall::Braking(0.0),
            ]
        );
    }
}
