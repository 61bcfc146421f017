//! Ingestion task: drains the event source into the command state.

use super::source::{EventSource, SourceError, SourcePoll};
use super::RawInputEvent;
use crate::command::{CommandWriter, PowerButtonMapper, PowerRequest};
use crate::profile::DeviceProfile;
use chrono::Local;
use statum::{machine, state};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Idle wait between polls, balancing input latency against CPU.
const IDLE_WAIT: Duration = Duration::from_micros(500);

#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    #[error("event source failed: {0}")]
    Source(#[from] SourceError),

    #[error("collector task panicked: {0}")]
    Task(String),
}

// Collector lifecycle states
#[state]
#[derive(Debug, Clone)]
pub enum IngestState {
    Initializing,
    Ingesting,
}

#[machine]
pub struct EventCollector<S: IngestState> {
    // Raw event source (device adapter or scripted replay)
    source: Box<dyn EventSource>,

    // Active device profile, selected at startup
    profile: DeviceProfile,

    // Writer half of the shared command cell
    commands: CommandWriter,

    // Edge-triggered power button mapping
    power_mapper: PowerButtonMapper,

    // Power requests towards the publisher task
    power_tx: mpsc::Sender<PowerRequest>,
}

impl EventCollector<Initializing> {
    pub fn create(
        source: Box<dyn EventSource>,
        profile: DeviceProfile,
        commands: CommandWriter,
        power_mapper: PowerButtonMapper,
        power_tx: mpsc::Sender<PowerRequest>,
    ) -> Self {
        debug!("Creating event collector for profile {}", profile.name());
        Self::new(source, profile, commands, power_mapper, power_tx)
    }

    pub fn initialize(self) -> EventCollector<Ingesting> {
        info!(
            "Event collector initialized with profile {}, transitioning to Ingesting state",
            self.profile.name()
        );
        self.transition()
    }
}

impl EventCollector<Ingesting> {
    // Route a single raw event to the command cell or the power mapper.
    fn handle_event(&mut self, event: RawInputEvent) {
        match event {
            RawInputEvent::Axis { axis, value, .. } => {
                match self.profile.normalize(axis, value) {
                    Some(update) => {
                        debug!("Axis {} -> {} {:.2}", axis, update.channel, update.value);
                        self.commands.apply(update);
                    }
                    // Not a fault: the profile simply does not map this axis.
                    None => debug!("Ignoring unmapped axis {} (value {})", axis, value),
                }
            }
            RawInputEvent::Button {
                button,
                pressed,
                timestamp,
            } => {
                info!(
                    "Button {} {} at {}",
                    button,
                    if pressed { "pressed" } else { "released" },
                    timestamp.format("%H:%M:%S.%3f")
                );
                if let Some(request) = self.power_mapper.handle_button(button, pressed) {
                    if let Err(e) = self.power_tx.try_send(request) {
                        warn!("Failed to forward power request: {}", e);
                    }
                }
            }
        }
    }

    /// Polls the source until cancelled or the source fails fatally.
    pub async fn run_ingest_loop(
        &mut self,
        cancel: CancellationToken,
    ) -> Result<(), CollectorError> {
        info!("Starting ingest loop");

        // For performance monitoring
        let mut event_count = 0u64;
        let mut last_log_time = Local::now();
        let log_interval = chrono::Duration::seconds(10);

        loop {
            match self.source.poll_event() {
                Ok(SourcePoll::Event(event)) => {
                    event_count += 1;
                    self.handle_event(event);
                    if cancel.is_cancelled() {
                        info!("Ingest loop cancelled");
                        return Ok(());
                    }
                }
                Ok(SourcePoll::Idle) => {
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            info!("Ingest loop cancelled");
                            return Ok(());
                        }
                        _ = tokio::time::sleep(IDLE_WAIT) => {}
                    }
                }
                Err(e) => {
                    error!("Event source failed: {}", e);
                    return Err(CollectorError::Source(e));
                }
            }

            let now = Local::now();
            if now - last_log_time > log_interval {
                info!(
                    "Ingest stats: {} events in the last {} seconds",
                    event_count,
                    log_interval.num_seconds()
                );
                event_count = 0;
                last_log_time = now;
            }
        }
    }
}

/// Handle for the ingestion task.
pub struct CollectorHandle {
    task_handle: JoinHandle<Result<(), CollectorError>>,
}

impl CollectorHandle {
    /// Spawns the collector as a tokio task.
    pub fn spawn(
        source: Box<dyn EventSource>,
        profile: DeviceProfile,
        commands: CommandWriter,
        power_mapper: PowerButtonMapper,
        power_tx: mpsc::Sender<PowerRequest>,
        cancel: CancellationToken,
    ) -> Self {
        info!("Spawning event collector task");

        let collector = EventCollector::create(source, profile, commands, power_mapper, power_tx);
        let task_handle = tokio::spawn(async move {
            let mut ingesting = collector.initialize();
            let result = ingesting.run_ingest_loop(cancel).await;
            if let Err(ref e) = result {
                error!("Collector task terminated with error: {}", e);
            }
            result
        });

        Self { task_handle }
    }

    /// Waits for the ingest task to end and returns its outcome.
    ///
    /// Must be awaited to completion at most once; the pipeline caches the
    /// result after the first successful join.
    pub async fn join(&mut self) -> Result<(), CollectorError> {
        match (&mut self.task_handle).await {
            Ok(result) => result,
            Err(e) => Err(CollectorError::Task(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::command_cell;
    use crate::input::source::testing::ScriptedSource;
    use std::collections::HashSet;

    fn axis(axis: u16, value: i32) -> RawInputEvent {
        RawInputEvent::Axis {
            axis,
            value,
            timestamp: Local::now(),
        }
    }

    fn button(button: u16, pressed: bool) -> RawInputEvent {
        RawInputEvent::Button {
            button,
            pressed,
            timestamp: Local::now(),
        }
    }

    fn default_mapper() -> PowerButtonMapper {
        PowerButtonMapper::new(HashSet::from([23]), HashSet::from([21, 22]))
    }

    #[tokio::test(start_paused = true)]
    async fn axis_events_update_the_command_cell() {
        let (writer, state_rx) = command_cell();
        let (power_tx, _power_rx) = mpsc::channel(4);
        let source = ScriptedSource::new(vec![axis(0, 32_767), axis(1, 255)]);
        let cancel = CancellationToken::new();

        let mut handle = CollectorHandle::spawn(
            Box::new(source),
            DeviceProfile::f310(),
            writer,
            default_mapper(),
            power_tx,
            cancel.clone(),
        );

        tokio::time::sleep(Duration::from_millis(5)).await;
        cancel.cancel();
        handle.join().await.unwrap();

        let state = *state_rx.borrow();
        assert!((state.steering_deg - 90.0).abs() < 0.01);
        assert!((state.signed_power - 100.0).abs() < 0.01);
    }

    #[tokio::test(start_paused = true)]
    async fn power_button_edges_reach_the_request_channel_once() {
        let (writer, _state_rx) = command_cell();
        let (power_tx, mut power_rx) = mpsc::channel(4);
        // Two press edges without a release between them.
        let source = ScriptedSource::new(vec![button(23, true), button(23, true)]);
        let cancel = CancellationToken::new();

        let mut handle = CollectorHandle::spawn(
            Box::new(source),
            DeviceProfile::g29(),
            writer,
            default_mapper(),
            power_tx,
            cancel.clone(),
        );

        tokio::time::sleep(Duration::from_millis(5)).await;
        cancel.cancel();
        handle.join().await.unwrap();

        assert!(matches!(power_rx.try_recv(), Ok(PowerRequest::On)));
        assert!(power_rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn unmapped_axes_do_not_touch_the_command_cell() {
        let (writer, state_rx) = command_cell();
        let (power_tx, _power_rx) = mpsc::channel(4);
        let source = ScriptedSource::new(vec![axis(9, 12_345)]);
        let cancel = CancellationToken::new();

        let mut handle = CollectorHandle::spawn(
            Box::new(source),
            DeviceProfile::f310(),
            writer,
            default_mapper(),
            power_tx,
            cancel.clone(),
        );

        tokio::time::sleep(Duration::from_millis(5)).await;
        cancel.cancel();
        handle.join().await.unwrap();

        assert_eq!(*state_rx.borrow(), Default::default());
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_source_error_ends_the_task() {
        let (writer, _state_rx) = command_cell();
        let (power_tx, _power_rx) = mpsc::channel(4);
        let source = ScriptedSource::failing_after(
            vec![axis(0, 100)],
            SourceError::Read("simulated read failure".to_string()),
        );
        let cancel = CancellationToken::new();

        let mut handle = CollectorHandle::spawn(
            Box::new(source),
            DeviceProfile::f310(),
            writer,
            default_mapper(),
            power_tx,
            cancel,
        );

        let result = handle.join().await;
        assert!(matches!(result, Err(CollectorError::Source(_))));
    }
}
