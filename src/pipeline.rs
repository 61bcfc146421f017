//! Pipeline wiring and lifecycle.
//!
//! Connects the two tasks of the system and owns their shutdown ordering:
//!
//! ```text
//! EventSource ──► Collector ──► CommandState ──► Publisher ──► Backend
//!                     │              (watch)         ▲
//!                     └── PowerRequest (mpsc) ───────┘
//! ```
//!
//! Cancellation fans out through a shared token. The publisher task forces
//! `turn_off` on the backend before it ends, so whichever path initiates
//! shutdown (signal, fatal source error, caller) the backend never outlives
//! the pipeline powered on.
//!
//! # Examples
//!
//! ```rust,no_run
//! use openwheel::backend::LoggingBackend;
//! use openwheel::command::{PowerButtonMapper, PublisherSettings};
//! use openwheel::input::EvdevSource;
//! use openwheel::pipeline::Pipeline;
//! use openwheel::profile::DeviceProfile;
//! use std::collections::HashSet;
//! use std::path::Path;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let source = EvdevSource::open(Path::new("/dev/input/event0"))?;
//! let mut pipeline = Pipeline::spawn(
//!     Box::new(source),
//!     DeviceProfile::g29(),
//!     Box::new(LoggingBackend::new()),
//!     PublisherSettings::default(),
//!     PowerButtonMapper::new(HashSet::from([23]), HashSet::from([21, 22])),
//! );
//!
//! tokio::signal::ctrl_c().await?;
//! pipeline.shutdown().await?;
//! # Ok(())
//! # }
//! ```

use crate::backend::VehicleBackend;
use crate::command::{command_cell, CommandPublisher, PowerButtonMapper, PublisherSettings};
use crate::input::{CollectorError, CollectorHandle, EventSource};
use crate::profile::DeviceProfile;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Buffered power requests between the ingest and publisher tasks.
const POWER_REQUEST_BUFFER: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("ingestion failed: {0}")]
    Collector(#[from] CollectorError),

    #[error("publisher task panicked: {0}")]
    Task(String),
}

/// Handle for the running pipeline.
pub struct Pipeline {
    cancel: CancellationToken,
    collector: CollectorHandle,
    collector_result: Option<Result<(), CollectorError>>,
    publisher_task: JoinHandle<()>,
}

impl Pipeline {
    /// Spawns the collector and publisher tasks around a fresh command cell.
    pub fn spawn(
        source: Box<dyn EventSource>,
        profile: DeviceProfile,
        backend: Box<dyn VehicleBackend>,
        settings: PublisherSettings,
        power_mapper: PowerButtonMapper,
    ) -> Self {
        info!("Starting pipeline with profile {}", profile.name());

        let cancel = CancellationToken::new();
        let (commands, state_rx) = command_cell();
        let (power_tx, power_rx) = mpsc::channel(POWER_REQUEST_BUFFER);

        let collector = CollectorHandle::spawn(
            source,
            profile,
            commands,
            power_mapper,
            power_tx,
            cancel.clone(),
        );

        let publisher = CommandPublisher::new(state_rx, backend, settings);
        let publisher_task = tokio::spawn(publisher.run(power_rx, cancel.clone()));

        Self {
            cancel,
            collector,
            collector_result: None,
            publisher_task,
        }
    }

    /// Completes when the ingestion task ends, normally or fatally.
    ///
    /// The outcome is cached and surfaced later by [`shutdown`](Self::shutdown).
    pub async fn ingest_finished(&mut self) {
        let result = self.collector.join().await;
        if let Err(ref e) = result {
            error!("Ingestion ended with error: {}", e);
        }
        self.collector_result = Some(result);
    }

    /// Cancels both tasks, waits for them, and reports the first failure.
    ///
    /// The publisher turns the backend off before its task ends, so after
    /// this returns no backend resource is still alive.
    pub async fn shutdown(mut self) -> Result<(), PipelineError> {
        info!("Shutting down pipeline");
        self.cancel.cancel();

        let publisher_result = self.publisher_task.await;

        let collector_result = match self.collector_result.take() {
            Some(result) => result,
            None => self.collector.join().await,
        };

        if let Err(e) = publisher_result {
            error!("Publisher task panicked: {}", e);
            return Err(PipelineError::Task(e.to_string()));
        }
        collector_result?;

        info!("Pipeline stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendCall, LoggingBackend};
    use crate::input::source::testing::ScriptedSource;
    use crate::input::{RawInputEvent, SourceError};
    use chrono::Local;
    use std::collections::HashSet;
    use std::time::Duration;

    fn default_mapper() -> PowerButtonMapper {
        PowerButtonMapper::new(HashSet::from([23]), HashSet::from([21, 22]))
    }

    #[tokio::test(start_paused = true)]
    async fn events_flow_from_source_to_backend() {
        let source = ScriptedSource::new(vec![
            RawInputEvent::Button {
                button: 23,
                pressed: true,
                timestamp: Local::now(),
            },
            RawInputEvent::Axis {
                axis: 0,
                value: 32_767,
                timestamp: Local::now(),
            },
        ]);
        let backend = LoggingBackend::new();
        let log = backend.call_log();

        let pipeline = Pipeline::spawn(
            Box::new(source),
            DeviceProfile::f310(),
            Box::new(backend),
            PublisherSettings { publish_rate_hz: 10 },
            default_mapper(),
        );

        tokio::time::sleep(Duration::from_millis(250)).await;
        pipeline.shutdown().await.unwrap();

        let calls = log.snapshot();
        assert!(calls.contains(&BackendCall::TurnOn));
        let steering_count = calls
            .iter()
            .filter(|call| matches!(call, BackendCall::Steering(_)))
            .count();
        assert_eq!(steering_count, 2);
        assert_eq!(calls.last(), Some(&BackendCall::TurnOff));
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_source_error_surfaces_after_shutdown() {
        let source = ScriptedSource::failing_after(
            Vec::new(),
            SourceError::Disconnected("device unplugged".to_string()),
        );
        let backend = LoggingBackend::new();
        let log = backend.call_log();

        let mut pipeline = Pipeline::spawn(
            Box::new(source),
            DeviceProfile::g29(),
            Box::new(backend),
            PublisherSettings { publish_rate_hz: 10 },
            default_mapper(),
        );

        pipeline.ingest_finished().await;
        let result = pipeline.shutdown().await;

        assert!(matches!(result, Err(PipelineError::Collector(_))));
        // Even a fatal ingest path leaves the backend off.
        assert_eq!(log.snapshot().last(), Some(&BackendCall::TurnOff));
    }

    #[tokio::test(start_paused = true)]
    async fn operator_power_off_reaches_the_backend() {
        let source = ScriptedSource::new(vec![
            RawInputEvent::Button {
                button: 23,
                pressed: true,
                timestamp: Local::now(),
            },
            RawInputEvent::Button {
                button: 23,
                pressed: false,
                timestamp: Local::now(),
            },
            RawInputEvent::Button {
                button: 21,
                pressed: true,
                timestamp: Local::now(),
            },
        ]);
        let backend = LoggingBackend::new();
        let log = backend.call_log();

        let pipeline = Pipeline::spawn(
            Box::new(source),
            DeviceProfile::g29(),
            Box::new(backend),
            PublisherSettings { publish_rate_hz: 10 },
            default_mapper(),
        );

        tokio::time::sleep(Duration::from_millis(50)).await;
        pipeline.shutdown().await.unwrap();

        let power_events: Vec<BackendCall> = log
            .snapshot()
            .into_iter()
            .filter(|call| matches!(call, BackendCall::TurnOn | BackendCall::TurnOff))
            .collect();
        assert_eq!(
            power_events,
            vec![
                BackendCall::TurnOn,
                BackendCall::TurnOff,
                BackendCall::TurnOff,
            ]
        );
    }
}
