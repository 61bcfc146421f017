//! Event-source contract consumed by the ingestion task.

use super::RawInputEvent;

/// Outcome of one non-blocking poll of an event source.
///
/// Together with the `Err` arm of [`EventSource::poll_event`] this is the
/// three-way classification driving the ingestion loop: data ready, would
/// block, fatal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SourcePoll {
    /// An event is available.
    Event(RawInputEvent),

    /// Nothing pending right now; the caller may idle before polling again.
    Idle,
}

/// Fatal source failures. The core does not reconnect: any of these ends
/// the ingestion task and is surfaced to the caller.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("failed to open input device: {0}")]
    Open(String),

    #[error("device read failed: {0}")]
    Read(String),

    #[error("device disconnected: {0}")]
    Disconnected(String),
}

/// A stream of raw device events.
///
/// Implementations must not block in `poll_event`; a source with nothing to
/// deliver returns [`SourcePoll::Idle`] and lets the caller decide how to
/// wait.
pub trait EventSource: Send {
    fn poll_event(&mut self) -> Result<SourcePoll, SourceError>;
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::VecDeque;

    /// Plays back a fixed event sequence, then idles (or fails once).
    pub struct ScriptedSource {
        events: VecDeque<RawInputEvent>,
        final_error: Option<SourceError>,
    }

    impl ScriptedSource {
        pub fn new(events: Vec<RawInputEvent>) -> Self {
            Self {
                events: events.into(),
                final_error: None,
            }
        }

        pub fn failing_after(events: Vec<RawInputEvent>, error: SourceError) -> Self {
            Self {
                events: events.into(),
                final_error: Some(error),
            }
        }
    }

    impl EventSource for ScriptedSource {
        fn poll_event(&mut self) -> Result<SourcePoll, SourceError> {
            if let Some(event) = self.events.pop_front() {
                return Ok(SourcePoll::Event(event));
            }
            match self.final_error.take() {
                Some(error) => Err(error),
                None => Ok(SourcePoll::Idle),
            }
        }
    }
}
