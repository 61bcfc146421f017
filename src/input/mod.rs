//! Raw input subsystem: event types, the event-source seam, and ingestion.
//!
//! ```text
//! Device ──► EventSource ──► Collector ──► CommandState / PowerRequest
//!            (raw events)    (normalize)
//! ```
//!
//! The source trait is the boundary to the outside world: device discovery,
//! capability introspection and reconnection live on the far side of it.

pub mod collector;
pub mod evdev;
pub mod source;

pub use self::evdev::EvdevSource;
pub use collector::{CollectorError, CollectorHandle};
pub use source::{EventSource, SourceError, SourcePoll};

use chrono::{DateTime, Local};

/// One raw event as delivered by the device, consumed immediately.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawInputEvent {
    /// An absolute axis moved. `axis` is the semantic index assigned by the
    /// source (capability enumeration order), `value` the unscaled sample.
    Axis {
        axis: u16,
        value: i32,
        timestamp: DateTime<Local>,
    },

    /// A button changed state. Sources deliver edges, not level samples.
    Button {
        button: u16,
        pressed: bool,
        timestamp: DateTime<Local>,
    },
}
