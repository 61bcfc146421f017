//! Vehicle control backend contract.
//!
//! The publisher and the power-button mapper talk to actuation hardware
//! exclusively through [`VehicleBackend`]. Real vehicle-bus backends live
//! outside this crate; the diagnostic [`LoggingBackend`] ships here so the
//! whole pipeline can run (and be tested) without hardware.

pub mod logging;

pub use logging::{BackendCall, CallLog, LoggingBackend};

use async_trait::async_trait;

/// Power state owned by each backend instance.
///
/// Mutated only by [`VehicleBackend::turn_on`] and
/// [`VehicleBackend::turn_off`]; backends are constructed off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PowerState {
    #[default]
    Off,
    On,
}

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("backend power-on failed: {0}")]
    PowerOn(String),
}

/// Actuation and lifecycle capability set of a control backend.
///
/// Actuation values arrive pre-clamped by the device profile; backends may
/// treat out-of-range input as a caller bug and are not required to
/// re-validate.
///
/// Callers must keep calls on a single backend serialized, force
/// [`turn_off`](Self::turn_off) before dropping an instance, and may call
/// both lifecycle methods any number of times.
#[async_trait]
pub trait VehicleBackend: Send {
    /// Commands the steering angle in degrees, negative = left.
    async fn steering(&mut self, angle_deg: f32);

    /// Commands throttle as a percentage in [0, 100].
    async fn throttle(&mut self, percentage: f32);

    /// Commands braking as a percentage in [0, 100].
    async fn braking(&mut self, percentage: f32);

    /// Brings the backend online.
    ///
    /// Idempotent: an already-on backend returns `Ok` without side effect.
    /// May start a background readiness/heartbeat task; anything started
    /// here must be torn down again by [`turn_off`](Self::turn_off).
    async fn turn_on(&mut self) -> Result<(), BackendError>;

    /// Takes the backend offline. Never fails and is idempotent.
    ///
    /// Must cancel and await termination of any background task started by
    /// [`turn_on`](Self::turn_on) before returning, so no backend resource
    /// outlives the call. Implementations that cannot guarantee clean
    /// termination degrade to best effort and still return, since shutdown
    /// must not be blockable by backend faults.
    async fn turn_off(&mut self);

    fn power_state(&self) -> PowerState;
}
