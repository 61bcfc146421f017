//! Edge-triggered mapping from button indices to backend power requests.

use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Power transition requested by the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerRequest {
    On,
    Off,
}

/// Maps press edges on configured button indices to [`PowerRequest`]s.
///
/// Only press edges act; releases and unbound indices are ignored. A press
/// edge for a button already recorded as pressed is suppressed, so a source
/// that repeats edges without an intervening release still yields exactly
/// one request per physical press.
pub struct PowerButtonMapper {
    on_buttons: HashSet<u16>,
    off_buttons: HashSet<u16>,
    pressed: HashMap<u16, bool>,
}

impl PowerButtonMapper {
    pub fn new(on_buttons: HashSet<u16>, off_buttons: HashSet<u16>) -> Self {
        Self {
            on_buttons,
            off_buttons,
            pressed: HashMap::new(),
        }
    }

    pub fn handle_button(&mut self, button: u16, pressed: bool) -> Option<PowerRequest> {
        let request = if self.on_buttons.contains(&button) {
            PowerRequest::On
        } else if self.off_buttons.contains(&button) {
            PowerRequest::Off
        } else {
            return None;
        };

        if !pressed {
            self.pressed.insert(button, false);
            return None;
        }
        if self.pressed.get(&button).copied().unwrap_or(false) {
            debug!("Suppressing repeated press edge for button {}", button);
            return None;
        }
        self.pressed.insert(button, true);
        Some(request)
    }
}
