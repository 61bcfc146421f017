//! evdev-backed event source.
//!
//! Opens a single device node given by configuration; finding the right node
//! is the operator's (or an outer discovery layer's) job. Axis and button
//! codes are renumbered into semantic indices from the device's reported
//! capabilities, so profiles stay independent of hardware code blocks.

use super::source::{EventSource, SourceError, SourcePoll};
use super::RawInputEvent;
use chrono::Local;
use evdev::{AbsoluteAxisType, Device, EventType};
use std::collections::{HashMap, VecDeque};
use std::io;
use std::os::unix::io::AsRawFd;
use std::path::Path;
use tracing::{debug, info};

// First codes of the button blocks (linux input-event-codes.h).
const BTN_MISC: u16 = 0x100;
const BTN_JOYSTICK: u16 = 0x120;

pub struct EvdevSource {
    device: Device,
    /// Raw axis code -> semantic axis index, hats excluded.
    axis_index: HashMap<u16, u16>,
    /// Raw key code -> semantic button index.
    button_index: HashMap<u16, u16>,
    pending: VecDeque<RawInputEvent>,
}

impl EvdevSource {
    /// Opens the device node and switches it to non-blocking reads.
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let device = Device::open(path)
            .map_err(|e| SourceError::Open(format!("{}: {}", path.display(), e)))?;

        set_nonblocking(device.as_raw_fd())
            .map_err(|e| SourceError::Open(format!("{}: {}", path.display(), e)))?;

        let axis_index = index_axes(&device);
        let button_index = index_buttons(&device);

        info!(
            "Opened input device {:?} at {} ({} axes, {} buttons)",
            device.name().unwrap_or("unnamed"),
            path.display(),
            axis_index.len(),
            button_index.len()
        );

        Ok(Self {
            device,
            axis_index,
            button_index,
            pending: VecDeque::new(),
        })
    }
}

impl EventSource for EvdevSource {
    fn poll_event(&mut self) -> Result<SourcePoll, SourceError> {
        if let Some(event) = self.pending.pop_front() {
            return Ok(SourcePoll::Event(event));
        }

        match self.device.fetch_events() {
            Ok(events) => {
                for event in events {
                    if let Some(raw) = translate(&self.axis_index, &self.button_index, event) {
                        self.pending.push_back(raw);
                    }
                }
                match self.pending.pop_front() {
                    Some(event) => Ok(SourcePoll::Event(event)),
                    None => Ok(SourcePoll::Idle),
                }
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(SourcePoll::Idle),
            Err(e) if e.raw_os_error() == Some(libc::ENODEV) => {
                Err(SourceError::Disconnected(e.to_string()))
            }
            Err(e) => Err(SourceError::Read(e.to_string())),
        }
    }
}

fn set_nonblocking(fd: i32) -> io::Result<()> {
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    if unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Assigns semantic indices to the device's absolute axes in capability
/// order, skipping the hat block.
fn index_axes(device: &Device) -> HashMap<u16, u16> {
    let mut map = HashMap::new();
    let hat_codes = AbsoluteAxisType::ABS_HAT0X.0..=AbsoluteAxisType::ABS_HAT3Y.0;

    if let Some(axes) = device.supported_absolute_axes() {
        let mut next = 0u16;
        for axis in axes.iter() {
            if hat_codes.contains(&axis.0) {
                continue;
            }
            map.insert(axis.0, next);
            next += 1;
        }
    }
    map
}

/// Assigns semantic indices to the device's buttons: the joystick block
/// first, then the misc block, each in code order.
fn index_buttons(device: &Device) -> HashMap<u16, u16> {
    let mut map = HashMap::new();

    if let Some(keys) = device.supported_keys() {
        let codes: Vec<u16> = keys.iter().map(|key| key.code()).collect();
        let ordered = codes
            .iter()
            .copied()
            .filter(|code| *code >= BTN_JOYSTICK)
            .chain(
                codes
                    .iter()
                    .copied()
                    .filter(|code| (BTN_MISC..BTN_JOYSTICK).contains(code)),
            );
        for (index, code) in ordered.enumerate() {
            map.insert(code, index as u16);
        }
    }
    map
}

fn translate(
    axis_index: &HashMap<u16, u16>,
    button_index: &HashMap<u16, u16>,
    event: evdev::InputEvent,
) -> Option<RawInputEvent> {
    let now = Local::now();

    if event.event_type() == EventType::ABSOLUTE {
        // Hats and other unindexed axes fall through silently.
        let axis = *axis_index.get(&event.code())?;
        Some(RawInputEvent::Axis {
            axis,
            value: event.value(),
            timestamp: now,
        })
    } else if event.event_type() == EventType::KEY {
        if event.value() == 2 {
            debug!("Ignoring key autorepeat for code {}", event.code());
            return None;
        }
        let button = *button_index.get(&event.code())?;
        Some(RawInputEvent::Button {
            button,
            pressed: event.value() == 1,
            timestamp: now,
        })
    } else {
        None
    }
}
