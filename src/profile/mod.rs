//! Device profiles: mapping raw axis values to normalized actuation channels.
//!
//! A profile describes one physical input device: which raw axis index feeds
//! which actuation channel, and the linear transform (scale, offset, clamp)
//! that turns the device's raw integer range into the channel's physical
//! range. Profiles are selected once at startup and never mutated.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Normalized actuation channel targeted by an axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    /// Steering angle in degrees, negative = left.
    Steering,

    /// Throttle percentage [0, 100].
    Throttle,

    /// Brake percentage [0, 100].
    Brake,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Steering => write!(f, "steering"),
            Channel::Throttle => write!(f, "throttle"),
            Channel::Brake => write!(f, "brake"),
        }
    }
}

/// One normalized value for one channel, produced by [`DeviceProfile::normalize`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelUpdate {
    pub channel: Channel,
    pub value: f32,
}

/// Linear transform from one raw axis to one channel.
///
/// `value = raw * scale + offset`, clamped to `[min, max]`. Inverted pedals
/// (raw counts down as the pedal is pressed) use a negative scale.
#[derive(Debug, Clone, Copy)]
pub struct AxisMapping {
    channel: Channel,
    scale: f32,
    offset: f32,
    min: f32,
    max: f32,
}

impl AxisMapping {
    pub fn new(channel: Channel, scale: f32, offset: f32, min: f32, max: f32) -> Self {
        Self {
            channel,
            scale,
            offset,
            min,
            max,
        }
    }

    fn apply(&self, raw: i32) -> ChannelUpdate {
        let value = (raw as f32 * self.scale + self.offset).clamp(self.min, self.max);
        ChannelUpdate {
            channel: self.channel,
            value,
        }
    }
}

/// Immutable per-device mapping from raw axis indices to channels.
///
/// Axis indices are semantic indices as reported by the event source
/// (enumeration order of the device's capabilities), not hardware codes.
/// Unknown indices are not a fault: [`DeviceProfile::normalize`] simply
/// returns `None` for them.
#[derive(Debug, Clone)]
pub struct DeviceProfile {
    name: String,
    max_steering_deg: f32,
    axes: HashMap<u16, AxisMapping>,
}

impl DeviceProfile {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Largest steering magnitude this profile can emit, in degrees.
    pub fn max_steering_deg(&self) -> f32 {
        self.max_steering_deg
    }

    /// Maps a raw axis sample to a channel update.
    ///
    /// Pure and allocation-free; called on the ingestion hot path. Returns
    /// `None` for axis indices the profile does not map.
    pub fn normalize(&self, axis: u16, raw: i32) -> Option<ChannelUpdate> {
        self.axes.get(&axis).map(|mapping| mapping.apply(raw))
    }

    /// Looks up a builtin profile by its configuration name.
    pub fn by_name(name: &str) -> Option<Self> {
        match name {
            "f310" => Some(Self::f310()),
            "g29" => Some(Self::g29()),
            _ => None,
        }
    }

    pub fn builtin_names() -> &'static [&'static str] {
        &["f310", "g29"]
    }

    /// Logitech F310 gamepad shape: stick steering plus two pedal-style axes.
    pub fn f310() -> Self {
        let mut axes = HashMap::new();

        // Achse 0: Lenkung, volle Stick-Auslenkung entspricht 90 Grad
        axes.insert(
            0,
            AxisMapping::new(Channel::Steering, 90.0 / 32_768.0, 0.0, -90.0, 90.0),
        );
        axes.insert(
            1,
            AxisMapping::new(Channel::Throttle, 100.0 / 255.0, 0.0, 0.0, 100.0),
        );
        axes.insert(
            2,
            AxisMapping::new(Channel::Brake, 100.0 / 255.0, 0.0, 0.0, 100.0),
        );

        Self {
            name: "f310".to_string(),
            max_steering_deg: 90.0,
            axes,
        }
    }

    /// Logitech G29 wheel shape: 900 degree wheel, inverted pedals.
    ///
    /// The wheel reports [0, 65535] with center at 32767; both pedals report
    /// 255 released down to 0 fully pressed.
    pub fn g29() -> Self {
        let mut axes = HashMap::new();

        let steering_scale = 900.0 / 65_535.0;
        axes.insert(
            0,
            AxisMapping::new(
                Channel::Steering,
                steering_scale,
                -32_767.0 * steering_scale,
                -450.0,
                450.0,
            ),
        );
        // Pedale invertiert: 255 = losgelassen, 0 = voll durchgedrückt
        axes.insert(
            1,
            AxisMapping::new(Channel::Throttle, -100.0 / 255.0, 100.0, 0.0, 100.0),
        );
        axes.insert(
            2,
            AxisMapping::new(Channel::Brake, -100.0 / 255.0, 100.0, 0.0, 100.0),
        );

        Self {
            name: "g29".to_string(),
            max_steering_deg: 450.0,
            axes,
        }
    }
}
