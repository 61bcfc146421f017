//! TOML configuration for the bridge.

use crate::command::{PowerButtonMapper, PublisherSettings};
use crate::profile::DeviceProfile;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Read(String),

    #[error("invalid configuration: {0}")]
    Parse(String),

    #[error("unknown device profile: {0}")]
    UnknownProfile(String),

    #[error("publish rate must be at least 1 Hz")]
    InvalidPublishRate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenwheelConfig {
    /// Device node to read events from. Picking the right node (or wiring a
    /// discovery layer) is outside this program.
    pub device: PathBuf,

    /// Name of the builtin device profile.
    pub profile: String,

    /// Command publish cadence in Hz.
    pub publish_rate_hz: u32,

    /// Button indices that power the backend on (press edge).
    pub power_on_buttons: Vec<u16>,

    /// Button indices that power the backend off (press edge).
    pub power_off_buttons: Vec<u16>,
}

impl Default for OpenwheelConfig {
    fn default() -> Self {
        Self {
            device: PathBuf::from("/dev/input/event0"),
            profile: "g29".to_string(),
            publish_rate_hz: 30,
            power_on_buttons: vec![23],
            power_off_buttons: vec![21, 22],
        }
    }
}

impl OpenwheelConfig {
    /// Loads the configuration, preferring an explicit path, then the user
    /// config directory, then a local `openwheel.toml`. No file at all is
    /// fine: defaults apply.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => Self::default_path().filter(|path| path.exists()).or_else(|| {
                let local = PathBuf::from("openwheel.toml");
                local.exists().then_some(local)
            }),
        };

        let config = match path {
            Some(path) => {
                info!("Loading configuration from {}", path.display());
                let text = fs::read_to_string(&path)
                    .map_err(|e| ConfigError::Read(format!("{}: {}", path.display(), e)))?;
                toml::from_str(&text)
                    .map_err(|e| ConfigError::Parse(format!("{}: {}", path.display(), e)))?
            }
            None => {
                info!("No configuration file found, using defaults");
                Self::default()
            }
        };

        config.validate()?;
        Ok(config)
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("openwheel").join("config.toml"))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.publish_rate_hz == 0 {
            return Err(ConfigError::InvalidPublishRate);
        }
        if DeviceProfile::by_name(&self.profile).is_none() {
            return Err(ConfigError::UnknownProfile(format!(
                "{:?} (available: {})",
                self.profile,
                DeviceProfile::builtin_names().join(", ")
            )));
        }
        Ok(())
    }

    /// Resolves the configured profile name; fails fast before any task runs.
    pub fn resolve_profile(&self) -> Result<DeviceProfile, ConfigError> {
        DeviceProfile::by_name(&self.profile).ok_or_else(|| {
            ConfigError::UnknownProfile(format!(
                "{:?} (available: {})",
                self.profile,
                DeviceProfile::builtin_names().join(", ")
            ))
        })
    }

    pub fn publisher_settings(&self) -> PublisherSettings {
        PublisherSettings {
            publish_rate_hz: self.publish_rate_hz,
        }
    }

    pub fn power_button_mapper(&self) -> PowerButtonMapper {
        PowerButtonMapper::new(
            self.power_on_buttons.iter().copied().collect(),
            self.power_off_buttons.iter().copied().collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_fills_in_defaults() {
        let config: OpenwheelConfig = toml::from_str("profile = \"f310\"").unwrap();
        assert_eq!(config.profile, "f310");
        assert_eq!(config.publish_rate_hz, 30);
        assert_eq!(config.power_on_buttons, vec![23]);
        assert_eq!(config.power_off_buttons, vec![21, 22]);
    }

    #[test]
    fn unknown_profile_fails_validation() {
        let config = OpenwheelConfig {
            profile: "momo".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnknownProfile(_))
        ));
    }

    #[test]
    fn zero_publish_rate_fails_validation() {
        let config = OpenwheelConfig {
            publish_rate_hz: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidPublishRate)
        ));
    }

    #[test]
    fn default_configuration_is_valid() {
        assert!(OpenwheelConfig::default().validate().is_ok());
        assert_eq!(
            OpenwheelConfig::default().resolve_profile().unwrap().name(),
            "g29"
        );
    }
}
