use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::device::{KeyCode, VideoResolution};
use crate::error::ConfigError;
use crate::transport::HeadUnitInfo;

const DEFAULT_SENSOR_POLL_INTERVAL_MS: u64 = 250;
const DEFAULT_MAILBOX_CAPACITY: usize = 16;
const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 2_000;

/// Immutable snapshot shared by every service of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadUnitConfig {
    pub display_name: String,
    pub head_unit: HeadUnitInfo,
    pub audio: AudioStreamsConfig,
    pub video: VideoSettings,
    pub input: InputSettings,
    pub sensor: SensorSettings,
    pub runtime: RuntimeSettings,
}

impl Default for HeadUnitConfig {
    fn default() -> Self {
        Self {
            display_name: "Head Unit".to_string(),
            head_unit: HeadUnitInfo {
                make: "Generic".to_string(),
                model: "Head Unit".to_string(),
                year: "2024".to_string(),
                vehicle_id: "0".to_string(),
                head_unit_make: "Generic".to_string(),
                head_unit_model: "Head Unit".to_string(),
                head_unit_software_build: env!("CARGO_PKG_VERSION").to_string(),
                head_unit_software_version: "1".to_string(),
            },
            audio: AudioStreamsConfig::default(),
            video: VideoSettings::default(),
            input: InputSettings::default(),
            sensor: SensorSettings::default(),
            runtime: RuntimeSettings::default(),
        }
    }
}

impl HeadUnitConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sensor.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                reason: "sensor.poll_interval_ms must be positive".to_string(),
            });
        }
        if self.runtime.mailbox_capacity == 0 {
            return Err(ConfigError::Invalid {
                reason: "runtime.mailbox_capacity must be positive".to_string(),
            });
        }
        if self.runtime.shutdown_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                reason: "runtime.shutdown_timeout_ms must be positive".to_string(),
            });
        }
        if self.input.touchscreen_enabled && (self.input.width == 0 || self.input.height == 0) {
            return Err(ConfigError::Invalid {
                reason: "touchscreen dimensions must be positive".to_string(),
            });
        }
        Ok(())
    }

    pub fn sensor_poll_interval(&self) -> Duration {
        Duration::from_millis(self.sensor.poll_interval_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.runtime.shutdown_timeout_ms)
    }
}

/// System audio is always present; the other streams are opt-in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioStreamsConfig {
    pub media_enabled: bool,
    pub guidance_enabled: bool,
    pub telephony_enabled: bool,
    pub microphone_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoSettings {
    pub resolution: VideoResolution,
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            resolution: VideoResolution::R800x480,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputSettings {
    pub touchscreen_enabled: bool,
    /// Panel size used when the input device does not report one.
    pub width: u32,
    pub height: u32,
    /// Keycodes the vehicle buttons are allowed to report; empty means
    /// whatever the input device supports.
    pub button_codes: Vec<KeyCode>,
}

impl Default for InputSettings {
    fn default() -> Self {
        Self {
            touchscreen_enabled: true,
            width: 800,
            height: 480,
            button_codes: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorSettings {
    pub poll_interval_ms: u64,
}

impl Default for SensorSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_SENSOR_POLL_INTERVAL_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSettings {
    pub mailbox_capacity: usize,
    pub shutdown_timeout_ms: u64,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
            shutdown_timeout_ms: DEFAULT_SHUTDOWN_TIMEOUT_MS,
        }
    }
}
