use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

use crate::capture::Facing;

const CONFIG_FILE: &str = "ripecam.toml";
const CONFIG_PATH_VAR: &str = "RIPECAM_CONFIG";
const ENV_PREFIX: &str = "RIPECAM";

pub const MIN_UPDATE_MS: u64 = 200;
pub const MIN_TARGET_MAX: u32 = 160;
pub const JPEG_QUALITY_RANGE: (f32, f32) = (0.2, 0.95);

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub inference: InferenceSettings,
    pub poll: PollSettings,
    pub camera: CameraSettings,
    pub ui: UiSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InferenceSettings {
    /// Optional URL prefix for the inference routes.
    pub api_base: String,
    /// Base cadence between cycles, in milliseconds.
    pub update_ms: u64,
    /// Largest side, in pixels, of the image sent for inference.
    pub target_max: u32,
    /// JPEG quality in 0..1.
    pub jpeg_quality: f32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PollSettings {
    pub interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    pub facing: Facing,
    pub devices: Vec<DeviceSettings>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceSettings {
    pub label: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UiSettings {
    pub headless: bool,
    pub font_path: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            inference: InferenceSettings::default(),
            poll: PollSettings::default(),
            camera: CameraSettings::default(),
            ui: UiSettings::default(),
        }
    }
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self {
            api_base: String::new(),
            update_ms: 500,
            target_max: 480,
            jpeg_quality: 0.5,
        }
    }
}

impl Default for PollSettings {
    fn default() -> Self {
        Self { interval_ms: 1500 }
    }
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            facing: Facing::Back,
            devices: Vec::new(),
        }
    }
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            headless: false,
            font_path: String::new(),
        }
    }
}

impl Settings {
    /// Reads defaults, then the optional config file, then `RIPECAM__*` variables.
    pub fn load() -> Result<Self, config::ConfigError> {
        let path = std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| CONFIG_FILE.to_string());
        let settings: Settings = Config::builder()
            .add_source(File::with_name(&path).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        Ok(settings.normalized())
    }

    /// Clamps every value into its accepted range.
    pub fn normalized(mut self) -> Self {
        let inference = &mut self.inference;
        if inference.update_ms < MIN_UPDATE_MS {
            warn!(
                "update_ms {} is below {}, clamping",
                inference.update_ms, MIN_UPDATE_MS
            );
            inference.update_ms = MIN_UPDATE_MS;
        }
        if inference.target_max < MIN_TARGET_MAX {
            warn!(
                "target_max {} is below {}, clamping",
                inference.target_max, MIN_TARGET_MAX
            );
            inference.target_max = MIN_TARGET_MAX;
        }
        let (low, high) = JPEG_QUALITY_RANGE;
        if !(low..=high).contains(&inference.jpeg_quality) {
            let clamped = if inference.jpeg_quality.is_nan() {
                InferenceSettings::default().jpeg_quality
            } else {
                inference.jpeg_quality.clamp(low, high)
            };
            warn!(
                "jpeg_quality {} is outside [{}, {}], using {}",
                inference.jpeg_quality, low, high, clamped
            );
            inference.jpeg_quality = clamped;
        }
        if self.poll.interval_ms < MIN_UPDATE_MS {
            self.poll.interval_ms = MIN_UPDATE_MS;
        }
        self
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.inference.update_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll.interval_ms)
    }

    pub fn api_base(&self) -> Option<&str> {
        let base = self.inference.api_base.trim();
        if base.is_empty() { None } else { Some(base) }
    }

    pub fn font_path(&self) -> Option<PathBuf> {
        let path = self.ui.font_path.trim();
        if path.is_empty() {
            None
        } else {
            Some(PathBuf::from(path))
        }
    }
}
