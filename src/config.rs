use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::hardware::InputSource;
use crate::touch::calibration::Calibration;
use crate::touch::device::TouchProtocol;
use crate::widgets::element::{ButtonElement, ElementSpec, FaderElement, LabelElement};
use crate::widgets::fader::FaderMode;
use crate::widgets::geometry::PanelSize;

const CONFIG_DIR: &str = "tauwerk";
const CONFIG_FILE: &str = "surface.toml";
const CONFIG_ENV: &str = "TAUWERK_CONFIG";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write config file {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Everything the surface needs at startup, stored as `surface.toml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurfaceConfig {
    #[serde(default)]
    pub channels: ChannelPaths,
    #[serde(default)]
    pub touch: TouchConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub controllers: Vec<ControllerConfig>,
    #[serde(default)]
    pub elements: Vec<ElementSpec>,
}

/// Shared memory regions of the GPIO driver and the renderer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelPaths {
    pub gpio: PathBuf,
    pub ui_commands: PathBuf,
    pub ui_events: PathBuf,
}

impl Default for ChannelPaths {
    fn default() -> Self {
        Self {
            gpio: PathBuf::from("/dev/shm/tauwerk_gpio"),
            ui_commands: PathBuf::from("/dev/shm/tauwerk_ui_commands"),
            ui_events: PathBuf::from("/dev/shm/tauwerk_ui_events"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TouchConfig {
    pub enabled: bool,
    /// Skips autodetection when set
    pub device: Option<PathBuf>,
    pub fallback_device: PathBuf,
    /// Overrides the protocol found by capability probing
    pub protocol: Option<TouchProtocol>,
    pub calibration: Calibration,
}

impl Default for TouchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            device: None,
            fallback_device: PathBuf::from("/dev/input/event3"),
            protocol: None,
            calibration: Calibration::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Sleep between channel polls
    pub poll_interval_us: u64,
    pub target_fps: u32,
    pub stats_interval_secs: i64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            poll_interval_us: 1000,
            target_fps: 60,
            stats_interval_secs: 30,
        }
    }
}

/// A hardware controller wired to the GPIO driver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ControllerConfig {
    Encoder { name: String, pins: [i32; 2] },
    Buttons { name: String, pins: BTreeMap<String, i32> },
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        let color = 0xCCEEEC;
        let button = |id, x, width, label: &str| {
            ElementSpec::Button(ButtonElement {
                id,
                x,
                y: 0,
                width,
                height: 120,
                label: label.to_string(),
                color,
            })
        };

        Self {
            channels: ChannelPaths::default(),
            touch: TouchConfig::default(),
            timing: TimingConfig::default(),
            controllers: vec![
                ControllerConfig::Encoder {
                    name: "A".to_string(),
                    pins: [5, 6],
                },
                ControllerConfig::Buttons {
                    name: "A".to_string(),
                    pins: BTreeMap::from([
                        ("push".to_string(), 16),
                        ("back".to_string(), 20),
                        ("confirm".to_string(), 21),
                    ]),
                },
            ],
            elements: vec![
                button(1, 0, 195, "PLAY"),
                button(2, 205, 195, "STOP"),
                button(5, 410, 195, "REC"),
                button(6, 615, 185, "EDIT"),
                ElementSpec::Fader(FaderElement {
                    id: 3,
                    x: 0,
                    y: 130,
                    width: 800,
                    height: 120,
                    label: "VOLUME".to_string(),
                    value: 50.0,
                    mode: FaderMode::Smooth,
                    color,
                    ..FaderElement::default()
                }),
                ElementSpec::Fader(FaderElement {
                    id: 4,
                    x: 0,
                    y: 260,
                    width: 800,
                    height: 120,
                    label: "BPM".to_string(),
                    min: 20.0,
                    max: 300.0,
                    value: 120.0,
                    mode: FaderMode::Incremental,
                    color,
                    ..FaderElement::default()
                }),
                ElementSpec::Label(LabelElement {
                    id: 7,
                    x: 0,
                    y: 390,
                    text: "TAUWERK".to_string(),
                    color,
                }),
            ],
        }
    }
}

impl SurfaceConfig {
    pub async fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;

        debug!("Loaded config from {:?}", path);
        Ok(config)
    }

    pub async fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }
        let content = toml::to_string_pretty(self)?;
        tokio::fs::write(path, content).await.map_err(write_err)?;

        info!("Saved config to {:?}", path);
        Ok(())
    }

    /// Loads the file, writing the default layout first if there is none
    pub async fn load_or_create(path: &Path) -> Result<Self, ConfigError> {
        let exists = tokio::fs::try_exists(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        if exists {
            return Self::load_from(path).await;
        }

        warn!("Config file {:?} does not exist, writing default", path);
        let config = Self::default();
        config.save_to(path).await?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timing.target_fps == 0 {
            return Err(ConfigError::Invalid("target_fps must be positive".to_string()));
        }
        if self.timing.stats_interval_secs <= 0 {
            return Err(ConfigError::Invalid(
                "stats_interval_secs must be positive".to_string(),
            ));
        }

        let mut ids = HashSet::new();
        for element in &self.elements {
            if !ids.insert(element.id()) {
                return Err(ConfigError::Invalid(format!(
                    "element id {} is used twice",
                    element.id()
                )));
            }
            element
                .validate()
                .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        }

        let mut names = HashSet::new();
        for controller in &self.controllers {
            let id = InputSource::from(controller).id().to_string();
            if !names.insert(id.clone()) {
                return Err(ConfigError::Invalid(format!("controller {} is defined twice", id)));
            }
        }
        Ok(())
    }

    pub fn panel(&self) -> PanelSize {
        self.touch.calibration.panel()
    }

    pub fn sources(&self) -> Vec<InputSource> {
        self.controllers.iter().map(InputSource::from).collect()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_micros(self.timing.poll_interval_us.max(1))
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs(1) / self.timing.target_fps.max(1)
    }

    pub fn stats_interval(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.timing.stats_interval_secs)
    }
}

/// `$TAUWERK_CONFIG`, or `surface.toml` in the user's config directory
pub fn config_path() -> PathBuf {
    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        return PathBuf::from(path);
    }

    let base = dirs::config_dir().unwrap_or_else(|| {
        warn!("Could not determine config directory, using current directory");
        PathBuf::from(".")
    });
    base.join(CONFIG_DIR).join(CONFIG_FILE)
}
