use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::hawkes::EstimatorConfig;

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub fit: EstimatorConfig,
    pub intensity: IntensityConfig,
    pub events: EventsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IntensityConfig {
    pub grid_step_seconds: u32,
    /// Number of peak seconds reported after reconstruction.
    pub top_k: usize,
}

impl Default for IntensityConfig {
    fn default() -> Self {
        Self {
            grid_step_seconds: 1,
            top_k: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Epoch-millisecond column of the large-trade tape.
    pub timestamp_column: String,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            timestamp_column: "ts_ms".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// When set, logs go to this file as JSON lines instead of stderr.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl Config {
    /// Load from `path`, or from [`DEFAULT_CONFIG_PATH`] when it exists, or
    /// fall back to built-in defaults. An explicit path must exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_PATH);
                if default_path.exists() {
                    Self::from_file(default_path)?
                } else {
                    Self::default()
                }
            }
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&config_str).with_context(|| format!("failed to parse {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        self.fit.validate().context("invalid [fit] section")?;
        if self.intensity.grid_step_seconds == 0 {
            bail!("intensity.grid_step_seconds must be > 0");
        }
        if self.events.timestamp_column.trim().is_empty() {
            bail!("events.timestamp_column must not be empty");
        }
        Ok(())
    }
}
