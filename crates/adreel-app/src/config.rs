//! Application configuration.

use adreel_ai::{CommandGeneratorConfig, QualityConfig, RegenerationConfig};
use adreel_render::RenderSettings;
use adreel_timeline::TimelineConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Where sessions and metrics are kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("adreel"),
        }
    }
}

/// Everything the binary reads from `config.json`. Missing sections take
/// their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub storage: StorageConfig,
    pub render: RenderSettings,
    pub timeline: TimelineConfig,
    pub quality: QualityConfig,
    pub regeneration: RegenerationConfig,
    /// External clip generator. Without one, clips are scored but never
    /// regenerated.
    pub generator: Option<CommandGeneratorConfig>,
    /// Log filter used when `ADREEL_LOG` is unset.
    pub log_level: Option<String>,
}

impl AppConfig {
    /// Default config file location.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("adreel")
            .join("config.json")
    }

    /// Load `path`, or the default location when `None`. A missing file
    /// yields the defaults; an unreadable or malformed one is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(Self::default_path);
        if !path.exists() {
            return Ok(Self::default());
        }
        let json = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&json).with_context(|| format!("parsing config {}", path.display()))
    }
}
