//! Main configuration structures for rustmvs

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use super::params::{SgmParams, TileParams};

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlError(#[from] toml::de::Error),
    #[error("Failed to serialize TOML: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),
    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(String),
}

/// Main multi-view stereo configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MvsConfig {
    /// Worst-case tile shape
    pub tile: TileParams,
    /// Semi-global matching parameters
    pub sgm: SgmParams,
}

/// Configuration loader supporting YAML and TOML
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file, dispatching on the extension
    pub fn load<P: AsRef<Path>>(path: P) -> Result<MvsConfig, ConfigError> {
        let path = path.as_ref();
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        match extension.to_lowercase().as_str() {
            "yaml" | "yml" => Self::load_yaml(path),
            "toml" => Self::load_toml(path),
            _ => Err(ConfigError::UnsupportedFormat(extension.to_string())),
        }
    }

    /// Load configuration from YAML file
    pub fn load_yaml<P: AsRef<Path>>(path: P) -> Result<MvsConfig, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: MvsConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from TOML file
    pub fn load_toml<P: AsRef<Path>>(path: P) -> Result<MvsConfig, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: MvsConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn save_yaml<P: AsRef<Path>>(config: &MvsConfig, path: P) -> Result<(), ConfigError> {
        let content = serde_yaml::to_string(config)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Save configuration to TOML file
    pub fn save_toml<P: AsRef<Path>>(config: &MvsConfig, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string(config)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

impl MvsConfig {
    /// Draft-quality preset: coarse scale, no filtering, few candidate depths
    pub fn draft() -> Self {
        Self {
            tile: TileParams::default(),
            sgm: SgmParams {
                scale: 4,
                step_xy: 2,
                max_depths: 400,
                optimize_volume: false,
                ..Default::default()
            },
        }
    }

    /// High-quality preset: fine scale, full filtering
    pub fn high_quality() -> Self {
        Self {
            tile: TileParams::default(),
            sgm: SgmParams {
                scale: 1,
                step_xy: 1,
                max_depths: 3000,
                optimize_volume: true,
                ..Default::default()
            },
        }
    }
}
