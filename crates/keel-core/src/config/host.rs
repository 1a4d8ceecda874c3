use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::error::ConfigError;
use crate::config::parameters::Parameters;
use crate::plugin_system::DependencyPolicy;

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigFormat {
    /// JSON format (.json)
    Json,
    /// YAML format (.yaml, .yml) - requires "yaml-config" feature
    #[cfg(feature = "yaml-config")]
    Yaml,
    /// TOML format (.toml) - requires "toml-config" feature
    #[cfg(feature = "toml-config")]
    Toml,
}

impl ConfigFormat {
    /// Get the file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            ConfigFormat::Json => "json",
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => "yaml",
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => "toml",
        }
    }

    /// Determine format from file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| match ext.to_lowercase().as_str() {
                "json" => Some(ConfigFormat::Json),
                #[cfg(feature = "yaml-config")]
                "yaml" | "yml" => Some(ConfigFormat::Yaml),
                #[cfg(feature = "toml-config")]
                "toml" => Some(ConfigFormat::Toml),
                _ => None,
            })
    }
}

/// Host settings, usually read from a config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Directories scanned for plugin libraries, in order
    pub plugin_dirs: Vec<PathBuf>,
    /// What happens to a plugin whose dependency failed
    pub dependency_policy: DependencyPolicy,
    /// Default startup parameters; command-line parameters override them
    pub parameters: Parameters,
}

impl HostConfig {
    /// Load from a file, choosing the format by extension.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let format = ConfigFormat::from_path(path).ok_or_else(|| ConfigError::UnsupportedFormat {
            path: path.to_path_buf(),
        })?;
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            operation: "read_config".to_string(),
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::parse(&contents, format, path)?;
        log::info!("Loaded host configuration from {}", path.display());
        Ok(config)
    }

    /// Parse `contents` in the given format. `origin` is only used in errors.
    pub fn parse(contents: &str, format: ConfigFormat, origin: &Path) -> Result<Self, ConfigError> {
        let deserialization_error = |source: Box<dyn std::error::Error + Send + Sync>| {
            ConfigError::Deserialization {
                format: format.extension().to_string(),
                path: origin.to_path_buf(),
                source,
            }
        };
        match format {
            ConfigFormat::Json => {
                serde_json::from_str(contents).map_err(|e| deserialization_error(Box::new(e)))
            }
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => {
                serde_yaml::from_str(contents).map_err(|e| deserialization_error(Box::new(e)))
            }
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => {
                toml::from_str(contents).map_err(|e| deserialization_error(Box::new(e)))
            }
        }
    }

    /// Relative plugin directories are resolved against `base`.
    pub fn resolve_plugin_dirs(&mut self, base: &Path) {
        for dir in &mut self.plugin_dirs {
            if dir.is_relative() {
                *dir = base.join(&*dir);
            }
        }
    }
}
