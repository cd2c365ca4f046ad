use std::fs;
use std::path::{Path, PathBuf};

use facebox_core::detection::domain::detector_config::DetectorConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("failed to read settings {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid settings in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Persistent CLI settings. Every field is optional in the JSON file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub detector: DetectorConfig,
    /// Clockwise rotation of source frames, in degrees.
    pub rotation: u32,
    /// Mirror frames horizontally (front-facing cameras).
    pub mirror: bool,
    pub model_path: Option<PathBuf>,
    pub model_url: Option<String>,
    pub bundled_model_dir: Option<PathBuf>,
}

impl Settings {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("FaceBox").join("settings.json"))
    }

    /// Loads `explicit` if given, failing when it is missing or malformed.
    /// Otherwise loads the default location, falling back to defaults when
    /// no file exists there.
    pub fn load(explicit: Option<&Path>) -> Result<Self, SettingsError> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        match Self::default_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, SettingsError> {
        let json = fs::read_to_string(path).map_err(|e| SettingsError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        let settings = serde_json::from_str(&json).map_err(|e| SettingsError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        log::debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }
}
