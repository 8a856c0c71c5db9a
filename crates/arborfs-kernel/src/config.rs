//! Engine configuration.
//!
//! Loaded from an optional TOML file; every field has a default so an empty
//! file (or no file) yields a working configuration.
//!
//! ```toml
//! image_path = "/var/lib/arborfs/home.img"
//!
//! [limits]
//! max_entries = 100
//! max_file_size = 1024
//! max_name_len = 255
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Image file used when none is configured, relative to the working directory.
pub const DEFAULT_IMAGE_PATH: &str = "arborfs.img";

/// Default maximum entries per directory.
pub const DEFAULT_MAX_ENTRIES: usize = 100;

/// Default per-file content capacity in bytes.
pub const DEFAULT_MAX_FILE_SIZE: usize = 1024;

/// Default maximum entry name length in bytes.
pub const DEFAULT_MAX_NAME_LEN: usize = 255;

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid limit: {0}")]
    InvalidLimit(&'static str),
}

/// Capacity limits checked at the operation boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Maximum number of entries in one directory.
    pub max_entries: usize,
    /// Maximum content length of one file, in bytes.
    pub max_file_size: usize,
    /// Maximum length of one entry name, in bytes.
    pub max_name_len: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_name_len: DEFAULT_MAX_NAME_LEN,
        }
    }
}

impl Limits {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_entries == 0 {
            return Err(ConfigError::InvalidLimit("max_entries must be positive"));
        }
        if self.max_name_len == 0 {
            return Err(ConfigError::InvalidLimit("max_name_len must be positive"));
        }
        if self.max_file_size > u32::MAX as usize {
            return Err(ConfigError::InvalidLimit("max_file_size must fit in 32 bits"));
        }
        Ok(())
    }
}

/// Filesystem configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FsConfig {
    /// Backing image file.
    pub image_path: PathBuf,
    /// Capacity limits.
    pub limits: Limits,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            image_path: PathBuf::from(DEFAULT_IMAGE_PATH),
            limits: Limits::default(),
        }
    }
}

impl FsConfig {
    /// Config with default limits backed by `image_path`.
    pub fn with_image(image_path: impl Into<PathBuf>) -> Self {
        Self {
            image_path: image_path.into(),
            ..Default::default()
        }
    }

    /// Parse a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: FsConfig = toml::from_str(text)?;
        config.limits.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }
}
