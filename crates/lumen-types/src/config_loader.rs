//! Configuration loading: built-in defaults with a TOML file layered on top.
//!
//! The loader starts from [`RunConfig::default()`] and merges one
//! `lumen.toml` over it, field by field at the TOML table level, so a config
//! file only has to spell out what it changes. Oversized files are rejected
//! up front.

use std::path::{Path, PathBuf};

use crate::config::{ConfigError, RunConfig};

/// Maximum config file size in bytes. Larger files are rejected rather than
/// parsed.
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

/// Loads a [`RunConfig`] from defaults plus an optional file layer.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    path: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the config file to layer over the defaults.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Load, merge, and validate.
    pub fn load(&self) -> Result<RunConfig, ConfigError> {
        let config = self.load_unchecked()?;
        config.validate()?;
        Ok(config)
    }

    /// Load and merge without validating. For callers that layer CLI
    /// overrides on top before validation.
    pub fn load_unchecked(&self) -> Result<RunConfig, ConfigError> {
        match &self.path {
            Some(path) => Self::load_file(path),
            None => Ok(RunConfig::default()),
        }
    }

    fn load_file(path: &Path) -> Result<RunConfig, ConfigError> {
        let io_err = |detail: String| ConfigError::Io {
            path: path.display().to_string(),
            detail,
        };

        let meta = std::fs::metadata(path).map_err(|e| io_err(e.to_string()))?;
        if meta.len() > MAX_CONFIG_FILE_SIZE {
            return Err(io_err(format!(
                "file is {} bytes, limit is {MAX_CONFIG_FILE_SIZE}",
                meta.len()
            )));
        }

        let content = std::fs::read_to_string(path).map_err(|e| io_err(e.to_string()))?;
        tracing::debug!(path = %path.display(), "loading run config");
        merge_over_defaults(&content)
    }
}

/// Merge a TOML document over the default config at the top-level-table
/// granularity: any key present in the document replaces the default value
/// wholesale.
pub fn merge_over_defaults(toml_src: &str) -> Result<RunConfig, ConfigError> {
    let parse_err = |detail: String| ConfigError::Parse { detail };

    let mut merged =
        toml::Value::try_from(RunConfig::default()).map_err(|e| parse_err(e.to_string()))?;
    let layer: toml::Value = toml::from_str(toml_src).map_err(|e| parse_err(e.to_string()))?;

    if let (toml::Value::Table(base), toml::Value::Table(overlay)) = (&mut merged, layer) {
        for (key, value) in overlay {
            base.insert(key, value);
        }
    }

    merged.try_into().map_err(|e: toml::de::Error| parse_err(e.to_string()))
}
