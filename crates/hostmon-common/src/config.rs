use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::path::Path;

/// How a configuration file was obtained by [`load_or_default`].
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigStatus {
    Loaded,
    /// The file does not exist; defaults are used.
    Missing,
    /// The file could not be read or parsed; defaults are used.
    Invalid(String),
}

impl ConfigStatus {
    /// Logs how the configuration was obtained. Called once the subscriber
    /// is installed, since the log file location comes from the config.
    pub fn report(&self, path: &Path) {
        match self {
            ConfigStatus::Loaded => {
                tracing::info!(path = %path.display(), "Configuration loaded")
            }
            ConfigStatus::Missing => tracing::warn!(
                path = %path.display(),
                "Configuration file not found, using defaults"
            ),
            ConfigStatus::Invalid(reason) => tracing::warn!(
                path = %path.display(),
                error = %reason,
                "Configuration file invalid, using defaults"
            ),
        }
    }
}

/// Reads and parses a TOML file.
pub fn load<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let config = toml::from_str(&content)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(config)
}

/// Like [`load`], but falls back to `T::default()` when the file is missing
/// or unusable.
pub fn load_or_default<T: DeserializeOwned + Default>(path: &Path) -> (T, ConfigStatus) {
    if !path.exists() {
        return (T::default(), ConfigStatus::Missing);
    }
    match load(path) {
        Ok(config) => (config, ConfigStatus::Loaded),
        Err(e) => (T::default(), ConfigStatus::Invalid(format!("{e:#}"))),
    }
}
