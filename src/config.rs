//! Engine configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::constraint::VerifierConfig;
use crate::error::{Error, Result};
use crate::io::{read_file, write_atomic};

/// Base paths and verifier settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Location of the mapping store document.
    pub store_path: PathBuf,
    /// Directory relative element file paths are resolved against.
    pub base_dir: PathBuf,
    pub verifier: VerifierConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from("metadata/metadata.json"),
            base_dir: PathBuf::from("."),
            verifier: VerifierConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Create configuration from environment variables.
    ///
    /// - `METASYNC_STORE_PATH`: store document
    /// - `METASYNC_BASE_DIR`: base directory for relative paths
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            store_path: std::env::var("METASYNC_STORE_PATH")
                .map(|s| expand(&s))
                .unwrap_or(defaults.store_path),
            base_dir: std::env::var("METASYNC_BASE_DIR")
                .map(|s| expand(&s))
                .unwrap_or(defaults.base_dir),
            verifier: defaults.verifier,
        }
    }

    /// Load a JSON config file, writing the defaults there first when it
    /// does not exist.
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if !path.exists() {
            let config = Self::default();
            config.save(path)?;
            info!(path = %path.display(), "Created default config");
            return Ok(config);
        }
        let json = read_file(path)?;
        let mut config: Self = serde_json::from_str(&json)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        config.store_path = expand_path(&config.store_path);
        config.base_dir = expand_path(&config.base_dir);
        Ok(config)
    }

    /// Write the config as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        write_atomic(path, &json)
    }

    /// Resolve a possibly relative file path against `base_dir`.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        let expanded = expand_path(path);
        if expanded.is_absolute() {
            expanded
        } else {
            self.base_dir.join(expanded)
        }
    }

    /// The store path, resolved against `base_dir`.
    pub fn resolved_store_path(&self) -> PathBuf {
        self.resolve(&self.store_path)
    }
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

fn expand_path(path: &Path) -> PathBuf {
    match path.to_str() {
        Some(s) => expand(s),
        None => path.to_path_buf(),
    }
}
