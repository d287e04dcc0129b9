//! DarcUI configuration.
//!
//! Read from `~/.darcui/config.toml`. Every section and key is optional; a
//! missing file is not an error.
//!
//! ```toml
//! [threading]
//! design_mode = false
//! shutdown_timeout_ms = 5000
//! worker_threads = 4
//! ```

use serde::Deserialize;
use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;

pub const DESIGN_MODE_ENV: &str = "DARCUI_DESIGN_MODE";

const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_millis(5000);

#[derive(Debug, Default, Deserialize)]
pub struct DarcConfig {
    pub threading: Option<ThreadingConfig>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ThreadingConfig {
    /// Skip UI-thread assertions (visual designer hosting).
    #[serde(default)]
    pub design_mode: bool,
    /// How long shutdown waits for background operations.
    pub shutdown_timeout_ms: Option<u64>,
    /// Worker threads for background operations; tokio's default when unset.
    pub worker_threads: Option<usize>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl ConfigError {
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

impl DarcConfig {
    /// Load the user config. `Ok(None)` when there is no home directory or no file.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        let path = match config_path() {
            Some(path) => path,
            None => return Ok(None),
        };
        if !path.exists() {
            return Ok(None);
        }
        Self::load_from(&path).map(Some)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    #[must_use]
    pub fn path() -> Option<PathBuf> {
        config_path()
    }

    /// Design mode from the config file, overridden by `DARCUI_DESIGN_MODE`.
    #[must_use]
    pub fn design_mode(&self) -> bool {
        design_mode_from_env().unwrap_or_else(|| {
            self.threading
                .as_ref()
                .is_some_and(|threading| threading.design_mode)
        })
    }

    #[must_use]
    pub fn shutdown_timeout(&self) -> Duration {
        self.threading
            .as_ref()
            .and_then(|threading| threading.shutdown_timeout_ms)
            .map_or(DEFAULT_SHUTDOWN_TIMEOUT, Duration::from_millis)
    }

    #[must_use]
    pub fn worker_threads(&self) -> Option<usize> {
        self.threading
            .as_ref()
            .and_then(|threading| threading.worker_threads)
            .filter(|&threads| threads > 0)
    }
}

#[must_use]
pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".darcui").join("config.toml"))
}

fn design_mode_from_env() -> Option<bool> {
    env::var(DESIGN_MODE_ENV)
        .ok()
        .map(|raw| is_truthy(raw.as_str()))
}

fn is_truthy(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes"
    )
}
