//! Game configuration.
//!
//! Loaded from an optional TOML file; command-line flags override file values.
//!
//! ```toml
//! snippet_seconds = 2.5
//! result_limit = 20
//! leaderboard_size = 10
//! catalog_path = "tracks.json"
//! database_path = "leaderboard.sqlite3"
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::leaderboard::DEFAULT_LEADERBOARD_SIZE;
use crate::round::{DEFAULT_SNIPPET_SECONDS, MAX_SNIPPET_SECONDS, MIN_SNIPPET_SECONDS};
use crate::selection::DEFAULT_RESULT_LIMIT;

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "CHOON_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("{0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GameConfig {
    pub snippet_seconds: f64,
    pub result_limit: usize,
    pub leaderboard_size: usize,
    pub catalog_path: Option<PathBuf>,
    /// Absent means an in-memory leaderboard for this session only.
    pub database_path: Option<PathBuf>,
}

impl Default for GameConfig {
    fn default() -> Self {
        GameConfig {
            snippet_seconds: DEFAULT_SNIPPET_SECONDS,
            result_limit: DEFAULT_RESULT_LIMIT,
            leaderboard_size: DEFAULT_LEADERBOARD_SIZE,
            catalog_path: None,
            database_path: None,
        }
    }
}

impl GameConfig {
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: GameConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Load from an explicit path, else from `CHOON_CONFIG`, else defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::load(Path::new(&path)),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_SNIPPET_SECONDS..=MAX_SNIPPET_SECONDS).contains(&self.snippet_seconds) {
            return Err(ConfigError::Invalid(format!(
                "snippet_seconds must be between {} and {}, got {}",
                MIN_SNIPPET_SECONDS, MAX_SNIPPET_SECONDS, self.snippet_seconds
            )));
        }
        if self.result_limit == 0 {
            return Err(ConfigError::Invalid("result_limit must be >= 1".to_string()));
        }
        if self.leaderboard_size == 0 {
            return Err(ConfigError::Invalid("leaderboard_size must be >= 1".to_string()));
        }
        Ok(())
    }
}
