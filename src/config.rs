use crate::engine::{DEFAULT_CANDIDATE_MULTIPLIER, DEFAULT_MAX_PAGE};
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Looked up in the working directory when no `--config` is given
pub const DEFAULT_CONFIG_FILE: &str = "catalog-search.json";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub catalog: CatalogConfig,
    pub search: SearchConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// JSON array or JSON-lines dump, optionally `.gz`
    pub path: Option<PathBuf>,
    /// Extra Thai words, one per line
    pub thai_dictionary: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub default_limit: usize,
    pub max_limit: usize,
    /// Each tier keeps at most `candidate_multiplier × max_limit` candidates
    pub candidate_multiplier: usize,
    /// Rebuild the index periodically in the background
    pub reindex_interval_secs: Option<u64>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: 30,
            max_limit: DEFAULT_MAX_PAGE,
            candidate_multiplier: DEFAULT_CANDIDATE_MULTIPLIER,
            reindex_interval_secs: None,
        }
    }
}

impl SearchConfig {
    /// Apply the default page size and the cap to a requested limit
    pub fn clamp_limit(&self, requested: Option<usize>) -> usize {
        let limit = match requested {
            None | Some(0) => self.default_limit,
            Some(limit) => limit,
        };
        limit.min(self.max_limit)
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load an explicit config file, or the default one if it exists, or
    /// fall back to built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::from_file(path),
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => Self::from_file(DEFAULT_CONFIG_FILE),
            None => Ok(Self::default()),
        }
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    pub fn reindex_interval(&self) -> Option<Duration> {
        self.search
            .reindex_interval_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}
