use std::path::PathBuf;
use thiserror::Error;

/// Failures of a catalog or metadata provider
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed catalog {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("catalog unavailable: {0}")]
    Unavailable(String),
}

/// Errors returned by the search engine
#[derive(Debug, Error)]
pub enum SearchError {
    /// The catalog could not be loaded while (re)building the index.
    #[error("index load failed: {0}")]
    IndexLoad(#[from] CatalogError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
