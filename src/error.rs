use std::path::PathBuf;

use thiserror::Error;

/// Failures while loading or validating a [`crate::config::PetConfig`].
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config value `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Failures persisting the guide-tip flag.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("no data directory available for this platform")]
    NoDataDir,

    #[error("guide flag I/O at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
