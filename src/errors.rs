use std::io;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GoldbergError {
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),
    #[error("Storage error: catalog lock poisoned for {0}")]
    StorageLock(String),
    #[error("Catalog sync error: {0}")]
    Sync(String),
    #[error("Provisioning error: {0}")]
    Provisioning(String),
    #[error("Config error: {0}")]
    Config(String),
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Operation cancelled")]
    Cancelled,
}

impl GoldbergError {
    /// Attach a path to an I/O failure raised while reading or writing configuration artifacts.
    pub fn config_io(path: &std::path::Path, err: io::Error) -> Self {
        GoldbergError::Config(format!("{}: {}", path.display(), err))
    }

    pub fn provisioning_io(path: &std::path::Path, err: io::Error) -> Self {
        GoldbergError::Provisioning(format!("{}: {}", path.display(), err))
    }
}

pub type Result<T> = std::result::Result<T, GoldbergError>;
