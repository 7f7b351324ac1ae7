//! Batch jobs over the service store: daily archival into a relational
//! database and cleanup of elapsed service dates.

use std::{error, fmt, result};

use config::ConfigError;
use store::StoreError;

mod archive;
mod cleanup;

pub use archive::Archive;
pub use cleanup::{cleanup_store, CleanupTarget};

#[derive(Debug)]
pub enum ArchiveError {
    Config(ConfigError),
    Store(StoreError),
    Database(sqlx::Error),
}

impl fmt::Display for ArchiveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArchiveError::Config(why) => write!(f, "{why}"),
            ArchiveError::Store(why) => write!(f, "{why}"),
            ArchiveError::Database(why) => write!(f, "archive database error: {why}"),
        }
    }
}

impl error::Error for ArchiveError {}

impl From<ConfigError> for ArchiveError {
    fn from(why: ConfigError) -> Self {
        ArchiveError::Config(why)
    }
}

impl From<StoreError> for ArchiveError {
    fn from(why: StoreError) -> Self {
        ArchiveError::Store(why)
    }
}

impl From<sqlx::Error> for ArchiveError {
    fn from(why: sqlx::Error) -> Self {
        ArchiveError::Database(why)
    }
}

pub type Result<T> = result::Result<T, ArchiveError>;
