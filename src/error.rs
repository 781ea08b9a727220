use thiserror::Error;

use crate::sync::{CalendarSyncError, GroupSyncError};

#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("not found")]
    NotFound,

    #[error("already exists")]
    AlreadyExists,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid config file: {0}")]
    ConfigFile(#[from] toml::de::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid sync status transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error(transparent)]
    CalendarSync(#[from] CalendarSyncError),

    #[error(transparent)]
    GroupSync(#[from] GroupSyncError),
}

pub type Result<T> = std::result::Result<T, Error>;
