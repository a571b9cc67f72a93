//! Crate-level error type for service startup and wiring.
//!
//! Pipeline-stage failures have their own taxonomy in
//! [`crate::pipeline::error`] and never surface through this type.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SpendsightError {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Secret error: {0}")]
    Secret(#[from] crate::secrets::SecretError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Object storage error: {0}")]
    Storage(#[from] crate::storage::StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SpendsightError>;
