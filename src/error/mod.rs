//! Error types for relogin.
//!
//! Two separate things live here: the authentication error taxonomy
//! ([`ErrorKind`], [`Severity`]) that the engine classifies *other* failures
//! into, and [`ReloginError`], the crate's own operational error type.

pub mod kind;

pub use kind::{ErrorKind, Severity};

use thiserror::Error;

/// Primary error type for relogin's own operations (config, storage, HTTP setup).
#[derive(Error, Debug)]
pub enum ReloginError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl From<serde_json::Error> for ReloginError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

impl From<toml::de::Error> for ReloginError {
    fn from(error: toml::de::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

impl From<toml::ser::Error> for ReloginError {
    fn from(error: toml::ser::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, ReloginError>;
