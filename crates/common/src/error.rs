//! Common error types
//!
//! Shared by configuration loading across the workspace. Request-path and
//! refresh-path failures have their own taxonomies in their own crates.

use thiserror::Error;

/// Common error type for config and file handling
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Result alias using common Error
pub type Result<T> = std::result::Result<T, Error>;
