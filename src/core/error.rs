//! Error types for the shadow-logic Engine
//!
//! Variants map onto the six error kinds the pipeline distinguishes: input, parse,
//! history, cache, internal, deadline. Recoverable kinds (parse, history, cache)
//! are captured as scan warnings rather than propagated; internal and deadline
//! abort the scan.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using the Engine's Error
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("root path not found: {path}")]
    RootNotFound { path: PathBuf },

    #[error("input error: {message}")]
    Input { message: String },

    #[error("parse error in {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("history error for {path}: {message}")]
    History { path: PathBuf, message: String },

    #[error("cache error: {message}")]
    Cache { message: String },

    #[error("internal error: {message}")]
    Internal { message: String },

    #[error("scan deadline exceeded at stage '{stage}' after {elapsed_ms}ms")]
    Deadline { stage: String, elapsed_ms: u128 },

    #[error("configuration error: {message}")]
    Config { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}
