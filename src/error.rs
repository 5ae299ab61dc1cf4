//! Error types for Reach.
//!
//! Only operations that touch the filesystem or parse user input can fail.
//! Graph queries never return errors: a missing node is an ordinary,
//! inspectable result.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReachError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Config(#[from] toml::de::Error),

    #[error("invalid pattern '{pattern}': {reason}")]
    Pattern { pattern: String, reason: String },

    #[error("no extractor for {0}")]
    UnsupportedFormat(PathBuf),

    #[error("invalid graph file: {0}")]
    GraphFormat(String),
}

pub type Result<T> = std::result::Result<T, ReachError>;
