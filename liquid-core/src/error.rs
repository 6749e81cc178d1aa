//! Error types for liquid-core

use thiserror::Error;

/// Main error type for the liquid-core library
#[derive(Error, Debug)]
pub enum Error {
    /// IO error (queue store, log directory)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding/decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// HTTP method outside the supported set
    #[error("invalid HTTP method: {0:?}")]
    InvalidMethod(String),

    /// Request could not be completed (unreachable host, timeout, unreadable response)
    #[error("transport error: {0}")]
    Transport(String),

    /// Worker runtime could not be created or a worker task failed
    #[error("runtime error: {0}")]
    Runtime(String),
}

/// Result type alias for liquid-core
pub type Result<T> = std::result::Result<T, Error>;
