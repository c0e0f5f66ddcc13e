//! Error types for salescope-core

use thiserror::Error;

/// Main error type for the salescope-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Planner error (LLM unreachable or returned an unusable plan)
    #[error("planner error: {0}")]
    Planner(String),

    /// A grouping dimension that cannot be mapped to a physical column
    #[error("unknown dimension: {0}")]
    UnknownDimension(String),

    /// A measure name that cannot be mapped to a fact column
    #[error("unknown measure: {0}")]
    UnknownMeasure(String),

    /// An operation name an agent does not implement
    #[error("unknown operation '{operation}' for agent {agent}")]
    UnknownOperation { agent: String, operation: String },
}

/// Result type alias for salescope-core
pub type Result<T> = std::result::Result<T, Error>;
