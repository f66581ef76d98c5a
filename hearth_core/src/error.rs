//! Error types for the hearth_core library.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for hearth_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Workout is missing or has no exercises
    #[error("Invalid workout: {0}")]
    InvalidWorkout(String),

    /// An operation needed an active session and there was none
    #[error("No active session")]
    NoActiveSession,

    /// Exercise id or set index does not exist in the session
    #[error("Out of range: {0}")]
    OutOfRange(String),

    /// A set field was given a value it cannot hold
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// A finish request arrived while another one was still in flight
    #[error("Submission already in progress")]
    SubmissionInProgress,

    /// The archival store rejected the finished session
    #[error("Archive error: {0}")]
    Archive(String),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Catalog validation error
    #[error("Catalog validation error: {0}")]
    CatalogValidation(String),

    /// Session slot error
    #[error("State error: {0}")]
    State(String),
}
