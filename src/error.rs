//! Error types for prompt trajectory analysis

use thiserror::Error;

/// Errors that can occur during analysis
#[derive(Debug, Error)]
pub enum TrajectoryError {
    #[error("Failed to parse prompt rows: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid conversation: {0}")]
    InvalidConversation(String),

    #[error("Not enough data to train: found {found} prompts, need at least {required}")]
    InsufficientData { found: usize, required: usize },

    #[error("Specificity model error: {0}")]
    ModelError(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),
}
