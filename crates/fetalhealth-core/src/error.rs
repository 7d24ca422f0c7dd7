//! Error types for the fetal health service

use std::path::PathBuf;

/// Result type alias using the service's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for model lifecycle, validation and inference
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Model artifact does not exist on disk
    #[error("model artifact not found: {}", .0.display())]
    ArtifactMissing(PathBuf),

    /// Model artifact exists but could not be deserialized
    #[error("model artifact is corrupt: {0}")]
    ArtifactCorrupt(String),

    /// Inference requested while no model is held
    #[error("Model not loaded. Cannot perform inference.")]
    ModelNotLoaded,

    /// A value the model cannot work with (wrong shape, non-finite, ...)
    #[error("{0}")]
    InvalidValue(String),

    /// Required exam field absent or null
    #[error("Field '{0}' is missing or null.")]
    MissingField(&'static str),

    /// Required exam field not coercible to a number
    #[error("Field '{0}' must be a valid number.")]
    InvalidField(&'static str),

    /// Request carried no data at all
    #[error("No JSON data provided.")]
    EmptyPayload,

    /// Prediction capability failed unexpectedly
    #[error("prediction error: {0}")]
    Prediction(String),

    /// Model answered with a label outside the known fetal health classes
    #[error("invalid ML response: unexpected class label {0}")]
    UnexpectedLabel(i64),

    /// Generic internal errors
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new corrupt-artifact error
    pub fn corrupt(msg: impl Into<String>) -> Self {
        Self::ArtifactCorrupt(msg.into())
    }

    /// Create a new invalid-value error
    pub fn invalid_value(msg: impl Into<String>) -> Self {
        Self::InvalidValue(msg.into())
    }

    /// Create a new prediction error
    pub fn prediction(msg: impl Into<String>) -> Self {
        Self::Prediction(msg.into())
    }

    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Validation failures detected before the model is touched
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::MissingField(_) | Self::InvalidField(_) | Self::EmptyPayload
        )
    }

    /// State or value errors raised at inference time.
    ///
    /// Their message is meant for the client as-is.
    pub fn is_inference_state(&self) -> bool {
        matches!(self, Self::ModelNotLoaded | Self::InvalidValue(_))
    }
}
