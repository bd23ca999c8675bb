use polars::error::PolarsError;
use thiserror::Error;

/// Everything the prediction pipeline can fail with.
#[derive(Debug, Error)]
pub enum PredictorError {
    /// Input rejected before any computation (e.g. a sequence that is too short).
    #[error("invalid input: {0}")]
    Validation(String),

    /// A patient field is missing, malformed or of the wrong type.
    #[error("schema error: {0}")]
    Schema(String),

    /// A model artifact is missing, unreadable or inconsistent with the others.
    #[error("artifact `{artifact}` unusable: {reason}")]
    Artifact { artifact: String, reason: String },

    #[error("chart rendering failed: {0}")]
    Chart(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Polars(#[from] PolarsError),
}

pub type PredictorResult<T> = Result<T, PredictorError>;

impl PredictorError {
    pub fn artifact(artifact: impl Into<String>, reason: impl Into<String>) -> Self {
        PredictorError::Artifact {
            artifact: artifact.into(),
            reason: reason.into(),
        }
    }
}

/// Wrap a plotters drawing error.
pub fn chart_err<E: std::error::Error>(e: E) -> PredictorError {
    PredictorError::Chart(e.to_string())
}
