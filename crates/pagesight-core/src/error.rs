use thiserror::Error;

/// Errors surfaced by the ingestion and aggregation engine.
///
/// Validation and NotFound are raised before any write reaches storage.
/// Storage errors propagate unchanged from the backend; retry policy, if
/// any, belongs to the storage layer. Geo/UA lookup failures are *not*
/// errors: ingestion degrades those fields to the `"Unknown"` sentinel.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl EngineError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
}
