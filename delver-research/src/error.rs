use delver_core::DelverError;
use thiserror::Error;

/// Failure classes surfaced to callers of the research engine.
#[derive(Debug, Error)]
pub enum ResearchError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("query generation failed: {0}")]
    QueryGenerationFailed(String),
    #[error("strategy compilation failed: {0}")]
    UdfCompilationFailed(String),
    #[error("strategy execution failed: {0}")]
    UdfExecutionFailed(String),
}

impl From<ResearchError> for DelverError {
    fn from(err: ResearchError) -> Self {
        DelverError::Custom(err.to_string())
    }
}
