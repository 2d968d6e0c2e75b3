use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DelverError {
    #[error("LLM provider error: {0}")]
    LlmProvider(String),
    #[error("LLM returned an empty response")]
    EmptyResponse,
    #[error("Parse failed: {reason}. Output: {output}")]
    ParseFailed { output: String, reason: String },
    #[error("Timeout after {0:?}")]
    Timeout(Duration),
    #[error("Max retries ({max}) exceeded")]
    MaxRetriesExceeded { max: usize },
    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),
    #[error("Vector store error: {0}")]
    Store(#[from] StoreError),
    #[error("Web search error: {0}")]
    Search(#[from] SearchError),
    #[error("Operation cancelled")]
    Cancelled,
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
    #[error("Serde error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Custom error: {0}")]
    Custom(String),
}

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding provider error: {0}")]
    Provider(String),
    #[error("embedding dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("vector store transport error: {0}")]
    Transport(String),
    #[error("collection '{collection}' not found: {message}")]
    CollectionNotFound { collection: String, message: String },
    #[error("vector dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
    #[error("invalid vector store response: {0}")]
    InvalidResponse(String),
    #[error("vector store returned status {status}: {message}")]
    HttpStatus { status: u16, message: String },
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("web search transport error: {0}")]
    Transport(String),
    #[error("web search returned status {status}: {message}")]
    HttpStatus { status: u16, message: String },
    #[error("invalid web search response: {0}")]
    InvalidResponse(String),
}
