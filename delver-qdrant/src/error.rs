use delver_core::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QdrantStoreError {
    #[error("qdrant transport error: {0}")]
    Transport(String),
    #[error("qdrant returned status {status}: {message}")]
    HttpStatus { status: u16, message: String },
    #[error("collection '{collection}' not found: {message}")]
    CollectionNotFound { collection: String, message: String },
    #[error("invalid qdrant response: {message}")]
    InvalidResponse { message: String },
}

impl From<reqwest::Error> for QdrantStoreError {
    fn from(err: reqwest::Error) -> Self {
        QdrantStoreError::Transport(err.to_string())
    }
}

impl From<QdrantStoreError> for StoreError {
    fn from(err: QdrantStoreError) -> Self {
        match err {
            QdrantStoreError::Transport(message) => StoreError::Transport(message),
            QdrantStoreError::HttpStatus { status, message } => {
                StoreError::HttpStatus { status, message }
            }
            QdrantStoreError::CollectionNotFound {
                collection,
                message,
            } => StoreError::CollectionNotFound {
                collection,
                message,
            },
            QdrantStoreError::InvalidResponse { message } => StoreError::InvalidResponse(message),
        }
    }
}
