use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::StoreError;

/// One scored chunk returned by an ANN search against a collection.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct ChunkHit {
    pub text: String,
    pub source: String,
    pub chunk_index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    pub score: f32,
}

/// A search handle bound to one named collection for the duration of a
/// request scope.
#[async_trait]
pub trait VectorIndex: Send + Sync + std::fmt::Debug {
    async fn search(&self, embedding: &[f32], limit: usize) -> Result<Vec<ChunkHit>, StoreError>;
}

/// Process-wide vector store connection. `open` validates the collection
/// and returns a per-request [`VectorIndex`].
#[async_trait]
pub trait VectorBackend: Send + Sync {
    async fn open(&self, collection: &str) -> Result<Box<dyn VectorIndex>, StoreError>;
}

#[async_trait]
impl<T: VectorBackend + ?Sized> VectorBackend for std::sync::Arc<T> {
    async fn open(&self, collection: &str) -> Result<Box<dyn VectorIndex>, StoreError> {
        self.as_ref().open(collection).await
    }
}
