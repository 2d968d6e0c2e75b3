use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;

use delver_core::{Citation, Embedding, Origin, SourceHit, VectorBackend};
use delver_graph::StepWriter;

/// Retrieval adapter: embeds a query and searches the named collection,
/// returning cited hits. Every failure is downgraded to an empty result;
/// the enclosing graph proceeds with what it has.
pub struct RagRetriever {
    embedder: Arc<dyn Embedding>,
    backend: Option<Arc<dyn VectorBackend>>,
    topk: usize,
    embed_timeout: Duration,
    store_timeout: Duration,
}

impl RagRetriever {
    pub fn new(
        embedder: Arc<dyn Embedding>,
        backend: Option<Arc<dyn VectorBackend>>,
        topk: usize,
        embed_timeout: Duration,
        store_timeout: Duration,
    ) -> Self {
        Self {
            embedder,
            backend,
            topk,
            embed_timeout,
            store_timeout,
        }
    }

    pub async fn retrieve(
        &self,
        collection: &str,
        query: &str,
        writer: &StepWriter,
    ) -> Vec<SourceHit> {
        if collection.is_empty() {
            return Vec::new();
        }
        let Some(backend) = &self.backend else {
            writer.write("vector store not configured; skipping document retrieval");
            tracing::warn!("vector store backend missing while collection is set");
            return Vec::new();
        };

        let embedding = match timeout(self.embed_timeout, self.embedder.embed(query)).await {
            Ok(Ok(embedding)) => embedding,
            Ok(Err(err)) => {
                writer.write(format!("document retrieval unavailable: {err}"));
                tracing::warn!(%query, error = %err, "embedding failed");
                return Vec::new();
            }
            Err(_) => {
                writer.write("document retrieval unavailable: embedding timed out");
                tracing::warn!(%query, "embedding timed out");
                return Vec::new();
            }
        };

        // The index handle lives for this call only; it is the per-request
        // collection scope.
        let search = async {
            let index = backend.open(collection).await?;
            index.search(&embedding, self.topk).await
        };
        let hits = match timeout(self.store_timeout, search).await {
            Ok(Ok(hits)) => hits,
            Ok(Err(err)) => {
                writer.write(format!("document retrieval unavailable: {err}"));
                tracing::warn!(%collection, error = %err, "vector search failed");
                return Vec::new();
            }
            Err(_) => {
                writer.write("document retrieval unavailable: vector store timed out");
                tracing::warn!(%collection, "vector search timed out");
                return Vec::new();
            }
        };

        hits.into_iter()
            .filter(|hit| !hit.text.trim().is_empty())
            .map(|hit| {
                SourceHit::new(
                    hit.text,
                    Origin::Rag,
                    Citation::document(hit.source, hit.chunk_index, hit.page),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use delver_core::{ChunkHit, EmbeddingError, StoreError, VectorIndex};

    struct FixedEmbedder;

    #[async_trait]
    impl Embedding for FixedEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
            Ok(vec![0.1, 0.2])
        }

        fn dimension(&self) -> usize {
            2
        }
    }

    struct FixedBackend {
        hits: Vec<ChunkHit>,
    }

    #[derive(Debug)]
    struct FixedIndex {
        hits: Vec<ChunkHit>,
    }

    #[async_trait]
    impl VectorIndex for FixedIndex {
        async fn search(
            &self,
            _embedding: &[f32],
            _limit: usize,
        ) -> Result<Vec<ChunkHit>, StoreError> {
            Ok(self.hits.clone())
        }
    }

    #[async_trait]
    impl VectorBackend for FixedBackend {
        async fn open(&self, _collection: &str) -> Result<Box<dyn VectorIndex>, StoreError> {
            Ok(Box::new(FixedIndex {
                hits: self.hits.clone(),
            }))
        }
    }

    struct FailingBackend;

    #[async_trait]
    impl VectorBackend for FailingBackend {
        async fn open(&self, collection: &str) -> Result<Box<dyn VectorIndex>, StoreError> {
            Err(StoreError::CollectionNotFound {
                collection: collection.to_string(),
                message: "missing".to_string(),
            })
        }
    }

    fn retriever(backend: Option<Arc<dyn VectorBackend>>) -> RagRetriever {
        RagRetriever::new(
            Arc::new(FixedEmbedder),
            backend,
            4,
            Duration::from_secs(1),
            Duration::from_secs(1),
        )
    }

    #[tokio::test]
    async fn empty_collection_short_circuits_without_logging() {
        let writer = StepWriter::new();
        let hits = retriever(None).retrieve("", "q", &writer).await;
        assert!(hits.is_empty());
        assert!(writer.is_empty());
    }

    #[tokio::test]
    async fn maps_chunks_and_discards_empty_text() {
        let backend = FixedBackend {
            hits: vec![
                ChunkHit {
                    text: "tariff schedule".into(),
                    source: "hts.pdf".into(),
                    chunk_index: 1,
                    page: Some(3),
                    score: 0.9,
                },
                ChunkHit {
                    text: "   ".into(),
                    source: "blank.pdf".into(),
                    chunk_index: 0,
                    page: None,
                    score: 0.5,
                },
            ],
        };
        let writer = StepWriter::new();
        let hits = retriever(Some(Arc::new(backend)))
            .retrieve("us_tariffs", "q", &writer)
            .await;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].origin, Origin::Rag);
        assert_eq!(
            hits[0].citation,
            Citation::document("hts.pdf", 1, Some(3))
        );
    }

    #[tokio::test]
    async fn store_failure_degrades_to_empty_with_log() {
        let writer = StepWriter::new();
        let hits = retriever(Some(Arc::new(FailingBackend)))
            .retrieve("ghost", "q", &writer)
            .await;
        assert!(hits.is_empty());
        assert!(!writer.is_empty());
    }
}
