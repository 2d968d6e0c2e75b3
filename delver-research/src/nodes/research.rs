use std::sync::Arc;

use delver_core::DelverError;
use delver_graph::{GraphNode, GraphState, NodeContext, StateUpdate};

use crate::state::{PerQueryResult, ResearchState};
use crate::tools::Toolbox;

/// Per-query retrieval: RAG first, relevance judgment, web fallback. Web
/// search fires unconditionally when the collection is empty so a web-only
/// run is possible. Processes only queries that have no per-query result
/// yet, so the reflection backedge re-enters cleanly.
pub struct WebResearchNode {
    tools: Arc<Toolbox>,
}

impl WebResearchNode {
    pub fn new(tools: Arc<Toolbox>) -> Self {
        Self { tools }
    }
}

#[async_trait::async_trait]
impl GraphNode<ResearchState> for WebResearchNode {
    async fn run(
        &self,
        input: GraphState<ResearchState>,
        ctx: &NodeContext,
    ) -> Result<StateUpdate<ResearchState>, DelverError> {
        let state = &input.data;
        let writer = &ctx.writer;
        let pending = state.pending_queries().to_vec();

        let mut update = ResearchState::default();
        for query in pending {
            let rag_hits = self
                .tools
                .search_rag(&state.collection, &query.query, writer)
                .await;

            let needs_web = if state.collection.is_empty() {
                // No collection: the judge has nothing to score and web
                // search must fire regardless.
                true
            } else {
                let candidate = rag_hits
                    .iter()
                    .map(|hit| hit.text.as_str())
                    .collect::<Vec<_>>()
                    .join("\n");
                let judgment = self
                    .tools
                    .judge_relevance(&query.query, &candidate, writer)
                    .await;
                writer.write(format!(
                    "relevance of documents for '{}': {}",
                    query.query, judgment.score
                ));
                !judgment.is_relevant()
            };

            let web_hits = if needs_web && state.search_web {
                self.tools.search_web(&query.query, writer).await
            } else {
                Vec::new()
            };

            if rag_hits.is_empty() && web_hits.is_empty() {
                writer.write(format!("no sources for query '{}'", query.query));
            }

            update.per_query_results.push(PerQueryResult {
                query: query.query.clone(),
                web: web_hits.first().cloned(),
                rag: rag_hits.first().cloned(),
            });
            update.sources.extend(rag_hits);
            update.sources.extend(web_hits);
        }

        update.logs = writer.drain();
        Ok(StateUpdate::new(update))
    }
}
