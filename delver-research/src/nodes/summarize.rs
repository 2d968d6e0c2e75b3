use std::sync::Arc;

use delver_core::DelverError;
use delver_graph::{GraphNode, GraphState, NodeContext, StateUpdate};

use crate::state::ResearchState;
use crate::tools::Toolbox;

/// Folds the pass's new hits into the running summary. Always leaves a
/// non-empty summary behind so the finalizer never starts from nothing.
pub struct SummarizeSourcesNode {
    tools: Arc<Toolbox>,
}

impl SummarizeSourcesNode {
    pub fn new(tools: Arc<Toolbox>) -> Self {
        Self { tools }
    }
}

#[async_trait::async_trait]
impl GraphNode<ResearchState> for SummarizeSourcesNode {
    async fn run(
        &self,
        input: GraphState<ResearchState>,
        ctx: &NodeContext,
    ) -> Result<StateUpdate<ResearchState>, DelverError> {
        let state = &input.data;
        let writer = &ctx.writer;
        let new_hits = state.unsummarized_sources().to_vec();

        let mut update = ResearchState::default();
        if new_hits.is_empty() {
            writer.write("no new material to summarize");
            if state.running_summary.is_empty() {
                update.running_summary = if state.queries.is_empty() {
                    format!("No queries could be generated for \"{}\".", state.topic)
                } else {
                    format!("No sources were gathered for \"{}\".", state.topic)
                };
            }
        } else {
            let summary = self
                .tools
                .summarize(&state.topic, &new_hits, &state.running_summary, writer)
                .await?;
            update.running_summary = summary;
            update.summarized_sources = new_hits.len() as u32;
        }

        update.logs = writer.drain();
        Ok(StateUpdate::new(update))
    }
}
