use std::sync::Arc;

use delver_core::DelverError;
use delver_graph::{GraphNode, GraphState, NodeContext, StateUpdate};

use crate::state::ResearchState;
use crate::tools::Toolbox;

/// Generates the pass's search queries. Generation failure is fatal for the
/// run (`QueryGenerationFailed`).
pub struct GenerateQueryNode {
    tools: Arc<Toolbox>,
}

impl GenerateQueryNode {
    pub fn new(tools: Arc<Toolbox>) -> Self {
        Self { tools }
    }
}

#[async_trait::async_trait]
impl GraphNode<ResearchState> for GenerateQueryNode {
    async fn run(
        &self,
        input: GraphState<ResearchState>,
        ctx: &NodeContext,
    ) -> Result<StateUpdate<ResearchState>, DelverError> {
        let state = &input.data;
        let writer = &ctx.writer;

        let queries = self
            .tools
            .generate_queries(
                &state.topic,
                &state.report_organization,
                self.tools.config().queries_per_pass,
                writer,
            )
            .await?;

        if queries.is_empty() {
            writer.write("no queries generated");
        }

        let mut update = ResearchState {
            queries,
            ..ResearchState::default()
        };
        update.logs = writer.drain();
        Ok(StateUpdate::new(update))
    }
}
