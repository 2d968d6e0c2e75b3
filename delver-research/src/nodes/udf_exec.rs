use std::sync::Arc;

use delver_core::DelverError;
use delver_graph::{GraphNode, GraphState, NodeContext, StateUpdate};

use crate::state::ResearchState;
use crate::tools::Toolbox;
use crate::udf::UdfEngine;

/// Runs the compiled dynamic strategy. On success the run is complete; on
/// failure the node marks the state so routing falls back to the standard
/// pipeline at query generation.
pub struct UdfExecutionNode {
    engine: UdfEngine,
}

impl UdfExecutionNode {
    pub fn new(tools: Arc<Toolbox>) -> Self {
        Self {
            engine: UdfEngine::new(tools),
        }
    }
}

#[async_trait::async_trait]
impl GraphNode<ResearchState> for UdfExecutionNode {
    async fn run(
        &self,
        input: GraphState<ResearchState>,
        ctx: &NodeContext,
    ) -> Result<StateUpdate<ResearchState>, DelverError> {
        let state = &input.data;
        let writer = &ctx.writer;

        let outcome = self.engine.run(state, writer).await;

        let mut update = ResearchState::default();
        // Retrieval side effects are kept even when the program fails.
        update.sources = outcome.sources;
        if outcome.success {
            update.final_report = if outcome.citations.is_empty() {
                outcome.report
            } else {
                format!("{}\n\n{}", outcome.report, outcome.citations)
            };
            update.citations = outcome.citations;
            writer.write("dynamic strategy completed");
        } else {
            update.udf_failed = true;
            writer.write(format!(
                "UDF failed, falling back to SIMPLE_RAG: {}",
                outcome.error.unwrap_or_else(|| "unknown error".to_string())
            ));
        }

        update.logs = writer.drain();
        Ok(StateUpdate::new(update))
    }
}
