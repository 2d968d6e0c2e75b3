use std::sync::Arc;

use delver_core::DelverError;
use delver_graph::{GraphNode, GraphState, NodeContext, StateUpdate};

use crate::state::ResearchState;
use crate::tools::Toolbox;

/// Composes the final report and appends the citation block.
pub struct FinalizeSummaryNode {
    tools: Arc<Toolbox>,
}

impl FinalizeSummaryNode {
    pub fn new(tools: Arc<Toolbox>) -> Self {
        Self { tools }
    }
}

#[async_trait::async_trait]
impl GraphNode<ResearchState> for FinalizeSummaryNode {
    async fn run(
        &self,
        input: GraphState<ResearchState>,
        ctx: &NodeContext,
    ) -> Result<StateUpdate<ResearchState>, DelverError> {
        let state = &input.data;
        let writer = &ctx.writer;

        let final_report = self
            .tools
            .finalize(
                &state.topic,
                &state.report_organization,
                &state.running_summary,
                &state.sources,
                writer,
            )
            .await?;

        let mut update = ResearchState::default();
        update.final_report = if final_report.citations.is_empty() {
            final_report.report
        } else {
            format!("{}\n\n{}", final_report.report, final_report.citations)
        };
        update.citations = final_report.citations;
        writer.write("research complete");
        update.logs = writer.drain();
        Ok(StateUpdate::new(update))
    }
}
