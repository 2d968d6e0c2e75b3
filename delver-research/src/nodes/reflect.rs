use std::sync::Arc;

use delver_core::DelverError;
use delver_graph::{GraphNode, GraphState, NodeContext, StateUpdate};

use crate::state::{GeneratedQuery, ResearchState};
use crate::tools::Toolbox;

/// Bounded reflection: identifies gaps in the running summary and queues at
/// most two follow-up queries for a second retrieval pass. A reflection
/// failure is not fatal; the run proceeds to finalization.
pub struct ReflectOnSummaryNode {
    tools: Arc<Toolbox>,
}

impl ReflectOnSummaryNode {
    pub fn new(tools: Arc<Toolbox>) -> Self {
        Self { tools }
    }
}

#[async_trait::async_trait]
impl GraphNode<ResearchState> for ReflectOnSummaryNode {
    async fn run(
        &self,
        input: GraphState<ResearchState>,
        ctx: &NodeContext,
    ) -> Result<StateUpdate<ResearchState>, DelverError> {
        let state = &input.data;
        let writer = &ctx.writer;
        let limit = self.tools.config().reflection_limit;

        let mut update = ResearchState::default();
        if state.queries.is_empty() {
            writer.write("skipping reflection: no queries were generated");
        } else if state.reflection_count >= limit {
            writer.write(format!("reflection limit ({limit}) reached"));
        } else {
            match self
                .tools
                .reflect(&state.topic, &state.running_summary, writer)
                .await
            {
                Ok(reflection) if !reflection.follow_up_queries.is_empty() => {
                    let gap = reflection.gap;
                    writer.write(format!(
                        "gap identified: {gap}; queuing {} follow-up queries",
                        reflection.follow_up_queries.len()
                    ));
                    update.reflection_count = 1;
                    update.queries = reflection
                        .follow_up_queries
                        .into_iter()
                        .map(|query| GeneratedQuery {
                            query,
                            report_section: "follow-up".to_string(),
                            rationale: gap.clone(),
                        })
                        .collect();
                }
                Ok(_) => writer.write("no gaps identified"),
                Err(err) => {
                    writer.write(format!("reflection unavailable: {err}"));
                    tracing::warn!(error = %err, "reflection call failed");
                }
            }
        }

        update.logs = writer.drain();
        Ok(StateUpdate::new(update))
    }
}
