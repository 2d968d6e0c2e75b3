use std::sync::Arc;

use serde::Deserialize;

use delver_core::{parse_json, DelverError};
use delver_graph::{GraphNode, GraphState, NodeContext, StateUpdate};

use crate::prompt_vars;
use crate::prompts;
use crate::state::{ResearchState, Strategy};
use crate::tools::Toolbox;

#[derive(Debug, Deserialize)]
struct PlannerDecision {
    strategy: Strategy,
    #[serde(default)]
    plan: String,
    #[serde(default)]
    rationale: String,
    #[serde(default)]
    udf_strategy: String,
}

/// Picks SIMPLE_RAG or DYNAMIC_STRATEGY for the topic. Unparseable or
/// failing planner output downgrades to SIMPLE_RAG with the topic as plan.
pub struct PlannerNode {
    tools: Arc<Toolbox>,
}

impl PlannerNode {
    pub fn new(tools: Arc<Toolbox>) -> Self {
        Self { tools }
    }

    async fn decide(&self, state: &ResearchState) -> Option<PlannerDecision> {
        let prompt = prompts::PLANNER.render(&prompt_vars! {
            "topic" => state.topic,
            "report_organization" => state.report_organization,
        });
        for _attempt in 0..2 {
            let content = match self
                .tools
                .chat(&self.tools.config().reasoning_model, prompt.clone(), true)
                .await
            {
                Ok(content) => content,
                Err(err) => {
                    tracing::warn!(error = %err, "planner call failed");
                    return None;
                }
            };
            match parse_json::<PlannerDecision>(&content) {
                Ok(decision) => return Some(decision),
                Err(err) => tracing::debug!(error = %err, "planner output unparseable"),
            }
        }
        None
    }
}

#[async_trait::async_trait]
impl GraphNode<ResearchState> for PlannerNode {
    async fn run(
        &self,
        input: GraphState<ResearchState>,
        ctx: &NodeContext,
    ) -> Result<StateUpdate<ResearchState>, DelverError> {
        let state = &input.data;
        let writer = &ctx.writer;

        let mut update = ResearchState::default();
        match self.decide(state).await {
            Some(mut decision) => {
                if decision.strategy == Strategy::DynamicStrategy
                    && decision.udf_strategy.trim().is_empty()
                {
                    writer.write("planner chose DYNAMIC_STRATEGY without a plan; using SIMPLE_RAG");
                    decision.strategy = Strategy::SimpleRag;
                }
                let strategy_name = match decision.strategy {
                    Strategy::SimpleRag => "SIMPLE_RAG",
                    Strategy::DynamicStrategy => "DYNAMIC_STRATEGY",
                };
                writer.write(format!(
                    "planner selected {strategy_name}: {}",
                    decision.rationale
                ));
                update.plan = if decision.plan.is_empty() {
                    state.topic.clone()
                } else {
                    decision.plan
                };
                update.strategy = decision.strategy;
                if decision.strategy == Strategy::DynamicStrategy {
                    update.udf_strategy = decision.udf_strategy;
                }
            }
            None => {
                writer.write("planner unavailable; defaulting to SIMPLE_RAG");
                update.plan = state.topic.clone();
                update.strategy = Strategy::SimpleRag;
            }
        }

        update.logs = writer.drain();
        Ok(StateUpdate::new(update))
    }
}
