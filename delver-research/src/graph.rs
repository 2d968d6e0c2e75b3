use std::sync::Arc;

use delver_graph::{ExecutableGraph, ExecutionConfig, GraphBuilder, GraphError, END};

use crate::nodes::{
    FinalizeSummaryNode, GenerateQueryNode, PlannerNode, ReflectOnSummaryNode,
    SummarizeSourcesNode, UdfExecutionNode, WebResearchNode,
};
use crate::state::{ResearchState, Strategy};
use crate::tools::Toolbox;

pub const PLANNER: &str = "planner";
pub const GENERATE_QUERY: &str = "generate_query";
pub const WEB_RESEARCH: &str = "web_research";
pub const SUMMARIZE_SOURCES: &str = "summarize_sources";
pub const REFLECT_ON_SUMMARY: &str = "reflect_on_summary";
pub const FINALIZE_SUMMARY: &str = "finalize_summary";
pub const UDF_EXECUTION: &str = "udf_execution";

/// Wires the research graph:
///
/// ```text
/// planner ──► generate_query ──► web_research ──► summarize_sources ──► reflect_on_summary ──► finalize_summary ──► END
///    │              │                  ▲                                     │
///    │              └──(no queries)────┼──────► summarize_sources            └──(follow-ups)──► web_research
///    └──► udf_execution ──(ok)──► END  │
///                 └──(failed)──► generate_query
/// ```
pub fn build_research_graph(tools: Arc<Toolbox>) -> Result<ExecutableGraph<ResearchState>, GraphError> {
    let deadline = tools.config().request_deadline;

    GraphBuilder::new()
        .add_node(PLANNER, PlannerNode::new(tools.clone()))
        .add_node(GENERATE_QUERY, GenerateQueryNode::new(tools.clone()))
        .add_node(WEB_RESEARCH, WebResearchNode::new(tools.clone()))
        .add_node(SUMMARIZE_SOURCES, SummarizeSourcesNode::new(tools.clone()))
        .add_node(REFLECT_ON_SUMMARY, ReflectOnSummaryNode::new(tools.clone()))
        .add_node(FINALIZE_SUMMARY, FinalizeSummaryNode::new(tools.clone()))
        .add_node(UDF_EXECUTION, UdfExecutionNode::new(tools))
        .set_entry(PLANNER)
        .add_conditional_edge(PLANNER, |state: &ResearchState| {
            match state.strategy {
                Strategy::DynamicStrategy => UDF_EXECUTION,
                Strategy::SimpleRag => GENERATE_QUERY,
            }
            .to_string()
        })
        .add_conditional_edge(UDF_EXECUTION, |state: &ResearchState| {
            if state.udf_failed {
                GENERATE_QUERY.to_string()
            } else {
                END.to_string()
            }
        })
        .add_conditional_edge(GENERATE_QUERY, |state: &ResearchState| {
            if state.pending_queries().is_empty() {
                SUMMARIZE_SOURCES.to_string()
            } else {
                WEB_RESEARCH.to_string()
            }
        })
        .add_edge(WEB_RESEARCH, SUMMARIZE_SOURCES)
        .add_edge(SUMMARIZE_SOURCES, REFLECT_ON_SUMMARY)
        .add_conditional_edge(REFLECT_ON_SUMMARY, |state: &ResearchState| {
            if state.pending_queries().is_empty() {
                FINALIZE_SUMMARY.to_string()
            } else {
                WEB_RESEARCH.to_string()
            }
        })
        .add_edge(FINALIZE_SUMMARY, END)
        .with_default_config(ExecutionConfig {
            deadline: Some(deadline),
            ..ExecutionConfig::default()
        })
        .build()
}
