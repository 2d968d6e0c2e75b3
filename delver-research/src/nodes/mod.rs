mod finalize;
mod generate;
mod planner;
mod reflect;
mod research;
mod summarize;
mod udf_exec;

pub use finalize::FinalizeSummaryNode;
pub use generate::GenerateQueryNode;
pub use planner::PlannerNode;
pub use reflect::ReflectOnSummaryNode;
pub use research::WebResearchNode;
pub use summarize::SummarizeSourcesNode;
pub use udf_exec::UdfExecutionNode;
