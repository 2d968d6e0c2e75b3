mod config;
mod error;
mod graph;
mod reducer;
mod state;
mod stream;
mod writer;

pub use config::ExecutionConfig;
pub use error::GraphError;
pub use graph::{Condition, ExecutableGraph, GraphBuilder, GraphNode, NodeContext};
pub use reducer::{AddCounter, AppendVec, Override, OverwriteIfSet};
pub use state::{GraphState, StateSchema, StateUpdate};
pub use stream::GraphEvent;
pub use writer::StepWriter;

pub const END: &str = "__end";
