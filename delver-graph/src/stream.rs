use crate::StateSchema;

/// Events yielded while driving a graph. `NodeCompleted` carries the shared
/// state after the node's update was merged; `Finished` carries the terminal
/// state once routing reached `END`.
#[derive(Debug, Clone)]
pub enum GraphEvent<S: StateSchema> {
    NodeStarted { node: String },
    NodeCompleted { node: String, state: S },
    Finished { state: S },
}
