use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_stream::try_stream;
use delver_core::DelverError;
use futures::stream::{BoxStream, StreamExt};

use crate::{
    ExecutionConfig, GraphError, GraphEvent, GraphState, StateSchema, StateUpdate, StepWriter, END,
};

pub type Condition<S> = Box<dyn Fn(&S) -> String + Send + Sync>;

/// Per-invocation context handed to a node: its name and a fresh
/// step-scoped writer.
pub struct NodeContext {
    pub node: String,
    pub writer: StepWriter,
}

#[async_trait::async_trait]
pub trait GraphNode<S: StateSchema>: Send + Sync {
    async fn run(
        &self,
        state: GraphState<S>,
        ctx: &NodeContext,
    ) -> Result<StateUpdate<S>, DelverError>;
}

pub struct GraphBuilder<S: StateSchema> {
    nodes: HashMap<String, Arc<dyn GraphNode<S>>>,
    edges: HashMap<String, String>,
    conditional: HashMap<String, Condition<S>>,
    default_config: ExecutionConfig,
    entry: Option<String>,
}

impl<S: StateSchema> Default for GraphBuilder<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: StateSchema> GraphBuilder<S> {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            edges: HashMap::new(),
            conditional: HashMap::new(),
            default_config: ExecutionConfig::default(),
            entry: None,
        }
    }

    pub fn add_node<N>(mut self, name: &str, node: N) -> Self
    where
        N: GraphNode<S> + 'static,
    {
        self.nodes.insert(name.to_string(), Arc::new(node));
        self
    }

    pub fn set_entry(mut self, name: &str) -> Self {
        self.entry = Some(name.to_string());
        self
    }

    pub fn add_edge(mut self, from: &str, to: &str) -> Self {
        self.edges.insert(from.to_string(), to.to_string());
        self
    }

    pub fn add_conditional_edge<F>(mut self, from: &str, condition: F) -> Self
    where
        F: Fn(&S) -> String + Send + Sync + 'static,
    {
        self.conditional
            .insert(from.to_string(), Box::new(condition));
        self
    }

    pub fn with_default_config(mut self, config: ExecutionConfig) -> Self {
        self.default_config = config;
        self
    }

    pub fn build(self) -> Result<ExecutableGraph<S>, GraphError> {
        let entry = self.entry.ok_or_else(|| GraphError::MissingNode {
            node: "<entry>".to_string(),
        })?;
        if !self.nodes.contains_key(&entry) {
            return Err(GraphError::MissingNode { node: entry });
        }
        for to in self.edges.values() {
            if to != END && !self.nodes.contains_key(to) {
                return Err(GraphError::InvalidEdge { node: to.clone() });
            }
        }
        Ok(ExecutableGraph {
            nodes: self.nodes,
            edges: self.edges,
            conditional: self.conditional,
            default_config: self.default_config,
            entry,
        })
    }
}

pub struct ExecutableGraph<S: StateSchema> {
    nodes: HashMap<String, Arc<dyn GraphNode<S>>>,
    edges: HashMap<String, String>,
    conditional: HashMap<String, Condition<S>>,
    default_config: ExecutionConfig,
    entry: String,
}

impl<S: StateSchema> ExecutableGraph<S> {
    /// Drives the graph one node at a time, merging each returned update
    /// into the shared state and yielding the post-state. The stream is
    /// pull-based: a dropped consumer cancels execution at the next
    /// suspension point.
    pub fn stream_invoke(&self, initial: S) -> BoxStream<'_, Result<GraphEvent<S>, GraphError>> {
        self.stream_invoke_with_config(initial, self.default_config.clone())
    }

    pub fn stream_invoke_with_config(
        &self,
        initial: S,
        config: ExecutionConfig,
    ) -> BoxStream<'_, Result<GraphEvent<S>, GraphError>> {
        try_stream! {
            let started = Instant::now();
            let mut state = initial;
            let mut current = self.entry.clone();
            let mut steps = 0usize;

            loop {
                if let Some(max) = config.max_steps {
                    if steps >= max {
                        Err(GraphError::MaxStepsExceeded { max, reached: steps })?;
                    }
                }
                if let Some(deadline) = config.deadline {
                    if started.elapsed() > deadline {
                        Err(GraphError::DeadlineExceeded {
                            elapsed: started.elapsed(),
                        })?;
                    }
                }

                let node = self
                    .nodes
                    .get(&current)
                    .ok_or_else(|| GraphError::MissingNode {
                        node: current.clone(),
                    })?
                    .clone();
                steps += 1;

                yield GraphEvent::NodeStarted {
                    node: current.clone(),
                };

                let ctx = NodeContext {
                    node: current.clone(),
                    writer: StepWriter::new(),
                };
                let future = node.run(GraphState::new(state.clone()), &ctx);
                let invoked = match config.node_timeout {
                    Some(timeout) => match tokio::time::timeout(timeout, future).await {
                        Ok(result) => result,
                        Err(_) => Err(DelverError::Timeout(timeout)),
                    },
                    None => future.await,
                };
                let update = invoked.map_err(|source| GraphError::NodeFailed {
                    node: current.clone(),
                    source,
                })?;

                state = S::merge(&state, update.data);

                yield GraphEvent::NodeCompleted {
                    node: current.clone(),
                    state: state.clone(),
                };

                let next = if let Some(condition) = self.conditional.get(&current) {
                    condition(&state)
                } else if let Some(to) = self.edges.get(&current) {
                    to.clone()
                } else {
                    END.to_string()
                };

                if next == END {
                    break;
                }
                if !self.nodes.contains_key(&next) {
                    Err(GraphError::InvalidEdge { node: next.clone() })?;
                }
                current = next;
            }

            yield GraphEvent::Finished { state };
        }
        .boxed()
    }

    /// Runs the graph to completion and returns the terminal state.
    pub async fn invoke(&self, initial: S) -> Result<S, GraphError> {
        let mut stream = self.stream_invoke(initial);
        let mut terminal = None;
        while let Some(event) = stream.next().await {
            if let GraphEvent::Finished { state } = event? {
                terminal = Some(state);
            }
        }
        terminal.ok_or_else(|| GraphError::MissingNode {
            node: self.entry.clone(),
        })
    }
}
