use std::time::Duration;

use delver_core::DelverError;
use delver_graph::{
    AddCounter, AppendVec, ExecutionConfig, GraphBuilder, GraphEvent, GraphError, GraphNode,
    GraphState, NodeContext, OverwriteIfSet, StateSchema, StateUpdate, END,
};
use futures::StreamExt;

#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
struct DemoState {
    hops: u32,
    logs: Vec<String>,
    label: String,
}

impl StateSchema for DemoState {
    fn merge(current: &Self, update: Self) -> Self {
        Self {
            hops: AddCounter::merge(&current.hops, update.hops),
            logs: AppendVec::merge(&current.logs, update.logs),
            label: OverwriteIfSet::merge(&current.label, update.label),
        }
    }
}

struct HopNode;

#[async_trait::async_trait]
impl GraphNode<DemoState> for HopNode {
    async fn run(
        &self,
        _state: GraphState<DemoState>,
        ctx: &NodeContext,
    ) -> Result<StateUpdate<DemoState>, DelverError> {
        ctx.writer.write(format!("visited {}", ctx.node));
        Ok(StateUpdate::new(DemoState {
            hops: 1,
            logs: ctx.writer.drain(),
            label: String::new(),
        }))
    }
}

struct LabelNode(&'static str);

#[async_trait::async_trait]
impl GraphNode<DemoState> for LabelNode {
    async fn run(
        &self,
        _state: GraphState<DemoState>,
        _ctx: &NodeContext,
    ) -> Result<StateUpdate<DemoState>, DelverError> {
        Ok(StateUpdate::new(DemoState {
            hops: 1,
            logs: vec![],
            label: self.0.to_string(),
        }))
    }
}

struct FailingNode;

#[async_trait::async_trait]
impl GraphNode<DemoState> for FailingNode {
    async fn run(
        &self,
        _state: GraphState<DemoState>,
        _ctx: &NodeContext,
    ) -> Result<StateUpdate<DemoState>, DelverError> {
        Err(DelverError::Custom("boom".to_string()))
    }
}

struct SlowNode;

#[async_trait::async_trait]
impl GraphNode<DemoState> for SlowNode {
    async fn run(
        &self,
        _state: GraphState<DemoState>,
        _ctx: &NodeContext,
    ) -> Result<StateUpdate<DemoState>, DelverError> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(StateUpdate::new(DemoState::default()))
    }
}

#[tokio::test]
async fn linear_graph_merges_updates_in_order() {
    let graph = GraphBuilder::new()
        .add_node("a", HopNode)
        .add_node("b", HopNode)
        .set_entry("a")
        .add_edge("a", "b")
        .add_edge("b", END)
        .build()
        .unwrap();

    let state = graph.invoke(DemoState::default()).await.unwrap();
    assert_eq!(state.hops, 2);
    assert_eq!(state.logs, vec!["visited a", "visited b"]);
}

#[tokio::test]
async fn stream_emits_post_state_per_node_then_finished() {
    let graph = GraphBuilder::new()
        .add_node("a", HopNode)
        .add_node("b", HopNode)
        .set_entry("a")
        .add_edge("a", "b")
        .add_edge("b", END)
        .build()
        .unwrap();

    let events: Vec<_> = graph
        .stream_invoke(DemoState::default())
        .collect::<Vec<_>>()
        .await;
    let mut completed = Vec::new();
    let mut finished = 0;
    for event in events {
        match event.unwrap() {
            GraphEvent::NodeCompleted { node, state } => completed.push((node, state.hops)),
            GraphEvent::Finished { state } => {
                finished += 1;
                assert_eq!(state.hops, 2);
            }
            GraphEvent::NodeStarted { .. } => {}
        }
    }
    assert_eq!(completed, vec![("a".to_string(), 1), ("b".to_string(), 2)]);
    assert_eq!(finished, 1);
}

#[tokio::test]
async fn conditional_edge_routes_on_state() {
    let graph = GraphBuilder::new()
        .add_node("pick", LabelNode("left"))
        .add_node("left", HopNode)
        .add_node("right", HopNode)
        .set_entry("pick")
        .add_conditional_edge("pick", |state: &DemoState| state.label.clone())
        .add_edge("left", END)
        .add_edge("right", END)
        .build()
        .unwrap();

    let state = graph.invoke(DemoState::default()).await.unwrap();
    assert_eq!(state.logs, vec!["visited left"]);
}

#[tokio::test]
async fn node_failure_surfaces_as_node_failed() {
    let graph = GraphBuilder::new()
        .add_node("a", FailingNode)
        .set_entry("a")
        .build()
        .unwrap();

    let err = graph.invoke(DemoState::default()).await.unwrap_err();
    match err {
        GraphError::NodeFailed { node, .. } => assert_eq!(node, "a"),
        other => panic!("expected NodeFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn max_steps_bounds_cyclic_routing() {
    let graph = GraphBuilder::new()
        .add_node("a", HopNode)
        .add_node("b", HopNode)
        .set_entry("a")
        .add_edge("a", "b")
        .add_edge("b", "a")
        .with_default_config(ExecutionConfig {
            max_steps: Some(5),
            ..ExecutionConfig::default()
        })
        .build()
        .unwrap();

    let err = graph.invoke(DemoState::default()).await.unwrap_err();
    assert!(matches!(err, GraphError::MaxStepsExceeded { max: 5, .. }));
}

#[tokio::test]
async fn deadline_is_checked_at_node_boundary() {
    let graph = GraphBuilder::new()
        .add_node("a", HopNode)
        .add_node("b", HopNode)
        .set_entry("a")
        .add_edge("a", "b")
        .add_edge("b", "a")
        .with_default_config(ExecutionConfig {
            deadline: Some(Duration::ZERO),
            ..ExecutionConfig::default()
        })
        .build()
        .unwrap();

    let mut stream = graph.stream_invoke(DemoState::default());
    let mut saw_deadline = false;
    while let Some(event) = stream.next().await {
        if let Err(GraphError::DeadlineExceeded { .. }) = event {
            saw_deadline = true;
            break;
        }
    }
    assert!(saw_deadline);
}

#[tokio::test]
async fn node_timeout_maps_to_timeout_failure() {
    let graph = GraphBuilder::new()
        .add_node("slow", SlowNode)
        .set_entry("slow")
        .with_default_config(ExecutionConfig {
            node_timeout: Some(Duration::from_millis(20)),
            ..ExecutionConfig::default()
        })
        .build()
        .unwrap();

    let err = graph.invoke(DemoState::default()).await.unwrap_err();
    match err {
        GraphError::NodeFailed { source, .. } => {
            assert!(matches!(source, DelverError::Timeout(_)));
        }
        other => panic!("expected NodeFailed(Timeout), got {other:?}"),
    }
}

#[tokio::test]
async fn build_rejects_edges_to_unknown_nodes() {
    let err = GraphBuilder::new()
        .add_node("a", HopNode)
        .set_entry("a")
        .add_edge("a", "ghost")
        .build()
        .err()
        .unwrap();
    assert!(matches!(err, GraphError::InvalidEdge { .. }));
}
