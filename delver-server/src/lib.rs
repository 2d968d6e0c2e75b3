//! HTTP facade over the research engine: a streaming SSE endpoint, a
//! synchronous mirror, and a health probe.

mod event;

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::StreamExt;
use serde_json::json;
use tower_http::limit::RequestBodyLimitLayer;
use uuid::Uuid;

use delver_graph::GraphEvent;
use delver_research::{
    build_research_graph, ResearchRequest, ResearchState, StateSnapshot, Toolbox,
};

pub use event::StreamEvent;

const REQUEST_BODY_LIMIT: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub tools: Arc<Toolbox>,
    pub keepalive_interval: Duration,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/research/stream", post(research_stream))
        .route("/research", post(research_sync))
        .route("/health", get(health))
        .layer(RequestBodyLimitLayer::new(REQUEST_BODY_LIMIT))
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

fn initial_state(request: &ResearchRequest) -> ResearchState {
    let mut state = ResearchState::from_request(request);
    state.logs.push("request accepted".to_string());
    state
}

fn validation_failure(message: String) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
}

/// `POST /research/stream` — text/event-stream of state deltas: an
/// immediate preamble comment, one `update` event per completed node, a
/// terminal `complete` or `error` event, keepalive comments while idle.
async fn research_stream(
    State(app): State<AppState>,
    Json(request): Json<ResearchRequest>,
) -> Response {
    if let Err(err) = request.validate() {
        return validation_failure(err.to_string());
    }
    let request_id = Uuid::new_v4();
    tracing::info!(%request_id, topic = %request.topic, "research stream accepted");

    let graph = match build_research_graph(app.tools.clone()) {
        Ok(graph) => graph,
        Err(err) => {
            tracing::error!(%request_id, error = %err, "graph construction failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "engine unavailable" })),
            )
                .into_response();
        }
    };
    let initial = initial_state(&request);

    let stream = async_stream::stream! {
        // Early flush so proxies open the stream before the first node lands.
        yield Ok::<Event, Infallible>(Event::default().comment("stream open"));

        let graph = graph;
        let mut events = graph.stream_invoke(initial);
        while let Some(event) = events.next().await {
            match event {
                Ok(GraphEvent::NodeCompleted { node, state }) => {
                    let payload = StreamEvent::Update {
                        node,
                        state: StateSnapshot::from(&state),
                    };
                    yield Ok(data_event(&payload));
                }
                Ok(GraphEvent::Finished { state }) => {
                    let payload = StreamEvent::Complete {
                        state: StateSnapshot::from(&state),
                    };
                    yield Ok(data_event(&payload));
                }
                Ok(GraphEvent::NodeStarted { .. }) => {}
                Err(err) => {
                    tracing::warn!(%request_id, error = %err, "research run failed");
                    let payload = StreamEvent::Error {
                        message: err.to_string(),
                    };
                    yield Ok(data_event(&payload));
                    break;
                }
            }
        }
    };

    Sse::new(stream)
        .keep_alive(
            KeepAlive::new()
                .interval(app.keepalive_interval)
                .text("keepalive"),
        )
        .into_response()
}

/// `POST /research` — synchronous mirror: drives the graph to completion
/// and returns the terminal state.
async fn research_sync(
    State(app): State<AppState>,
    Json(request): Json<ResearchRequest>,
) -> Response {
    if let Err(err) = request.validate() {
        return validation_failure(err.to_string());
    }
    let request_id = Uuid::new_v4();
    tracing::info!(%request_id, topic = %request.topic, "research request accepted");

    let graph = match build_research_graph(app.tools.clone()) {
        Ok(graph) => graph,
        Err(err) => {
            tracing::error!(%request_id, error = %err, "graph construction failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "engine unavailable" })),
            )
                .into_response();
        }
    };

    match graph.invoke(initial_state(&request)).await {
        Ok(state) => Json(StateSnapshot::from(&state)).into_response(),
        Err(err) => {
            tracing::warn!(%request_id, error = %err, "research run failed");
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": err.to_string() })),
            )
                .into_response()
        }
    }
}

fn data_event(payload: &StreamEvent) -> Event {
    match Event::default().json_data(payload) {
        Ok(event) => event,
        Err(err) => {
            tracing::error!(error = %err, "event serialization failed");
            Event::default().data("{\"type\":\"error\",\"message\":\"serialization failed\"}")
        }
    }
}
