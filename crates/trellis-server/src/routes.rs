//! HTTP surface
//!
//! REST mirror of the websocket mutation protocol plus graph reads and the
//! job queue. HTTP mutations skip the version gate: they apply against the
//! current graph and broadcast the resulting events to websocket
//! subscribers exactly like accepted websocket mutations. Failures come
//! back as a JSON `detail` message instead of a `sync_graph`.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;

use graph_engine::{GraphEdge, GraphMutation, GraphNode, NodeId, PortId, Position, ValueMap};

use crate::state::AppState;
use crate::sync::GraphView;
use crate::ws;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/graph", get(read_graph))
        .route(
            "/graph/node",
            post(create_node).patch(update_node).delete(delete_node),
        )
        .route("/graph/edge", post(create_edge).delete(delete_edge))
        .route("/graph/queue", post(queue_job))
        .route("/ws", get(ws::upgrade))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    fn unprocessable(detail: impl ToString) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            detail: detail.to_string(),
        }
    }

    fn unavailable(detail: impl ToString) -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            detail: detail.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct UpdateNodeBody {
    id: NodeId,
    values: Option<ValueMap>,
    position: Option<Position>,
}

#[derive(Debug, Deserialize)]
struct DeleteNodeBody {
    id: NodeId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateEdgeBody {
    source: NodeId,
    source_handle: PortId,
    target: NodeId,
    target_handle: PortId,
}

#[derive(Debug, Deserialize)]
struct DeleteEdgeBody {
    id: String,
}

#[derive(Debug, Deserialize)]
struct QueueRequest {
    id: Option<NodeId>,
}

async fn read_graph(State(state): State<AppState>) -> Json<GraphView> {
    Json(state.graph.read())
}

async fn create_node(
    State(state): State<AppState>,
    Json(node): Json<GraphNode>,
) -> Result<StatusCode, ApiError> {
    apply_mutation(&state, GraphMutation::CreateNode { node })
}

async fn update_node(
    State(state): State<AppState>,
    Json(body): Json<UpdateNodeBody>,
) -> Result<StatusCode, ApiError> {
    if let Some(values) = body.values {
        apply_mutation(&state, GraphMutation::UpdateValuesNode { id: body.id, values })?;
    }
    if let Some(position) = body.position {
        apply_mutation(
            &state,
            GraphMutation::UpdatePositionNode {
                id: body.id,
                position,
            },
        )?;
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_node(
    State(state): State<AppState>,
    Json(body): Json<DeleteNodeBody>,
) -> Result<StatusCode, ApiError> {
    apply_mutation(&state, GraphMutation::DeleteNode { id: body.id })
}

async fn create_edge(
    State(state): State<AppState>,
    Json(body): Json<CreateEdgeBody>,
) -> Result<StatusCode, ApiError> {
    let edge = GraphEdge::new(body.source, body.source_handle, body.target, body.target_handle);
    apply_mutation(&state, GraphMutation::CreateEdge { edge })
}

async fn delete_edge(
    State(state): State<AppState>,
    Json(body): Json<DeleteEdgeBody>,
) -> Result<StatusCode, ApiError> {
    apply_mutation(&state, GraphMutation::DeleteEdge { id: body.id })
}

async fn queue_job(
    State(state): State<AppState>,
    Json(body): Json<QueueRequest>,
) -> Result<impl IntoResponse, ApiError> {
    match state.submit(body.id) {
        Some(Ok(device)) => Ok((
            StatusCode::ACCEPTED,
            Json(json!({ "status": "queued", "device": device })),
        )),
        Some(Err(err)) => Err(ApiError::unavailable(err)),
        None => Err(ApiError::unavailable("No workers are running")),
    }
}

fn apply_mutation(state: &AppState, mutation: GraphMutation) -> Result<StatusCode, ApiError> {
    state
        .graph
        .apply(mutation)
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(ApiError::unprocessable)
}
