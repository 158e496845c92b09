use crate::protocol::{McpRequest, McpResponse};
use crate::service::ToolService;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use pr_core::ReviewStore;

/// Stateless HTTP carrier for the agent surface: one RPC per POST.
pub fn router<S: ReviewStore + 'static>(service: ToolService<S>) -> Router {
    Router::new()
        .route("/mcp", post(handle::<S>))
        .with_state(service)
}

async fn handle<S: ReviewStore + 'static>(
    State(service): State<ToolService<S>>,
    Json(request): Json<McpRequest>,
) -> Json<McpResponse> {
    Json(service.handle(request).await)
}
