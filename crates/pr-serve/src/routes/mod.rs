pub mod error;
pub mod reviews;

use crate::{openapi, AppState};
use axum::extract::{Request, State};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::Router;

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .merge(reviews::router(state.clone()))
        .merge(openapi::router())
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            track_activity,
        ));

    Router::new().nest("/api", api)
}

/// Every request re-arms the idle watchdog. Public so additional mounts
/// (the agent's `/mcp` endpoint) can participate.
pub async fn track_activity(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    state.activity.touch();
    next.run(request).await
}
