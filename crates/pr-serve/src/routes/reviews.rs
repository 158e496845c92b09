use crate::routes::error::map_error;
use crate::AppState;
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use pr_core::diff::DiffResult;
use pr_core::types::io::AskQuestionsInput;
use pr_core::types::review::{Review, VersionSummary};
use pr_core::types::{
    AnswerInput, ApproveInput, Comment, CommentId, CreateCommentInput, CreateReviewInput,
    DocumentVersion, ReviewId, RollbackInput, UpdateCommentInput, UpdatePlanInput,
};
use pr_core::ReviewError;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Deserialize, ToSchema, IntoParams)]
pub struct LatestQuery {
    pub project: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema, IntoParams)]
pub struct DiffQuery {
    pub from: String,
    pub to: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/reviews", post(create_review))
        .route("/reviews/latest", get(latest_review))
        .route("/reviews/:id", get(get_review))
        .route("/reviews/:id/comments", post(add_comment))
        .route(
            "/reviews/:id/comments/:cid",
            put(update_comment).delete(delete_comment),
        )
        .route("/reviews/:id/comments/:cid/answer", post(answer_comment))
        .route("/reviews/:id/plan", put(update_plan))
        .route("/reviews/:id/versions", get(list_versions))
        .route("/reviews/:id/versions/:hash", get(get_version))
        .route("/reviews/:id/diff", get(diff_versions))
        .route("/reviews/:id/rollback", post(rollback))
        .route("/reviews/:id/approve", post(approve))
        .route("/reviews/:id/request-changes", post(request_changes))
        .route("/reviews/:id/ask-questions", post(ask_questions))
        .route("/reviews/:id/events", get(events))
        .with_state(state)
}

fn parse_review_id(value: &str) -> Result<ReviewId, ReviewError> {
    ReviewId::new(value.to_string()).map_err(ReviewError::from)
}

fn parse_comment_id(value: &str) -> Result<CommentId, ReviewError> {
    CommentId::new(value.to_string()).map_err(ReviewError::from)
}

#[utoipa::path(
    post,
    path = "/api/reviews",
    request_body = CreateReviewInput,
    responses((status = 200, body = Review))
)]
pub(crate) async fn create_review(
    State(state): State<AppState>,
    Json(input): Json<CreateReviewInput>,
) -> Response {
    match state.engine.create(input) {
        Ok(review) => Json(review).into_response(),
        Err(err) => map_error(&err).into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/reviews/latest",
    params(LatestQuery),
    responses((status = 200, body = Review))
)]
pub(crate) async fn latest_review(
    State(state): State<AppState>,
    Query(query): Query<LatestQuery>,
) -> Response {
    match state.engine.latest(query.project.as_deref()) {
        Ok(Some(review)) => Json(review).into_response(),
        Ok(None) => map_error(&ReviewError::ReviewNotFound).into_response(),
        Err(err) => map_error(&err).into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/reviews/{id}",
    params(("id" = String, Path, description = "Review ID")),
    responses((status = 200, body = Review))
)]
pub(crate) async fn get_review(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let review_id = match parse_review_id(&id) {
        Ok(value) => value,
        Err(err) => return map_error(&err).into_response(),
    };
    match state.engine.get(&review_id, None) {
        Ok(review) => Json(review).into_response(),
        Err(err) => map_error(&err).into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/reviews/{id}/comments",
    request_body = CreateCommentInput,
    params(("id" = String, Path, description = "Review ID")),
    responses((status = 200, body = Comment))
)]
pub(crate) async fn add_comment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<CreateCommentInput>,
) -> Response {
    let review_id = match parse_review_id(&id) {
        Ok(value) => value,
        Err(err) => return map_error(&err).into_response(),
    };
    match state.engine.add_comment(&review_id, input) {
        Ok(comment) => Json(comment).into_response(),
        Err(err) => map_error(&err).into_response(),
    }
}

#[utoipa::path(
    put,
    path = "/api/reviews/{id}/comments/{cid}",
    request_body = UpdateCommentInput,
    params(
        ("id" = String, Path, description = "Review ID"),
        ("cid" = String, Path, description = "Comment ID")
    ),
    responses((status = 200, body = Comment))
)]
pub(crate) async fn update_comment(
    State(state): State<AppState>,
    Path((id, cid)): Path<(String, String)>,
    Json(input): Json<UpdateCommentInput>,
) -> Response {
    let (review_id, comment_id) = match (parse_review_id(&id), parse_comment_id(&cid)) {
        (Ok(review_id), Ok(comment_id)) => (review_id, comment_id),
        (Err(err), _) | (_, Err(err)) => return map_error(&err).into_response(),
    };
    match state.engine.update_comment(&review_id, &comment_id, input) {
        Ok(comment) => Json(comment).into_response(),
        Err(err) => map_error(&err).into_response(),
    }
}

#[utoipa::path(
    delete,
    path = "/api/reviews/{id}/comments/{cid}",
    params(
        ("id" = String, Path, description = "Review ID"),
        ("cid" = String, Path, description = "Comment ID")
    ),
    responses((status = 200))
)]
pub(crate) async fn delete_comment(
    State(state): State<AppState>,
    Path((id, cid)): Path<(String, String)>,
) -> Response {
    let (review_id, comment_id) = match (parse_review_id(&id), parse_comment_id(&cid)) {
        (Ok(review_id), Ok(comment_id)) => (review_id, comment_id),
        (Err(err), _) | (_, Err(err)) => return map_error(&err).into_response(),
    };
    match state.engine.delete_comment(&review_id, &comment_id) {
        Ok(()) => Json(serde_json::json!({ "ok": true })).into_response(),
        Err(err) => map_error(&err).into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/reviews/{id}/comments/{cid}/answer",
    request_body = AnswerInput,
    params(
        ("id" = String, Path, description = "Review ID"),
        ("cid" = String, Path, description = "Comment ID")
    ),
    responses((status = 200, body = Review))
)]
pub(crate) async fn answer_comment(
    State(state): State<AppState>,
    Path((id, cid)): Path<(String, String)>,
    Json(input): Json<AnswerInput>,
) -> Response {
    let (review_id, comment_id) = match (parse_review_id(&id), parse_comment_id(&cid)) {
        (Ok(review_id), Ok(comment_id)) => (review_id, comment_id),
        (Err(err), _) | (_, Err(err)) => return map_error(&err).into_response(),
    };
    match state.engine.answer(&review_id, &comment_id, input) {
        Ok(review) => Json(review).into_response(),
        Err(err) => map_error(&err).into_response(),
    }
}

#[utoipa::path(
    put,
    path = "/api/reviews/{id}/plan",
    request_body = UpdatePlanInput,
    params(("id" = String, Path, description = "Review ID")),
    responses((status = 200, body = Review))
)]
pub(crate) async fn update_plan(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<UpdatePlanInput>,
) -> Response {
    let review_id = match parse_review_id(&id) {
        Ok(value) => value,
        Err(err) => return map_error(&err).into_response(),
    };
    match state.engine.update_plan(&review_id, input) {
        Ok(review) => Json(review).into_response(),
        Err(err) => map_error(&err).into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/reviews/{id}/versions",
    params(("id" = String, Path, description = "Review ID")),
    responses((status = 200, body = Vec<VersionSummary>))
)]
pub(crate) async fn list_versions(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    let review_id = match parse_review_id(&id) {
        Ok(value) => value,
        Err(err) => return map_error(&err).into_response(),
    };
    match state.engine.versions(&review_id) {
        Ok(versions) => Json(versions).into_response(),
        Err(err) => map_error(&err).into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/reviews/{id}/versions/{hash}",
    params(
        ("id" = String, Path, description = "Review ID"),
        ("hash" = String, Path, description = "Version digest")
    ),
    responses((status = 200, body = DocumentVersion))
)]
pub(crate) async fn get_version(
    State(state): State<AppState>,
    Path((id, hash)): Path<(String, String)>,
) -> Response {
    let review_id = match parse_review_id(&id) {
        Ok(value) => value,
        Err(err) => return map_error(&err).into_response(),
    };
    match state.engine.version(&review_id, &hash) {
        Ok(version) => Json(version).into_response(),
        Err(err) => map_error(&err).into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/reviews/{id}/diff",
    params(("id" = String, Path, description = "Review ID"), DiffQuery),
    responses((status = 200, body = DiffResult))
)]
pub(crate) async fn diff_versions(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<DiffQuery>,
) -> Response {
    let review_id = match parse_review_id(&id) {
        Ok(value) => value,
        Err(err) => return map_error(&err).into_response(),
    };
    match state.engine.diff(&review_id, &query.from, &query.to) {
        Ok(diff) => Json(diff).into_response(),
        Err(err) => map_error(&err).into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/reviews/{id}/rollback",
    request_body = RollbackInput,
    params(("id" = String, Path, description = "Review ID")),
    responses((status = 200, body = Review))
)]
pub(crate) async fn rollback(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<RollbackInput>,
) -> Response {
    let review_id = match parse_review_id(&id) {
        Ok(value) => value,
        Err(err) => return map_error(&err).into_response(),
    };
    match state.engine.rollback(&review_id, input) {
        Ok(review) => Json(review).into_response(),
        Err(err) => map_error(&err).into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/reviews/{id}/approve",
    request_body = ApproveInput,
    params(("id" = String, Path, description = "Review ID")),
    responses((status = 200, body = Review))
)]
pub(crate) async fn approve(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<ApproveInput>>,
) -> Response {
    let review_id = match parse_review_id(&id) {
        Ok(value) => value,
        Err(err) => return map_error(&err).into_response(),
    };
    let input = body.map(|Json(input)| input).unwrap_or_default();
    match state.engine.approve(&review_id, input) {
        Ok(review) => Json(review).into_response(),
        Err(err) => map_error(&err).into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/reviews/{id}/request-changes",
    params(("id" = String, Path, description = "Review ID")),
    responses((status = 200, body = Review))
)]
pub(crate) async fn request_changes(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    let review_id = match parse_review_id(&id) {
        Ok(value) => value,
        Err(err) => return map_error(&err).into_response(),
    };
    match state.engine.request_changes(&review_id) {
        Ok(review) => Json(review).into_response(),
        Err(err) => map_error(&err).into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/reviews/{id}/ask-questions",
    request_body = AskQuestionsInput,
    params(("id" = String, Path, description = "Review ID")),
    responses((status = 200, body = Review))
)]
pub(crate) async fn ask_questions(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<AskQuestionsInput>,
) -> Response {
    let review_id = match parse_review_id(&id) {
        Ok(value) => value,
        Err(err) => return map_error(&err).into_response(),
    };
    match state.engine.ask_questions(&review_id, input.questions) {
        Ok(outcome) => Json(outcome.review).into_response(),
        Err(err) => map_error(&err).into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/reviews/{id}/events",
    params(("id" = String, Path, description = "Review ID")),
    responses((status = 200, description = "Event stream"))
)]
pub(crate) async fn events(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    crate::sse::subscribe(state, id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use http_body_util::BodyExt;
    use pr_core::Engine;
    use pr_events::ReviewBus;
    use pr_store::FileStore;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn setup_app() -> (tempfile::TempDir, axum::Router) {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(Engine::new(FileStore::new(dir.path()), ReviewBus::new()));
        let state = AppState::new(engine);
        (dir, crate::routes::router(state))
    }

    async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn put_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("PUT")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn create_fetch_approve_cycle() {
        let (_dir, app) = setup_app();

        let (status, created) = send(
            &app,
            post_json(
                "/api/reviews",
                json!({ "plan": "# Step 1\nDo X", "projectPath": "/work/app" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(created["status"], "open");
        let id = created["id"].as_str().unwrap().to_string();

        let (status, fetched) = send(&app, get_req(&format!("/api/reviews/{id}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["planContent"], "# Step 1\nDo X");

        let (status, latest) = send(&app, get_req("/api/reviews/latest?project=/work/app")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(latest["id"], id.as_str());

        let (status, approved) = send(
            &app,
            post_json(&format!("/api/reviews/{id}/approve"), json!({ "note": "lgtm" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(approved["status"], "approved");
        assert_eq!(approved["approvalNote"], "lgtm");

        // Terminal: further transitions are rejected with the error shape.
        let (status, body) = send(
            &app,
            post_json(&format!("/api/reviews/{id}/request-changes"), json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("invalid transition"));
    }

    #[tokio::test]
    async fn comment_and_revision_cycle() {
        let (_dir, app) = setup_app();
        let (_, created) = send(
            &app,
            post_json(
                "/api/reviews",
                json!({ "plan": "line one\nline two\nline three" }),
            ),
        )
        .await;
        let id = created["id"].as_str().unwrap().to_string();

        let (status, comment) = send(
            &app,
            post_json(
                &format!("/api/reviews/{id}/comments"),
                json!({
                    "quote": "line one",
                    "comment": "rename",
                    "position": { "startOffset": 0, "endOffset": 8 },
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(comment["positionStatus"], "valid");
        assert_eq!(comment["resolved"], false);

        let (status, _) = send(
            &app,
            post_json(&format!("/api/reviews/{id}/request-changes"), json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, updated) = send(
            &app,
            put_json(
                &format!("/api/reviews/{id}/plan"),
                json!({ "content": "line ONE\nline two\nline three", "author": "agent" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["status"], "updated");
        assert_eq!(updated["documentVersions"].as_array().unwrap().len(), 2);
        assert_eq!(updated["comments"][0]["resolved"], true);

        let from = updated["documentVersions"][0]["versionHash"]
            .as_str()
            .unwrap();
        let to = updated["currentVersion"].as_str().unwrap();
        let (status, diff) = send(
            &app,
            get_req(&format!("/api/reviews/{id}/diff?from={from}&to={to}")),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(diff["stats"]["additions"], 1);
        assert_eq!(diff["stats"]["deletions"], 1);
        assert_eq!(diff["stats"]["unchanged"], 2);

        let (status, rolled) = send(
            &app,
            post_json(
                &format!("/api/reviews/{id}/rollback"),
                json!({ "versionHash": from }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(rolled["documentVersions"].as_array().unwrap().len(), 3);
        assert_eq!(rolled["planContent"], "line one\nline two\nline three");
    }

    #[tokio::test]
    async fn unknown_review_returns_404() {
        let (_dir, app) = setup_app();
        let id = ReviewId::generate();
        let (status, body) = send(&app, get_req(&format!("/api/reviews/{id}"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "review not found");
    }

    #[tokio::test]
    async fn malformed_id_returns_400() {
        let (_dir, app) = setup_app();
        let (status, _) = send(&app, get_req("/api/reviews/not-an-id")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn first_stream_frame_is_the_connected_snapshot() {
        use futures::StreamExt;

        let (_dir, app) = setup_app();
        let (_, created) = send(
            &app,
            post_json("/api/reviews", json!({ "plan": "# Step 1\nDo X" })),
        )
        .await;
        let id = created["id"].as_str().unwrap();

        let response = app
            .clone()
            .oneshot(get_req(&format!("/api/reviews/{id}/events")))
            .await
            .unwrap();
        let mut frames = response.into_body().into_data_stream();
        let chunk = frames.next().await.unwrap().unwrap();
        let text = String::from_utf8(chunk.to_vec()).unwrap();

        assert!(text.starts_with("event: connected\nid: "), "frame: {text}");
        let data_line = text
            .lines()
            .find(|line| line.starts_with("data: "))
            .unwrap();
        let snapshot: Value = serde_json::from_str(&data_line["data: ".len()..]).unwrap();
        assert_eq!(snapshot["id"], id);
        assert_eq!(snapshot["planContent"], "# Step 1\nDo X");
        assert_eq!(snapshot["status"], "open");
    }

    #[tokio::test]
    async fn event_stream_handshake_sets_headers() {
        let (_dir, app) = setup_app();
        let (_, created) = send(&app, post_json("/api/reviews", json!({ "plan": "p" }))).await;
        let id = created["id"].as_str().unwrap();

        let response = app
            .clone()
            .oneshot(get_req(&format!("/api/reviews/{id}/events")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers["content-type"], "text/event-stream");
        assert_eq!(headers["cache-control"], "no-cache");
        assert_eq!(headers["x-accel-buffering"], "no");
    }
}
