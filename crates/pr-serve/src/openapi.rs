use crate::routes::reviews::{DiffQuery, LatestQuery};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use pr_core::diff::{DiffLine, DiffLineKind, DiffResult, DiffStats};
use pr_core::types::enums::{PositionStatus, QuestionType, ReviewStatus, VersionAuthor};
use pr_core::types::ids::{CommentId, ReviewId};
use pr_core::types::io::{
    AnswerInput, ApproveInput, AskQuestionsInput, CreateCommentInput, CreateReviewInput,
    QuestionInput, RollbackInput, UpdateCommentInput, UpdatePlanInput,
};
use pr_core::types::review::{
    Comment, CommentQuestion, DocumentVersion, Review, ReviewSummary, TextPosition,
    VersionSummary,
};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::reviews::create_review,
        crate::routes::reviews::latest_review,
        crate::routes::reviews::get_review,
        crate::routes::reviews::add_comment,
        crate::routes::reviews::update_comment,
        crate::routes::reviews::delete_comment,
        crate::routes::reviews::answer_comment,
        crate::routes::reviews::update_plan,
        crate::routes::reviews::list_versions,
        crate::routes::reviews::get_version,
        crate::routes::reviews::diff_versions,
        crate::routes::reviews::rollback,
        crate::routes::reviews::approve,
        crate::routes::reviews::request_changes,
        crate::routes::reviews::ask_questions,
        crate::routes::reviews::events
    ),
    components(schemas(
        Review,
        ReviewSummary,
        DocumentVersion,
        VersionSummary,
        Comment,
        CommentQuestion,
        TextPosition,
        CreateReviewInput,
        CreateCommentInput,
        UpdateCommentInput,
        UpdatePlanInput,
        RollbackInput,
        ApproveInput,
        AskQuestionsInput,
        QuestionInput,
        AnswerInput,
        LatestQuery,
        DiffQuery,
        DiffResult,
        DiffLine,
        DiffLineKind,
        DiffStats,
        ReviewId,
        CommentId,
        ReviewStatus,
        VersionAuthor,
        PositionStatus,
        QuestionType
    ))
)]
struct ApiDoc;

pub fn generate_spec() -> String {
    ApiDoc::openapi()
        .to_json()
        .unwrap_or_else(|_| "{}".to_string())
}

pub fn router() -> Router {
    Router::new()
        .route("/openapi.json", get(openapi_json))
        .route("/docs", get(swagger_ui))
}

async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

async fn swagger_ui() -> impl IntoResponse {
    let html = r#"<!doctype html>
<html lang="en">
  <head>
    <meta charset="utf-8">
    <title>planloop API Docs</title>
    <link rel="stylesheet" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css">
  </head>
  <body>
    <div id="swagger-ui"></div>
    <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
    <script>
      window.ui = SwaggerUIBundle({ url: '/api/openapi.json', dom_id: '#swagger-ui' });
    </script>
  </body>
</html>
"#;
    axum::response::Html(html)
}
