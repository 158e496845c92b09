use axum::http::StatusCode;
use axum::Json;
use pr_core::ReviewError;
use serde::Serialize;
use utoipa::ToSchema;

/// Wire error shape: `{"error": "..."}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorEnvelope {
    pub error: String,
}

pub fn map_error(err: &ReviewError) -> (StatusCode, Json<ErrorEnvelope>) {
    let status = match err {
        ReviewError::ReviewNotFound
        | ReviewError::CommentNotFound
        | ReviewError::VersionNotFound => StatusCode::NOT_FOUND,
        ReviewError::InvalidTransition { .. } | ReviewError::InvalidInput { .. } => {
            StatusCode::BAD_REQUEST
        }
        ReviewError::Store { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorEnvelope {
            error: err.to_string(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pr_core::types::ReviewStatus;

    #[test]
    fn status_mapping() {
        let cases = [
            (ReviewError::ReviewNotFound, StatusCode::NOT_FOUND),
            (ReviewError::CommentNotFound, StatusCode::NOT_FOUND),
            (ReviewError::VersionNotFound, StatusCode::NOT_FOUND),
            (
                ReviewError::InvalidTransition {
                    from: ReviewStatus::Approved,
                    to: ReviewStatus::ChangesRequested,
                },
                StatusCode::BAD_REQUEST,
            ),
            (
                ReviewError::invalid_input("missing coverage"),
                StatusCode::BAD_REQUEST,
            ),
            (
                ReviewError::store("disk full"),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            let (status, body) = map_error(&err);
            assert_eq!(status, expected, "error {err}");
            assert!(!body.error.is_empty());
        }
    }
}
