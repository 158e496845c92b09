use crate::protocol::{McpRequest, McpResponse};
use crate::resources::{parse_resource_uri, resource_listing, ResourceUri};
use pr_core::types::enums::ReviewStatus;
use pr_core::types::io::QuestionInput;
use pr_core::types::{Review, ReviewId};
use pr_core::{Engine, ReviewError, ReviewStore};
use pr_events::EventRecord;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// Hard cap on how long `ask_questions` keeps the agent suspended.
const ASK_TIMEOUT: Duration = Duration::from_secs(600);

/// Fallback cadence when the bus subscription cannot be relied on.
const POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AskQuestionsParams {
    review_id: String,
    questions: Vec<QuestionInput>,
}

#[derive(Debug, Deserialize)]
struct ReadResourceParams {
    uri: String,
}

/// RPC-facing wrapper around the engine. Tool errors come back as
/// structured `{success: false, ...}` results; only malformed frames and
/// resource misses produce protocol error frames.
pub struct ToolService<S: ReviewStore> {
    engine: Arc<Engine<S>>,
    ask_timeout: Duration,
}

impl<S: ReviewStore> Clone for ToolService<S> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            ask_timeout: self.ask_timeout,
        }
    }
}

impl<S: ReviewStore> ToolService<S> {
    pub fn new(engine: Arc<Engine<S>>) -> Self {
        Self {
            engine,
            ask_timeout: ASK_TIMEOUT,
        }
    }

    #[cfg(test)]
    fn with_timeout(engine: Arc<Engine<S>>, ask_timeout: Duration) -> Self {
        Self {
            engine,
            ask_timeout,
        }
    }

    pub async fn handle(&self, request: McpRequest) -> McpResponse {
        let McpRequest { id, method, params } = request;
        tracing::debug!(%id, %method, "agent request");
        match method.as_str() {
            "ask_questions" => match serde_json::from_value::<AskQuestionsParams>(params) {
                Ok(params) => McpResponse::ok(id, self.ask_questions(params).await),
                Err(err) => McpResponse::error(id, "invalid_params", err.to_string()),
            },
            "read_resource" => match serde_json::from_value::<ReadResourceParams>(params) {
                Ok(params) => match self.read_resource(&params.uri) {
                    Ok(value) => McpResponse::ok(id, value),
                    Err(err) => McpResponse::error(id, error_code(&err), err.to_string()),
                },
                Err(err) => McpResponse::error(id, "invalid_params", err.to_string()),
            },
            "list_resources" => McpResponse::ok(id, resource_listing()),
            other => {
                McpResponse::error(id, "invalid_params", format!("unknown method: {other}"))
            }
        }
    }

    /// Apply the questions, then suspend until the review leaves
    /// `discussing` or the deadline passes. The subscription is taken before
    /// the mutation so the wake-up event cannot slip between the two.
    async fn ask_questions(&self, params: AskQuestionsParams) -> Value {
        let review_id = match ReviewId::new(params.review_id) {
            Ok(review_id) => review_id,
            Err(err) => return failure(&ReviewError::from(err)),
        };
        let mut rx = self.engine.bus().subscribe(review_id.as_str());
        let outcome = match self.engine.ask_questions(&review_id, params.questions) {
            Ok(outcome) => outcome,
            Err(err) => return failure(&err),
        };
        if outcome.pending_questions == 0 {
            return success(&outcome.review);
        }

        let waited = tokio::time::timeout(
            self.ask_timeout,
            self.await_discussion_end(&review_id, &mut rx),
        )
        .await;
        match waited {
            Ok(Ok(())) => match self.engine.get(&review_id, None) {
                Ok(review) => success(&review),
                Err(err) => failure(&err),
            },
            Ok(Err(err)) => failure(&err),
            Err(_) => {
                tracing::warn!(review_id = %review_id, "ask_questions timed out");
                json!({ "success": false, "error": "timeout" })
            }
        }
    }

    async fn await_discussion_end(
        &self,
        review_id: &ReviewId,
        rx: &mut broadcast::Receiver<EventRecord>,
    ) -> Result<(), ReviewError> {
        loop {
            match rx.recv().await {
                Ok(record) => {
                    if record.event == "status_changed" && !is_discussing(&record) {
                        return Ok(());
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => {
                    if self.engine.get(review_id, None)?.status != ReviewStatus::Discussing {
                        return Ok(());
                    }
                }
                Err(broadcast::error::RecvError::Closed) => {
                    // Topic went away; fall back to polling the store.
                    if self.engine.get(review_id, None)?.status != ReviewStatus::Discussing {
                        return Ok(());
                    }
                    tokio::time::sleep(POLL_INTERVAL).await;
                    *rx = self.engine.bus().subscribe(review_id.as_str());
                }
            }
        }
    }

    fn read_resource(&self, uri: &str) -> Result<Value, ReviewError> {
        let resource = parse_resource_uri(uri)
            .ok_or_else(|| ReviewError::invalid_input(format!("unrecognized resource uri: {uri}")))?;
        match resource {
            ResourceUri::Pending { project } => {
                let summaries = self.engine.list_pending(&project)?;
                Ok(json!({ "uri": uri, "reviews": summaries }))
            }
            ResourceUri::Current { project } => {
                let review = self.engine.current_pending(&project)?;
                Ok(json!({ "uri": uri, "review": review }))
            }
            ResourceUri::Review { id } => {
                let review_id = ReviewId::new(id)?;
                let review = self.engine.get(&review_id, None)?;
                Ok(json!({ "uri": uri, "review": review }))
            }
        }
    }
}

fn is_discussing(record: &EventRecord) -> bool {
    record
        .data
        .get("status")
        .cloned()
        .and_then(|value| serde_json::from_value::<ReviewStatus>(value).ok())
        .map(|status| status == ReviewStatus::Discussing)
        .unwrap_or(false)
}

fn success(review: &Review) -> Value {
    let answers: Vec<Value> = review
        .comments
        .iter()
        .filter(|comment| comment.question.is_some())
        .map(|comment| {
            json!({
                "commentId": comment.id,
                "question": comment.question,
                "answer": comment.answer,
            })
        })
        .collect();
    json!({
        "success": true,
        "status": review.status,
        "answers": answers,
    })
}

fn failure(err: &ReviewError) -> Value {
    json!({
        "success": false,
        "error": error_code(err),
        "message": err.to_string(),
    })
}

fn error_code(err: &ReviewError) -> &'static str {
    match err {
        ReviewError::ReviewNotFound
        | ReviewError::CommentNotFound
        | ReviewError::VersionNotFound => "not_found",
        ReviewError::InvalidTransition { .. } => "invalid_state",
        ReviewError::InvalidInput { .. } => "invalid_params",
        ReviewError::Store { .. } => "store_error",
    }
}
