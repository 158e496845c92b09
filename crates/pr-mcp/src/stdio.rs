use crate::protocol::{McpRequest, McpResponse};
use crate::service::ToolService;
use pr_core::ReviewStore;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

/// Newline-delimited JSON-RPC frames on stdin/stdout. Frames are handled
/// one at a time; a blocking `ask_questions` simply keeps the agent's frame
/// open until the human acts. Logging goes to stderr, never here.
pub async fn run<S: ReviewStore + 'static>(service: ToolService<S>) -> std::io::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let response = match serde_json::from_str::<McpRequest>(&line) {
            Ok(request) => service.handle(request).await,
            Err(err) => {
                tracing::warn!(%err, "unparseable agent frame");
                McpResponse::error("unknown".to_string(), "invalid_params", err.to_string())
            }
        };
        stdout.write_all(response.to_json().as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
    }
    tracing::info!("agent stdin closed");
    Ok(())
}
