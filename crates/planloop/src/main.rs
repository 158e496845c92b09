use axum::middleware;
use clap::{Parser, ValueEnum};
use pr_core::Engine;
use pr_events::ReviewBus;
use pr_mcp::ToolService;
use pr_serve::{watchdog, AppState};
use pr_store::FileStore;
use std::future::IntoFuture;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::Notify;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const DEFAULT_PORT: u16 = 3030;
const DEFAULT_DATA_DIR: &str = ".planloop/reviews";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Transport {
    /// JSON-RPC frames on stdin/stdout (stdout also carries the ready line).
    Stdio,
    /// One JSON-RPC per POST to /mcp.
    Http,
}

#[derive(Parser)]
#[command(name = "planloop", about = "Human-in-the-loop plan review server")]
struct Cli {
    /// Carrier for the agent tool surface.
    #[arg(long, value_enum, default_value = "stdio")]
    transport: Transport,

    /// Preferred HTTP port; falls back to an ephemeral port when taken.
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Review record directory. Defaults to PLANLOOP_DATA_DIR or .planloop/reviews.
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Stdout belongs to the ready line and the stdio agent transport.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "planloop=info,pr_serve=info,pr_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let data_dir = cli
        .data_dir
        .or_else(|| std::env::var("PLANLOOP_DATA_DIR").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));

    let engine = Arc::new(Engine::new(FileStore::new(data_dir), ReviewBus::new()));
    let state = AppState::new(engine.clone());
    let service = ToolService::new(engine);

    let (listener, port) = match pr_serve::bind(cli.port).await {
        Ok(bound) => bound,
        Err(err) => {
            eprintln!("failed to bind: {err}");
            return ExitCode::FAILURE;
        }
    };

    let mut router = pr_serve::app(state.clone());
    if cli.transport == Transport::Http {
        router = router.merge(pr_mcp::http::router(service.clone()).route_layer(
            middleware::from_fn_with_state(state.clone(), pr_serve::routes::track_activity),
        ));
    }

    // The interceptor parses this line to learn where to connect.
    println!("{}", serde_json::json!({ "status": "ready", "port": port }));
    let _ = std::io::stdout().flush();
    tracing::info!(port, transport = ?cli.transport, "listening");

    let shutdown = Arc::new(Notify::new());
    tokio::spawn(watchdog::run(state.activity.clone(), shutdown.clone()));

    if cli.transport == Transport::Stdio {
        let service = service.clone();
        tokio::spawn(async move {
            if let Err(err) = pr_mcp::stdio::run(service).await {
                tracing::warn!(%err, "stdio transport closed with error");
            }
        });
    }

    let server = axum::serve(listener, router).into_future();
    tokio::select! {
        result = server => {
            if let Err(err) = result {
                tracing::error!(%err, "server error");
                return ExitCode::FAILURE;
            }
        }
        _ = shutdown.notified() => {
            tracing::info!("shutting down after idle timeout");
        }
        _ = shutdown_signal() => {
            tracing::info!("shutting down on signal");
        }
    }
    ExitCode::SUCCESS
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
