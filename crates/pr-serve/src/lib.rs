pub mod openapi;
pub mod routes;
pub mod sse;
pub mod watchdog;

use pr_core::Engine;
use pr_store::FileStore;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use tokio::net::TcpListener;
use watchdog::ActivityTracker;

pub type ServeEngine = Engine<FileStore>;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ServeEngine>,
    pub activity: ActivityTracker,
}

impl AppState {
    pub fn new(engine: Arc<ServeEngine>) -> Self {
        Self {
            engine,
            activity: ActivityTracker::new(),
        }
    }
}

pub fn app(state: AppState) -> axum::Router {
    routes::router(state)
}

/// Bind the preferred port, falling back to an OS-assigned one when it is
/// taken. Returns the listener and the port actually bound.
pub async fn bind(preferred_port: u16) -> std::io::Result<(TcpListener, u16)> {
    let localhost = IpAddr::V4(Ipv4Addr::LOCALHOST);
    match TcpListener::bind((localhost, preferred_port)).await {
        Ok(listener) => {
            let port = listener.local_addr()?.port();
            Ok((listener, port))
        }
        Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => {
            tracing::warn!(preferred_port, "port in use, falling back to ephemeral");
            let listener = TcpListener::bind((localhost, 0)).await?;
            let port = listener.local_addr()?.port();
            Ok((listener, port))
        }
        Err(err) => Err(err),
    }
}

pub async fn serve(state: AppState, listener: TcpListener) -> std::io::Result<()> {
    axum::serve(listener, app(state)).await
}
