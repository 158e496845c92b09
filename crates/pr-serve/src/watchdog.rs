use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

/// The process exits after this much inactivity.
pub const IDLE_SHUTDOWN_AFTER: Duration = Duration::from_secs(30 * 60);

const TICK_INTERVAL: Duration = Duration::from_secs(60);

/// Last-request timestamp shared between the request middleware and the
/// watchdog task.
#[derive(Clone)]
pub struct ActivityTracker {
    last: Arc<Mutex<Instant>>,
}

impl Default for ActivityTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ActivityTracker {
    pub fn new() -> Self {
        Self {
            last: Arc::new(Mutex::new(Instant::now())),
        }
    }

    pub fn touch(&self) {
        *self.last.lock().unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.last
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .elapsed()
    }
}

/// Checks once a minute; fires `shutdown` when the server has been idle for
/// the full window.
pub async fn run(activity: ActivityTracker, shutdown: Arc<Notify>) {
    let mut interval = tokio::time::interval(TICK_INTERVAL);
    interval.tick().await;
    loop {
        interval.tick().await;
        let idle = activity.idle_for();
        if idle >= IDLE_SHUTDOWN_AFTER {
            tracing::info!(idle_secs = idle.as_secs(), "idle timeout reached");
            shutdown.notify_one();
            return;
        }
    }
}
