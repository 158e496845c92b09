use crate::routes::error::map_error;
use crate::AppState;
use axum::http::{header, HeaderName, HeaderValue};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use pr_core::types::{EventBody, ReviewId};
use pr_core::ReviewError;
use pr_events::EventRecord;
use serde_json::Value;
use std::convert::Infallible;
use std::time::Duration;
use tokio::time::Instant;
use tokio_stream::wrappers::{BroadcastStream, IntervalStream};
use ulid::Ulid;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Long-lived event stream for one review. The first frame is always
/// `connected` with the full review snapshot, taken after subscribing so no
/// mutation can fall between bootstrap and live events. Heartbeats tick
/// every 30 seconds; a failed write tears the connection down, which drops
/// the receiver and unsubscribes.
pub async fn subscribe(state: AppState, id: String) -> Response {
    let review_id = match ReviewId::new(id).map_err(ReviewError::from) {
        Ok(value) => value,
        Err(err) => return map_error(&err).into_response(),
    };
    let receiver = state.engine.bus().subscribe(review_id.as_str());
    let review = match state.engine.get(&review_id, None) {
        Ok(review) => review,
        Err(err) => return map_error(&err).into_response(),
    };

    let connection_id = Ulid::new().to_string();
    tracing::debug!(%connection_id, review_id = %review_id, "stream connected");

    let snapshot = EventRecord {
        review_id: review_id.to_string(),
        event: "connected".to_string(),
        at: Utc::now(),
        data: serde_json::to_value(&review).unwrap_or(Value::Null),
    };
    let connected = stream::once(futures::future::ready(Ok::<Event, Infallible>(frame(
        &snapshot,
    ))));

    let live = BroadcastStream::new(receiver).filter_map(|item| async move {
        match item {
            Ok(record) => Some(Ok(frame(&record))),
            // Lagged receivers skip ahead rather than killing the stream.
            Err(_) => None,
        }
    });

    let heartbeats = IntervalStream::new(tokio::time::interval_at(
        Instant::now() + HEARTBEAT_INTERVAL,
        HEARTBEAT_INTERVAL,
    ))
    .map(|_| Ok(heartbeat_frame()));

    let events = connected.chain(stream::select(live, heartbeats));
    let mut response = Sse::new(events).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(
        HeaderName::from_static("x-accel-buffering"),
        HeaderValue::from_static("no"),
    );
    response
}

fn frame(record: &EventRecord) -> Event {
    Event::default()
        .event(record.event.clone())
        .id(record.frame_id().to_string())
        .data(serde_json::to_string(&record.data).unwrap_or_else(|_| "{}".to_string()))
}

fn heartbeat_frame() -> Event {
    let now = Utc::now();
    let body = EventBody::heartbeat(now);
    Event::default()
        .event(body.event_type())
        .id(now.timestamp_millis().to_string())
        .data(serde_json::to_string(&body).unwrap_or_else(|_| "{}".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heartbeat_payload_carries_timestamp() {
        let now = Utc::now();
        let body = EventBody::heartbeat(now);
        assert_eq!(body.event_type(), "heartbeat");
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["timestamp"], now.timestamp_millis());
    }
}
