//! Server-Sent Events (SSE) utilities

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use serde::Serialize;
use std::convert::Infallible;
use std::time::Duration;
use tracing::warn;

use crate::events::LeadEvent;

/// Heartbeat interval for every SSE stream
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Serialize `payload` as the data of an SSE event named `name`
///
/// Returns None (and logs) if serialization fails.
pub fn json_event<T: Serialize>(name: &str, payload: &T) -> Option<Event> {
    match serde_json::to_string(payload) {
        Ok(data) => Some(Event::default().event(name).data(data)),
        Err(e) => {
            warn!("SSE: Failed to serialize {} payload: {}", name, e);
            None
        }
    }
}

/// SSE event carrying a full [`LeadEvent`], named after its type
pub fn lead_event(event: &LeadEvent) -> Option<Event> {
    json_event(event.event_type(), event)
}

/// Wrap a stream in an Sse response with the shared heartbeat keep-alive
pub fn with_heartbeat<S>(stream: S) -> Sse<S>
where
    S: Stream<Item = Result<Event, Infallible>> + Send + 'static,
{
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(HEARTBEAT_INTERVAL)
            .text("heartbeat"),
    )
}
