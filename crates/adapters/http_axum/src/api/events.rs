//! Event log queries plus the one-shot per-event SSE transport.
//!
//! The event endpoints serve two transports from one path: a plain request
//! returns the JSON log, while `Accept: text/event-stream` opens a live
//! stream of matching events. Establishment fails — no data is sent — when
//! the thing or the named event does not exist.

use std::convert::Infallible;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::header;
use axum::http::HeaderMap;
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::UnboundedReceiverStream;

use thinghub_app::hub::RealtimeHub;
use thinghub_app::ports::Adapter;
use thinghub_domain::error::ThingHubError;
use thinghub_domain::id::{SessionId, ThingId};

use crate::error::ApiError;
use crate::state::AppState;

/// `GET /things/{thing_id}/events`
pub async fn list_for_thing<A: Adapter>(
    State(state): State<AppState<A>>,
    Path(thing_id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let thing_id = ThingId::new(thing_id);
    if wants_event_stream(&headers) {
        return open_stream(&state, &thing_id, None).await;
    }
    let log = state.events.events_for_thing(&thing_id, None).await?;
    Ok(Json(log).into_response())
}

/// `GET /things/{thing_id}/events/{name}`
pub async fn list_named_for_thing<A: Adapter>(
    State(state): State<AppState<A>>,
    Path((thing_id, name)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let thing_id = ThingId::new(thing_id);
    if wants_event_stream(&headers) {
        return open_stream(&state, &thing_id, Some(name)).await;
    }
    let log = state
        .events
        .events_for_thing(&thing_id, Some(&name))
        .await?;
    Ok(Json(log).into_response())
}

/// `GET /events` — gateway-scope log.
pub async fn list_gateway<A: Adapter>(State(state): State<AppState<A>>) -> Json<Vec<serde_json::Value>> {
    Json(state.events.all_events(None).await)
}

/// `GET /events/{name}` — gateway-scope log filtered by name.
pub async fn list_named_gateway<A: Adapter>(
    State(state): State<AppState<A>>,
    Path(name): Path<String>,
) -> Json<Vec<serde_json::Value>> {
    Json(state.events.all_events(Some(&name)).await)
}

fn wants_event_stream(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|accept| accept.to_str().ok())
        .is_some_and(|accept| accept.contains("text/event-stream"))
}

/// Closes the hub-side stream entry when the client disconnects.
struct StreamGuard {
    hub: Arc<RealtimeHub>,
    stream_id: SessionId,
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.hub.close_event_stream(self.stream_id);
    }
}

/// Subscribe a one-shot stream to `(thing, event?)` and serve it as SSE.
async fn open_stream<A: Adapter>(
    state: &AppState<A>,
    thing_id: &ThingId,
    event_name: Option<String>,
) -> Result<Response, ApiError> {
    let thing = state.registry.get(thing_id).await?;
    if let Some(name) = &event_name
        && !thing.has_event(name)
    {
        return Err(ThingHubError::not_found("event", name.clone()).into());
    }

    let (stream_id, rx) = state.hub.open_event_stream(thing_id.clone(), event_name);
    let guard = StreamGuard {
        hub: Arc::clone(&state.hub),
        stream_id,
    };

    let stream = UnboundedReceiverStream::new(rx).map(move |event| {
        // Holds the guard for the stream's lifetime.
        let _ = &guard;
        Ok::<_, Infallible>(
            SseEvent::default()
                .event(event.name)
                .data(serde_json::to_string(&event.data).unwrap_or_default()),
        )
    });

    Ok(Sse::new(stream)
        .keep_alive(KeepAlive::default())
        .into_response())
}
