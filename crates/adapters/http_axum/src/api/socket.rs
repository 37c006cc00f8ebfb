//! Per-thing realtime session over WebSocket.
//!
//! Frames in both directions are `{messageType, data}` JSON. The session task
//! spawned on upgrade is the socket's single writer: notifications arrive on
//! the hub queue, inbound frames are dispatched to the services, and error
//! replies are enqueued on the same queue so nothing can interleave.
//!
//! A malformed frame or an unknown `messageType` yields an `error` frame and
//! the session stays open; the connection only closes on transport
//! termination or thing removal.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use serde::Deserialize;
use serde_json::{Value, json};

use thinghub_app::hub::{OutboundFrame, SessionMessage};
use thinghub_app::ports::Adapter;
use thinghub_domain::id::{SessionId, ThingId};

use crate::state::AppState;

/// Inbound realtime frame.
#[derive(Debug, Deserialize)]
struct IncomingFrame {
    #[serde(rename = "messageType")]
    message_type: String,
    #[serde(default)]
    data: Value,
}

/// `GET /things/{thing_id}/ws`
pub async fn attach<A: Adapter>(
    State(state): State<AppState<A>>,
    Path(thing_id): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_session(state, ThingId::new(thing_id), socket))
}

async fn handle_session<A: Adapter>(state: AppState<A>, thing_id: ThingId, mut socket: WebSocket) {
    // Binding to a nonexistent thing always fails: one error frame, then
    // close.
    if !state.registry.contains(&thing_id).await {
        let frame = OutboundFrame::Error(json!({
            "status": "404 Not Found",
            "message": format!("thing not found: {thing_id}"),
        }));
        let _ = send_frame(&mut socket, &frame).await;
        let _ = socket.send(Message::Close(None)).await;
        return;
    }

    let (session_id, mut outbound) = state.hub.open_session(thing_id.clone());
    tracing::debug!(%thing_id, %session_id, "realtime session opened");

    // Bind-time frames: connection status plus a full property snapshot.
    if send_frame(&mut socket, &OutboundFrame::Connected(true)).await.is_err() {
        state.hub.close_session(session_id);
        return;
    }
    if let Ok(values) = state.registry.properties(&thing_id).await
        && send_frame(&mut socket, &OutboundFrame::PropertyStatus(Value::Object(values)))
            .await
            .is_err()
    {
        state.hub.close_session(session_id);
        return;
    }

    loop {
        tokio::select! {
            queued = outbound.recv() => match queued {
                Some(SessionMessage::Frame(frame)) => {
                    if send_frame(&mut socket, &frame).await.is_err() {
                        break;
                    }
                }
                Some(SessionMessage::Close) | None => {
                    let _ = socket.send(Message::Close(None)).await;
                    break;
                }
            },
            inbound = socket.recv() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    dispatch(&state, &thing_id, session_id, text.as_str()).await;
                }
                Some(Ok(Message::Binary(data))) => {
                    if let Ok(text) = String::from_utf8(data.to_vec()) {
                        dispatch(&state, &thing_id, session_id, &text).await;
                    }
                }
                Some(Ok(Message::Ping(data))) => {
                    if socket.send(Message::Pong(data)).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Pong(_))) => {}
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(err)) => {
                    tracing::debug!(%session_id, error = %err, "websocket error");
                    break;
                }
            },
        }
    }

    state.hub.close_session(session_id);
    tracing::debug!(%thing_id, %session_id, "realtime session closed");
}

async fn send_frame(socket: &mut WebSocket, frame: &OutboundFrame) -> Result<(), axum::Error> {
    let text = serde_json::to_string(frame).unwrap_or_default();
    socket.send(Message::Text(text.into())).await
}

/// Route one inbound frame. Failures are answered with an `error` frame that
/// echoes the offending request; the session stays open.
async fn dispatch<A: Adapter>(
    state: &AppState<A>,
    thing_id: &ThingId,
    session_id: SessionId,
    text: &str,
) {
    let Ok(frame) = serde_json::from_str::<IncomingFrame>(text) else {
        state.hub.send_error(
            session_id,
            json!({
                "status": "400 Bad Request",
                "message": "Parsing request failed",
            }),
        );
        return;
    };
    let request = serde_json::from_str::<Value>(text).unwrap_or(Value::Null);

    match frame.message_type.as_str() {
        "setProperty" => {
            let Some(values) = frame.data.as_object() else {
                reply_error(state, session_id, &request, "setProperty data must be an object");
                return;
            };
            for (name, value) in values {
                if let Err(err) = state.registry.set_property(thing_id, name, value).await {
                    reply_error(state, session_id, &request, &err.to_string());
                }
            }
        }
        "requestAction" => {
            let Some(requests) = frame.data.as_object() else {
                reply_error(state, session_id, &request, "requestAction data must be an object");
                return;
            };
            for (name, body) in requests {
                let input = body.get("input").cloned().unwrap_or(Value::Null);
                if let Err(err) = state.actions.request_action(thing_id, name, input).await {
                    reply_error(state, session_id, &request, &err.to_string());
                }
            }
        }
        "addEventSubscription" => {
            // Unknown event names are accepted as no-op subscriptions; an
            // empty map subscribes to everything.
            let names: Vec<String> = frame
                .data
                .as_object()
                .map(|data| data.keys().cloned().collect())
                .unwrap_or_default();
            state.hub.subscribe_events(session_id, names);
        }
        other => {
            reply_error(
                state,
                session_id,
                &request,
                &format!("Unknown messageType: {other}"),
            );
        }
    }
}

fn reply_error<A: Adapter>(
    state: &AppState<A>,
    session_id: SessionId,
    request: &Value,
    message: &str,
) {
    state.hub.send_error(
        session_id,
        json!({
            "status": "400 Bad Request",
            "message": message,
            "request": request,
        }),
    );
}
