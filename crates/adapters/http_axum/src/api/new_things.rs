//! Staged ("new") things: the pending list and the discovery stream.

use axum::Json;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use serde_json::Value;

use thinghub_app::ports::Adapter;

use crate::state::AppState;

/// `GET /new_things` — descriptors reported by adapters but not yet promoted.
pub async fn list<A: Adapter>(State(state): State<AppState<A>>) -> Json<Vec<Value>> {
    Json(state.registry.staged().iter().map(staged_json).collect())
}

/// `GET /new_things/ws` — discovery stream delivering newly staged
/// descriptors as they arrive.
pub async fn attach<A: Adapter>(
    State(state): State<AppState<A>>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_stream(state, socket))
}

async fn handle_stream<A: Adapter>(state: AppState<A>, mut socket: WebSocket) {
    let (stream_id, mut discoveries) = state.hub.open_discovery();

    // Replay what is already staged, then stream live discoveries.
    for staged in state.registry.staged() {
        if send_json(&mut socket, &staged_json(&staged)).await.is_err() {
            state.hub.close_discovery(stream_id);
            return;
        }
    }

    loop {
        tokio::select! {
            discovery = discoveries.recv() => match discovery {
                Some(description) => {
                    if send_json(&mut socket, &description).await.is_err() {
                        break;
                    }
                }
                None => break,
            },
            inbound = socket.recv() => match inbound {
                Some(Ok(Message::Ping(data))) => {
                    if socket.send(Message::Pong(data)).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    state.hub.close_discovery(stream_id);
}

async fn send_json(socket: &mut WebSocket, value: &Value) -> Result<(), axum::Error> {
    let text = serde_json::to_string(value).unwrap_or_default();
    socket.send(Message::Text(text.into())).await
}

fn staged_json(description: &thinghub_domain::thing::ThingDescription) -> Value {
    let mut value = serde_json::to_value(description).unwrap_or(Value::Null);
    if let Some(object) = value.as_object_mut() {
        object.insert(
            "href".to_string(),
            Value::String(format!("/things/{}", description.id)),
        );
    }
    value
}
