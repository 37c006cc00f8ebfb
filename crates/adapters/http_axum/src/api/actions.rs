//! JSON REST handlers for thing-scoped and gateway-scoped actions.

use std::str::FromStr;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde_json::Value;

use thinghub_app::ports::Adapter;
use thinghub_domain::error::ThingHubError;
use thinghub_domain::id::{ActionId, ThingId};

use crate::error::ApiError;
use crate::state::AppState;

/// Action inputs are optional; an absent or empty body means no input.
fn input_from(body: Result<Json<Value>, JsonRejection>) -> Value {
    body.map(|Json(value)| value).unwrap_or(Value::Null)
}

/// `POST /things/{thing_id}/actions/{name}`
pub async fn create_for_thing<A: Adapter>(
    State(state): State<AppState<A>>,
    Path((thing_id, name)): Path<(String, String)>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let action = state
        .actions
        .request_action(&ThingId::new(thing_id), &name, input_from(body))
        .await?;
    Ok((StatusCode::CREATED, Json(action.to_wire())))
}

/// `GET /things/{thing_id}/actions`
pub async fn list_for_thing<A: Adapter>(
    State(state): State<AppState<A>>,
    Path(thing_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let grouped = state
        .actions
        .actions_for_thing(&ThingId::new(thing_id))
        .await?;
    Ok(Json(grouped))
}

/// `DELETE /things/{thing_id}/actions/{name}/{action_id}`
pub async fn delete_for_thing<A: Adapter>(
    State(state): State<AppState<A>>,
    Path((thing_id, _name, action_id)): Path<(String, String, String)>,
) -> Result<StatusCode, ApiError> {
    let action_id = parse_action_id(&action_id)?;
    state
        .actions
        .remove_action(&ThingId::new(thing_id), action_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /actions/{name}` — gateway scope (`pair`, `unpair`).
pub async fn create_gateway<A: Adapter>(
    State(state): State<AppState<A>>,
    Path(name): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let action = state
        .actions
        .request_gateway_action(&name, input_from(body))
        .await?;
    Ok((StatusCode::CREATED, Json(action.to_wire())))
}

/// `GET /actions` — gateway scope, non-deleted, grouped by name.
pub async fn list_gateway<A: Adapter>(State(state): State<AppState<A>>) -> Json<Value> {
    Json(state.actions.gateway_actions())
}

/// `DELETE /actions/{name}/{action_id}`
pub async fn delete_gateway<A: Adapter>(
    State(state): State<AppState<A>>,
    Path((_name, action_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let action_id = parse_action_id(&action_id)?;
    state.actions.remove_gateway_action(action_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn parse_action_id(raw: &str) -> Result<ActionId, ApiError> {
    ActionId::from_str(raw)
        .map_err(|_| ThingHubError::not_found("action", raw.to_string()).into())
}
