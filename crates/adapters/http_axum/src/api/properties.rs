//! JSON REST handlers for property reads and writes.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde_json::Value;

use thinghub_app::ports::Adapter;
use thinghub_domain::error::ThingHubError;
use thinghub_domain::id::ThingId;

use crate::error::ApiError;
use crate::state::AppState;

/// `GET /things/{thing_id}/properties`
pub async fn list<A: Adapter>(
    State(state): State<AppState<A>>,
    Path(thing_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let values = state.registry.properties(&ThingId::new(thing_id)).await?;
    Ok(Json(Value::Object(values)))
}

/// `PUT /things/{thing_id}/properties` — bulk write.
///
/// Fails atomically when any key names an unknown or read-only property;
/// otherwise each key is validated and applied independently.
pub async fn set_all<A: Adapter>(
    State(state): State<AppState<A>>,
    Path(thing_id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(body) =
        body.map_err(|err| ThingHubError::BadRequest(format!("invalid request body: {err}")))?;
    let values = body
        .as_object()
        .ok_or_else(|| ThingHubError::BadRequest("expected a map of property values".into()))?;
    state
        .registry
        .set_properties(&ThingId::new(thing_id), values)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /things/{thing_id}/properties/{name}`
pub async fn get_one<A: Adapter>(
    State(state): State<AppState<A>>,
    Path((thing_id, name)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let value = state
        .registry
        .property(&ThingId::new(thing_id), &name)
        .await?;
    Ok(Json(value))
}

/// `PUT /things/{thing_id}/properties/{name}` — write a bare JSON value.
pub async fn set_one<A: Adapter>(
    State(state): State<AppState<A>>,
    Path((thing_id, name)): Path<(String, String)>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(value) =
        body.map_err(|err| ThingHubError::BadRequest(format!("invalid request body: {err}")))?;
    state
        .registry
        .set_property(&ThingId::new(thing_id), &name, &value)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
