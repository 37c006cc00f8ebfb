//! Proxy passthrough to device-specific handlers.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{Method, StatusCode, header};
use axum::response::Response;

use thinghub_app::ports::Adapter;
use thinghub_domain::error::ThingHubError;
use thinghub_domain::id::ThingId;

use crate::error::ApiError;
use crate::state::AppState;

/// `ANY /proxy/{thing_id}/{*path}` — forwards the method and device-relative
/// path to the adapter and relays its raw response verbatim.
pub async fn forward<A: Adapter>(
    State(state): State<AppState<A>>,
    Path((thing_id, path)): Path<(String, String)>,
    method: Method,
) -> Result<Response, ApiError> {
    let thing_id = ThingId::new(thing_id);
    if !state.registry.contains(&thing_id).await {
        return Err(ThingHubError::not_found("thing", thing_id.as_str()).into());
    }

    let relayed = state
        .adapter
        .proxy(&thing_id, method.as_str(), &format!("/{path}"))
        .await?;

    Response::builder()
        .status(StatusCode::from_u16(relayed.status).unwrap_or(StatusCode::BAD_GATEWAY))
        .header(header::CONTENT_TYPE, relayed.content_type)
        .body(Body::from(relayed.body))
        .map_err(|err| ThingHubError::Internal(err.to_string()).into())
}
