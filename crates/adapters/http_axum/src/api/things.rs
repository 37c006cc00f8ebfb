//! JSON REST handlers for the thing collection.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::Value;

use thinghub_app::ports::Adapter;
use thinghub_domain::error::ThingHubError;
use thinghub_domain::id::ThingId;
use thinghub_domain::thing::{Credentials, Thing, ThingDescription};

use crate::error::ApiError;
use crate::state::AppState;

/// Possible responses from the list endpoint.
pub enum ListResponse {
    Ok(Json<Vec<Value>>),
}

impl IntoResponse for ListResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// Possible responses from the create endpoint.
pub enum CreateResponse {
    Created(Json<Value>),
}

impl IntoResponse for CreateResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Created(json) => (StatusCode::CREATED, json).into_response(),
        }
    }
}

/// `GET /things`
pub async fn list<A: Adapter>(State(state): State<AppState<A>>) -> ListResponse {
    let things = state.registry.list().await;
    ListResponse::Ok(Json(things.iter().map(description_json).collect()))
}

/// `POST /things`
///
/// Creating a thing whose id sits in the staging area promotes the staged
/// descriptor into the live registry.
pub async fn create<A: Adapter>(
    State(state): State<AppState<A>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<CreateResponse, ApiError> {
    let Json(body) = body
        .map_err(|err| ThingHubError::BadRequest(format!("invalid request body: {err}")))?;
    let description: ThingDescription = serde_json::from_value(body)
        .map_err(|err| ThingHubError::BadRequest(format!("invalid thing description: {err}")))?;
    let thing = state.registry.create_thing(description).await?;
    Ok(CreateResponse::Created(Json(description_json(&thing))))
}

/// `GET /things/{thing_id}`
pub async fn get<A: Adapter>(
    State(state): State<AppState<A>>,
    Path(thing_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let thing = state.registry.get(&ThingId::new(thing_id)).await?;
    Ok(Json(description_json(&thing)))
}

/// `PUT /things/{thing_id}` — update title and floorplan visibility from a
/// full description.
pub async fn update<A: Adapter>(
    State(state): State<AppState<A>>,
    Path(thing_id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let thing_id = ThingId::new(thing_id);
    if !state.registry.contains(&thing_id).await {
        return Err(ThingHubError::not_found("thing", thing_id.as_str()).into());
    }

    let title = body
        .get("title")
        .and_then(Value::as_str)
        .ok_or_else(|| ThingHubError::BadRequest("title is required".into()))?;
    let mut thing = state.registry.rename(&thing_id, title).await?;
    if let Some(visible) = body.get("floorplanVisibility").and_then(Value::as_bool) {
        thing = state
            .registry
            .set_floorplan_visibility(&thing_id, visible)
            .await?;
    }
    Ok(Json(description_json(&thing)))
}

/// `PATCH /things/{thing_id}` — accepts exactly one of `{title}`,
/// `{floorplanX, floorplanY}`, `{layoutIndex}`, `{pin}`.
pub async fn patch<A: Adapter>(
    State(state): State<AppState<A>>,
    Path(thing_id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let thing_id = ThingId::new(thing_id);
    if !state.registry.contains(&thing_id).await {
        return Err(ThingHubError::not_found("thing", thing_id.as_str()).into());
    }

    let thing = match patch_shape(&body)? {
        PatchShape::Title(title) => state.registry.rename(&thing_id, &title).await?,
        PatchShape::Floorplan { x, y } => state.registry.set_floorplan(&thing_id, x, y).await?,
        PatchShape::LayoutIndex(index) => {
            state.registry.set_layout_index(&thing_id, index).await?
        }
        PatchShape::Pin(pin) => {
            state.adapter.set_pin(&thing_id, &pin).await?;
            state.registry.set_pin(&thing_id, &pin).await?
        }
    };
    Ok(Json(description_json(&thing)))
}

/// `PATCH /things` — accepts exactly one of `{thingId, pin}` or
/// `{thingId, username, password}`, verified through the adapter.
pub async fn patch_collection<A: Adapter>(
    State(state): State<AppState<A>>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let object = body
        .as_object()
        .ok_or_else(|| ThingHubError::BadRequest("expected a JSON object".into()))?;
    let thing_id = object
        .get("thingId")
        .and_then(Value::as_str)
        .map(ThingId::new)
        .ok_or_else(|| ThingHubError::BadRequest("thingId is required".into()))?;
    if !state.registry.contains(&thing_id).await {
        return Err(ThingHubError::not_found("thing", thing_id.as_str()).into());
    }

    let mut keys: Vec<&str> = object.keys().map(String::as_str).collect();
    keys.sort_unstable();

    let thing = match keys.as_slice() {
        ["pin", "thingId"] => {
            let pin = object
                .get("pin")
                .and_then(Value::as_str)
                .ok_or_else(|| ThingHubError::BadRequest("pin must be a string".into()))?;
            state.adapter.set_pin(&thing_id, pin).await?;
            state.registry.set_pin(&thing_id, pin).await?
        }
        ["password", "thingId", "username"] => {
            let credentials = Credentials {
                username: string_field(object, "username")?,
                password: string_field(object, "password")?,
            };
            state.adapter.set_credentials(&thing_id, &credentials).await?;
            state.registry.set_credentials(&thing_id, credentials).await?
        }
        _ => {
            return Err(ThingHubError::BadRequest("unrecognized patch shape".into()).into());
        }
    };
    Ok(Json(description_json(&thing)))
}

/// `DELETE /things/{thing_id}`
pub async fn delete<A: Adapter>(
    State(state): State<AppState<A>>,
    Path(thing_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.registry.remove(&ThingId::new(thing_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

enum PatchShape {
    Title(String),
    Floorplan { x: f64, y: f64 },
    LayoutIndex(u32),
    Pin(String),
}

/// Match the body against the allowed patch shapes by exact key set; any
/// other shape is a bad request.
fn patch_shape(body: &Value) -> Result<PatchShape, ThingHubError> {
    let object = body
        .as_object()
        .ok_or_else(|| ThingHubError::BadRequest("expected a JSON object".into()))?;
    let mut keys: Vec<&str> = object.keys().map(String::as_str).collect();
    keys.sort_unstable();

    match keys.as_slice() {
        ["title"] => Ok(PatchShape::Title(string_field(object, "title")?)),
        ["floorplanX", "floorplanY"] => Ok(PatchShape::Floorplan {
            x: number_field(object, "floorplanX")?,
            y: number_field(object, "floorplanY")?,
        }),
        ["layoutIndex"] => {
            let index = object
                .get("layoutIndex")
                .and_then(Value::as_u64)
                .ok_or_else(|| {
                    ThingHubError::BadRequest("layoutIndex must be a non-negative integer".into())
                })?;
            Ok(PatchShape::LayoutIndex(
                u32::try_from(index).unwrap_or(u32::MAX),
            ))
        }
        ["pin"] => Ok(PatchShape::Pin(string_field(object, "pin")?)),
        _ => Err(ThingHubError::BadRequest("unrecognized patch shape".into())),
    }
}

fn string_field(
    object: &serde_json::Map<String, Value>,
    name: &str,
) -> Result<String, ThingHubError> {
    object
        .get(name)
        .and_then(Value::as_str)
        .map(ToString::to_string)
        .ok_or_else(|| ThingHubError::BadRequest(format!("{name} must be a string")))
}

fn number_field(
    object: &serde_json::Map<String, Value>,
    name: &str,
) -> Result<f64, ThingHubError> {
    object
        .get(name)
        .and_then(Value::as_f64)
        .ok_or_else(|| ThingHubError::BadRequest(format!("{name} must be a number")))
}

/// Public description of a thing: the serialized aggregate plus resource
/// hrefs, with proxied form hrefs rewritten behind `/proxy/{id}` and the
/// canonical gateway href appended to each descriptor.
pub(crate) fn description_json(thing: &Thing) -> Value {
    let mut value = serde_json::to_value(thing).unwrap_or(Value::Null);
    let base = format!("/things/{}", thing.id);

    for section in ["properties", "actions", "events"] {
        if let Some(descriptors) = value.get_mut(section).and_then(Value::as_object_mut) {
            for (name, descriptor) in descriptors {
                rewrite_forms(descriptor, &thing.id, &format!("{base}/{section}/{name}"));
            }
        }
    }

    if let Some(object) = value.as_object_mut() {
        object.insert("href".to_string(), Value::String(base));
    }
    value
}

fn rewrite_forms(descriptor: &mut Value, thing_id: &ThingId, canonical: &str) {
    let Some(descriptor) = descriptor.as_object_mut() else {
        return;
    };
    let forms = descriptor
        .entry("forms")
        .or_insert_with(|| Value::Array(Vec::new()));
    let Some(forms) = forms.as_array_mut() else {
        return;
    };
    for form in forms.iter_mut() {
        let Some(form) = form.as_object_mut() else {
            continue;
        };
        let proxied = form
            .remove("proxy")
            .is_some_and(|proxy| proxy == Value::Bool(true));
        let href = form.get("href").and_then(Value::as_str).map(String::from);
        if proxied && let Some(href) = href {
            form.insert(
                "href".to_string(),
                Value::String(format!("/proxy/{thing_id}{href}")),
            );
        }
    }
    forms.push(serde_json::json!({ "href": canonical }));
}
