//! End-to-end tests for the full thinghubd stack.
//!
//! Each test spins up the complete application (real registry, real hub,
//! virtual adapter, real axum router) and exercises the HTTP layer via
//! `tower::ServiceExt::oneshot` — no TCP port is bound.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use tower::ServiceExt;

use thinghub_adapter_http_axum::router;
use thinghub_adapter_http_axum::state::AppState;
use thinghub_adapter_virtual::VirtualAdapter;
use thinghub_app::actions::ActionManager;
use thinghub_app::events::EventBus;
use thinghub_app::hub::RealtimeHub;
use thinghub_app::registry::ThingRegistry;
use thinghub_domain::event::Event;
use thinghub_domain::id::ThingId;

struct TestApp {
    app: axum::Router,
    registry: Arc<ThingRegistry>,
    events: Arc<EventBus>,
    adapter: Arc<VirtualAdapter>,
}

/// Build a fully-wired router backed by the virtual adapter.
fn test_app() -> TestApp {
    let hub = Arc::new(RealtimeHub::new());
    let registry = Arc::new(ThingRegistry::new(Arc::clone(&hub)));
    let events = Arc::new(EventBus::new(Arc::clone(&registry), Arc::clone(&hub)));
    let adapter = Arc::new(VirtualAdapter::new());
    let actions = Arc::new(ActionManager::new(
        Arc::clone(&registry),
        Arc::clone(&hub),
        Arc::clone(&adapter),
    ));
    let state = AppState::new(
        Arc::clone(&registry),
        actions,
        Arc::clone(&events),
        hub,
        Arc::clone(&adapter),
    );
    TestApp {
        app: router::build(state),
        registry,
        events,
        adapter,
    }
}

fn test_thing() -> serde_json::Value {
    serde_json::json!({
        "id": "test-1",
        "title": "test-1",
        "@context": "https://www.w3.org/2022/wot/td/v1.1",
        "@type": ["OnOffSwitch"],
        "properties": {
            "power": {"@type": "OnOffProperty", "type": "boolean", "value": false},
            "percent": {"@type": "LevelProperty", "type": "number", "value": 20},
        },
    })
}

fn validation_thing() -> serde_json::Value {
    serde_json::json!({
        "id": "validation-1",
        "title": "validation-1",
        "properties": {
            "readOnlyProp": {"type": "boolean", "readOnly": true, "value": true},
            "minMaxProp": {"type": "number", "minimum": 10, "maximum": 20, "value": 15},
            "enumProp": {"type": "string", "enum": ["val1", "val2", "val3"], "value": "val2"},
            "multipleProp": {
                "type": "integer",
                "minimum": 0,
                "maximum": 600,
                "value": 10,
                "multipleOf": 5,
            },
        },
    })
}

fn pi_thing() -> serde_json::Value {
    serde_json::json!({
        "id": "pi-1",
        "title": "pi-1",
        "properties": {
            "power": {
                "type": "boolean",
                "value": true,
                "forms": [{"href": "/properties/power", "proxy": true}],
            },
        },
        "actions": {
            "reboot": {"description": "Reboot the device"},
        },
        "events": {
            "reboot": {"description": "Going down for reboot"},
        },
    })
}

async fn request(app: &axum::Router, method: &str, uri: &str, body: Option<&serde_json::Value>) -> (StatusCode, serde_json::Value) {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    let request = match body {
        Some(body) => builder.body(Body::from(body.to_string())).unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    };
    (status, json)
}

async fn create_thing(app: &TestApp, description: &serde_json::Value) {
    let (status, _) = request(&app.app, "POST", "/things", Some(description)).await;
    assert_eq!(status, StatusCode::CREATED);
}

// ---------------------------------------------------------------------------
// Health & thing collection
// ---------------------------------------------------------------------------

#[tokio::test]
async fn should_return_ok_when_health_check_called() {
    let app = test_app();
    let response = app
        .app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn should_list_no_things_initially() {
    let app = test_app();
    let (status, body) = request(&app.app, "GET", "/things", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!([]));
}

#[tokio::test]
async fn should_reject_thing_creation_with_empty_body() {
    let app = test_app();
    let response = app
        .app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/things")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn should_reject_duplicate_thing_id() {
    let app = test_app();
    create_thing(&app, &test_thing()).await;
    let (status, _) = request(&app.app, "POST", "/things", Some(&test_thing())).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn should_list_created_thing_with_href() {
    let app = test_app();
    create_thing(&app, &test_thing()).await;

    let (status, body) = request(&app.app, "GET", "/things", None).await;
    assert_eq!(status, StatusCode::OK);
    let things = body.as_array().unwrap();
    assert_eq!(things.len(), 1);
    assert_eq!(things[0]["href"], "/things/test-1");
}

#[tokio::test]
async fn should_serve_description_with_rewritten_proxy_forms() {
    let app = test_app();
    create_thing(&app, &pi_thing()).await;

    let (status, body) = request(&app.app, "GET", "/things/pi-1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "pi-1");
    let forms = body["properties"]["power"]["forms"].as_array().unwrap();
    assert_eq!(forms[0]["href"], "/proxy/pi-1/properties/power");
    assert!(forms[0].get("proxy").is_none());
    assert_eq!(forms[1]["href"], "/things/pi-1/properties/power");
    // Property values are not part of the description.
    assert!(body["properties"]["power"].get("value").is_none());
}

#[tokio::test]
async fn should_return_not_found_for_unknown_thing() {
    let app = test_app();
    create_thing(&app, &test_thing()).await;
    let (status, _) = request(&app.app, "GET", "/things/test-2", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn should_remove_thing() {
    let app = test_app();
    create_thing(&app, &test_thing()).await;

    let (status, _) = request(&app.app, "DELETE", "/things/test-1", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, body) = request(&app.app, "GET", "/things", None).await;
    assert_eq!(body, serde_json::json!([]));

    let (status, _) = request(&app.app, "DELETE", "/things/test-1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Rename & patch shapes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn should_rename_thing_via_patch() {
    let app = test_app();
    create_thing(&app, &pi_thing()).await;

    let (status, body) = request(
        &app.app,
        "PATCH",
        "/things/pi-1",
        Some(&serde_json::json!({"title": "new title"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "new title");

    let (_, body) = request(&app.app, "GET", "/things/pi-1", None).await;
    assert_eq!(body["title"], "new title");
}

#[tokio::test]
async fn should_reject_blank_rename() {
    let app = test_app();
    create_thing(&app, &pi_thing()).await;

    let (status, _) = request(
        &app.app,
        "PATCH",
        "/things/pi-1",
        Some(&serde_json::json!({"title": "  \n  "})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn should_reject_unrecognized_patch_shape() {
    let app = test_app();
    create_thing(&app, &test_thing()).await;

    let (status, _) = request(
        &app.app,
        "PATCH",
        "/things/test-1",
        Some(&serde_json::json!({"abc": true})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn should_prefer_not_found_over_bad_shape() {
    let app = test_app();
    let (status, _) = request(
        &app.app,
        "PATCH",
        "/things/test-1",
        Some(&serde_json::json!({"abc": true})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn should_set_floorplan_coordinates() {
    let app = test_app();
    create_thing(&app, &test_thing()).await;

    let (status, body) = request(
        &app.app,
        "PATCH",
        "/things/test-1",
        Some(&serde_json::json!({"floorplanX": 10, "floorplanY": 20})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["floorplanX"], 10.0);
    assert_eq!(body["floorplanY"], 20.0);
}

#[tokio::test]
async fn should_set_floorplan_visibility_via_put() {
    let app = test_app();
    create_thing(&app, &test_thing()).await;

    let mut updated = test_thing();
    updated["floorplanVisibility"] = serde_json::json!(false);
    let (status, body) = request(&app.app, "PUT", "/things/test-1", Some(&updated)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["floorplanVisibility"], false);
}

#[tokio::test]
async fn should_reassign_layout_index_densely() {
    let app = test_app();
    create_thing(&app, &test_thing()).await;
    let mut second = test_thing();
    second["id"] = serde_json::json!("test-2");
    second["title"] = serde_json::json!("test-2");
    create_thing(&app, &second).await;
    let mut third = test_thing();
    third["id"] = serde_json::json!("test-3");
    third["title"] = serde_json::json!("test-3");
    create_thing(&app, &third).await;

    // Out-of-range targets clamp to the end of the dense order.
    let (status, body) = request(
        &app.app,
        "PATCH",
        "/things/test-1",
        Some(&serde_json::json!({"layoutIndex": 15})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["layoutIndex"], 2);

    let (status, body) = request(
        &app.app,
        "PATCH",
        "/things/test-2",
        Some(&serde_json::json!({"layoutIndex": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["layoutIndex"], 1);
}

// ---------------------------------------------------------------------------
// PIN & credentials
// ---------------------------------------------------------------------------

#[tokio::test]
async fn should_reject_wrong_pin() {
    let app = test_app();
    create_thing(&app, &pi_thing()).await;

    let (status, _) = request(
        &app.app,
        "PATCH",
        "/things",
        Some(&serde_json::json!({"thingId": "pi-1", "pin": "0000"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn should_accept_valid_pin() {
    let app = test_app();
    create_thing(&app, &pi_thing()).await;

    let (status, body) = request(
        &app.app,
        "PATCH",
        "/things",
        Some(&serde_json::json!({"thingId": "pi-1", "pin": "1234"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "pi-1");
}

#[tokio::test]
async fn should_reject_wrong_credentials() {
    let app = test_app();
    create_thing(&app, &pi_thing()).await;

    let (status, _) = request(
        &app.app,
        "PATCH",
        "/things",
        Some(&serde_json::json!({
            "thingId": "pi-1",
            "username": "fake",
            "password": "wrong",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn should_accept_valid_credentials() {
    let app = test_app();
    create_thing(&app, &pi_thing()).await;

    let (status, body) = request(
        &app.app,
        "PATCH",
        "/things",
        Some(&serde_json::json!({
            "thingId": "pi-1",
            "username": "test-user",
            "password": "Password-1234!",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "pi-1");
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

#[tokio::test]
async fn should_read_all_properties() {
    let app = test_app();
    create_thing(&app, &test_thing()).await;

    let (status, body) = request(&app.app, "GET", "/things/test-1/properties", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["power"], false);
    assert_eq!(body["percent"], 20);
}

#[tokio::test]
async fn should_round_trip_boolean_property() {
    let app = test_app();
    create_thing(&app, &test_thing()).await;

    let (status, _) = request(
        &app.app,
        "PUT",
        "/things/test-1/properties/power",
        Some(&serde_json::json!(true)),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = request(&app.app, "GET", "/things/test-1/properties/power", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!(true));

    let (status, _) = request(
        &app.app,
        "PUT",
        "/things/test-1/properties/power",
        Some(&serde_json::json!(false)),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, body) = request(&app.app, "GET", "/things/test-1/properties/power", None).await;
    assert_eq!(body, serde_json::json!(false));
}

#[tokio::test]
async fn should_fail_property_access_on_unknown_names() {
    let app = test_app();
    create_thing(&app, &test_thing()).await;

    let (status, _) = request(&app.app, "GET", "/things/test-1/properties/xyz", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = request(&app.app, "GET", "/things/test-1a/properties/power", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = request(
        &app.app,
        "PUT",
        "/things/test-1/properties/xyz",
        Some(&serde_json::json!(true)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn should_reject_malformed_property_body() {
    let app = test_app();
    create_thing(&app, &test_thing()).await;

    // Empty body
    let response = app
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/things/test-1/properties/power")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Not JSON
    let response = app
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/things/test-1/properties/power")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("foo"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn should_set_multiple_properties() {
    let app = test_app();
    create_thing(&app, &test_thing()).await;

    let (status, _) = request(
        &app.app,
        "PUT",
        "/things/test-1/properties",
        Some(&serde_json::json!({"power": true, "percent": 42})),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, body) = request(&app.app, "GET", "/things/test-1/properties", None).await;
    assert_eq!(body["power"], true);
    assert_eq!(body["percent"], 42);
}

#[tokio::test]
async fn should_fail_bulk_set_entirely_on_unknown_key() {
    let app = test_app();
    create_thing(&app, &test_thing()).await;

    let (status, _) = request(
        &app.app,
        "PUT",
        "/things/test-1/properties",
        Some(&serde_json::json!({
            "power": true,
            "percent": 42,
            "invalidpropertyname": true,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // No key was applied, valid or not.
    let (_, body) = request(&app.app, "GET", "/things/test-1/properties", None).await;
    assert_eq!(body["power"], false);
    assert_eq!(body["percent"], 20);
}

// ---------------------------------------------------------------------------
// Property validation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn should_refuse_write_to_read_only_property() {
    let app = test_app();
    create_thing(&app, &validation_thing()).await;

    let (status, _) = request(
        &app.app,
        "PUT",
        "/things/validation-1/properties/readOnlyProp",
        Some(&serde_json::json!(false)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = request(
        &app.app,
        "GET",
        "/things/validation-1/properties/readOnlyProp",
        None,
    )
    .await;
    assert_eq!(body, serde_json::json!(true));
}

#[tokio::test]
async fn should_enforce_minimum_and_maximum() {
    let app = test_app();
    create_thing(&app, &validation_thing()).await;

    for out_of_range in [0, 30] {
        let (status, _) = request(
            &app.app,
            "PUT",
            "/things/validation-1/properties/minMaxProp",
            Some(&serde_json::json!(out_of_range)),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    let (_, body) = request(
        &app.app,
        "GET",
        "/things/validation-1/properties/minMaxProp",
        None,
    )
    .await;
    assert_eq!(body, serde_json::json!(15));
}

#[tokio::test]
async fn should_enforce_multiple_of() {
    let app = test_app();
    create_thing(&app, &validation_thing()).await;

    let (status, _) = request(
        &app.app,
        "PUT",
        "/things/validation-1/properties/multipleProp",
        Some(&serde_json::json!(3)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = request(
        &app.app,
        "GET",
        "/things/validation-1/properties/multipleProp",
        None,
    )
    .await;
    assert_eq!(body, serde_json::json!(10));

    let (status, _) = request(
        &app.app,
        "PUT",
        "/things/validation-1/properties/multipleProp",
        Some(&serde_json::json!(30)),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, body) = request(
        &app.app,
        "GET",
        "/things/validation-1/properties/multipleProp",
        None,
    )
    .await;
    assert_eq!(body, serde_json::json!(30));
}

#[tokio::test]
async fn should_enforce_enum_membership() {
    let app = test_app();
    create_thing(&app, &validation_thing()).await;

    let (status, _) = request(
        &app.app,
        "PUT",
        "/things/validation-1/properties/enumProp",
        Some(&serde_json::json!("val0")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = request(
        &app.app,
        "GET",
        "/things/validation-1/properties/enumProp",
        None,
    )
    .await;
    assert_eq!(body, serde_json::json!("val2"));
}

// ---------------------------------------------------------------------------
// Discovery & staging
// ---------------------------------------------------------------------------

#[tokio::test]
async fn should_list_adapter_reported_devices_as_new_things() {
    let app = test_app();
    let ctx = Arc::clone(&app.registry);
    app.adapter
        .add_device(&ctx, serde_json::from_value(serde_json::json!({"id": "test-2", "title": "test-2"})).unwrap())
        .await;
    app.adapter
        .add_device(&ctx, serde_json::from_value(serde_json::json!({"id": "test-3", "title": "test-3"})).unwrap())
        .await;

    let (status, body) = request(&app.app, "GET", "/new_things", None).await;
    assert_eq!(status, StatusCode::OK);
    let staged = body.as_array().unwrap();
    assert_eq!(staged.len(), 2);
    assert_eq!(staged[0]["href"], "/things/test-2");
    assert_eq!(staged[1]["href"], "/things/test-3");
}

#[tokio::test]
async fn should_promote_staged_thing_on_create() {
    let app = test_app();
    let ctx = Arc::clone(&app.registry);
    let descriptor = serde_json::json!({"id": "test-6", "title": "test-6"});
    app.adapter
        .add_device(&ctx, serde_json::from_value(descriptor.clone()).unwrap())
        .await;

    create_thing(&app, &descriptor).await;

    let (_, staged) = request(&app.app, "GET", "/new_things", None).await;
    assert_eq!(staged, serde_json::json!([]));

    let (_, things) = request(&app.app, "GET", "/things", None).await;
    assert_eq!(things.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn should_not_stage_devices_for_registered_things() {
    let app = test_app();
    create_thing(&app, &test_thing()).await;

    let ctx = Arc::clone(&app.registry);
    app.adapter
        .add_device(&ctx, serde_json::from_value(test_thing()).unwrap())
        .await;

    let (_, staged) = request(&app.app, "GET", "/new_things", None).await;
    assert_eq!(staged, serde_json::json!([]));
}

#[tokio::test]
async fn should_evict_staging_and_live_thing_on_device_removal() {
    let app = test_app();
    create_thing(&app, &test_thing()).await;
    let ctx = Arc::clone(&app.registry);
    app.adapter
        .add_device(&ctx, serde_json::from_value(serde_json::json!({"id": "test-9", "title": "test-9"})).unwrap())
        .await;

    app.adapter.remove_device(&ctx, ThingId::new("test-9")).await;
    app.adapter.remove_device(&ctx, ThingId::new("test-1")).await;

    let (_, staged) = request(&app.app, "GET", "/new_things", None).await;
    assert_eq!(staged, serde_json::json!([]));
    let (_, things) = request(&app.app, "GET", "/things", None).await;
    assert_eq!(things, serde_json::json!([]));
}

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn should_create_and_list_thing_actions() {
    let app = test_app();
    create_thing(&app, &pi_thing()).await;

    let (status, body) = request(
        &app.app,
        "POST",
        "/things/pi-1/actions/reboot",
        Some(&serde_json::json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body["reboot"]["href"]
        .as_str()
        .unwrap()
        .starts_with("/things/pi-1/actions/reboot/"));

    let (status, body) = request(&app.app, "GET", "/things/pi-1/actions", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_object().unwrap().len(), 1);
    assert!(body["reboot"][0]["href"]
        .as_str()
        .unwrap()
        .starts_with("/things/pi-1"));

    // Thing actions do not show up in the gateway listing.
    let (_, gateway) = request(&app.app, "GET", "/actions", None).await;
    assert_eq!(gateway, serde_json::json!({}));
}

#[tokio::test]
async fn should_fail_action_on_unknown_thing() {
    let app = test_app();
    let (status, _) = request(
        &app.app,
        "POST",
        "/things/nonexistent-thing/actions/reboot",
        Some(&serde_json::json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn should_fail_unknown_action_name() {
    let app = test_app();
    create_thing(&app, &pi_thing()).await;

    let (status, _) = request(
        &app.app,
        "POST",
        "/things/pi-1/actions/explode",
        Some(&serde_json::json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn should_complete_action_in_background() {
    let app = test_app();
    create_thing(&app, &pi_thing()).await;

    let (_, created) = request(
        &app.app,
        "POST",
        "/things/pi-1/actions/reboot",
        Some(&serde_json::json!({})),
    )
    .await;
    assert_eq!(created["reboot"]["status"], "pending");

    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    let (_, listed) = request(&app.app, "GET", "/things/pi-1/actions", None).await;
    assert_eq!(listed["reboot"][0]["status"], "completed");
    assert!(listed["reboot"][0].get("timeCompleted").is_some());
}

#[tokio::test]
async fn should_run_gateway_pair_action_through_lifecycle() {
    let app = test_app();

    let (status, created) = request(
        &app.app,
        "POST",
        "/actions/pair",
        Some(&serde_json::json!({"timeout": 60})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let href = created["pair"]["href"].as_str().unwrap().to_string();
    assert!(href.starts_with("/actions/pair/"));

    let (_, listed) = request(&app.app, "GET", "/actions", None).await;
    assert_eq!(listed.as_object().unwrap().len(), 1);

    // Deleting the pair action closes the pairing window.
    let (status, _) = request(&app.app, "DELETE", &href, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, listed) = request(&app.app, "GET", "/actions", None).await;
    assert_eq!(listed, serde_json::json!({}));
}

#[tokio::test]
async fn should_deliver_paired_devices_to_staging() {
    let app = test_app();
    app.adapter.pair_device(
        serde_json::from_value(serde_json::json!({"id": "test-6", "title": "test-6"})).unwrap(),
    );

    let (status, _) = request(
        &app.app,
        "POST",
        "/actions/pair",
        Some(&serde_json::json!({"timeout": 60})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    let (_, staged) = request(&app.app, "GET", "/new_things", None).await;
    assert_eq!(staged.as_array().unwrap().len(), 1);
    assert_eq!(staged[0]["href"], "/things/test-6");
}

#[tokio::test]
async fn should_unpair_armed_device_via_gateway_action() {
    let app = test_app();
    let ctx = Arc::clone(&app.registry);
    app.adapter
        .add_device(&ctx, serde_json::from_value(serde_json::json!({"id": "test-5", "title": "test-5"})).unwrap())
        .await;
    app.adapter.unpair_device(ThingId::new("test-5"));

    let (status, _) = request(
        &app.app,
        "POST",
        "/actions/unpair",
        Some(&serde_json::json!({"id": "test-5"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    let (_, staged) = request(&app.app, "GET", "/new_things", None).await;
    assert_eq!(staged, serde_json::json!([]));
}

#[tokio::test]
async fn should_fail_unknown_gateway_action() {
    let app = test_app();
    let (status, _) = request(
        &app.app,
        "POST",
        "/actions/explode",
        Some(&serde_json::json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn should_fail_deleting_unknown_action() {
    let app = test_app();
    create_thing(&app, &pi_thing()).await;
    let (status, _) = request(
        &app.app,
        "DELETE",
        &format!("/things/pi-1/actions/reboot/{}", uuid_like()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

fn uuid_like() -> &'static str {
    "00000000-0000-4000-8000-000000000000"
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[tokio::test]
async fn should_list_events_in_insertion_order() {
    let app = test_app();
    create_thing(&app, &test_thing()).await;
    let thing_id = ThingId::new("test-1");

    let (_, empty) = request(&app.app, "GET", "/things/test-1/events", None).await;
    assert_eq!(empty, serde_json::json!([]));

    app.events
        .add(&thing_id, Event::new("a", serde_json::json!("just a cool event")))
        .await
        .unwrap();
    app.events
        .add(&thing_id, Event::new("b", serde_json::json!("just a boring event")))
        .await
        .unwrap();

    let (status, body) = request(&app.app, "GET", "/things/test-1/events", None).await;
    assert_eq!(status, StatusCode::OK);
    let log = body.as_array().unwrap();
    assert_eq!(log.len(), 2);
    assert_eq!(log[0]["a"]["data"], "just a cool event");
    assert!(log[0]["a"].get("timestamp").is_some());
    assert_eq!(log[1]["b"]["data"], "just a boring event");

    let (_, named) = request(&app.app, "GET", "/things/test-1/events/a", None).await;
    let named = named.as_array().unwrap();
    assert_eq!(named.len(), 1);
    assert_eq!(named[0]["a"]["data"], "just a cool event");
}

#[tokio::test]
async fn should_aggregate_events_at_gateway_scope() {
    let app = test_app();
    create_thing(&app, &test_thing()).await;
    app.events
        .add(&ThingId::new("test-1"), Event::new("a", serde_json::json!(1)))
        .await
        .unwrap();

    let (status, body) = request(&app.app, "GET", "/events", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (_, named) = request(&app.app, "GET", "/events/b", None).await;
    assert_eq!(named, serde_json::json!([]));
}

#[tokio::test]
async fn should_refuse_event_stream_for_unknown_thing_or_event() {
    let app = test_app();
    create_thing(&app, &pi_thing()).await;

    let response = app
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/things/non-existent-thing/events/reboot")
                .header(header::ACCEPT, "text/event-stream")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/things/pi-1/events/non-existent-event")
                .header(header::ACCEPT, "text/event-stream")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn should_open_event_stream_for_declared_event() {
    let app = test_app();
    create_thing(&app, &pi_thing()).await;

    let response = app
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/things/pi-1/events/reboot")
                .header(header::ACCEPT, "text/event-stream")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("text/event-stream"));
}

// ---------------------------------------------------------------------------
// Proxy passthrough
// ---------------------------------------------------------------------------

#[tokio::test]
async fn should_relay_proxied_request_verbatim() {
    let app = test_app();
    create_thing(&app, &pi_thing()).await;

    let response = app
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/proxy/pi-1/properties/power")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"GET /properties/power");
}

#[tokio::test]
async fn should_refuse_proxy_for_unknown_thing() {
    let app = test_app();
    let response = app
        .app
        .oneshot(
            Request::builder()
                .uri("/proxy/pi-1/properties/power")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
