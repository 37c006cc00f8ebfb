//! Axum router assembly.

use axum::Router;
use axum::routing::{any, get, post};
use tower_http::trace::TraceLayer;

use thinghub_app::ports::Adapter;

use crate::api::{actions, events, new_things, properties, proxy, socket, things};
use crate::state::AppState;

/// Build the top-level axum [`Router`].
///
/// Includes a [`TraceLayer`] that logs each HTTP request/response at the
/// `DEBUG` level using the `tracing` ecosystem.
pub fn build<A: Adapter>(state: AppState<A>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        // Things
        .route(
            "/things",
            get(things::list::<A>)
                .post(things::create::<A>)
                .patch(things::patch_collection::<A>),
        )
        .route(
            "/things/{thing_id}",
            get(things::get::<A>)
                .put(things::update::<A>)
                .patch(things::patch::<A>)
                .delete(things::delete::<A>),
        )
        .route("/things/{thing_id}/ws", get(socket::attach::<A>))
        // Properties
        .route(
            "/things/{thing_id}/properties",
            get(properties::list::<A>).put(properties::set_all::<A>),
        )
        .route(
            "/things/{thing_id}/properties/{name}",
            get(properties::get_one::<A>).put(properties::set_one::<A>),
        )
        // Actions (thing scope)
        .route(
            "/things/{thing_id}/actions",
            get(actions::list_for_thing::<A>),
        )
        .route(
            "/things/{thing_id}/actions/{name}",
            post(actions::create_for_thing::<A>),
        )
        .route(
            "/things/{thing_id}/actions/{name}/{action_id}",
            axum::routing::delete(actions::delete_for_thing::<A>),
        )
        // Events (thing scope; SSE when requested via Accept)
        .route(
            "/things/{thing_id}/events",
            get(events::list_for_thing::<A>),
        )
        .route(
            "/things/{thing_id}/events/{name}",
            get(events::list_named_for_thing::<A>),
        )
        // Gateway scope
        .route("/actions", get(actions::list_gateway::<A>))
        .route("/actions/{name}", post(actions::create_gateway::<A>))
        .route(
            "/actions/{name}/{action_id}",
            axum::routing::delete(actions::delete_gateway::<A>),
        )
        .route("/events", get(events::list_gateway::<A>))
        .route("/events/{name}", get(events::list_named_gateway::<A>))
        // Discovery
        .route("/new_things", get(new_things::list::<A>))
        .route("/new_things/ws", get(new_things::attach::<A>))
        // Proxy passthrough
        .route("/proxy/{thing_id}/{*path}", any(proxy::forward::<A>))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use thinghub_adapter_virtual::VirtualAdapter;
    use thinghub_app::actions::ActionManager;
    use thinghub_app::events::EventBus;
    use thinghub_app::hub::RealtimeHub;
    use thinghub_app::registry::ThingRegistry;

    fn test_state() -> AppState<VirtualAdapter> {
        let hub = Arc::new(RealtimeHub::new());
        let registry = Arc::new(ThingRegistry::new(Arc::clone(&hub)));
        let adapter = Arc::new(VirtualAdapter::new());
        let actions = Arc::new(ActionManager::new(
            Arc::clone(&registry),
            Arc::clone(&hub),
            Arc::clone(&adapter),
        ));
        let events = Arc::new(EventBus::new(Arc::clone(&registry), Arc::clone(&hub)));
        AppState::new(registry, actions, events, hub, adapter)
    }

    #[tokio::test]
    async fn should_return_ok_when_health_check_called() {
        let app = build(test_state());

        let response = app
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
    async fn should_list_empty_thing_collection() {
        let app = build(test_state());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/things")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn should_return_not_found_for_unknown_thing() {
        let app = build(test_state());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/things/test-2")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
