//! Shared application state for axum handlers.

use std::sync::Arc;

use thinghub_app::actions::ActionManager;
use thinghub_app::events::EventBus;
use thinghub_app::hub::RealtimeHub;
use thinghub_app::ports::Adapter;
use thinghub_app::registry::ThingRegistry;

/// Application state shared across all axum handlers.
///
/// Generic over the adapter port to avoid dynamic dispatch. `Clone` is
/// implemented manually so the underlying types themselves do not need to be
/// `Clone` — only the `Arc` wrappers are cloned.
pub struct AppState<A> {
    /// Thing registry (live things + staging).
    pub registry: Arc<ThingRegistry>,
    /// Action queues and lifecycle tasks.
    pub actions: Arc<ActionManager<A>>,
    /// Event logs and subscriber fan-out.
    pub events: Arc<EventBus>,
    /// Realtime session registry.
    pub hub: Arc<RealtimeHub>,
    /// Physical adapter behind the gateway.
    pub adapter: Arc<A>,
}

impl<A> Clone for AppState<A> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            actions: Arc::clone(&self.actions),
            events: Arc::clone(&self.events),
            hub: Arc::clone(&self.hub),
            adapter: Arc::clone(&self.adapter),
        }
    }
}

impl<A: Adapter> AppState<A> {
    /// Create the state from pre-wrapped `Arc` services; the composition
    /// root shares the same `Arc`s with background tasks.
    #[must_use]
    pub fn new(
        registry: Arc<ThingRegistry>,
        actions: Arc<ActionManager<A>>,
        events: Arc<EventBus>,
        hub: Arc<RealtimeHub>,
        adapter: Arc<A>,
    ) -> Self {
        Self {
            registry,
            actions,
            events,
            hub,
            adapter,
        }
    }
}
