//! Event bus — append-only per-thing logs plus subscriber notification.

use std::sync::Arc;

use serde_json::Value;

use thinghub_domain::error::ThingHubError;
use thinghub_domain::event::Event;
use thinghub_domain::id::ThingId;

use crate::hub::RealtimeHub;
use crate::registry::ThingRegistry;

/// Appends events to the owning thing's log and notifies matching realtime
/// subscribers synchronously with the append.
pub struct EventBus {
    registry: Arc<ThingRegistry>,
    hub: Arc<RealtimeHub>,
}

impl EventBus {
    #[must_use]
    pub fn new(registry: Arc<ThingRegistry>, hub: Arc<RealtimeHub>) -> Self {
        Self { registry, hub }
    }

    /// Append an event to the thing's log (unbounded, arrival-ordered) and
    /// fan it out to subscribed sessions and one-shot streams.
    ///
    /// # Errors
    ///
    /// Returns [`ThingHubError::NotFound`] for an unknown thing.
    pub async fn add(&self, thing_id: &ThingId, event: Event) -> Result<(), ThingHubError> {
        let slot = self.registry.slot(thing_id).await?;
        let mut state = slot.state.lock().await;
        state.events.push(event.clone());
        // Notify inside the critical section so event order on the wire
        // matches log order.
        self.hub.publish_event(thing_id, &event);
        Ok(())
    }

    /// The thing's event log, oldest first, optionally filtered by name.
    /// Non-destructive.
    ///
    /// # Errors
    ///
    /// Returns [`ThingHubError::NotFound`] for an unknown thing.
    pub async fn events_for_thing(
        &self,
        thing_id: &ThingId,
        name: Option<&str>,
    ) -> Result<Vec<Value>, ThingHubError> {
        let slot = self.registry.slot(thing_id).await?;
        let state = slot.state.lock().await;
        Ok(state
            .events
            .iter()
            .filter(|event| name.is_none_or(|name| event.name == name))
            .map(Event::to_wire)
            .collect())
    }

    /// Aggregated view across every thing, ordered by timestamp, optionally
    /// filtered by name.
    pub async fn all_events(&self, name: Option<&str>) -> Vec<Value> {
        let mut events = Vec::new();
        for thing in self.registry.list().await {
            let Ok(slot) = self.registry.slot(&thing.id).await else {
                continue;
            };
            let state = slot.state.lock().await;
            events.extend(
                state
                    .events
                    .iter()
                    .filter(|event| name.is_none_or(|name| event.name == name))
                    .cloned(),
            );
        }
        events.sort_by_key(|event| event.timestamp);
        events.iter().map(Event::to_wire).collect()
    }
}
