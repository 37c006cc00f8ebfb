//! Thing registry — the live thing set, staging area, and layout ordering.
//!
//! Concurrency model: the map of things sits behind a `RwLock`, and every
//! thing's mutable state (property values, action queue, event log) sits
//! behind its own `Mutex`. Operations on one thing serialize on its slot;
//! different things mutate independently. Lock order is always map → slot,
//! and no slot lock is ever held while acquiring the map write lock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use serde_json::Value;
use tokio::sync::{Mutex, RwLock};

use thinghub_domain::action::Action;
use thinghub_domain::error::ThingHubError;
use thinghub_domain::event::Event;
use thinghub_domain::id::ThingId;
use thinghub_domain::thing::{Thing, ThingDescription};

use crate::hub::RealtimeHub;
use crate::ports::DeviceContext;

/// Mutable per-thing state, guarded by the slot mutex.
pub struct ThingState {
    pub thing: Thing,
    pub actions: Vec<Action>,
    pub events: Vec<Event>,
}

/// A thing's exclusive section. Everything that mutates one thing goes
/// through `state.lock()`.
pub struct ThingSlot {
    pub state: Mutex<ThingState>,
}

impl ThingSlot {
    fn new(thing: Thing) -> Self {
        Self {
            state: Mutex::new(ThingState {
                thing,
                actions: Vec::new(),
                events: Vec::new(),
            }),
        }
    }
}

/// Owns the set of registered things and the staging area for descriptors
/// reported by adapters during pairing.
pub struct ThingRegistry {
    things: RwLock<HashMap<ThingId, Arc<ThingSlot>>>,
    staged: StdMutex<Vec<ThingDescription>>,
    hub: Arc<RealtimeHub>,
}

impl ThingRegistry {
    #[must_use]
    pub fn new(hub: Arc<RealtimeHub>) -> Self {
        Self {
            things: RwLock::new(HashMap::new()),
            staged: StdMutex::new(Vec::new()),
            hub,
        }
    }

    /// The hub this registry publishes through.
    #[must_use]
    pub fn hub(&self) -> &Arc<RealtimeHub> {
        &self.hub
    }

    /// Register a thing from a creation payload.
    ///
    /// Promotion is atomic: a staged descriptor with the same id is consumed
    /// by the same call that inserts the live thing.
    ///
    /// # Errors
    ///
    /// Returns [`ThingHubError::Conflict`] when the id is already registered
    /// or [`ThingHubError::BadRequest`] for an empty id.
    pub async fn create_thing(&self, description: ThingDescription) -> Result<Thing, ThingHubError> {
        let mut things = self.things.write().await;
        if things.contains_key(&description.id) {
            return Err(ThingHubError::conflict("thing", description.id.as_str()));
        }

        self.staged
            .lock()
            .unwrap()
            .retain(|staged| staged.id != description.id);

        let layout_index = u32::try_from(things.len()).unwrap_or(u32::MAX);
        let thing = Thing::from_description(description, layout_index)?;
        tracing::info!(thing_id = %thing.id, "thing registered");
        things.insert(thing.id.clone(), Arc::new(ThingSlot::new(thing.clone())));
        Ok(thing)
    }

    /// Remove a thing, force-closing every bound realtime session first so
    /// peers observe the closure, then compacting the layout order.
    ///
    /// # Errors
    ///
    /// Returns [`ThingHubError::NotFound`] when the id is not registered.
    pub async fn remove(&self, id: &ThingId) -> Result<(), ThingHubError> {
        let mut things = self.things.write().await;
        let slot = things
            .get(id)
            .cloned()
            .ok_or_else(|| ThingHubError::not_found("thing", id.as_str()))?;

        self.hub.close_thing_sessions(id);

        let removed_index = slot.state.lock().await.thing.layout_index;
        things.remove(id);
        for slot in things.values() {
            let mut state = slot.state.lock().await;
            if state.thing.layout_index > removed_index {
                state.thing.layout_index -= 1;
            }
        }
        tracing::info!(thing_id = %id, "thing removed");
        Ok(())
    }

    /// Look up a thing's slot for an exclusive section.
    ///
    /// # Errors
    ///
    /// Returns [`ThingHubError::NotFound`] when the id is not registered.
    pub async fn slot(&self, id: &ThingId) -> Result<Arc<ThingSlot>, ThingHubError> {
        self.things
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| ThingHubError::not_found("thing", id.as_str()))
    }

    /// Whether a thing with this id is registered.
    pub async fn contains(&self, id: &ThingId) -> bool {
        self.things.read().await.contains_key(id)
    }

    /// Snapshot of a thing.
    ///
    /// # Errors
    ///
    /// Returns [`ThingHubError::NotFound`] when the id is not registered.
    pub async fn get(&self, id: &ThingId) -> Result<Thing, ThingHubError> {
        let slot = self.slot(id).await?;
        let state = slot.state.lock().await;
        Ok(state.thing.clone())
    }

    /// Snapshot of every thing, in layout order.
    pub async fn list(&self) -> Vec<Thing> {
        let slots: Vec<Arc<ThingSlot>> = self.things.read().await.values().cloned().collect();
        let mut things = Vec::with_capacity(slots.len());
        for slot in slots {
            things.push(slot.state.lock().await.thing.clone());
        }
        things.sort_by_key(|thing| thing.layout_index);
        things
    }

    /// Read a single property value.
    ///
    /// # Errors
    ///
    /// Returns [`ThingHubError::NotFound`] for an unknown thing or property.
    pub async fn property(&self, id: &ThingId, name: &str) -> Result<Value, ThingHubError> {
        let slot = self.slot(id).await?;
        let state = slot.state.lock().await;
        state.thing.property(name)
    }

    /// Read all property values.
    ///
    /// # Errors
    ///
    /// Returns [`ThingHubError::NotFound`] for an unknown thing.
    pub async fn properties(
        &self,
        id: &ThingId,
    ) -> Result<serde_json::Map<String, Value>, ThingHubError> {
        let slot = self.slot(id).await?;
        let state = slot.state.lock().await;
        Ok(state.thing.properties_snapshot())
    }

    /// Validate and store one property, fanning the new value out to every
    /// session bound to the thing. On failure nothing is stored and nothing
    /// is published.
    ///
    /// # Errors
    ///
    /// Propagates unknown-name and validation errors from the thing.
    pub async fn set_property(
        &self,
        id: &ThingId,
        name: &str,
        value: &Value,
    ) -> Result<Value, ThingHubError> {
        let slot = self.slot(id).await?;
        let mut state = slot.state.lock().await;
        let coerced = state.thing.set_property(name, value)?;
        // Publishing inside the critical section keeps wire order equal to
        // mutation order for this thing.
        self.hub.publish_property(id, name, &coerced);
        Ok(coerced)
    }

    /// Bulk property write.
    ///
    /// Unknown or read-only keys fail the entire call before anything is
    /// written. Once the batch is known to be writable, each key is validated
    /// and applied independently; the first validation failure is reported
    /// after the rest of the batch has been applied.
    ///
    /// # Errors
    ///
    /// Returns [`ThingHubError::Unknown`] / read-only validation errors from
    /// the pre-check, or the first per-key validation failure.
    pub async fn set_properties(
        &self,
        id: &ThingId,
        values: &serde_json::Map<String, Value>,
    ) -> Result<(), ThingHubError> {
        let slot = self.slot(id).await?;
        let mut state = slot.state.lock().await;

        for name in values.keys() {
            let descriptor = state
                .thing
                .properties
                .get(name)
                .ok_or_else(|| ThingHubError::unknown("property", name))?;
            if descriptor.read_only {
                return Err(thinghub_domain::error::ValidationError::ReadOnly.into());
            }
        }

        let mut first_error = None;
        for (name, value) in values {
            match state.thing.set_property(name, value) {
                Ok(coerced) => self.hub.publish_property(id, name, &coerced),
                Err(err) => {
                    if first_error.is_none() {
                        first_error = Some(err);
                    }
                }
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Change a thing's title.
    ///
    /// # Errors
    ///
    /// Returns [`ThingHubError::NotFound`] or the rename validation error.
    pub async fn rename(&self, id: &ThingId, title: &str) -> Result<Thing, ThingHubError> {
        let slot = self.slot(id).await?;
        let mut state = slot.state.lock().await;
        state.thing.rename(title)?;
        Ok(state.thing.clone())
    }

    /// Move a thing on the floorplan.
    ///
    /// # Errors
    ///
    /// Returns [`ThingHubError::NotFound`] for an unknown thing.
    pub async fn set_floorplan(
        &self,
        id: &ThingId,
        x: f64,
        y: f64,
    ) -> Result<Thing, ThingHubError> {
        let slot = self.slot(id).await?;
        let mut state = slot.state.lock().await;
        state.thing.floorplan_x = x;
        state.thing.floorplan_y = y;
        Ok(state.thing.clone())
    }

    /// Show or hide a thing on the floorplan.
    ///
    /// # Errors
    ///
    /// Returns [`ThingHubError::NotFound`] for an unknown thing.
    pub async fn set_floorplan_visibility(
        &self,
        id: &ThingId,
        visible: bool,
    ) -> Result<Thing, ThingHubError> {
        let slot = self.slot(id).await?;
        let mut state = slot.state.lock().await;
        state.thing.floorplan_visibility = visible;
        Ok(state.thing.clone())
    }

    /// Store a verified PIN on the thing.
    ///
    /// # Errors
    ///
    /// Returns [`ThingHubError::NotFound`] for an unknown thing.
    pub async fn set_pin(&self, id: &ThingId, pin: &str) -> Result<Thing, ThingHubError> {
        let slot = self.slot(id).await?;
        let mut state = slot.state.lock().await;
        state.thing.pin = Some(pin.to_string());
        Ok(state.thing.clone())
    }

    /// Store verified credentials on the thing.
    ///
    /// # Errors
    ///
    /// Returns [`ThingHubError::NotFound`] for an unknown thing.
    pub async fn set_credentials(
        &self,
        id: &ThingId,
        credentials: thinghub_domain::thing::Credentials,
    ) -> Result<Thing, ThingHubError> {
        let slot = self.slot(id).await?;
        let mut state = slot.state.lock().await;
        state.thing.credentials = Some(credentials);
        Ok(state.thing.clone())
    }

    /// Reassign a thing's layout index.
    ///
    /// The index is clamped into the dense range, things at or above the slot
    /// shift up by one, and the whole order is renumbered 0..n so it stays
    /// dense. Ties keep their prior relative order.
    ///
    /// # Errors
    ///
    /// Returns [`ThingHubError::NotFound`] for an unknown thing.
    pub async fn set_layout_index(
        &self,
        id: &ThingId,
        index: u32,
    ) -> Result<Thing, ThingHubError> {
        let things = self.things.read().await;
        if !things.contains_key(id) {
            return Err(ThingHubError::not_found("thing", id.as_str()));
        }

        let mut entries = Vec::with_capacity(things.len());
        for (thing_id, slot) in things.iter() {
            let current = slot.state.lock().await.thing.layout_index;
            entries.push((thing_id.clone(), Arc::clone(slot), current));
        }
        entries.sort_by_key(|(_, _, current)| *current);

        let position = entries
            .iter()
            .position(|(thing_id, _, _)| thing_id == id)
            .expect("target was checked above");
        let target = entries.remove(position);
        let clamped = (index as usize).min(entries.len());
        entries.insert(clamped, target);

        let mut updated = None;
        for (new_index, (thing_id, slot, _)) in entries.iter().enumerate() {
            let mut state = slot.state.lock().await;
            state.thing.layout_index = u32::try_from(new_index).unwrap_or(u32::MAX);
            if thing_id == id {
                updated = Some(state.thing.clone());
            }
        }
        Ok(updated.expect("target was reinserted above"))
    }

    /// Descriptors reported by adapters but not yet promoted, in report
    /// order.
    #[must_use]
    pub fn staged(&self) -> Vec<ThingDescription> {
        self.staged.lock().unwrap().clone()
    }

    async fn stage(&self, description: ThingDescription) {
        if self.contains(&description.id).await {
            tracing::debug!(thing_id = %description.id, "ignoring discovery for registered thing");
            return;
        }
        let wire = staged_wire(&description);
        {
            let mut staged = self.staged.lock().unwrap();
            staged.retain(|existing| existing.id != description.id);
            staged.push(description);
        }
        self.hub.publish_discovery(&wire);
    }
}

/// Discovery-stream payload for a staged descriptor.
fn staged_wire(description: &ThingDescription) -> Value {
    let mut wire = serde_json::to_value(description).unwrap_or(Value::Null);
    if let Some(object) = wire.as_object_mut() {
        object.insert(
            "href".to_string(),
            Value::String(format!("/things/{}", description.id)),
        );
    }
    wire
}

impl DeviceContext for Arc<ThingRegistry> {
    async fn device_added(&self, description: ThingDescription) {
        self.stage(description).await;
    }

    async fn device_removed(&self, thing_id: ThingId) {
        self.staged
            .lock()
            .unwrap()
            .retain(|staged| staged.id != thing_id);
        if self.contains(&thing_id).await
            && let Err(err) = self.remove(&thing_id).await
        {
            tracing::warn!(thing_id = %thing_id, error = %err, "device removal failed");
        }
    }
}
