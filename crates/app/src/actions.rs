//! Action manager — queues, lifecycle transitions, and background execution.
//!
//! Requesting an action never blocks on its completion: the request call
//! records the action as `pending` and returns, while a spawned task owns the
//! `running` → `completed` sequence and reports every transition through the
//! same realtime channel used by direct API calls.

use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use serde_json::Value;

use thinghub_domain::action::{Action, ActionStatus};
use thinghub_domain::error::ThingHubError;
use thinghub_domain::id::{ActionId, ThingId};

use crate::hub::RealtimeHub;
use crate::ports::Adapter;
use crate::registry::{ThingRegistry, ThingSlot};

/// Default pairing window length in seconds.
const DEFAULT_PAIRING_TIMEOUT_SECS: u64 = 60;

/// Creates, transitions, and removes actions for things, plus the
/// gateway-scoped `pair`/`unpair` actions that drive the adapter.
pub struct ActionManager<A> {
    registry: Arc<ThingRegistry>,
    hub: Arc<RealtimeHub>,
    adapter: Arc<A>,
    gateway_queue: StdMutex<Vec<Action>>,
}

impl<A: Adapter> ActionManager<A> {
    #[must_use]
    pub fn new(registry: Arc<ThingRegistry>, hub: Arc<RealtimeHub>, adapter: Arc<A>) -> Self {
        Self {
            registry,
            hub,
            adapter,
            gateway_queue: StdMutex::new(Vec::new()),
        }
    }

    /// Request an action on a thing.
    ///
    /// The action is created, immediately moved to `pending`, and handed to a
    /// background task that executes it through the adapter.
    ///
    /// # Errors
    ///
    /// Returns [`ThingHubError::NotFound`] for an unknown thing,
    /// [`ThingHubError::Unknown`] for an undeclared action name, and
    /// [`ThingHubError::BadRequest`] for invalid input.
    pub async fn request_action(
        self: &Arc<Self>,
        thing_id: &ThingId,
        name: &str,
        input: Value,
    ) -> Result<Action, ThingHubError> {
        let slot = self.registry.slot(thing_id).await?;
        let mut state = slot.state.lock().await;
        if !state.thing.has_action(name) {
            return Err(ThingHubError::unknown("action", name));
        }
        if !input.is_null() && !input.is_object() {
            return Err(ThingHubError::BadRequest(
                "action input must be an object".into(),
            ));
        }

        let mut action = Action::new(Some(thing_id.clone()), name, input);
        action.transition(ActionStatus::Pending)?;
        state.actions.push(action.clone());
        self.hub.publish_action(Some(thing_id), action.to_wire());
        drop(state);

        self.spawn_execution(slot, action.clone());
        Ok(action)
    }

    /// Background continuation that owns the `running` → `completed` part of
    /// the lifecycle.
    fn spawn_execution(self: &Arc<Self>, slot: Arc<ThingSlot>, action: Action) {
        let manager = Arc::clone(self);
        let thing_id = action
            .thing_id
            .clone()
            .expect("thing actions always carry their owner");
        tokio::spawn(async move {
            manager
                .transition_queued(&slot, action.id, ActionStatus::Running)
                .await;
            if let Err(err) = manager
                .adapter
                .perform_action(&thing_id, &action.name, &action.input)
                .await
            {
                tracing::warn!(
                    thing_id = %thing_id,
                    action = %action.name,
                    error = %err,
                    "adapter failed to perform action"
                );
            }
            manager
                .transition_queued(&slot, action.id, ActionStatus::Completed)
                .await;
        });
    }

    /// Transition an action still present in a thing's queue. An action
    /// deleted in the meantime is gone from the queue and stays terminal.
    async fn transition_queued(&self, slot: &ThingSlot, id: ActionId, next: ActionStatus) {
        let mut state = slot.state.lock().await;
        let Some(action) = state.actions.iter_mut().find(|action| action.id == id) else {
            return;
        };
        if action.transition(next).is_ok() {
            let wire = action.to_wire();
            let thing_id = action.thing_id.clone();
            self.hub.publish_action(thing_id.as_ref(), wire);
        }
    }

    /// Remove an action from a thing's queue: it transitions to `deleted`
    /// (terminal), the status is fanned out, and it disappears from
    /// subsequent listings.
    ///
    /// # Errors
    ///
    /// Returns [`ThingHubError::NotFound`] for an unknown thing or action id.
    pub async fn remove_action(
        &self,
        thing_id: &ThingId,
        id: ActionId,
    ) -> Result<(), ThingHubError> {
        let slot = self.registry.slot(thing_id).await?;
        let mut state = slot.state.lock().await;
        let position = state
            .actions
            .iter()
            .position(|action| action.id == id)
            .ok_or_else(|| ThingHubError::not_found("action", id.to_string()))?;
        let mut action = state.actions.remove(position);
        action.transition(ActionStatus::Deleted)?;
        self.hub.publish_action(Some(thing_id), action.to_wire());
        Ok(())
    }

    /// A thing's queued actions grouped by name:
    /// `{name: [{href, status, ...}, ...]}`.
    ///
    /// # Errors
    ///
    /// Returns [`ThingHubError::NotFound`] for an unknown thing.
    pub async fn actions_for_thing(&self, thing_id: &ThingId) -> Result<Value, ThingHubError> {
        let slot = self.registry.slot(thing_id).await?;
        let state = slot.state.lock().await;
        Ok(group_by_name(&state.actions))
    }

    /// Request a gateway-scoped action (`pair` or `unpair`).
    ///
    /// Status updates broadcast to every realtime session.
    ///
    /// # Errors
    ///
    /// Returns [`ThingHubError::Unknown`] for any other name, and
    /// [`ThingHubError::BadRequest`] when `unpair` input lacks an `id`.
    pub async fn request_gateway_action(
        self: &Arc<Self>,
        name: &str,
        input: Value,
    ) -> Result<Action, ThingHubError> {
        let job = match name {
            "pair" => {
                let timeout = input
                    .get("timeout")
                    .and_then(Value::as_u64)
                    .unwrap_or(DEFAULT_PAIRING_TIMEOUT_SECS);
                GatewayJob::Pair(Duration::from_secs(timeout))
            }
            "unpair" => {
                let id = input
                    .get("id")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        ThingHubError::BadRequest("unpair input requires an id".into())
                    })?;
                GatewayJob::Unpair(ThingId::new(id))
            }
            other => return Err(ThingHubError::unknown("action", other)),
        };

        let mut action = Action::new(None, name, input);
        action.transition(ActionStatus::Pending)?;
        self.gateway_queue.lock().unwrap().push(action.clone());
        self.hub.publish_action(None, action.to_wire());

        let manager = Arc::clone(self);
        let id = action.id;
        tokio::spawn(async move {
            manager.transition_gateway(id, ActionStatus::Running);
            let ctx = Arc::clone(&manager.registry);
            let result = match job {
                GatewayJob::Pair(timeout) => manager.adapter.start_pairing(ctx, timeout).await,
                GatewayJob::Unpair(thing_id) => manager.adapter.unpair(ctx, &thing_id).await,
            };
            if let Err(err) = result {
                tracing::warn!(error = %err, "gateway action failed");
            }
            manager.transition_gateway(id, ActionStatus::Completed);
        });
        Ok(action)
    }

    fn transition_gateway(&self, id: ActionId, next: ActionStatus) {
        let mut queue = self.gateway_queue.lock().unwrap();
        let Some(action) = queue.iter_mut().find(|action| action.id == id) else {
            return;
        };
        if action.transition(next).is_ok() {
            self.hub.publish_action(None, action.to_wire());
        }
    }

    /// Remove a gateway-scoped action; deleting an unfinished `pair` closes
    /// the pairing window early.
    ///
    /// # Errors
    ///
    /// Returns [`ThingHubError::NotFound`] for an unknown action id.
    pub async fn remove_gateway_action(&self, id: ActionId) -> Result<(), ThingHubError> {
        let mut action = {
            let mut queue = self.gateway_queue.lock().unwrap();
            let position = queue
                .iter()
                .position(|action| action.id == id)
                .ok_or_else(|| ThingHubError::not_found("action", id.to_string()))?;
            queue.remove(position)
        };
        if action.name == "pair" && action.status < ActionStatus::Completed {
            self.adapter.cancel_pairing().await;
        }
        action.transition(ActionStatus::Deleted)?;
        self.hub.publish_action(None, action.to_wire());
        Ok(())
    }

    /// Gateway-scoped actions grouped by name, excluding deleted ones.
    #[must_use]
    pub fn gateway_actions(&self) -> Value {
        group_by_name(&self.gateway_queue.lock().unwrap())
    }
}

enum GatewayJob {
    Pair(Duration),
    Unpair(ThingId),
}

fn group_by_name(actions: &[Action]) -> Value {
    let mut grouped = serde_json::Map::new();
    for action in actions {
        if action.status == ActionStatus::Deleted {
            continue;
        }
        grouped
            .entry(action.name.clone())
            .or_insert_with(|| Value::Array(Vec::new()))
            .as_array_mut()
            .expect("entries are always arrays")
            .push(action.body());
    }
    Value::Object(grouped)
}
