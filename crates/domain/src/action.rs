//! Actions and their observable lifecycle.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::ThingHubError;
use crate::id::{ActionId, ThingId};
use crate::time::{Timestamp, now};

/// Lifecycle state of an action.
///
/// Transitions are monotonic: an action moves forward through
/// created → pending → running → completed and never regresses.
/// `deleted` is terminal and reachable from every other state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    Created,
    Pending,
    Running,
    Completed,
    Deleted,
}

impl ActionStatus {
    /// Whether a transition to `next` respects the monotonic order.
    #[must_use]
    pub fn can_become(self, next: Self) -> bool {
        match (self, next) {
            (Self::Deleted, _) => false,
            (_, Self::Deleted) => true,
            (from, to) => from < to,
        }
    }
}

impl fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Deleted => "deleted",
        };
        f.write_str(name)
    }
}

/// A requested operation on a thing, or on the gateway itself when
/// `thing_id` is `None` (pairing and unpairing).
#[derive(Debug, Clone)]
pub struct Action {
    pub id: ActionId,
    pub name: String,
    pub input: Value,
    pub status: ActionStatus,
    pub time_requested: Timestamp,
    pub time_completed: Option<Timestamp>,
    pub thing_id: Option<ThingId>,
}

impl Action {
    /// New action in the `created` state.
    #[must_use]
    pub fn new(thing_id: Option<ThingId>, name: impl Into<String>, input: Value) -> Self {
        Self {
            id: ActionId::new(),
            name: name.into(),
            input,
            status: ActionStatus::Created,
            time_requested: now(),
            time_completed: None,
            thing_id,
        }
    }

    /// Apply a monotonic transition, stamping the completion time when the
    /// action reaches `completed`.
    ///
    /// # Errors
    ///
    /// Returns [`ThingHubError::BadRequest`] when the transition would
    /// regress or leave the terminal `deleted` state.
    pub fn transition(&mut self, next: ActionStatus) -> Result<(), ThingHubError> {
        if !self.status.can_become(next) {
            return Err(ThingHubError::BadRequest(format!(
                "illegal action transition: {} -> {next}",
                self.status
            )));
        }
        self.status = next;
        if next == ActionStatus::Completed {
            self.time_completed = Some(now());
        }
        Ok(())
    }

    /// Canonical resource path of this action.
    #[must_use]
    pub fn href(&self) -> String {
        match &self.thing_id {
            Some(thing_id) => format!("/things/{thing_id}/actions/{}/{}", self.name, self.id),
            None => format!("/actions/{}/{}", self.name, self.id),
        }
    }

    /// Inner wire object: `{href, status, input, timeRequested, timeCompleted?}`.
    #[must_use]
    pub fn body(&self) -> Value {
        let mut body = json!({
            "href": self.href(),
            "status": self.status,
            "input": self.input,
            "timeRequested": self.time_requested,
        });
        if let Some(completed) = self.time_completed {
            body["timeCompleted"] = json!(completed);
        }
        body
    }

    /// Wire form keyed by the action name: `{name: {href, status, ...}}`.
    #[must_use]
    pub fn to_wire(&self) -> Value {
        json!({ &self.name: self.body() })
    }
}
