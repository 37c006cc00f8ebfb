//! Events — timestamped, named occurrences emitted by a thing.

use serde_json::{Value, json};

use crate::time::{Timestamp, now};

/// An entry in a thing's append-only event log.
#[derive(Debug, Clone)]
pub struct Event {
    pub name: String,
    pub data: Value,
    pub timestamp: Timestamp,
}

impl Event {
    /// New event stamped with the current time.
    #[must_use]
    pub fn new(name: impl Into<String>, data: Value) -> Self {
        Self {
            name: name.into(),
            data,
            timestamp: now(),
        }
    }

    /// Wire form keyed by the event name: `{name: {data, timestamp}}`.
    #[must_use]
    pub fn to_wire(&self) -> Value {
        json!({
            &self.name: {
                "data": self.data,
                "timestamp": self.timestamp,
            }
        })
    }
}
