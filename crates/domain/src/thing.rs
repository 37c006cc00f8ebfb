//! Thing — the aggregate at the heart of the registry.
//!
//! A thing owns its property values, its action queue, and its event log.
//! Property/action/event sets are arbitrary per thing, defined at
//! registration through descriptor maps.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ThingHubError;
use crate::id::ThingId;
use crate::property::PropertyDescriptor;

fn default_context() -> String {
    "https://www.w3.org/2022/wot/td/v1.1".to_string()
}

/// Device credentials set through the gateway. Never served back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Descriptor of an action a thing supports.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionDescriptor {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Declared input schema, interpreted as data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
    /// Vendor fields carried through verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Descriptor of an event a thing can emit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventDescriptor {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Vendor fields carried through verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Payload submitted to create a thing. Also the shape adapters report for
/// newly discovered, not-yet-promoted devices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThingDescription {
    pub id: ThingId,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "@context", default = "default_context")]
    pub context: String,
    #[serde(rename = "@type", default, skip_serializing_if = "Vec::is_empty")]
    pub types: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, PropertyDescriptor>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub actions: BTreeMap<String, ActionDescriptor>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub events: BTreeMap<String, EventDescriptor>,
}

/// A registered thing: schema descriptors plus current state.
///
/// Serialization produces the public description — property *values* and
/// secrets are excluded and served through their own endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct Thing {
    pub id: ThingId,
    pub title: String,
    #[serde(rename = "@context")]
    pub context: String,
    #[serde(rename = "@type", skip_serializing_if = "Vec::is_empty")]
    pub types: Vec<String>,
    pub properties: BTreeMap<String, PropertyDescriptor>,
    #[serde(skip)]
    pub property_values: BTreeMap<String, Value>,
    pub actions: BTreeMap<String, ActionDescriptor>,
    pub events: BTreeMap<String, EventDescriptor>,
    #[serde(rename = "floorplanX")]
    pub floorplan_x: f64,
    #[serde(rename = "floorplanY")]
    pub floorplan_y: f64,
    #[serde(rename = "floorplanVisibility")]
    pub floorplan_visibility: bool,
    #[serde(rename = "layoutIndex")]
    pub layout_index: u32,
    #[serde(skip)]
    pub pin: Option<String>,
    #[serde(skip)]
    pub credentials: Option<Credentials>,
}

impl Thing {
    /// Build a thing from a creation payload, seeding property values from
    /// the descriptors' initial `value` fields.
    ///
    /// # Errors
    ///
    /// Returns [`ThingHubError::BadRequest`] when the id is empty.
    pub fn from_description(
        description: ThingDescription,
        layout_index: u32,
    ) -> Result<Self, ThingHubError> {
        if description.id.is_empty() {
            return Err(ThingHubError::BadRequest("thing id must not be empty".into()));
        }

        let mut properties = description.properties;
        let mut property_values = BTreeMap::new();
        for (name, descriptor) in &mut properties {
            let initial = descriptor.value.take().unwrap_or(Value::Null);
            property_values.insert(name.clone(), initial);
        }

        let title = if description.title.trim().is_empty() {
            description.id.to_string()
        } else {
            description.title
        };

        Ok(Self {
            id: description.id,
            title,
            context: description.context,
            types: description.types,
            properties,
            property_values,
            actions: description.actions,
            events: description.events,
            floorplan_x: 0.0,
            floorplan_y: 0.0,
            floorplan_visibility: true,
            layout_index,
            pin: None,
            credentials: None,
        })
    }

    /// Read a property value.
    ///
    /// # Errors
    ///
    /// Returns [`ThingHubError::NotFound`] when no such property is declared.
    pub fn property(&self, name: &str) -> Result<Value, ThingHubError> {
        if !self.properties.contains_key(name) {
            return Err(ThingHubError::not_found("property", name));
        }
        Ok(self
            .property_values
            .get(name)
            .cloned()
            .unwrap_or(Value::Null))
    }

    /// Current values of every property, by name.
    #[must_use]
    pub fn properties_snapshot(&self) -> serde_json::Map<String, Value> {
        self.properties
            .keys()
            .map(|name| {
                (
                    name.clone(),
                    self.property_values
                        .get(name)
                        .cloned()
                        .unwrap_or(Value::Null),
                )
            })
            .collect()
    }

    /// Validate and store a property value, returning the coerced value.
    ///
    /// On failure the stored value is untouched.
    ///
    /// # Errors
    ///
    /// Returns [`ThingHubError::Unknown`] for an undeclared name, or
    /// [`ThingHubError::Validation`] when the value violates the schema.
    pub fn set_property(&mut self, name: &str, value: &Value) -> Result<Value, ThingHubError> {
        let descriptor = self
            .properties
            .get(name)
            .ok_or_else(|| ThingHubError::unknown("property", name))?;
        let coerced = descriptor.validate(value)?;
        self.property_values.insert(name.to_string(), coerced.clone());
        Ok(coerced)
    }

    /// Change the title.
    ///
    /// # Errors
    ///
    /// Returns [`ThingHubError::BadRequest`] when the trimmed title is empty.
    pub fn rename(&mut self, title: &str) -> Result<(), ThingHubError> {
        let trimmed = title.trim();
        if trimmed.is_empty() {
            return Err(ThingHubError::BadRequest("title must not be empty".into()));
        }
        self.title = trimmed.to_string();
        Ok(())
    }

    /// Whether the thing declares an action with this name.
    #[must_use]
    pub fn has_action(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    /// Whether the thing declares an event with this name.
    #[must_use]
    pub fn has_event(&self, name: &str) -> bool {
        self.events.contains_key(name)
    }
}
