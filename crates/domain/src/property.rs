//! Property schemas and schema-driven validation.
//!
//! Things declare their properties as data (a name → descriptor map parsed at
//! registration), never as generated types; a single validator interprets the
//! descriptors for every thing.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ValidationError;

/// Absolute tolerance when checking `multipleOf` against floating error.
const MULTIPLE_OF_TOLERANCE: f64 = 1e-9;

/// JSON type of a property value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    Boolean,
    Number,
    Integer,
    String,
    Object,
    Array,
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Boolean => "boolean",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::String => "string",
            Self::Object => "object",
            Self::Array => "array",
        };
        f.write_str(name)
    }
}

/// Schema for a single property. Immutable after registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyDescriptor {
    /// Declared JSON type of the value.
    #[serde(rename = "type")]
    pub kind: PropertyType,
    /// Whether writes are rejected.
    #[serde(rename = "readOnly", default, skip_serializing_if = "is_false")]
    pub read_only: bool,
    /// Inclusive lower bound (numeric types).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    /// Inclusive upper bound (numeric types).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    /// Step constraint, anchored at `minimum` (or zero when unset).
    #[serde(rename = "multipleOf", skip_serializing_if = "Option::is_none")]
    pub multiple_of: Option<f64>,
    /// Closed set of allowed values.
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
    /// Initial value carried by a creation payload; never served back.
    #[serde(default, skip_serializing)]
    pub value: Option<Value>,
    /// Vendor fields (`@type`, `unit`, `forms`, ...) carried through verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl PropertyDescriptor {
    /// Bare descriptor of the given type, without constraints.
    #[must_use]
    pub fn new(kind: PropertyType) -> Self {
        Self {
            kind,
            read_only: false,
            minimum: None,
            maximum: None,
            multiple_of: None,
            enum_values: None,
            value: None,
            extra: serde_json::Map::new(),
        }
    }

    /// Validate `value` against this schema, returning the coerced value.
    ///
    /// Pure: no state is touched, the caller decides whether to persist.
    ///
    /// # Errors
    ///
    /// Returns the first violated rule: read-only, type mismatch, range,
    /// step, or enumeration membership.
    pub fn validate(&self, value: &Value) -> Result<Value, ValidationError> {
        if self.read_only {
            return Err(ValidationError::ReadOnly);
        }

        let coerced = self.coerce(value)?;

        if let Some(number) = coerced.as_f64() {
            if let Some(minimum) = self.minimum
                && number < minimum
            {
                return Err(ValidationError::BelowMinimum {
                    value: number,
                    minimum,
                });
            }
            if let Some(maximum) = self.maximum
                && number > maximum
            {
                return Err(ValidationError::AboveMaximum {
                    value: number,
                    maximum,
                });
            }
            if let Some(multiple_of) = self.multiple_of {
                let quotient = (number - self.minimum.unwrap_or(0.0)) / multiple_of;
                if (quotient - quotient.round()).abs() > MULTIPLE_OF_TOLERANCE {
                    return Err(ValidationError::NotAMultiple {
                        value: number,
                        multiple_of,
                    });
                }
            }
        }

        if let Some(allowed) = &self.enum_values
            && !allowed.contains(&coerced)
        {
            return Err(ValidationError::NotInEnum);
        }

        Ok(coerced)
    }

    /// Check the declared JSON type, converting whole-number floats for
    /// integer properties.
    fn coerce(&self, value: &Value) -> Result<Value, ValidationError> {
        let mismatch = || ValidationError::TypeMismatch {
            expected: self.kind,
        };
        let matches = match self.kind {
            PropertyType::Boolean => value.is_boolean(),
            PropertyType::Number => value.is_number(),
            PropertyType::String => value.is_string(),
            PropertyType::Object => value.is_object(),
            PropertyType::Array => value.is_array(),
            PropertyType::Integer => {
                if value.as_i64().is_some() || value.as_u64().is_some() {
                    true
                } else if let Some(float) = value.as_f64() {
                    if float.fract() == 0.0 {
                        #[allow(clippy::cast_possible_truncation)]
                        return Ok(Value::from(float as i64));
                    }
                    false
                } else {
                    false
                }
            }
        };
        if matches {
            Ok(value.clone())
        } else {
            Err(mismatch())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn numeric(minimum: Option<f64>, maximum: Option<f64>, multiple_of: Option<f64>) -> PropertyDescriptor {
        PropertyDescriptor {
            minimum,
            maximum,
            multiple_of,
            ..PropertyDescriptor::new(PropertyType::Number)
        }
    }

    #[test]
    fn should_accept_boolean_for_boolean_property() {
        let descriptor = PropertyDescriptor::new(PropertyType::Boolean);
        assert_eq!(descriptor.validate(&json!(true)).unwrap(), json!(true));
    }

    #[test]
    fn should_reject_string_for_boolean_property() {
        let descriptor = PropertyDescriptor::new(PropertyType::Boolean);
        assert_eq!(
            descriptor.validate(&json!("on")),
            Err(ValidationError::TypeMismatch {
                expected: PropertyType::Boolean
            })
        );
    }

    #[test]
    fn should_reject_write_when_read_only() {
        let descriptor = PropertyDescriptor {
            read_only: true,
            ..PropertyDescriptor::new(PropertyType::Boolean)
        };
        assert_eq!(
            descriptor.validate(&json!(false)),
            Err(ValidationError::ReadOnly)
        );
    }

    #[test]
    fn should_enforce_minimum_and_maximum() {
        let descriptor = numeric(Some(10.0), Some(20.0), None);
        assert!(descriptor.validate(&json!(15)).is_ok());
        assert_eq!(
            descriptor.validate(&json!(0)),
            Err(ValidationError::BelowMinimum {
                value: 0.0,
                minimum: 10.0
            })
        );
        assert_eq!(
            descriptor.validate(&json!(30)),
            Err(ValidationError::AboveMaximum {
                value: 30.0,
                maximum: 20.0
            })
        );
    }

    #[test]
    fn should_enforce_multiple_of() {
        let descriptor = PropertyDescriptor {
            minimum: Some(0.0),
            maximum: Some(600.0),
            multiple_of: Some(5.0),
            ..PropertyDescriptor::new(PropertyType::Integer)
        };
        assert!(descriptor.validate(&json!(30)).is_ok());
        assert_eq!(
            descriptor.validate(&json!(3)),
            Err(ValidationError::NotAMultiple {
                value: 3.0,
                multiple_of: 5.0
            })
        );
    }

    #[test]
    fn should_anchor_multiple_of_at_minimum() {
        let descriptor = numeric(Some(1.0), None, Some(2.0));
        assert!(descriptor.validate(&json!(5)).is_ok());
        assert!(descriptor.validate(&json!(4)).is_err());
    }

    #[test]
    fn should_tolerate_floating_error_in_multiple_of() {
        let descriptor = numeric(Some(0.0), None, Some(0.1));
        // 0.3 is not representable exactly; the step check must still pass.
        assert!(descriptor.validate(&json!(0.3)).is_ok());
    }

    #[test]
    fn should_enforce_enum_membership() {
        let descriptor = PropertyDescriptor {
            enum_values: Some(vec![json!("val1"), json!("val2"), json!("val3")]),
            ..PropertyDescriptor::new(PropertyType::String)
        };
        assert!(descriptor.validate(&json!("val2")).is_ok());
        assert_eq!(
            descriptor.validate(&json!("val0")),
            Err(ValidationError::NotInEnum)
        );
    }

    #[test]
    fn should_coerce_whole_float_to_integer() {
        let descriptor = PropertyDescriptor::new(PropertyType::Integer);
        assert_eq!(descriptor.validate(&json!(42.0)).unwrap(), json!(42));
        assert!(descriptor.validate(&json!(42.5)).is_err());
    }

    #[test]
    fn should_accept_integer_for_number_property() {
        let descriptor = PropertyDescriptor::new(PropertyType::Number);
        assert_eq!(descriptor.validate(&json!(20)).unwrap(), json!(20));
    }

    #[test]
    fn should_keep_vendor_fields_through_serde() {
        let descriptor: PropertyDescriptor = serde_json::from_value(json!({
            "@type": "LevelProperty",
            "type": "number",
            "unit": "percent",
            "value": 20,
        }))
        .unwrap();
        assert_eq!(descriptor.kind, PropertyType::Number);
        assert_eq!(descriptor.value, Some(json!(20)));
        assert_eq!(descriptor.extra.get("unit"), Some(&json!("percent")));

        let serialized = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(serialized.get("@type"), Some(&json!("LevelProperty")));
        // The initial value is consumed at registration, never served back.
        assert_eq!(serialized.get("value"), None);
    }
}
