//! Common error types used across the workspace.
//!
//! Each layer converts into [`ThingHubError`] via `#[from]` or constructs the
//! matching variant directly; the HTTP adapter maps variants onto status codes
//! in one place.

use crate::property::PropertyType;

/// Top-level error for gateway operations.
#[derive(Debug, thiserror::Error)]
pub enum ThingHubError {
    /// Malformed body or request shape.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// A value failed validation against an existing property schema.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The addressed thing/property/action/event does not exist.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// What was looked up (`"thing"`, `"action"`, ...).
        kind: &'static str,
        /// The identifier that missed.
        id: String,
    },

    /// An identifier that must be unique already exists.
    #[error("duplicate {kind}: {id}")]
    Conflict {
        /// What collided.
        kind: &'static str,
        /// The duplicate identifier.
        id: String,
    },

    /// A name that matches no descriptor. Distinct from [`Self::Validation`]
    /// so callers can tell "doesn't exist" from "exists but invalid value".
    #[error("unknown {kind}: {name}")]
    Unknown {
        /// What kind of name was unrecognized.
        kind: &'static str,
        /// The offending name.
        name: String,
    },

    /// Unexpected adapter or infrastructure failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ThingHubError {
    /// Shorthand for a [`Self::NotFound`] error.
    #[must_use]
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Shorthand for a [`Self::Conflict`] error.
    #[must_use]
    pub fn conflict(kind: &'static str, id: impl Into<String>) -> Self {
        Self::Conflict {
            kind,
            id: id.into(),
        }
    }

    /// Shorthand for a [`Self::Unknown`] error.
    #[must_use]
    pub fn unknown(kind: &'static str, name: impl Into<String>) -> Self {
        Self::Unknown {
            kind,
            name: name.into(),
        }
    }
}

/// Property schema violations, produced by
/// [`PropertyDescriptor::validate`](crate::property::PropertyDescriptor::validate).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    /// Write attempted on a read-only property.
    #[error("property is read-only")]
    ReadOnly,

    /// The value does not have the declared JSON type.
    #[error("expected a {expected} value")]
    TypeMismatch {
        /// The declared type.
        expected: PropertyType,
    },

    /// Numeric value below the declared minimum.
    #[error("value {value} is below minimum {minimum}")]
    BelowMinimum {
        /// The rejected value.
        value: f64,
        /// The declared minimum.
        minimum: f64,
    },

    /// Numeric value above the declared maximum.
    #[error("value {value} is above maximum {maximum}")]
    AboveMaximum {
        /// The rejected value.
        value: f64,
        /// The declared maximum.
        maximum: f64,
    },

    /// Numeric value off the declared step grid.
    #[error("value {value} is not a multiple of {multiple_of}")]
    NotAMultiple {
        /// The rejected value.
        value: f64,
        /// The declared step.
        multiple_of: f64,
    },

    /// Value absent from the declared enumeration.
    #[error("value is not one of the allowed values")]
    NotInEnum,
}
