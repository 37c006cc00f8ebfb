//! # thinghub-domain
//!
//! Pure domain model for the thinghub IoT gateway.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define **Things** (registered devices with properties, actions, events)
//! - Define **property schemas** and the validation/coercion rules applied on
//!   every write path
//! - Define **Actions** (requested operations with an observable lifecycle)
//! - Define **Events** (timestamped, named occurrences)
//! - Contain all invariant enforcement and domain logic
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod action;
pub mod event;
pub mod property;
pub mod thing;
