//! # thinghub-app
//!
//! Application layer — use-cases and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define the **adapter port** that device integrations implement
//!   (`Adapter`) and the context they report discoveries through
//!   (`DeviceContext`)
//! - Own the **thing registry**: the live thing set, the staging area for
//!   newly discovered devices, and layout ordering
//! - Run the **action manager**: action queues and background lifecycle tasks
//! - Run the **event bus**: per-thing append-only logs plus subscriber fan-out
//! - Provide the **realtime hub**: per-session outbound queues, subscriptions,
//!   one-shot event streams, and the discovery stream
//!
//! ## Dependency rule
//! Depends on `thinghub-domain` only (plus `tokio` for channels and tasks).
//! Never imports adapter crates. Adapters depend on *this* crate, not the
//! reverse.

pub mod actions;
pub mod events;
pub mod hub;
pub mod ports;
pub mod registry;
