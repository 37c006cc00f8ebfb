//! # thinghub-adapter-http-axum
//!
//! HTTP adapter built on [axum](https://docs.rs/axum).
//!
//! ## Responsibilities
//! - Serve the **REST JSON API** (`/things`, `/actions`, `/events`,
//!   `/new_things`, `/proxy`)
//! - Serve the **realtime session protocol** over WebSocket
//!   (`/things/{id}/ws`) and the discovery stream (`/new_things/ws`)
//! - Serve **one-shot per-event streams** over SSE (the event endpoints,
//!   when requested with `Accept: text/event-stream`)
//! - Map HTTP requests into application service calls (driving adapter)
//! - Map application errors into HTTP responses in one place
//!
//! ## Dependency rule
//! Depends on `thinghub-app` (for the services and the adapter port) and
//! `thinghub-domain` (for types used in request/response mapping). Never
//! leaks axum types into the domain.

pub mod api;
pub mod error;
pub mod router;
pub mod state;
