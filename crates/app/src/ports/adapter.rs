//! Adapter port — physical pairing, discovery, and request proxying.
//!
//! An adapter bridges an external device protocol into the gateway. It stays
//! in charge of everything device-side (pairing radios, executing commands,
//! answering proxied requests) and reports appearing/disappearing devices
//! back through a [`DeviceContext`].

use std::future::Future;
use std::time::Duration;

use serde_json::Value;

use thinghub_domain::error::ThingHubError;
use thinghub_domain::id::ThingId;
use thinghub_domain::thing::{Credentials, ThingDescription};

/// Raw response relayed verbatim from a device-specific handler.
#[derive(Debug, Clone)]
pub struct ProxyResponse {
    pub status: u16,
    pub content_type: String,
    pub body: Vec<u8>,
}

/// Context provided to adapters for reporting device changes.
///
/// This is a **port** — adapters call it when devices appear or disappear.
/// The registry provides the concrete implementation: added devices land in
/// the staging area (and on the discovery stream), removed devices are
/// evicted from staging and/or the live registry.
pub trait DeviceContext: Clone + Send + Sync + 'static {
    /// A device was discovered or re-announced.
    fn device_added(&self, description: ThingDescription) -> impl Future<Output = ()> + Send;

    /// A device disappeared or was unpaired.
    fn device_removed(&self, thing_id: ThingId) -> impl Future<Output = ()> + Send;
}

/// A pluggable device adapter.
///
/// The action manager calls [`perform_action`](Self::perform_action) from the
/// background task that owns an action's lifecycle; the gateway-level `pair`
/// and `unpair` actions drive [`start_pairing`](Self::start_pairing) and
/// [`unpair`](Self::unpair). Each pairing window carries its own passive
/// expiry timer — the gateway never polls.
pub trait Adapter: Send + Sync + 'static {
    /// Unique name identifying this adapter (e.g. `"virtual"`).
    fn name(&self) -> &'static str;

    /// Execute a thing action on the device. Resolves when the device is
    /// done; the caller reports `running`/`completed` around this call.
    fn perform_action(
        &self,
        thing_id: &ThingId,
        action: &str,
        input: &Value,
    ) -> impl Future<Output = Result<(), ThingHubError>> + Send;

    /// Open a pairing window. Newly visible devices are reported through
    /// `ctx` as they appear; the future resolves when the window expires or
    /// [`cancel_pairing`](Self::cancel_pairing) is called.
    fn start_pairing(
        &self,
        ctx: impl DeviceContext,
        timeout: Duration,
    ) -> impl Future<Output = Result<(), ThingHubError>> + Send;

    /// Close an open pairing window early.
    fn cancel_pairing(&self) -> impl Future<Output = ()> + Send;

    /// Unpair a device; the removal is reported back through `ctx`.
    fn unpair(
        &self,
        ctx: impl DeviceContext,
        thing_id: &ThingId,
    ) -> impl Future<Output = Result<(), ThingHubError>> + Send;

    /// Verify and apply a PIN for a device that requires one.
    fn set_pin(
        &self,
        thing_id: &ThingId,
        pin: &str,
    ) -> impl Future<Output = Result<(), ThingHubError>> + Send;

    /// Verify and apply credentials for a device that requires them.
    fn set_credentials(
        &self,
        thing_id: &ThingId,
        credentials: &Credentials,
    ) -> impl Future<Output = Result<(), ThingHubError>> + Send;

    /// Forward a request to the device-specific handler, relaying its raw
    /// response verbatim.
    fn proxy(
        &self,
        thing_id: &ThingId,
        method: &str,
        path: &str,
    ) -> impl Future<Output = Result<ProxyResponse, ThingHubError>> + Send;
}
