//! # thinghub-adapter-virtual
//!
//! Virtual adapter that simulates physical devices for development and
//! end-to-end tests.
//!
//! Devices are "paired" through one-shot expectations: arm a device with
//! [`VirtualAdapter::pair_device`] (or an unpairing with
//! [`VirtualAdapter::unpair_device`]) and the next pairing window consumes
//! it, reporting through the [`DeviceContext`] exactly like a radio-backed
//! adapter would. Proxied requests are answered with a plain-text echo of
//! the method and device-relative path.
//!
//! ## Dependency rule
//!
//! Depends on `thinghub-app` (port traits) and `thinghub-domain` only.

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::Notify;

use thinghub_app::ports::{Adapter, DeviceContext, ProxyResponse};
use thinghub_domain::error::ThingHubError;
use thinghub_domain::id::ThingId;
use thinghub_domain::thing::{Credentials, ThingDescription};

/// PIN accepted by simulated devices unless overridden.
const DEFAULT_PIN: &str = "1234";
/// Credentials accepted by simulated devices unless overridden.
const DEFAULT_USERNAME: &str = "test-user";
const DEFAULT_PASSWORD: &str = "Password-1234!";

#[derive(Default)]
struct Expectations {
    pair: Vec<ThingDescription>,
    unpair: HashSet<ThingId>,
}

/// Simulated device adapter.
pub struct VirtualAdapter {
    expectations: Mutex<Expectations>,
    pairing_cancel: Notify,
    valid_pin: String,
    valid_credentials: Credentials,
    action_delay: Duration,
}

impl Default for VirtualAdapter {
    fn default() -> Self {
        Self {
            expectations: Mutex::new(Expectations::default()),
            pairing_cancel: Notify::new(),
            valid_pin: DEFAULT_PIN.to_string(),
            valid_credentials: Credentials {
                username: DEFAULT_USERNAME.to_string(),
                password: DEFAULT_PASSWORD.to_string(),
            },
            action_delay: Duration::ZERO,
        }
    }
}

impl VirtualAdapter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the PIN simulated devices accept.
    #[must_use]
    pub fn with_pin(mut self, pin: impl Into<String>) -> Self {
        self.valid_pin = pin.into();
        self
    }

    /// Override the credentials simulated devices accept.
    #[must_use]
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.valid_credentials = Credentials {
            username: username.into(),
            password: password.into(),
        };
        self
    }

    /// Simulate device-side work taking this long per action.
    #[must_use]
    pub fn with_action_delay(mut self, delay: Duration) -> Self {
        self.action_delay = delay;
        self
    }

    /// Arm a device to appear during the next pairing window.
    pub fn pair_device(&self, description: ThingDescription) {
        self.expectations.lock().unwrap().pair.push(description);
    }

    /// Arm a device removal, consumed by the next `unpair` request for it.
    pub fn unpair_device(&self, thing_id: ThingId) {
        self.expectations.lock().unwrap().unpair.insert(thing_id);
    }

    /// Report a device immediately, outside any pairing window.
    pub async fn add_device(&self, ctx: &impl DeviceContext, description: ThingDescription) {
        ctx.device_added(description).await;
    }

    /// Report a device removal immediately.
    pub async fn remove_device(&self, ctx: &impl DeviceContext, thing_id: ThingId) {
        ctx.device_removed(thing_id).await;
    }
}

impl Adapter for VirtualAdapter {
    fn name(&self) -> &'static str {
        "virtual"
    }

    async fn perform_action(
        &self,
        thing_id: &ThingId,
        action: &str,
        _input: &Value,
    ) -> Result<(), ThingHubError> {
        if !self.action_delay.is_zero() {
            tokio::time::sleep(self.action_delay).await;
        }
        tracing::debug!(%thing_id, action, "virtual device performed action");
        Ok(())
    }

    async fn start_pairing(
        &self,
        ctx: impl DeviceContext,
        timeout: Duration,
    ) -> Result<(), ThingHubError> {
        let armed: Vec<ThingDescription> =
            self.expectations.lock().unwrap().pair.drain(..).collect();
        for description in armed {
            ctx.device_added(description).await;
        }

        // Passive expiry: each window owns its own timer.
        tokio::select! {
            () = tokio::time::sleep(timeout) => {}
            () = self.pairing_cancel.notified() => {}
        }
        Ok(())
    }

    async fn cancel_pairing(&self) {
        self.pairing_cancel.notify_waiters();
    }

    async fn unpair(
        &self,
        ctx: impl DeviceContext,
        thing_id: &ThingId,
    ) -> Result<(), ThingHubError> {
        let armed = self.expectations.lock().unwrap().unpair.remove(thing_id);
        if armed {
            ctx.device_removed(thing_id.clone()).await;
        } else {
            tracing::debug!(%thing_id, "no unpairing armed for device");
        }
        Ok(())
    }

    async fn set_pin(&self, thing_id: &ThingId, pin: &str) -> Result<(), ThingHubError> {
        if pin == self.valid_pin {
            Ok(())
        } else {
            Err(ThingHubError::BadRequest(format!(
                "invalid PIN for {thing_id}"
            )))
        }
    }

    async fn set_credentials(
        &self,
        thing_id: &ThingId,
        credentials: &Credentials,
    ) -> Result<(), ThingHubError> {
        if *credentials == self.valid_credentials {
            Ok(())
        } else {
            Err(ThingHubError::BadRequest(format!(
                "invalid credentials for {thing_id}"
            )))
        }
    }

    async fn proxy(
        &self,
        _thing_id: &ThingId,
        method: &str,
        path: &str,
    ) -> Result<ProxyResponse, ThingHubError> {
        Ok(ProxyResponse {
            status: 200,
            content_type: "text/plain".to_string(),
            body: format!("{method} {path}").into_bytes(),
        })
    }
}
