//! # thinghubd — thinghub daemon
//!
//! Composition root that wires all adapters together and starts the server.
//!
//! ## Responsibilities
//! - Parse configuration (TOML file, env vars)
//! - Construct the realtime hub, registry, event bus, and action manager
//! - Construct the device adapter
//! - Build the axum router, injecting application services
//! - Bind to a TCP port and serve
//! - Handle graceful shutdown (SIGINT)
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

mod config;

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use thinghub_adapter_http_axum::router;
use thinghub_adapter_http_axum::state::AppState;
use thinghub_adapter_virtual::VirtualAdapter;
use thinghub_app::actions::ActionManager;
use thinghub_app::events::EventBus;
use thinghub_app::hub::RealtimeHub;
use thinghub_app::registry::ThingRegistry;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Configuration & logging
    let config = Config::load().context("loading configuration")?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.logging.filter))
        .init();

    // Core services
    let hub = Arc::new(RealtimeHub::new());
    let registry = Arc::new(ThingRegistry::new(Arc::clone(&hub)));
    let events = Arc::new(EventBus::new(Arc::clone(&registry), Arc::clone(&hub)));

    // Adapter
    let adapter = Arc::new(
        VirtualAdapter::new()
            .with_pin(&config.adapter.pin)
            .with_credentials(&config.adapter.username, &config.adapter.password),
    );

    let actions = Arc::new(ActionManager::new(
        Arc::clone(&registry),
        Arc::clone(&hub),
        Arc::clone(&adapter),
    ));

    // HTTP
    let state = AppState::new(registry, actions, events, hub, adapter);
    let app = router::build(state);

    let bind_addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {bind_addr}"))?;
    tracing::info!(%bind_addr, "thinghubd listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
    tracing::info!("shutting down");
}
