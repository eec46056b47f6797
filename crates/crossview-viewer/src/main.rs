//! Headless viewer for the Crossview intersection sync engine.
//!
//! Connects to the simulation authority, mirrors its vehicles, signal
//! fixtures and clock, and reports the scene through `tracing`. Control
//! intents are read from stdin.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `crossview.yaml` (defaults if absent)
//! 2. Initialize structured logging (tracing)
//! 3. Create the event bus, lifecycle stats and entity store
//! 4. Place the initial signal fixtures
//! 5. Build the connection manager and sync loop
//! 6. Start the console reader and the interrupt handler
//! 7. Run until `quit` or Ctrl-C

mod console;
mod error;
mod renderer;

use std::path::Path;

use crossview_core::{ClientConfig, ClientOptions, ConnectionManager, SyncClient, WsConnector};
use crossview_core::reconnect;
use crossview_store::{DiscCycle, EntityStore, EventBus, LifecycleStats, StatsHandle};
use crossview_types::{EntityKind, InitPayload, SyncEvent};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::error::ViewerError;
use crate::renderer::TracingRenderer;

/// Configuration file looked up in the working directory.
const CONFIG_PATH: &str = "crossview.yaml";

/// Application entry point for the viewer.
///
/// # Errors
///
/// Returns an error if configuration, logging or scene setup fails. Once
/// the sync loop runs, session failures are retried, not returned.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let config = ClientConfig::load_or_default(Path::new(CONFIG_PATH)).map_err(ViewerError::from)?;

    // 2. Initialize structured logging.
    init_logging(&config.logging.level)?;
    info!(
        url = %config.connection.url,
        connect_timeout_ms = config.connection.connect_timeout_ms,
        reconnect = ?config.reconnect.strategy,
        frame_interval_ms = config.render.frame_interval_ms,
        "Configuration loaded"
    );

    // 3. Event bus, stats and store.
    let bus = EventBus::new();
    let stats = LifecycleStats::attach(&bus).ok_or_else(|| ViewerError::Startup {
        message: String::from("stats subscription refused"),
    })?;
    let log_stats = stats.clone();
    bus.subscribe(move |event| log_event(event, &log_stats))
        .ok_or_else(|| ViewerError::Startup {
            message: String::from("event log subscription refused"),
        })?;
    let mut store = EntityStore::new(bus.clone());

    // 4. Initial scene.
    let placed = store.init(&InitPayload {
        lights: config.scene.signals.clone(),
        cars: Vec::new(),
    });
    if config.scene.auto_cycle {
        let ids: Vec<String> = store.signals().map(|s| s.id.to_string()).collect();
        for id in &ids {
            store.start_auto_cycle(id, DiscCycle::default());
        }
    }
    info!(
        signals = placed.applied,
        skipped = placed.skipped,
        auto_cycle = config.scene.auto_cycle,
        "Initial scene placed"
    );

    // 5. Connection manager and sync loop.
    let manager = ConnectionManager::new(WsConnector, bus, &config);
    let (mut client, handle) = SyncClient::new(
        manager,
        store,
        TracingRenderer::new(),
        reconnect::from_config(&config.reconnect),
        ClientOptions::from(&config),
    );

    // 6. Console reader and interrupt handler.
    tokio::spawn(console::read_stdin(handle.clone()));
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, shutting down");
            handle.shutdown();
        }
    });
    info!(usage = console::USAGE, "crossview-viewer running");

    // 7. Run.
    client.run().await;

    let summary = stats.snapshot();
    info!(
        vehicles_in = summary.vehicles_in,
        vehicles_out = summary.vehicles_out,
        average_lifetime = summary.average_lifetime,
        sessions = client.manager().sessions(),
        "crossview-viewer stopped"
    );
    Ok(())
}

/// Install the fmt subscriber, preferring `RUST_LOG` over the configured
/// level.
fn init_logging(default_level: &str) -> Result<(), ViewerError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| ViewerError::Logging {
            message: e.to_string(),
        })?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| ViewerError::Logging {
            message: e.to_string(),
        })
}

/// Log lifecycle events with the running statistics.
fn log_event(event: &SyncEvent, stats: &StatsHandle) {
    match event {
        SyncEvent::EntityDeleted {
            kind: EntityKind::Vehicle,
            id,
            remaining,
            lifetime,
        } => {
            let summary = stats.snapshot();
            debug!(
                vehicle = %id,
                remaining,
                lifetime,
                average_lifetime = summary.average_lifetime,
                vehicles_out = summary.vehicles_out,
                "vehicle left"
            );
        }
        SyncEvent::EntitiesReset { .. } => {
            let summary = stats.snapshot();
            info!(
                vehicles_in = summary.vehicles_in,
                vehicles_out = summary.vehicles_out,
                "vehicles reset"
            );
        }
        SyncEvent::ClockUpdated { time } => debug!(time, "simulation clock"),
        _ => {}
    }
}
