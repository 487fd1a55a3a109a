//! RFID Listener console application
//!
//! Watches for a USB-serial RFID reader, reconnects whenever it goes away,
//! and prints every scanned card code.

mod display;
mod settings;
mod simulation;

use std::io;

use anyhow::{bail, Result};
use display::ConsoleDisplay;
use rfid_core::{spawn_listener, SerialOpener};
use rfid_detect::ScannerConfig;
use settings::Settings;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries the status records, so logs go to stderr
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "rfid_listener=info,rfid_core=info,rfid_detect=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    tracing::info!("Starting RFID listener");

    let settings = Settings::load_or_init();
    let config = settings.listener_config();

    let (handle, mut events) = if settings.simulate {
        tracing::info!("Using simulated reader on {}", simulation::SIMULATED_PORT);
        let (scanner, opener) = simulation::simulated_reader(ScannerConfig {
            markers: settings.markers.clone(),
        });
        spawn_listener(config, scanner, opener)
    } else {
        spawn_listener(config, settings.scanner(), SerialOpener)
    };

    let mut display = ConsoleDisplay::new(io::stdout().lock(), settings.json_status);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                tracing::info!("Shutting down");
                break;
            }
            event = events.recv() => match event {
                Some(event) => display.handle(&event)?,
                None => {
                    let reason = match handle.await {
                        Err(e) if e.is_panic() => "panicked",
                        _ => "stopped",
                    };
                    bail!("Listener task {}", reason);
                }
            }
        }
    }

    handle.abort();

    if let Some(code) = display.code() {
        tracing::info!("Last scanned code: {}", code);
    }
    if let Some(status) = display.status() {
        tracing::debug!("Last status: {}", status);
    }

    Ok(())
}
