// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Visit SDK host
//
// Entry point. Initialises logging, loads config, attaches the plugin to a
// simulated Health Connect surface and serves the method channel as JSON
// lines on stdin/stdout. Logs go to stderr.

mod services;
mod transport;

use std::process::ExitCode;
use std::time::Duration;

use tokio::io::BufReader;

use visit_sdk_bridge::simulated::{SimulatedPlatform, UserResponse};
use visit_sdk_bridge::storage::FileSessionStorage;
use visit_sdk_bridge::{VisitSdkPlugin, platform_device};
use visit_sdk_core::types::ConnectionState;

use services::host_factory::HostFactory;

/// How long to wait for in-flight calls once stdin closes.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Visit SDK host starting");

    let dir = services::data_dir::data_dir();
    let config = services::config_store::load_or_default(&dir);

    // Health Connect installed but not yet granted; the simulated user
    // accepts every permission sheet.
    let platform = SimulatedPlatform::new(ConnectionState::Installed);
    platform.surface.set_response(UserResponse::GrantAll);
    let factory = HostFactory::new(platform.factory(), FileSessionStorage::open(&dir));

    let mut plugin = VisitSdkPlugin::attach_to_engine(config, platform_device(), Box::new(factory));
    if let Err(err) = plugin.on_attached_to_surface(Some(platform.surface_handle())) {
        tracing::error!(error = %err, "surface attach failed");
        return ExitCode::FAILURE;
    }

    let served = transport::serve(
        plugin.channel().clone(),
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
        DRAIN_GRACE,
    )
    .await;

    if let Err(err) = plugin.on_detached_from_surface() {
        tracing::debug!(error = %err, "controller already stopped");
    }
    plugin.detach_from_engine().await;

    match served {
        Ok(stats) => {
            tracing::info!(
                received = stats.received,
                answered = stats.answered,
                unanswered = stats.unanswered,
                "Visit SDK host stopped"
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(error = %err, "transport failed");
            ExitCode::FAILURE
        }
    }
}
