use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use matchmaker::env::{Args, Settings};
use matchmaker::metrics::Metrics;
use matchmaker::pairing::PairingConfig;
use matchmaker::state::Store;
use matchmaker::{pairing, rpc_server, LoggerManager};
use prometheus::Registry;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();

    let args = Args::parse();
    let settings = match Settings::load(&args) {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("failed to load settings: {err}");
            return ExitCode::FAILURE;
        }
    };

    let _logger = LoggerManager::setup(&settings);
    info!(node_id = %settings.node_id, "matchmaker starting");

    let store = Arc::new(Store::new(settings.node_id.clone()));
    let registry = Registry::new();
    let metrics = Arc::new(Metrics::new(&registry));
    let shutdown = CancellationToken::new();

    let listen_addr = format!("{}:{}", settings.server.bind_address, settings.server.port);
    let rpc_task = tokio::spawn(rpc_server::run(
        store.clone(),
        listen_addr.clone(),
        shutdown.clone(),
    ));

    let pairing_task = tokio::spawn(pairing::run(
        store.clone(),
        metrics.clone(),
        PairingConfig {
            tick_interval: std::time::Duration::from_secs(settings.matchmaking.match_tick_seconds),
            heartbeat_timeout: std::time::Duration::from_secs(
                settings.matchmaking.heartbeat_timeout_seconds,
            ),
            dispatch_timeout: std::time::Duration::from_secs(
                settings.matchmaking.dispatch_timeout_seconds,
            ),
        },
        shutdown.clone(),
    ));

    let metrics_task = settings.server.metrics_port.map(|port| {
        let bind_addr = format!("{}:{}", settings.server.bind_address, port);
        tokio::spawn(matchmaker::metrics::serve(
            metrics.clone(),
            registry.clone(),
            bind_addr,
        ))
    });

    info!(addr = %listen_addr, "matchmaker is running");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("ctrl-c received, shutting down");
            shutdown.cancel();
        }
        res = rpc_task => {
            error!(?res, "rpc listener task exited unexpectedly");
            shutdown.cancel();
        }
    }

    pairing_task.abort();
    if let Some(task) = metrics_task {
        task.abort();
    }

    info!("matchmaker shut down");
    ExitCode::SUCCESS
}
