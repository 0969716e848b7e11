mod client;
mod env;
mod errors;

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use env::{Args, Settings};
use schema::{AssignMatchResponse, AssignStatus, ServerStatusKind, VectorClock};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use clap::Parser;

/// What this worker is doing right now. Guarded by a plain async mutex
/// since the only contention is "accept loop" vs. "match simulation
/// finishing", never more than one waiter deep.
struct WorkerState {
    busy: bool,
    current_match_id: Option<String>,
    clock: VectorClock,
}

fn setup_logging(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.log_level.clone()));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .init();
}

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
    setup_logging(&settings);

    let listener = match TcpListener::bind(&settings.listen_addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(error = %err, addr = %settings.listen_addr, "failed to bind assignment listener");
            return ExitCode::FAILURE;
        }
    };
    let own_address = match listener.local_addr() {
        Ok(addr) => addr.to_string(),
        Err(err) => {
            error!(error = %err, "failed to resolve own bound address");
            return ExitCode::FAILURE;
        }
    };
    info!(server_id = %settings.server_id, addr = %own_address, "game server listening");

    let state = Arc::new(Mutex::new(WorkerState {
        busy: false,
        current_match_id: None,
        clock: VectorClock::new(),
    }));

    {
        let mut guard = state.lock().await;
        client::report_status(
            &settings.matchmaker_addr,
            &settings.server_id,
            &own_address,
            ServerStatusKind::Available,
            "",
            &mut guard.clock,
        )
        .await;
    }
    info!("registered with matchmaker as Available");

    let heartbeat_task = tokio::spawn(heartbeat_loop(
        settings.clone(),
        own_address.clone(),
        state.clone(),
    ));

    tokio::select! {
        _ = accept_loop(listener, settings.clone(), own_address.clone(), state.clone()) => {}
        _ = tokio::signal::ctrl_c() => {
            info!("ctrl-c received, shutting down");
        }
    }

    heartbeat_task.abort();
    ExitCode::SUCCESS
}

async fn heartbeat_loop(settings: Settings, own_address: String, state: Arc<Mutex<WorkerState>>) {
    let interval = Duration::from_secs(settings.heartbeat_timeout_seconds) / 3;
    let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
    loop {
        ticker.tick().await;
        let mut guard = state.lock().await;
        let (status, match_id) = if guard.busy {
            (
                ServerStatusKind::Busy,
                guard.current_match_id.clone().unwrap_or_default(),
            )
        } else {
            (ServerStatusKind::Available, String::new())
        };
        client::report_status(
            &settings.matchmaker_addr,
            &settings.server_id,
            &own_address,
            status,
            &match_id,
            &mut guard.clock,
        )
        .await;
    }
}

async fn accept_loop(
    listener: TcpListener,
    settings: Settings,
    own_address: String,
    state: Arc<Mutex<WorkerState>>,
) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(pair) => pair,
            Err(err) => {
                warn!(error = %err, "failed to accept assignment connection");
                continue;
            }
        };
        let settings = settings.clone();
        let own_address = own_address.clone();
        let state = state.clone();
        tokio::spawn(async move {
            if let Err(err) = handle_assignment(stream, settings, own_address, state).await {
                warn!(%peer, error = %err, "assignment connection ended with error");
            }
        });
    }
}

async fn handle_assignment(
    mut stream: TcpStream,
    settings: Settings,
    own_address: String,
    state: Arc<Mutex<WorkerState>>,
) -> Result<(), errors::WorkerError> {
    let request: schema::AssignMatchRequest = schema::read_frame(&mut stream).await?;

    let mut guard = state.lock().await;
    guard.clock.merge(&request.clock);

    if guard.busy {
        let response = AssignMatchResponse {
            status: AssignStatus::Busy,
            message: "already running a match".to_string(),
            clock: guard.clock.snapshot(),
        };
        schema::write_frame(&mut stream, &response).await?;
        return Ok(());
    }

    guard.busy = true;
    guard.current_match_id = Some(request.match_id.clone());
    let response = AssignMatchResponse {
        status: AssignStatus::Ok,
        message: String::new(),
        clock: guard.clock.snapshot(),
    };
    schema::write_frame(&mut stream, &response).await?;

    client::report_status(
        &settings.matchmaker_addr,
        &settings.server_id,
        &own_address,
        ServerStatusKind::Busy,
        &request.match_id,
        &mut guard.clock,
    )
    .await;
    drop(guard);

    tokio::spawn(run_match(request.match_id, settings, own_address, state));
    Ok(())
}

/// Simulates running the assigned match: a short fixed sleep standing
/// in for real game time, then either "crashes" (process exit 1,
/// leaving the Matchmaker to detect it via the heartbeat sweep) or
/// reports back Available to close the match out cleanly.
async fn run_match(
    match_id: String,
    settings: Settings,
    own_address: String,
    state: Arc<Mutex<WorkerState>>,
) {
    tokio::time::sleep(Duration::from_millis(500)).await;

    if rand::random::<f64>() < settings.crash_probability {
        error!(%match_id, "simulated crash during match");
        std::process::exit(1);
    }

    let mut guard = state.lock().await;
    guard.busy = false;
    guard.current_match_id = None;
    client::report_status(
        &settings.matchmaker_addr,
        &settings.server_id,
        &own_address,
        ServerStatusKind::Available,
        "",
        &mut guard.clock,
    )
    .await;
    info!(%match_id, "match completed, reported Available");
}
