mod errors;

use std::time::Duration;

use clap::Parser;
use errors::ClientError;
use schema::{PlayerInfoRequest, PlayerState, PlayerStatusRequest, QueueStatus, Request, Response, VectorClock};
use tokio::net::TcpStream;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Enqueues once, then polls status until the match is found or the
/// user interrupts. Business logic is intentionally thin — the RPC
/// exchange is the contract, not the UX.
#[derive(Debug, Parser)]
#[command(name = "player", about = "enqueue and wait for a match")]
struct Args {
    #[arg(long, default_value = "127.0.0.1:50051")]
    matchmaker_addr: String,

    #[arg(long)]
    player_id: Option<String>,

    #[arg(long, default_value = "1v1")]
    game_mode: String,

    #[arg(long, default_value = "info")]
    log_level: String,

    #[arg(long, default_value_t = 1000)]
    poll_interval_ms: u64,
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    dotenv::dotenv().ok();
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(args.log_level.clone()));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .init();

    let player_id = args
        .player_id
        .clone()
        .unwrap_or_else(|| format!("player-{}", uuid::Uuid::new_v4()));

    let mut clock = VectorClock::new();

    match queue_player(&args.matchmaker_addr, &player_id, &args.game_mode, &mut clock).await {
        Ok(QueueStatus::Ok) => info!(%player_id, "queued"),
        Ok(other) => {
            println!("could not queue: {other:?}");
            return std::process::ExitCode::SUCCESS;
        }
        Err(err) => {
            eprintln!("failed to queue player: {err}");
            return std::process::ExitCode::FAILURE;
        }
    }

    loop {
        match get_status(&args.matchmaker_addr, &player_id, &mut clock).await {
            Ok(resp) => match resp.state {
                PlayerState::InMatch => {
                    println!(
                        "matched! match_id={} server={}",
                        resp.match_id, resp.server_addr
                    );
                    return std::process::ExitCode::SUCCESS;
                }
                PlayerState::Unknown => {
                    eprintln!("matchmaker does not know this player id");
                    return std::process::ExitCode::FAILURE;
                }
                _ => {}
            },
            Err(err) => {
                eprintln!("status poll failed: {err}");
            }
        }
        tokio::time::sleep(Duration::from_millis(args.poll_interval_ms)).await;
    }
}

async fn queue_player(
    matchmaker_addr: &str,
    player_id: &str,
    game_mode: &str,
    clock: &mut VectorClock,
) -> Result<QueueStatus, ClientError> {
    let mut stream = TcpStream::connect(matchmaker_addr).await?;
    let request = Request::QueuePlayer(PlayerInfoRequest {
        player_id: player_id.to_string(),
        game_mode: game_mode.to_string(),
        clock: clock.clone(),
    });
    schema::write_frame(&mut stream, &request).await?;
    let response: Response = schema::read_frame(&mut stream).await?;
    match response {
        Response::QueuePlayer(resp) => {
            clock.merge(&resp.clock);
            Ok(resp.status)
        }
        _ => Err(ClientError::UnexpectedResponse),
    }
}

async fn get_status(
    matchmaker_addr: &str,
    player_id: &str,
    clock: &mut VectorClock,
) -> Result<schema::PlayerStatusResponse, ClientError> {
    let mut stream = TcpStream::connect(matchmaker_addr).await?;
    let request = Request::GetPlayerStatus(PlayerStatusRequest {
        player_id: player_id.to_string(),
        clock: clock.clone(),
    });
    schema::write_frame(&mut stream, &request).await?;
    let response: Response = schema::read_frame(&mut stream).await?;
    match response {
        Response::GetPlayerStatus(resp) => {
            clock.merge(&resp.clock);
            Ok(resp)
        }
        _ => Err(ClientError::UnexpectedResponse),
    }
}
