mod errors;

use clap::{Parser, Subcommand, ValueEnum};
use errors::ClientError;
use schema::{
    AdminRequest, AdminResult, AdminServerUpdateRequest, ForcedStatus, Request, Response,
    VectorClock,
};
use tokio::net::TcpStream;

#[derive(Debug, Parser)]
#[command(name = "admin", about = "operator CLI for the matchmaker")]
struct Args {
    #[arg(long, default_value = "127.0.0.1:50051")]
    matchmaker_addr: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the server table and the current queue.
    Status,
    /// Force a server into Available or Down.
    Force {
        server_id: String,
        #[arg(value_enum)]
        state: ForceState,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ForceState {
    Available,
    Down,
}

impl From<ForceState> for ForcedStatus {
    fn from(value: ForceState) -> Self {
        match value {
            ForceState::Available => ForcedStatus::ForceAvailable,
            ForceState::Down => ForcedStatus::ForceDown,
        }
    }
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    dotenv::dotenv().ok();
    let args = Args::parse();

    let result = match args.command {
        Command::Status => status(&args.matchmaker_addr).await,
        Command::Force { server_id, state } => {
            force(&args.matchmaker_addr, &server_id, state.into()).await
        }
    };

    match result {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            std::process::ExitCode::FAILURE
        }
    }
}

async fn status(matchmaker_addr: &str) -> Result<(), ClientError> {
    let mut stream = TcpStream::connect(matchmaker_addr).await?;
    let request = Request::AdminGetSystemStatus(AdminRequest {});
    schema::write_frame(&mut stream, &request).await?;
    let response: Response = schema::read_frame(&mut stream).await?;
    let Response::AdminGetSystemStatus(resp) = response else {
        return Err(ClientError::UnexpectedResponse);
    };

    println!("{:<16} {:<10} {:<22} {:<10} {}", "SERVER", "STATUS", "ADDRESS", "MATCH", "LAST HEARTBEAT");
    for server in &resp.servers {
        println!(
            "{:<16} {:<10} {:<22} {:<10} {}ms ago",
            server.id,
            format!("{:?}", server.status),
            server.address,
            if server.current_match_id.is_empty() { "-" } else { &server.current_match_id },
            server.last_heartbeat_ms_ago
        );
    }

    println!();
    println!("queue ({}): {}", resp.queue.len(), resp.queue.iter().map(|e| e.player_id.as_str()).collect::<Vec<_>>().join(", "));
    Ok(())
}

async fn force(matchmaker_addr: &str, server_id: &str, forced_status: ForcedStatus) -> Result<(), ClientError> {
    let mut stream = TcpStream::connect(matchmaker_addr).await?;
    let request = Request::AdminUpdateServerState(AdminServerUpdateRequest {
        server_id: server_id.to_string(),
        forced_status,
        clock: VectorClock::new(),
    });
    schema::write_frame(&mut stream, &request).await?;
    let response: Response = schema::read_frame(&mut stream).await?;
    let Response::AdminUpdateServerState(resp) = response else {
        return Err(ClientError::UnexpectedResponse);
    };

    match resp.status {
        AdminResult::Ok => println!("ok"),
        AdminResult::NotFound => println!("not found: {server_id}"),
        AdminResult::Conflict => println!("conflict: {}", resp.message),
    }
    Ok(())
}
