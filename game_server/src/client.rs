use schema::{ServerStatusKind, ServerStatusUpdateRequest, VectorClock};
use tokio::net::TcpStream;
use tracing::warn;

use crate::errors::WorkerError;

/// Pushes one status update to the Matchmaker and merges the clock it
/// replied with into `clock` in place. Failures are logged and
/// swallowed — a missed heartbeat just means the next one, or the
/// sweep, will catch up.
pub async fn report_status(
    matchmaker_addr: &str,
    server_id: &str,
    address: &str,
    new_status: ServerStatusKind,
    match_id: &str,
    clock: &mut VectorClock,
) {
    match send(matchmaker_addr, server_id, address, new_status, match_id, clock.clone()).await {
        Ok(reply_clock) => clock.merge(&reply_clock),
        Err(err) => warn!(%matchmaker_addr, error = %err, "failed to report status to matchmaker"),
    }
}

async fn send(
    matchmaker_addr: &str,
    server_id: &str,
    address: &str,
    new_status: ServerStatusKind,
    match_id: &str,
    clock: VectorClock,
) -> Result<VectorClock, WorkerError> {
    let mut stream = TcpStream::connect(matchmaker_addr).await?;
    let request = schema::Request::UpdateServerStatus(ServerStatusUpdateRequest {
        server_id: server_id.to_string(),
        new_status,
        address: address.to_string(),
        match_id: match_id.to_string(),
        clock,
    });
    schema::write_frame(&mut stream, &request).await?;
    let response: schema::Response = schema::read_frame(&mut stream).await?;
    match response {
        schema::Response::UpdateServerStatus(resp) => Ok(resp.clock),
        _ => Err(WorkerError::UnexpectedResponse),
    }
}
