use std::sync::Arc;
use std::time::Duration;

use schema::{AssignMatchRequest, AssignMatchResponse, AssignStatus, VectorClock};
use tokio::net::TcpStream;
use tracing::{info, warn};

use crate::metrics::Metrics;
use crate::state::{ServerStatus, Store};

/// A match formed by the pairing loop, ready to be pushed to its
/// assigned server. Built and handed off while the write lock is
/// still held; the network call itself happens after the lock is
/// released (`§5 Suspension points`).
#[derive(Debug, Clone)]
pub struct DispatchJob {
    pub server_id: String,
    pub address: String,
    pub match_id: String,
    pub players: (String, String),
    pub clock: VectorClock,
}

enum Outcome {
    Ok,
    Rejected(String),
    Failed(String),
}

/// Connects to the server, issues the assignment RPC, and reconciles
/// the outcome under a freshly re-acquired write lock. Runs as its own
/// spawned task so a slow or dead Game Server never blocks a handler.
pub async fn run(store: Arc<Store>, metrics: Arc<Metrics>, job: DispatchJob, timeout: Duration) {
    let outcome = attempt(&job, timeout).await;
    match outcome {
        Outcome::Ok => {
            info!(match_id = %job.match_id, server = %job.server_id, "assignment accepted");
        }
        Outcome::Rejected(reason) => {
            warn!(match_id = %job.match_id, server = %job.server_id, reason, "assignment rejected, requeueing");
            metrics.dispatch_failures_total.inc();
            store.write(|w| {
                w.requeue_match_players(&job.match_id);
                // The server is healthy, just unable to take this
                // match right now — free it back to the pool rather
                // than leaving it stuck Busy with no current match.
                w.set_server_status(&job.server_id, ServerStatus::Available);
                w.increment_self();
            });
        }
        Outcome::Failed(reason) => {
            warn!(match_id = %job.match_id, server = %job.server_id, reason, "dispatch failed, marking server Down");
            metrics.dispatch_failures_total.inc();
            metrics.servers_marked_down_total.inc();
            store.write(|w| {
                w.requeue_match_players(&job.match_id);
                w.set_server_status(&job.server_id, ServerStatus::Down);
                w.increment_self();
            });
        }
    }
}

async fn attempt(job: &DispatchJob, timeout: Duration) -> Outcome {
    let call = async {
        let mut stream = TcpStream::connect(&job.address).await?;
        let request = AssignMatchRequest {
            match_id: job.match_id.clone(),
            player_ids: vec![job.players.0.clone(), job.players.1.clone()],
            clock: job.clock.clone(),
        };
        schema::write_frame(&mut stream, &request).await?;
        let response: AssignMatchResponse = schema::read_frame(&mut stream).await?;
        Ok::<_, schema::CodecError>(response)
    };

    match tokio::time::timeout(timeout, call).await {
        Ok(Ok(response)) => match response.status {
            AssignStatus::Ok => Outcome::Ok,
            AssignStatus::Busy | AssignStatus::Reject => Outcome::Rejected(response.message),
        },
        Ok(Err(err)) => Outcome::Failed(err.to_string()),
        Err(_) => Outcome::Failed(format!("dispatch exceeded {timeout:?} deadline")),
    }
}
