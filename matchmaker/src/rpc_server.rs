use std::sync::Arc;

use schema::{Request, Response};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::handlers;
use crate::state::Store;

/// Accepts inbound player/server/admin RPCs on one TCP listener and
/// routes each to the matching handler (`§4.3`). One connection per
/// call: the client opens, sends a single framed [`Request`], reads
/// the matching framed [`Response`], and closes.
pub async fn run(store: Arc<Store>, listen_addr: String, shutdown: CancellationToken) -> std::io::Result<()> {
    let listener = TcpListener::bind(&listen_addr).await?;
    info!(addr = %listen_addr, "matchmaker rpc listener bound");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("rpc listener received shutdown signal, exiting");
                return Ok(());
            }
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(pair) => pair,
                    Err(err) => {
                        warn!(error = %err, "failed to accept connection");
                        continue;
                    }
                };
                let store = store.clone();
                tokio::spawn(async move {
                    if let Err(err) = serve_one(store, stream).await {
                        debug!(peer = %peer, error = %err, "connection ended with error");
                    }
                });
            }
        }
    }
}

async fn serve_one(store: Arc<Store>, mut stream: TcpStream) -> Result<(), schema::CodecError> {
    let request: Request = schema::read_frame(&mut stream).await?;
    let response = dispatch(&store, request);
    schema::write_frame(&mut stream, &response).await?;
    Ok(())
}

fn dispatch(store: &Store, request: Request) -> Response {
    match request {
        Request::QueuePlayer(req) => Response::QueuePlayer(handlers::queue_player(store, req)),
        Request::GetPlayerStatus(req) => {
            Response::GetPlayerStatus(handlers::get_player_status(store, req))
        }
        Request::UpdateServerStatus(req) => {
            Response::UpdateServerStatus(handlers::update_server_status(store, req))
        }
        Request::AdminGetSystemStatus(req) => {
            Response::AdminGetSystemStatus(handlers::admin_get_system_status(store, req))
        }
        Request::AdminUpdateServerState(req) => {
            Response::AdminUpdateServerState(handlers::admin_update_server_state(store, req))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schema::{PlayerInfoRequest, QueueStatus, VectorClock};

    #[test]
    fn dispatch_routes_queue_player_to_the_matching_handler() {
        let store = Store::new("mm");
        let response = dispatch(
            &store,
            Request::QueuePlayer(PlayerInfoRequest {
                player_id: "a".into(),
                game_mode: "1v1".into(),
                clock: VectorClock::new(),
            }),
        );
        match response {
            Response::QueuePlayer(resp) => assert_eq!(resp.status, QueueStatus::Ok),
            other => panic!("unexpected response variant: {other:?}"),
        }
    }
}
