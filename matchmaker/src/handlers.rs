use schema::{
    AdminRequest, AdminResult, AdminServerUpdateRequest, AdminUpdateResponse, ForcedStatus,
    PlayerInfoRequest, PlayerState, PlayerStatusRequest, PlayerStatusResponse, QueuePlayerResponse,
    QueueStatus, ServerInfo, ServerStatusFull, ServerStatusKind, ServerStatusUpdateRequest,
    ServerStatusUpdateResponse, SystemStatusResponse, UpdateResult, PlayerQueueEntry,
};
use tracing::{info, warn};

use crate::state::{PlayerStatus, ServerStatus, Store};

/// `§4.3 QueuePlayer`. Holds the write lock for the whole body.
pub fn queue_player(store: &Store, req: PlayerInfoRequest) -> QueuePlayerResponse {
    store.write(|w| {
        w.merge_clock(&req.clock);

        let current_status = w.player(&req.player_id).map(|p| p.status);
        let (status, message) = match current_status {
            Some(PlayerStatus::InQueue) => (QueueStatus::AlreadyInQueue, "already in queue".to_string()),
            Some(PlayerStatus::InMatch) => (QueueStatus::InMatch, "already in a match".to_string()),
            _ => {
                w.enqueue_tail(&req.player_id);
                info!(player = %req.player_id, game_mode = %req.game_mode, "player queued");
                (QueueStatus::Ok, String::new())
            }
        };

        w.increment_self();
        QueuePlayerResponse {
            status,
            message,
            clock: w.clock_snapshot(),
        }
    })
}

/// `§4.3 GetPlayerStatus`. Read-only: no self increment, but runs
/// under the same lock that committed any preceding write from this
/// process, which is what gives read-your-writes here.
pub fn get_player_status(store: &Store, req: PlayerStatusRequest) -> PlayerStatusResponse {
    store.write(|w| {
        w.merge_clock(&req.clock);

        let Some(player) = w.player(&req.player_id) else {
            return PlayerStatusResponse {
                state: PlayerState::Unknown,
                match_id: String::new(),
                server_addr: String::new(),
                clock: w.clock_snapshot(),
            };
        };

        let (state, match_id) = match player.status {
            PlayerStatus::Idle => (PlayerState::Idle, String::new()),
            PlayerStatus::InQueue => (PlayerState::InQueue, String::new()),
            PlayerStatus::InMatch => (
                PlayerState::InMatch,
                player.match_id.clone().unwrap_or_default(),
            ),
        };

        let server_addr = if match_id.is_empty() {
            String::new()
        } else {
            w.server_for_match(&match_id)
                .map(|s| s.address.clone())
                .unwrap_or_default()
        };

        PlayerStatusResponse {
            state,
            match_id,
            server_addr,
            clock: w.clock_snapshot(),
        }
    })
}

/// `§4.3 UpdateServerStatus`.
pub fn update_server_status(
    store: &Store,
    req: ServerStatusUpdateRequest,
) -> ServerStatusUpdateResponse {
    store.write(|w| {
        w.merge_clock(&req.clock);

        w.upsert_server(&req.server_id, &req.address);

        match req.new_status {
            ServerStatusKind::Available => {
                // Match completion: the server reporting Available
                // while it still references a known current match
                // means that match is done.
                if let Some(server) = w.server(&req.server_id) {
                    if let Some(match_id) = server.current_match_id.clone() {
                        if w.match_exists(&match_id) {
                            w.complete_match(&match_id);
                        }
                    }
                }
                w.set_server_status(&req.server_id, ServerStatus::Available);
            }
            ServerStatusKind::Busy => {
                // A server-initiated Busy report names the match it is
                // now running; honour it so the registry agrees with
                // what the server believes even if this update arrives
                // out of order with respect to our own dispatch.
                if !req.match_id.is_empty() {
                    w.set_server_current_match(&req.server_id, &req.match_id);
                }
                w.set_server_status(&req.server_id, ServerStatus::Busy);
            }
            ServerStatusKind::Down => {
                if let Some(server) = w.server(&req.server_id) {
                    if let Some(match_id) = server.current_match_id.clone() {
                        w.requeue_match_players(&match_id);
                    }
                }
                w.set_server_status(&req.server_id, ServerStatus::Down);
                warn!(server = %req.server_id, "server reported Down");
            }
        }

        w.increment_self();
        ServerStatusUpdateResponse {
            status: UpdateResult::Ok,
            clock: w.clock_snapshot(),
        }
    })
}

/// `§4.3 AdminGetSystemStatus`. Read-only, does not bump the clock.
pub fn admin_get_system_status(store: &Store, _req: AdminRequest) -> SystemStatusResponse {
    let snapshot = store.snapshot();
    let servers = snapshot
        .servers
        .into_iter()
        .map(|s| ServerInfo {
            id: s.id,
            status: match s.status {
                ServerStatus::Unknown => ServerStatusFull::Unknown,
                ServerStatus::Available => ServerStatusFull::Available,
                ServerStatus::Busy => ServerStatusFull::Busy,
                ServerStatus::Down => ServerStatusFull::Down,
            },
            address: s.address,
            current_match_id: s.current_match_id.unwrap_or_default(),
            last_heartbeat_ms_ago: s.last_heartbeat.elapsed().as_millis() as u64,
        })
        .collect();
    let queue = snapshot
        .queue
        .into_iter()
        .map(|player_id| PlayerQueueEntry { player_id })
        .collect();

    SystemStatusResponse {
        servers,
        queue,
        clock: snapshot.clock,
    }
}

/// `§4.3 AdminUpdateServerState`.
pub fn admin_update_server_state(
    store: &Store,
    req: AdminServerUpdateRequest,
) -> AdminUpdateResponse {
    store.write(|w| {
        w.merge_clock(&req.clock);

        let Some(current) = w.server(&req.server_id).map(|s| s.status) else {
            return AdminUpdateResponse {
                status: AdminResult::NotFound,
                message: format!("unknown server {}", req.server_id),
                clock: w.clock_snapshot(),
            };
        };

        let result = match req.forced_status {
            ForcedStatus::ForceDown => {
                if let Some(server) = w.server(&req.server_id) {
                    if let Some(match_id) = server.current_match_id.clone() {
                        w.requeue_match_players(&match_id);
                    }
                }
                w.set_server_status(&req.server_id, ServerStatus::Down);
                Ok(())
            }
            ForcedStatus::ForceAvailable => match current {
                ServerStatus::Down | ServerStatus::Unknown => {
                    w.set_server_status(&req.server_id, ServerStatus::Available);
                    Ok(())
                }
                ServerStatus::Busy => Err(format!(
                    "cannot force {} Available while Busy",
                    req.server_id
                )),
                ServerStatus::Available => Ok(()),
            },
        };

        w.increment_self();
        match result {
            Ok(()) => AdminUpdateResponse {
                status: AdminResult::Ok,
                message: String::new(),
                clock: w.clock_snapshot(),
            },
            Err(message) => AdminUpdateResponse {
                status: AdminResult::Conflict,
                message,
                clock: w.clock_snapshot(),
            },
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use schema::VectorClock;

    fn req(player_id: &str) -> PlayerInfoRequest {
        PlayerInfoRequest {
            player_id: player_id.to_string(),
            game_mode: "1v1".to_string(),
            clock: VectorClock::new(),
        }
    }

    #[test]
    fn second_enqueue_of_same_player_is_rejected() {
        let store = Store::new("mm");
        let first = queue_player(&store, req("a"));
        assert_eq!(first.status, QueueStatus::Ok);
        let second = queue_player(&store, req("a"));
        assert_eq!(second.status, QueueStatus::AlreadyInQueue);
        let snap = store.snapshot();
        assert_eq!(snap.queue.len(), 1);
    }

    #[test]
    fn clock_is_strictly_monotone_across_mutations() {
        let store = Store::new("mm");
        let r1 = queue_player(&store, req("a"));
        let r2 = queue_player(&store, req("b"));
        assert!(VectorClock::happens_before(&r1.clock, &r2.clock));
    }

    #[test]
    fn status_for_unknown_player_is_unknown_and_does_not_bump_clock() {
        let store = Store::new("mm");
        let before = store.snapshot().clock;
        let resp = get_player_status(
            &store,
            PlayerStatusRequest {
                player_id: "ghost".into(),
                clock: VectorClock::new(),
            },
        );
        assert_eq!(resp.state, PlayerState::Unknown);
        assert_eq!(resp.clock, before);
    }

    #[test]
    fn admin_force_available_from_busy_is_conflict() {
        let store = Store::new("mm");
        store.write(|w| {
            w.upsert_server("g1", "addr");
            w.set_server_status("g1", ServerStatus::Available);
            w.enqueue_tail("a");
            w.enqueue_tail("b");
            let (a, b) = w.pop_front_two().unwrap();
            w.form_match("m1".into(), "g1", &a, &b);
        });
        let resp = admin_update_server_state(
            &store,
            AdminServerUpdateRequest {
                server_id: "g1".into(),
                forced_status: ForcedStatus::ForceAvailable,
                clock: VectorClock::new(),
            },
        );
        assert_eq!(resp.status, AdminResult::Conflict);
        store.read(|v| assert_eq!(v.server("g1").unwrap().status, ServerStatus::Busy));
    }

    #[test]
    fn admin_force_down_requeues_match_players() {
        let store = Store::new("mm");
        store.write(|w| {
            w.upsert_server("g1", "addr");
            w.set_server_status("g1", ServerStatus::Available);
            w.enqueue_tail("a");
            w.enqueue_tail("b");
            let (a, b) = w.pop_front_two().unwrap();
            w.form_match("m1".into(), "g1", &a, &b);
        });
        let resp = admin_update_server_state(
            &store,
            AdminServerUpdateRequest {
                server_id: "g1".into(),
                forced_status: ForcedStatus::ForceDown,
                clock: VectorClock::new(),
            },
        );
        assert_eq!(resp.status, AdminResult::Ok);
        let snap = store.snapshot();
        assert_eq!(snap.queue, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn update_server_status_available_completes_match() {
        let store = Store::new("mm");
        store.write(|w| {
            w.upsert_server("g1", "addr");
            w.set_server_status("g1", ServerStatus::Available);
            w.enqueue_tail("a");
            w.enqueue_tail("b");
            let (a, b) = w.pop_front_two().unwrap();
            w.form_match("m1".into(), "g1", &a, &b);
        });
        update_server_status(
            &store,
            ServerStatusUpdateRequest {
                server_id: "g1".into(),
                new_status: ServerStatusKind::Available,
                address: "addr".into(),
                match_id: String::new(),
                clock: VectorClock::new(),
            },
        );
        store.read(|v| {
            assert_eq!(v.player("a").unwrap().status, PlayerStatus::Idle);
            assert_eq!(v.server("g1").unwrap().status, ServerStatus::Available);
        });
    }
}
