use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::dispatch::{self, DispatchJob};
use crate::metrics::Metrics;
use crate::state::{ServerStatus, Store, WriteHandle};

pub struct PairingConfig {
    pub tick_interval: Duration,
    pub heartbeat_timeout: Duration,
    pub dispatch_timeout: Duration,
}

/// The background pairing-and-health loop (`§4.4`). Exits promptly on
/// shutdown rather than waiting out the current tick interval.
pub async fn run(
    store: Arc<Store>,
    metrics: Arc<Metrics>,
    config: PairingConfig,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(config.tick_interval);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("pairing loop received shutdown signal, exiting");
                return;
            }
            _ = ticker.tick() => {
                let jobs = tick_once(&store, &metrics);
                for job in jobs {
                    tokio::spawn(dispatch::run(
                        store.clone(),
                        metrics.clone(),
                        job,
                        config.dispatch_timeout,
                    ));
                }
                heartbeat_sweep(&store, &metrics, config.heartbeat_timeout);
            }
        }
    }
}

/// One pairing pass: forms as many matches as the queue and Available
/// pool allow, returning the dispatch jobs for the caller to spawn
/// outside the lock.
pub fn tick_once(store: &Store, metrics: &Metrics) -> Vec<DispatchJob> {
    store.write(|w| {
        let mut jobs = Vec::new();
        while w.queue_len() >= 2 {
            let Some(server_id) = w.oldest_available_server_id() else {
                break;
            };
            let (a, b) = w.pop_front_two().expect("checked queue_len() >= 2 above");
            let match_id = fresh_match_id(w);
            w.form_match(match_id.clone(), &server_id, &a, &b);
            w.increment_self();
            metrics.matches_formed_total.inc();

            let address = w
                .server(&server_id)
                .map(|s| s.address.clone())
                .unwrap_or_default();
            jobs.push(DispatchJob {
                server_id,
                address,
                match_id,
                players: (a, b),
                clock: w.clock_snapshot(),
            });
        }
        metrics.queue_depth.set(w.queue_len() as i64);
        jobs
    })
}

/// For every server not already Down, marks it Down once its
/// heartbeat has gone stale and requeues any players it still owed a
/// match to.
pub fn heartbeat_sweep(store: &Store, metrics: &Metrics, timeout: Duration) {
    store.write(|w| {
        for server_id in w.server_ids_not_down() {
            let Some(server) = w.server(&server_id) else {
                continue;
            };
            if server.last_heartbeat.elapsed() <= timeout {
                continue;
            }
            let current_match = server.current_match_id.clone();
            if let Some(match_id) = current_match {
                w.requeue_match_players(&match_id);
            }
            w.set_server_status(&server_id, ServerStatus::Down);
            w.increment_self();
            metrics.servers_marked_down_total.inc();
        }
    });
}

/// Opaque 32-bit hex match id; regenerated on the vanishingly rare
/// collision with an existing match.
fn fresh_match_id(w: &WriteHandle) -> String {
    loop {
        let token: u32 = rand::random();
        let candidate = format!("{token:08x}");
        if !w.match_exists(&candidate) {
            return candidate;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::Registry;

    fn metrics() -> Metrics {
        Metrics::new(&Registry::new())
    }

    #[test]
    fn tick_pairs_the_two_oldest_players_with_the_sole_available_server() {
        let store = Store::new("mm");
        store.write(|w| {
            w.upsert_server("g1", "127.0.0.1:9100");
            w.set_server_status("g1", ServerStatus::Available);
            w.enqueue_tail("a");
            w.enqueue_tail("b");
            w.enqueue_tail("c");
        });

        let jobs = tick_once(&store, &metrics());
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].server_id, "g1");
        assert_eq!(jobs[0].players, ("a".to_string(), "b".to_string()));

        let snap = store.snapshot();
        assert_eq!(snap.queue, vec!["c".to_string()]);
    }

    #[test]
    fn tick_does_nothing_when_no_server_is_available() {
        let store = Store::new("mm");
        store.write(|w| {
            w.enqueue_tail("a");
            w.enqueue_tail("b");
        });
        let jobs = tick_once(&store, &metrics());
        assert!(jobs.is_empty());
    }

    #[test]
    fn heartbeat_sweep_marks_stale_server_down_and_requeues_its_match() {
        let store = Store::new("mm");
        store.write(|w| {
            w.upsert_server("g1", "addr");
            w.set_server_status("g1", ServerStatus::Available);
            w.enqueue_tail("a");
            w.enqueue_tail("b");
            let (a, b) = w.pop_front_two().unwrap();
            w.form_match("m1".into(), "g1", &a, &b);
        });
        heartbeat_sweep(&store, &metrics(), Duration::from_millis(0));
        store.read(|v| {
            assert_eq!(v.server("g1").unwrap().status, ServerStatus::Down);
        });
        let snap = store.snapshot();
        assert_eq!(snap.queue, vec!["a".to_string(), "b".to_string()]);
    }
}
