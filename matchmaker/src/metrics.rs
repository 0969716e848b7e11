use std::sync::Arc;

use prometheus::{IntCounter, IntGauge, Registry};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Thin wrapper around the handful of counters/gauges this service
/// cares about, in the teacher's `metrics.rs` idiom: a small struct of
/// pre-registered instruments, no custom collector.
pub struct Metrics {
    pub matches_formed_total: IntCounter,
    pub dispatch_failures_total: IntCounter,
    pub servers_marked_down_total: IntCounter,
    pub queue_depth: IntGauge,
}

impl Metrics {
    pub fn new(registry: &Registry) -> Self {
        let matches_formed_total = IntCounter::new(
            "matchmaker_matches_formed_total",
            "matches formed by the pairing loop",
        )
        .expect("metric definition is valid");
        let dispatch_failures_total = IntCounter::new(
            "matchmaker_dispatch_failures_total",
            "assignment dispatches that failed or were rejected",
        )
        .expect("metric definition is valid");
        let servers_marked_down_total = IntCounter::new(
            "matchmaker_servers_marked_down_total",
            "servers transitioned to Down, by any cause",
        )
        .expect("metric definition is valid");
        let queue_depth = IntGauge::new("matchmaker_queue_depth", "players currently queued")
            .expect("metric definition is valid");

        registry
            .register(Box::new(matches_formed_total.clone()))
            .expect("metric registration is valid");
        registry
            .register(Box::new(dispatch_failures_total.clone()))
            .expect("metric registration is valid");
        registry
            .register(Box::new(servers_marked_down_total.clone()))
            .expect("metric registration is valid");
        registry
            .register(Box::new(queue_depth.clone()))
            .expect("metric registration is valid");

        Self {
            matches_formed_total,
            dispatch_failures_total,
            servers_marked_down_total,
            queue_depth,
        }
    }

    pub fn render(&self, registry: &Registry) -> String {
        use prometheus::{Encoder, TextEncoder};
        let metric_families = registry.gather();
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .expect("prometheus text encoding is infallible for our metric types");
        String::from_utf8(buffer).expect("prometheus text output is valid utf8")
    }
}

/// A minimal `/metrics`-shaped text endpoint: every accepted
/// connection gets one plaintext response and is closed. No routing,
/// no keep-alive — just enough for a scraper's `GET /metrics` to work.
pub async fn serve(metrics: Arc<Metrics>, registry: Registry, bind_addr: String) -> std::io::Result<()> {
    let listener = TcpListener::bind(&bind_addr).await?;
    info!(addr = %bind_addr, "metrics endpoint listening");

    loop {
        let (mut stream, _peer) = listener.accept().await?;
        let body = metrics.render(&registry);
        let response = format!(
            "HTTP/1.1 200 OK\r\ncontent-type: text/plain; version=0.0.4\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        if let Err(err) = stream.write_all(response.as_bytes()).await {
            warn!(error = %err, "failed writing metrics response");
        }
        let _ = stream.shutdown().await;
    }
}
