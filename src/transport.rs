// Peer transport client (C7): outbound propagation of operations to peers.
//
// `PeerTransport` is the seam the spec calls out in §4.7 / §9 ("Transport-
// layer decoupling") so that causal-delivery tests can substitute a
// synchronous in-memory transport for the real HTTP one.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::operation::Operation;
use crate::replication::ReplicationController;

#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Deliver `op` to the peer identified by `peer_id` at `peer_url`.
    /// Implementations own their own retry policy; a returned `Err` means
    /// delivery was abandoned (never silently dropped without logging).
    async fn send(&self, peer_id: &str, peer_url: &str, op: Operation) -> anyhow::Result<()>;
}

/// Bounded exponential backoff used by `HttpPeerTransport`: base 250ms,
/// factor 2, capped at 30s, unbounded attempts (§7 ReplicationTransportError).
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub factor: u32,
    pub cap: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(250),
            factor: 2,
            cap: Duration::from_secs(30),
        }
    }
}

impl BackoffPolicy {
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let scaled = self.base.saturating_mul(self.factor.saturating_pow(attempt));
        scaled.min(self.cap)
    }
}

/// Real HTTP transport over `reqwest`, POSTing to `{peer_url}/replicate`.
pub struct HttpPeerTransport {
    client: reqwest::Client,
    backoff: BackoffPolicy,
    request_timeout: Duration,
}

impl HttpPeerTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            backoff: BackoffPolicy::default(),
            request_timeout: Duration::from_secs(5),
        }
    }
}

impl Default for HttpPeerTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PeerTransport for HttpPeerTransport {
    async fn send(&self, peer_id: &str, peer_url: &str, op: Operation) -> anyhow::Result<()> {
        let url = format!("{}/replicate", peer_url.trim_end_matches('/'));
        let mut attempt = 0u32;

        loop {
            let result = self
                .client
                .post(&url)
                .timeout(self.request_timeout)
                .json(&op)
                .send()
                .await;

            match result {
                Ok(response) if response.status().is_success() => {
                    debug!(peer_id, op_id = %op.op_id, "delivered operation to peer");
                    return Ok(());
                }
                Ok(response) if response.status().is_client_error() => {
                    // ProtocolError on the peer's side: retrying a malformed
                    // operation can never succeed.
                    warn!(
                        peer_id,
                        op_id = %op.op_id,
                        status = %response.status(),
                        "peer rejected operation, not retrying"
                    );
                    anyhow::bail!("peer {peer_id} rejected op {}: {}", op.op_id, response.status());
                }
                Ok(response) => {
                    warn!(peer_id, op_id = %op.op_id, status = %response.status(), attempt, "peer returned server error, retrying");
                }
                Err(err) => {
                    warn!(peer_id, op_id = %op.op_id, %err, attempt, "transport error, retrying");
                }
            }

            tokio::time::sleep(self.backoff.delay_for_attempt(attempt)).await;
            attempt += 1;
        }
    }
}

/// In-process transport for deterministic tests: delivers directly into the
/// target node's `ReplicationController`, synchronously, with no network
/// and no retries. Tests register peers explicitly so that individual
/// nodes can be left unregistered ("paused") to model partitions.
#[derive(Default)]
pub struct InMemoryTransport {
    nodes: Mutex<HashMap<String, Arc<ReplicationController>>>,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, node_id: impl Into<String>, controller: Arc<ReplicationController>) {
        self.nodes
            .lock()
            .expect("in-memory transport mutex poisoned")
            .insert(node_id.into(), controller);
    }

    pub fn unregister(&self, node_id: &str) {
        self.nodes
            .lock()
            .expect("in-memory transport mutex poisoned")
            .remove(node_id);
    }
}

#[async_trait]
impl PeerTransport for InMemoryTransport {
    async fn send(&self, peer_id: &str, _peer_url: &str, op: Operation) -> anyhow::Result<()> {
        let controller = self
            .nodes
            .lock()
            .expect("in-memory transport mutex poisoned")
            .get(peer_id)
            .cloned();

        match controller {
            Some(controller) => {
                controller.replicate(op)?;
                Ok(())
            }
            None => anyhow::bail!("peer {peer_id} is not reachable (paused/unregistered)"),
        }
    }
}
