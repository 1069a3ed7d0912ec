// Replication controller (C5): the only component that mutates node state.
//
// All reads and writes of the node VC, store, log and hold-back queue
// happen under a single `std::sync::Mutex`. The critical section performs
// no `.await` (it is pure CPU-bound bookkeeping), so a std mutex is the
// right tool here rather than a tokio one: holding it never blocks the
// runtime's reactor.

use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::holdback::HoldbackQueue;
use crate::membership::Membership;
use crate::operation::{OpKind, Operation, OperationLog};
use crate::store::{Record, Store};
use crate::transport::PeerTransport;
use crate::vector_clock::{ClockOrdering, VectorClock};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplicationError {
    /// Client-side malformed request / conflicting CREATE. Maps to 4xx.
    Validation(String),
    /// UPDATE or GET on an unknown key. Maps to 404.
    NotFound(String),
    /// Received operation references an unknown node id, or has a malformed
    /// VC shape. Logged and dropped, never enqueued. Maps to 4xx so the
    /// sender's retry loop does not retry it.
    Protocol(String),
    /// VC overflow or an I1-I5 invariant violation detected at runtime.
    /// The process must abort; see `error::AppError`.
    Fatal(String),
}

impl std::fmt::Display for ReplicationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReplicationError::Validation(msg) => write!(f, "validation error: {msg}"),
            ReplicationError::NotFound(msg) => write!(f, "not found: {msg}"),
            ReplicationError::Protocol(msg) => write!(f, "protocol error: {msg}"),
            ReplicationError::Fatal(msg) => write!(f, "fatal error: {msg}"),
        }
    }
}

impl std::error::Error for ReplicationError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryOutcome {
    /// Applied immediately (possibly after draining the hold-back queue).
    Delivered,
    /// Buffered in the hold-back queue; not yet causally deliverable.
    Held,
    /// Already in the log (duplicate delivery); no-op.
    AlreadyApplied,
}

struct NodeState {
    vc: VectorClock,
    store: Store,
    log: OperationLog,
    holdback: HoldbackQueue,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub node_id: String,
    pub vector_clock: VectorClock,
    pub store_size: usize,
    pub queue_size: usize,
    pub log_size: usize,
}

pub struct ReplicationController {
    membership: Membership,
    state: Mutex<NodeState>,
    transport: Arc<dyn PeerTransport>,
}

impl ReplicationController {
    pub fn new(membership: Membership, transport: Arc<dyn PeerTransport>) -> Self {
        let vc = VectorClock::zero(membership.all_ids());
        Self {
            membership,
            state: Mutex::new(NodeState {
                vc,
                store: Store::new(),
                log: OperationLog::new(),
                holdback: HoldbackQueue::new(),
            }),
            transport,
        }
    }

    pub fn node_id(&self) -> &str {
        self.membership.self_id()
    }

    /// Deliverability predicate from §4.5: `op` from origin `o` is
    /// deliverable against `node_vc` iff it is the very next op expected
    /// from `o`, and every other dependency it carries has already landed.
    fn is_deliverable(op: &Operation, node_vc: &VectorClock) -> bool {
        let origin = &op.origin;
        if op.vc.get(origin) != node_vc.get(origin) + 1 {
            return false;
        }
        op.vc
            .iter()
            .all(|(id, n)| id == origin || n <= node_vc.get(id))
    }

    /// Local CREATE or UPDATE (§4.5 "Local write"). Synchronous: the whole
    /// critical section runs without yielding. Returns the assigned
    /// operation; the caller is responsible for propagating it to peers
    /// outside the lock via `propagate`.
    #[instrument(skip(self, payload))]
    pub fn local_write(
        &self,
        kind: OpKind,
        key: String,
        payload: serde_json::Value,
    ) -> Result<Operation, ReplicationError> {
        let mut state = self
            .state
            .lock()
            .expect("replication controller mutex poisoned");

        match kind {
            OpKind::Create if state.store.contains(&key) => {
                return Err(ReplicationError::Validation(format!(
                    "key {key:?} already exists"
                )));
            }
            OpKind::Update if !state.store.contains(&key) => {
                return Err(ReplicationError::NotFound(format!(
                    "key {key:?} does not exist"
                )));
            }
            _ => {}
        }

        let node_id = self.membership.self_id();
        let vc = state.vc.incremented(node_id).ok_or_else(|| {
            ReplicationError::Fatal(format!("vector clock overflow on node {node_id}"))
        })?;

        let op = Operation::new(vc.get(node_id), kind, key.clone(), payload.clone(), node_id.to_string(), vc.clone());

        state.store.put(key, payload, vc.clone(), node_id.to_string());
        state.log.append(op.clone());
        state.vc = vc;

        info!(op_id = %op.op_id, kind = ?op.kind, "applied local write");
        Ok(op)
    }

    /// Inbound replication (§4.5 "Inbound replication"). Synchronous.
    #[instrument(skip(self, op), fields(op_id = %op.op_id, origin = %op.origin))]
    pub fn replicate(&self, op: Operation) -> Result<DeliveryOutcome, ReplicationError> {
        self.validate_vc_shape(&op.vc)?;

        let mut state = self
            .state
            .lock()
            .expect("replication controller mutex poisoned");

        if state.log.contains(&op.op_id) {
            debug!("duplicate delivery, dropping silently");
            return Ok(DeliveryOutcome::AlreadyApplied);
        }

        if Self::is_deliverable(&op, &state.vc) {
            Self::apply_remote(&mut state, op);

            let node_vc = state.vc.clone();
            let (released, final_vc) = state
                .holdback
                .drain_deliverable(node_vc, Self::is_deliverable);
            for released_op in released {
                info!(op_id = %released_op.op_id, "released from hold-back queue");
                Self::apply_remote_after_drain(&mut state, released_op);
            }
            state.vc = final_vc;

            Ok(DeliveryOutcome::Delivered)
        } else {
            debug!("not yet deliverable, holding");
            state.holdback.add(op);
            Ok(DeliveryOutcome::Held)
        }
    }

    fn validate_vc_shape(&self, vc: &VectorClock) -> Result<(), ReplicationError> {
        for (node_id, _) in vc.iter() {
            if !self.membership.contains(node_id) {
                warn!(node_id, "received operation with unknown node id in VC");
                return Err(ReplicationError::Protocol(format!(
                    "unknown node id {node_id:?} in vector clock"
                )));
            }
        }
        Ok(())
    }

    /// Apply a deliverable remote op: resolve conflicts, merge the VC,
    /// append to the log (always, §4.5 "Apply remote op" step 4).
    fn apply_remote(state: &mut NodeState, op: Operation) {
        Self::apply_conflict_resolution(state, &op);
        state.vc = state.vc.merged(&op.vc);
        state.log.append(op);
    }

    /// Same as `apply_remote` but the VC merge is folded into the caller's
    /// fixed-point drain, so only the store/log mutation happens here.
    fn apply_remote_after_drain(state: &mut NodeState, op: Operation) {
        Self::apply_conflict_resolution(state, &op);
        state.log.append(op);
    }

    /// Concurrent-write policy (§4.5). Decides whether the incoming op's
    /// payload should overwrite the stored record.
    fn apply_conflict_resolution(state: &mut NodeState, op: &Operation) {
        let take_incoming = match state.store.get(&op.key) {
            None => true,
            Some(current) => Self::resolve(current, op),
        };

        if take_incoming {
            state.store.put(
                op.key.clone(),
                op.payload.clone(),
                op.vc.clone(),
                op.origin.clone(),
            );
        }
    }

    fn resolve(current: &Record, incoming: &Operation) -> bool {
        match incoming.vc.compare(&current.vc_written) {
            ClockOrdering::Greater => true,
            ClockOrdering::Less | ClockOrdering::Equal => false,
            ClockOrdering::Concurrent => incoming.origin > current.written_by,
        }
    }

    pub fn get(&self, key: &str) -> Option<Record> {
        self.lock_state().store.get(key).cloned()
    }

    pub fn list(&self) -> Vec<Record> {
        self.lock_state().store.list()
    }

    pub fn log_snapshot(&self) -> Vec<Operation> {
        self.lock_state().log.snapshot().to_vec()
    }

    pub fn queue_snapshot(&self) -> Vec<Operation> {
        self.lock_state().holdback.snapshot().to_vec()
    }

    pub fn health(&self) -> HealthSnapshot {
        let state = self.lock_state();
        HealthSnapshot {
            node_id: self.membership.self_id().to_string(),
            vector_clock: state.vc.clone(),
            store_size: state.store.len(),
            queue_size: state.holdback.len(),
            log_size: state.log.len(),
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, NodeState> {
        self.state.lock().expect("replication controller mutex poisoned")
    }

    /// Propagate `op` to every other member, outside the critical section.
    /// Best-effort/at-least-once: each peer send retries independently
    /// inside the transport (§4.7); a failure here is logged, not returned,
    /// since the sender's job is done once the send is handed off.
    pub async fn propagate(&self, op: Operation) {
        let sends = self.membership.other_peers().map(|(peer_id, peer_url)| {
            let transport = Arc::clone(&self.transport);
            let op = op.clone();
            let peer_id = peer_id.to_string();
            let peer_url = peer_url.to_string();
            async move {
                if let Err(err) = transport.send(&peer_id, &peer_url, op).await {
                    warn!(peer_id, %err, "propagation to peer ultimately failed");
                }
            }
        });
        futures::future::join_all(sends).await;
    }
}
