// Causal KV - a replicated key-value store with causal consistency.

// Vector clocks: construction, increment, merge, happens-before comparison.
pub mod vector_clock;

// Local key-value storage.
pub mod store;

// Replicated operation representation and the append-only operation log.
pub mod operation;

// Hold-back queue for operations that arrive before their dependencies.
pub mod holdback;

// Statically configured cluster membership.
pub mod membership;

// The replication controller: the only component that mutates node state.
pub mod replication;

// Outbound peer transport (HTTP in production, in-memory for tests).
pub mod transport;

// Environment-derived node configuration.
pub mod config;

// Shared application state handed to HTTP handlers.
pub mod app_state;

// HTTP façade: routes, request/response shapes, error-to-status mapping.
pub mod http;

// Common utilities
pub mod error;

pub use error::{AppError, AppResult};

/// Aborts the process after a `ReplicationError::Fatal` (VC overflow or an
/// I1-I5 invariant violation). A node that has reached this state can no
/// longer be trusted to keep serving requests, so it must stop rather than
/// continue answering with corrupted state.
pub fn abort_node(reason: &str) -> ! {
    tracing::error!("aborting node due to unrecoverable replication error: {reason}");
    std::process::exit(1)
}
