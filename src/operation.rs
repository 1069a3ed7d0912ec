// The replicated operation: an immutable message describing a single
// CREATE or UPDATE, plus the append-only log that records delivery order.

use serde::{Deserialize, Serialize};

use crate::vector_clock::VectorClock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OpKind {
    Create,
    Update,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operation {
    pub op_id: String,
    pub kind: OpKind,
    pub key: String,
    pub payload: serde_json::Value,
    pub origin: String,
    pub vc: VectorClock,
}

impl Operation {
    pub fn new(
        origin_seq: u64,
        kind: OpKind,
        key: String,
        payload: serde_json::Value,
        origin: String,
        vc: VectorClock,
    ) -> Self {
        Self {
            op_id: format!("{origin}-{origin_seq}"),
            kind,
            key,
            payload,
            origin,
            vc,
        }
    }
}

/// Operation log (C3): append-only, read by `GET /log`.
#[derive(Debug, Default)]
pub struct OperationLog {
    entries: Vec<Operation>,
}

impl OperationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, op: Operation) {
        self.entries.push(op);
    }

    pub fn contains(&self, op_id: &str) -> bool {
        self.entries.iter().any(|op| op.op_id == op_id)
    }

    pub fn snapshot(&self) -> &[Operation] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
