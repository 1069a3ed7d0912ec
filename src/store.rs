// Local store (C2): key -> (payload, vc_written).
//
// `put` unconditionally overwrites. The concurrent-write policy lives in the
// replication controller (C5) and must be applied before `put` is called.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::vector_clock::VectorClock;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub key: String,
    pub payload: serde_json::Value,
    pub vc_written: VectorClock,
    /// Origin of the operation that produced `vc_written`. Not part of the
    /// wire-visible record shape (§6), but required internally to apply
    /// the LWW-by-origin tie-break (§4.5) on the next concurrent write.
    #[serde(skip_serializing)]
    pub written_by: String,
}

#[derive(Debug, Default)]
pub struct Store {
    records: HashMap<String, Record>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Record> {
        self.records.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.records.contains_key(key)
    }

    pub fn put(
        &mut self,
        key: String,
        payload: serde_json::Value,
        vc_written: VectorClock,
        written_by: String,
    ) {
        self.records.insert(
            key.clone(),
            Record {
                key,
                payload,
                vc_written,
                written_by,
            },
        );
    }

    pub fn list(&self) -> Vec<Record> {
        let mut records: Vec<_> = self.records.values().cloned().collect();
        records.sort_by(|a, b| a.key.cmp(&b.key));
        records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_round_trips() {
        let mut store = Store::new();
        let vc = VectorClock::zero(["n1"]).incremented("n1").unwrap();
        store.put(
            "A".to_string(),
            serde_json::json!({"name": "x"}),
            vc.clone(),
            "n1".to_string(),
        );

        let record = store.get("A").unwrap();
        assert_eq!(record.payload, serde_json::json!({"name": "x"}));
        assert_eq!(record.vc_written, vc);
    }

    #[test]
    fn put_overwrites_unconditionally() {
        let mut store = Store::new();
        let vc1 = VectorClock::zero(["n1"]).incremented("n1").unwrap();
        let vc2 = vc1.incremented("n1").unwrap();
        store.put("A".to_string(), serde_json::json!(1), vc1, "n1".to_string());
        store.put(
            "A".to_string(),
            serde_json::json!(2),
            vc2.clone(),
            "n1".to_string(),
        );

        let record = store.get("A").unwrap();
        assert_eq!(record.payload, serde_json::json!(2));
        assert_eq!(record.vc_written, vc2);
    }

    #[test]
    fn list_is_sorted_by_key() {
        let mut store = Store::new();
        let vc = VectorClock::zero(["n1"]);
        store.put("B".to_string(), serde_json::json!(1), vc.clone(), "n1".to_string());
        store.put("A".to_string(), serde_json::json!(2), vc, "n1".to_string());

        let keys: Vec<_> = store.list().into_iter().map(|r| r.key).collect();
        assert_eq!(keys, vec!["A".to_string(), "B".to_string()]);
    }
}
