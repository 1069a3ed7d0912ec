// Hold-back queue (C4): operations received but not yet causally
// deliverable. `drain_deliverable` is a fixed-point scan so that releasing
// op A, which advances the node's VC, can expose op B in the very same
// drain (the "Held-then-released chain" scenario).

use crate::operation::Operation;
use crate::vector_clock::VectorClock;

#[derive(Debug, Default)]
pub struct HoldbackQueue {
    pending: Vec<Operation>,
}

impl HoldbackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// No-op if `op.op_id` is already pending (P4: re-delivering a still-held
    /// op must not grow the queue with a second copy the drain can never
    /// release).
    pub fn add(&mut self, op: Operation) {
        if self.contains(&op.op_id) {
            return;
        }
        self.pending.push(op);
    }

    pub fn contains(&self, op_id: &str) -> bool {
        self.pending.iter().any(|pending| pending.op_id == op_id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn snapshot(&self) -> &[Operation] {
        &self.pending
    }

    /// Repeatedly scans `self.pending` for operations whose dependencies are
    /// satisfied, per `is_deliverable`, against the clock returned by
    /// `advance` after each release. Returns released operations in release
    /// order. Ties within a single scan are broken by `(origin, vc[origin])`
    /// ascending for determinism.
    pub fn drain_deliverable(
        &mut self,
        mut current_vc: VectorClock,
        is_deliverable: impl Fn(&Operation, &VectorClock) -> bool,
    ) -> (Vec<Operation>, VectorClock) {
        let mut released = Vec::new();

        loop {
            let mut candidates: Vec<usize> = self
                .pending
                .iter()
                .enumerate()
                .filter(|(_, op)| is_deliverable(op, &current_vc))
                .map(|(idx, _)| idx)
                .collect();

            if candidates.is_empty() {
                break;
            }

            candidates.sort_by_key(|&idx| {
                let op = &self.pending[idx];
                (op.origin.clone(), op.vc.get(&op.origin))
            });

            // Take the first deterministic candidate; re-scan afterwards
            // since releasing it may change which of the remaining
            // candidates are still valid (their deliverability depends on
            // the now-advanced `current_vc`).
            let idx = candidates[0];
            let op = self.pending.remove(idx);
            current_vc = current_vc.merged(&op.vc);
            released.push(op);
        }

        (released, current_vc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::OpKind;

    fn op(origin: &str, vc: VectorClock) -> Operation {
        Operation::new(
            vc.get(origin),
            OpKind::Create,
            "A".to_string(),
            serde_json::json!(null),
            origin.to_string(),
            vc,
        )
    }

    fn deliverable(op: &Operation, node_vc: &VectorClock) -> bool {
        let o = &op.origin;
        if op.vc.get(o) != node_vc.get(o) + 1 {
            return false;
        }
        op.vc
            .iter()
            .all(|(id, n)| id == o || n <= node_vc.get(id))
    }

    #[test]
    fn drain_releases_nothing_when_dependency_missing() {
        let mut queue = HoldbackQueue::new();
        let node_vc = VectorClock::zero(["n1", "n2"]);
        // n2's op depends on n1 being at 1, but node_vc has n1 at 0.
        let mut vc_b = VectorClock::zero(["n1", "n2"])
            .incremented("n1")
            .unwrap();
        vc_b = vc_b.incremented("n2").unwrap();
        queue.add(op("n2", vc_b));

        let (released, final_vc) = queue.drain_deliverable(node_vc.clone(), deliverable);
        assert!(released.is_empty());
        assert_eq!(final_vc, node_vc);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn add_is_a_no_op_for_an_op_id_already_pending() {
        let mut queue = HoldbackQueue::new();
        let vc = VectorClock::zero(["n1", "n2"]).incremented("n2").unwrap();
        queue.add(op("n2", vc.clone()));
        queue.add(op("n2", vc));

        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn drain_is_transitive_fixed_point() {
        // C depends on B depends on A, all same origin n1 sequenced 1,2,3.
        let mut queue = HoldbackQueue::new();
        let vc_a = VectorClock::zero(["n1"]).incremented("n1").unwrap();
        let vc_b = vc_a.incremented("n1").unwrap();
        let vc_c = vc_b.incremented("n1").unwrap();

        queue.add(op("n1", vc_c.clone()));
        queue.add(op("n1", vc_b.clone()));
        queue.add(op("n1", vc_a.clone()));

        let node_vc = VectorClock::zero(["n1"]);
        let (released, final_vc) = queue.drain_deliverable(node_vc, deliverable);

        let ids: Vec<_> = released.iter().map(|o| o.vc.get("n1")).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(final_vc, vc_c);
        assert!(queue.is_empty());
    }
}
