// Vector-clock algebra: construction, comparison and merge over a fixed membership.
//
// A VectorClock is immutable from the caller's perspective: `increment` and
// `merge` always return a new value. This keeps the operation log free of
// aliasing bugs where two log entries would end up sharing (and later
// mutating) the same clock.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorClock {
    counters: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockOrdering {
    Less,
    Equal,
    Greater,
    Concurrent,
}

impl VectorClock {
    /// Construct a zero clock with an entry for every member.
    pub fn zero<'a>(membership: impl IntoIterator<Item = &'a str>) -> Self {
        let counters = membership
            .into_iter()
            .map(|id| (id.to_string(), 0u64))
            .collect();
        Self { counters }
    }

    pub fn get(&self, node_id: &str) -> u64 {
        self.counters.get(node_id).copied().unwrap_or(0)
    }

    /// Increment this node's own entry, returning a new clock.
    ///
    /// Returns `None` on counter overflow, which callers must treat as a
    /// `FatalError` (spec invariant I1: the clock never wraps silently).
    pub fn incremented(&self, node_id: &str) -> Option<Self> {
        let mut counters = self.counters.clone();
        let entry = counters.entry(node_id.to_string()).or_insert(0);
        *entry = entry.checked_add(1)?;
        Some(Self { counters })
    }

    /// Componentwise max of `self` and `other`.
    pub fn merged(&self, other: &Self) -> Self {
        let mut counters = self.counters.clone();
        for (node_id, &value) in &other.counters {
            let entry = counters.entry(node_id.clone()).or_insert(0);
            *entry = (*entry).max(value);
        }
        Self { counters }
    }

    pub fn le(&self, other: &Self) -> bool {
        self.all_node_ids(other)
            .all(|id| self.get(id) <= other.get(id))
    }

    pub fn compare(&self, other: &Self) -> ClockOrdering {
        if self == other {
            return ClockOrdering::Equal;
        }
        match (self.le(other), other.le(self)) {
            (true, false) => ClockOrdering::Less,
            (false, true) => ClockOrdering::Greater,
            (true, true) => ClockOrdering::Equal, // unreachable given the == check above
            (false, false) => ClockOrdering::Concurrent,
        }
    }

    pub fn lt(&self, other: &Self) -> bool {
        matches!(self.compare(other), ClockOrdering::Less)
    }

    fn all_node_ids<'a>(&'a self, other: &'a Self) -> impl Iterator<Item = &'a str> {
        self.counters
            .keys()
            .chain(other.counters.keys())
            .map(String::as_str)
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counters.iter().map(|(k, &v)| (k.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vc(pairs: &[(&str, u64)]) -> VectorClock {
        let mut clock = VectorClock::zero(["n1", "n2", "n3"]);
        for &(id, n) in pairs {
            for _ in 0..n {
                clock = clock.incremented(id).unwrap();
            }
        }
        clock
    }

    #[test]
    fn zero_clock_has_every_member_at_zero() {
        let clock = VectorClock::zero(["n1", "n2"]);
        assert_eq!(clock.get("n1"), 0);
        assert_eq!(clock.get("n2"), 0);
        assert_eq!(clock.get("missing"), 0);
    }

    #[test]
    fn increment_only_touches_one_entry() {
        let clock = VectorClock::zero(["n1", "n2"]).incremented("n1").unwrap();
        assert_eq!(clock.get("n1"), 1);
        assert_eq!(clock.get("n2"), 0);
    }

    #[test]
    fn equal_clocks_compare_equal() {
        let a = vc(&[("n1", 2)]);
        let b = vc(&[("n1", 2)]);
        assert_eq!(a.compare(&b), ClockOrdering::Equal);
    }

    #[test]
    fn strictly_dominant_clock_compares_greater() {
        let a = vc(&[("n1", 2), ("n2", 1)]);
        let b = vc(&[("n1", 1), ("n2", 1)]);
        assert_eq!(a.compare(&b), ClockOrdering::Greater);
        assert_eq!(b.compare(&a), ClockOrdering::Less);
        assert!(b.lt(&a));
    }

    #[test]
    fn incomparable_clocks_are_concurrent() {
        let a = vc(&[("n1", 2), ("n2", 0)]);
        let b = vc(&[("n1", 0), ("n2", 1)]);
        assert_eq!(a.compare(&b), ClockOrdering::Concurrent);
        assert_eq!(b.compare(&a), ClockOrdering::Concurrent);
    }

    #[test]
    fn merge_takes_componentwise_max() {
        let a = vc(&[("n1", 2), ("n2", 0)]);
        let b = vc(&[("n1", 0), ("n2", 3)]);
        let merged = a.merged(&b);
        assert_eq!(merged.get("n1"), 2);
        assert_eq!(merged.get("n2"), 3);
    }

    #[test]
    fn increment_overflow_returns_none() {
        let mut counters = BTreeMap::new();
        counters.insert("n1".to_string(), u64::MAX);
        let clock = VectorClock { counters };
        assert!(clock.incremented("n1").is_none());
    }
}
