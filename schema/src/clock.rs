use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Mapping from node id to a monotonic counter, merged on receive and
/// incremented on local mutation. A `BTreeMap` keeps the wire form
/// stable for tests and logs without needing a separate sorting pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VectorClock(BTreeMap<String, u64>);

impl VectorClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, node_id: &str) -> u64 {
        self.0.get(node_id).copied().unwrap_or(0)
    }

    /// `local[id] := max(local[id], other[id])` for every id in `other`.
    pub fn merge(&mut self, other: &VectorClock) {
        for (id, counter) in &other.0 {
            let slot = self.0.entry(id.clone()).or_insert(0);
            if *counter > *slot {
                *slot = *counter;
            }
        }
    }

    /// `local[self_id] += 1`, creating the entry if absent.
    pub fn increment(&mut self, self_id: &str) {
        *self.0.entry(self_id.to_string()).or_insert(0) += 1;
    }

    pub fn snapshot(&self) -> VectorClock {
        self.clone()
    }

    /// True iff `a <= b` componentwise and `a` is strictly less in at
    /// least one component. Ids absent on either side are zero.
    pub fn happens_before(a: &VectorClock, b: &VectorClock) -> bool {
        let mut strictly_less = false;
        let ids = a.0.keys().chain(b.0.keys());
        for id in ids {
            let av = a.get(id);
            let bv = b.get(id);
            if av > bv {
                return false;
            }
            if av < bv {
                strictly_less = true;
            }
        }
        strictly_less
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_clock_is_all_zeros() {
        let c = VectorClock::new();
        assert_eq!(c.get("mm"), 0);
        assert_eq!(c.get("anything"), 0);
    }

    #[test]
    fn increment_bumps_only_self() {
        let mut c = VectorClock::new();
        c.increment("mm");
        c.increment("mm");
        assert_eq!(c.get("mm"), 2);
        assert_eq!(c.get("other"), 0);
    }

    #[test]
    fn merge_takes_componentwise_max() {
        let mut a = VectorClock::new();
        a.increment("mm");
        a.increment("mm");
        let mut b = VectorClock::new();
        b.increment("gs1");
        a.merge(&b);
        assert_eq!(a.get("mm"), 2);
        assert_eq!(a.get("gs1"), 1);
    }

    #[test]
    fn happens_before_detects_strict_dominance() {
        let mut c1 = VectorClock::new();
        c1.increment("mm");
        let mut c2 = c1.clone();
        c2.increment("mm");
        assert!(VectorClock::happens_before(&c1, &c2));
        assert!(!VectorClock::happens_before(&c2, &c1));
        assert!(!VectorClock::happens_before(&c1, &c1));
    }

    #[test]
    fn happens_before_is_false_for_concurrent_clocks() {
        let mut a = VectorClock::new();
        a.increment("mm");
        let mut b = VectorClock::new();
        b.increment("gs1");
        assert!(!VectorClock::happens_before(&a, &b));
        assert!(!VectorClock::happens_before(&b, &a));
    }

    #[test]
    fn round_trips_through_json_including_empty() {
        let empty = VectorClock::new();
        let json = serde_json::to_string(&empty).unwrap();
        let back: VectorClock = serde_json::from_str(&json).unwrap();
        assert_eq!(empty, back);

        let mut populated = VectorClock::new();
        populated.increment("mm");
        populated.increment("gs1");
        populated.increment("mm");
        let json = serde_json::to_string(&populated).unwrap();
        let back: VectorClock = serde_json::from_str(&json).unwrap();
        assert_eq!(populated, back);
    }
}
