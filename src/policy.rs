use crate::record::Request;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

/// The contract every pluggable cache policy must implement.
///
/// Offline policies (declared via the registry's `is_offline` flag)
/// additionally read `Request::next_seq`; the driver only populates it
/// when the selected policy needs it.
pub trait CachePolicy: Send {
    fn set_size(&mut self, bytes: u64);

    /// Accepts a name to string option bag; unknown keys are ignored.
    fn configure(&mut self, _options: &BTreeMap<String, String>) {}

    /// Non-mutating membership check, used by the admission filter
    /// adapter to decide whether to bypass the filter.
    fn exist(&self, id: i64) -> bool;

    /// Mutating lookup: returns whether `req` was a hit, and may update
    /// internal recency/frequency state either way.
    fn lookup(&mut self, req: &Request) -> bool;

    /// Inserts `req`, evicting as needed to respect capacity.
    fn admit(&mut self, req: &Request);

    fn current_bytes(&self) -> u64;

    /// Called at every sequence-window boundary.
    fn periodic_tick(&mut self) {}

    /// Policy-specific counters merged into the result document.
    fn emit_stats(&self) -> serde_json::Map<String, serde_json::Value> {
        serde_json::Map::new()
    }
}

/// A registered policy's metadata: its constructor and whether it
/// requires offline (`next_seq`-annotated) requests.
pub struct PolicyRegistration {
    pub is_offline: bool,
    pub construct: fn() -> Box<dyn CachePolicy>,
}

pub fn registry() -> BTreeMap<&'static str, PolicyRegistration> {
    let mut r = BTreeMap::new();
    r.insert(
        "LRU",
        PolicyRegistration {
            is_offline: false,
            construct: || Box::new(LruPolicy::default()),
        },
    );
    r.insert(
        "FIFO",
        PolicyRegistration {
            is_offline: false,
            construct: || Box::new(FifoPolicy::default()),
        },
    );
    r
}

/// Least-recently-used reference policy, backed by an insertion-ordered
/// map simulated with a `VecDeque` recency list plus a size index.
#[derive(Default)]
pub struct LruPolicy {
    capacity: u64,
    occupied: u64,
    sizes: HashMap<i64, u64>,
    recency: VecDeque<i64>, // front = least recently used
}

impl LruPolicy {
    fn touch(&mut self, id: i64) {
        if let Some(pos) = self.recency.iter().position(|&x| x == id) {
            self.recency.remove(pos);
        }
        self.recency.push_back(id);
    }

    fn evict_to_fit(&mut self, incoming: u64) {
        while self.occupied + incoming > self.capacity {
            let Some(victim) = self.recency.pop_front() else {
                break;
            };
            if let Some(size) = self.sizes.remove(&victim) {
                self.occupied -= size;
            }
        }
    }
}

impl CachePolicy for LruPolicy {
    fn set_size(&mut self, bytes: u64) {
        self.capacity = bytes;
        self.evict_to_fit(0);
    }

    fn exist(&self, id: i64) -> bool {
        self.sizes.contains_key(&id)
    }

    fn lookup(&mut self, req: &Request) -> bool {
        if self.sizes.contains_key(&req.id) {
            self.touch(req.id);
            true
        } else {
            false
        }
    }

    fn admit(&mut self, req: &Request) {
        if self.sizes.contains_key(&req.id) {
            return;
        }
        if req.size > self.capacity {
            return;
        }
        self.evict_to_fit(req.size);
        self.sizes.insert(req.id, req.size);
        self.occupied += req.size;
        self.recency.push_back(req.id);
    }

    fn current_bytes(&self) -> u64 {
        self.occupied
    }
}

/// First-in-first-out reference policy.
#[derive(Default)]
pub struct FifoPolicy {
    capacity: u64,
    occupied: u64,
    sizes: HashMap<i64, u64>,
    queue: VecDeque<i64>,
    present: HashSet<i64>,
}

impl FifoPolicy {
    fn evict_to_fit(&mut self, incoming: u64) {
        while self.occupied + incoming > self.capacity {
            let Some(victim) = self.queue.pop_front() else {
                break;
            };
            self.present.remove(&victim);
            if let Some(size) = self.sizes.remove(&victim) {
                self.occupied -= size;
            }
        }
    }
}

impl CachePolicy for FifoPolicy {
    fn set_size(&mut self, bytes: u64) {
        self.capacity = bytes;
        self.evict_to_fit(0);
    }

    fn exist(&self, id: i64) -> bool {
        self.present.contains(&id)
    }

    fn lookup(&mut self, req: &Request) -> bool {
        self.present.contains(&req.id)
    }

    fn admit(&mut self, req: &Request) {
        if self.present.contains(&req.id) {
            return;
        }
        if req.size > self.capacity {
            return;
        }
        self.evict_to_fit(req.size);
        self.sizes.insert(req.id, req.size);
        self.occupied += req.size;
        self.queue.push_back(req.id);
        self.present.insert(req.id);
    }

    fn current_bytes(&self) -> u64 {
        self.occupied
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn req(id: i64, size: u64) -> Request {
        Request {
            seq: 0,
            t: 0,
            id,
            size,
            next_seq: None,
            extra_features: vec![],
        }
    }

    #[test]
    fn lru_evicts_least_recently_used() {
        let mut p = LruPolicy::default();
        p.set_size(10);
        assert!(!p.lookup(&req(1, 10)));
        p.admit(&req(1, 10));
        assert!(!p.lookup(&req(2, 10)));
        p.admit(&req(2, 10));
        assert!(!p.exist(1));
        assert!(p.exist(2));
        assert_eq!(p.current_bytes(), 10);
    }

    #[test]
    fn fifo_evicts_in_insertion_order() {
        let mut p = FifoPolicy::default();
        p.set_size(10);
        p.admit(&req(1, 10));
        p.lookup(&req(1, 10)); // should not affect eviction order
        p.admit(&req(2, 10));
        assert!(!p.exist(1));
        assert!(p.exist(2));
    }

    #[test]
    fn set_size_shrinks_and_evicts() {
        let mut p = LruPolicy::default();
        p.set_size(20);
        p.admit(&req(1, 10));
        p.admit(&req(2, 10));
        assert_eq!(p.current_bytes(), 20);
        p.set_size(10);
        assert_eq!(p.current_bytes(), 10);
        assert!(!p.exist(1));
        assert!(p.exist(2));
    }

    #[test]
    fn registry_resolves_known_names() {
        let reg = registry();
        assert!(reg.contains_key("LRU"));
        assert!(reg.contains_key("FIFO"));
        assert!(!reg["LRU"].is_offline);
    }
}
