use std::collections::{HashMap, VecDeque};

/// Bounded recency cache of event fingerprints. A second delivery of the
/// same fingerprint inside the window replays the cached response without
/// touching any state. In-memory only: its loss on restart is fine because
/// every downstream write is idempotent.
#[derive(Debug)]
pub struct DedupeCache {
    capacity: usize,
    entries: HashMap<String, serde_json::Value>,
    order: VecDeque<String>,
}

impl DedupeCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
        }
    }

    /// Cached response for a fingerprint, refreshing its recency
    pub fn hit(&mut self, fingerprint: &str) -> Option<serde_json::Value> {
        let response = self.entries.get(fingerprint)?.clone();
        if let Some(pos) = self.order.iter().position(|entry| entry == fingerprint) {
            self.order.remove(pos);
            self.order.push_back(fingerprint.to_string());
        }
        Some(response)
    }

    pub fn record(&mut self, fingerprint: String, response: serde_json::Value) {
        if self.entries.contains_key(&fingerprint) {
            self.entries.insert(fingerprint.clone(), response);
            if let Some(pos) = self.order.iter().position(|entry| entry == &fingerprint) {
                self.order.remove(pos);
            }
            self.order.push_back(fingerprint);
            return;
        }

        while self.entries.len() >= self.capacity {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.entries.remove(&oldest);
                }
                None => break,
            }
        }
        self.order.push_back(fingerprint.clone());
        self.entries.insert(fingerprint, response);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(n: i64) -> serde_json::Value {
        serde_json::json!({ "n": n })
    }

    #[test]
    fn test_hit_returns_cached_response() {
        let mut cache = DedupeCache::new(10);
        assert!(cache.hit("a").is_none());

        cache.record("a".to_string(), response(1));
        assert_eq!(cache.hit("a").unwrap(), response(1));
    }

    #[test]
    fn test_eviction_is_lru() {
        let mut cache = DedupeCache::new(2);
        cache.record("a".to_string(), response(1));
        cache.record("b".to_string(), response(2));

        // Touch "a" so "b" is the least recently used
        cache.hit("a");
        cache.record("c".to_string(), response(3));

        assert!(cache.hit("a").is_some());
        assert!(cache.hit("b").is_none());
        assert!(cache.hit("c").is_some());
    }

    #[test]
    fn test_capacity_bound_holds() {
        let mut cache = DedupeCache::new(100);
        for i in 0..1000 {
            cache.record(format!("fp-{}", i), response(i));
        }
        assert_eq!(cache.len(), 100);
    }
}
