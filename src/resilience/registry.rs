//! Bounded host registry.
//!
//! # Responsibilities
//! - Map host identifiers to their breaker records
//! - Bound memory with least-recently-used eviction
//! - Serialize read-modify-write of a single host's record
//!
//! # Design Decisions
//! - Shards keyed by host hash, each with its own lock and LRU, so unrelated
//!   hosts rarely contend; with one shard the registry is an exact LRU
//! - Eviction is silent: an evicted host comes back as a fresh Closed record
//! - Lock sections never await; the upstream call happens outside them

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};

use lru::LruCache;

use crate::observability::metrics;
use crate::resilience::circuit_breaker::HostRecord;

/// Default number of shards used by [`HostRegistry::new`].
pub const DEFAULT_SHARDS: usize = 8;

type Shard = Mutex<LruCache<String, HostRecord>>;

/// Fixed-capacity, concurrency-safe LRU of host breaker records.
#[derive(Debug)]
pub struct HostRegistry {
    shards: Box<[Shard]>,
    capacity: usize,
}

impl HostRegistry {
    /// Create a registry holding at most `capacity` hosts.
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self::with_shards(capacity, NonZeroUsize::new(DEFAULT_SHARDS).unwrap_or(NonZeroUsize::MIN))
    }

    /// Create a registry with an explicit shard count.
    ///
    /// The capacity is split across shards; the shard count is clamped to the
    /// capacity so every shard holds at least one host.
    pub fn with_shards(capacity: NonZeroUsize, shards: NonZeroUsize) -> Self {
        let shard_count = shards.get().min(capacity.get());
        let base = capacity.get() / shard_count;
        let extra = capacity.get() % shard_count;

        let shards = (0..shard_count)
            .map(|i| {
                let size = base + usize::from(i < extra);
                Mutex::new(LruCache::new(NonZeroUsize::new(size).unwrap_or(NonZeroUsize::MIN)))
            })
            .collect();

        Self {
            shards,
            capacity: capacity.get(),
        }
    }

    /// Look up a host, marking it most recently used.
    pub fn get(&self, id: &str) -> Option<HostRecord> {
        self.lock(id).get(id).cloned()
    }

    /// Look up a host without touching its recency.
    pub fn peek(&self, id: &str) -> Option<HostRecord> {
        self.lock(id).peek(id).cloned()
    }

    /// Insert or overwrite a record under `record.id`, evicting if full.
    pub fn put(&self, record: HostRecord) {
        let mut shard = self.lock(&record.id);
        insert(&mut shard, record);
    }

    /// Atomically read, transform and commit one host's record.
    ///
    /// A missing host starts from a fresh Closed record. Returns the
    /// committed record.
    pub fn update<F>(&self, id: &str, f: F) -> HostRecord
    where
        F: FnOnce(HostRecord) -> HostRecord,
    {
        let mut shard = self.lock(id);
        let current = shard.get(id).cloned().unwrap_or_else(|| HostRecord::new(id));
        let next = f(current);
        debug_assert_eq!(next.id, id, "update must not change the record key");
        insert(&mut shard, next.clone());
        next
    }

    /// Number of hosts currently tracked.
    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|shard| shard.lock().unwrap_or_else(PoisonError::into_inner).len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of hosts tracked at once.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self, id: &str) -> MutexGuard<'_, LruCache<String, HostRecord>> {
        let index = if self.shards.len() == 1 {
            0
        } else {
            let mut hasher = DefaultHasher::new();
            id.hash(&mut hasher);
            (hasher.finish() % self.shards.len() as u64) as usize
        };
        // Records are plain data; a panic mid-update cannot leave one torn.
        self.shards[index]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn insert(shard: &mut LruCache<String, HostRecord>, record: HostRecord) {
    let id = record.id.clone();
    if let Some((evicted, _)) = shard.push(id.clone(), record) {
        if evicted != id {
            tracing::debug!(host = %evicted, "Host evicted from registry");
            metrics::record_eviction();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    use crate::resilience::circuit_breaker::BreakerState;

    fn nz(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    fn record(id: &str, failure_count: u32) -> HostRecord {
        HostRecord {
            id: id.into(),
            state: BreakerState::Closed,
            failure_count,
        }
    }

    #[test]
    fn get_and_put() {
        let registry = HostRegistry::new(nz(100));
        assert!(registry.get("a").is_none());

        registry.put(record("a", 2));
        assert_eq!(registry.get("a"), Some(record("a", 2)));

        registry.put(record("a", 1));
        assert_eq!(registry.get("a"), Some(record("a", 1)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn update_starts_from_fresh_record() {
        let registry = HostRegistry::new(nz(10));
        let committed = registry.update("a", |mut r| {
            assert_eq!(r, HostRecord::new("a"));
            r.failure_count += 1;
            r
        });
        assert_eq!(committed.failure_count, 1);
        assert_eq!(registry.get("a"), Some(committed));
    }

    #[test]
    fn evicts_least_recently_used() {
        // Scenario E with exact LRU ordering.
        let registry = HostRegistry::with_shards(nz(2), nz(1));
        registry.put(record("a", 1));
        registry.put(record("b", 1));
        registry.put(record("c", 1)); // evicts a

        // a comes back fresh; re-inserting it evicts b.
        assert!(registry.get("a").is_none());
        registry.put(record("a", 0));
        assert!(registry.get("b").is_none());
        assert_eq!(registry.get("c"), Some(record("c", 1)));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn get_refreshes_recency() {
        let registry = HostRegistry::with_shards(nz(2), nz(1));
        registry.put(record("a", 1));
        registry.put(record("b", 1));
        assert!(registry.get("a").is_some());
        registry.put(record("c", 1)); // b is now the least recently used

        assert!(registry.peek("b").is_none());
        assert!(registry.peek("a").is_some());
    }

    #[test]
    fn peek_does_not_refresh_recency() {
        let registry = HostRegistry::with_shards(nz(2), nz(1));
        registry.put(record("a", 1));
        registry.put(record("b", 1));
        assert!(registry.peek("a").is_some());
        registry.put(record("c", 1));

        assert!(registry.peek("a").is_none());
        assert!(registry.peek("b").is_some());
    }

    #[test]
    fn sharded_capacity_is_bounded() {
        let registry = HostRegistry::with_shards(nz(10), nz(4));
        for i in 0..1_000 {
            registry.put(record(&format!("host-{i}"), 0));
        }
        assert!(registry.len() <= registry.capacity());
        assert_eq!(registry.capacity(), 10);
    }

    #[test]
    fn shard_count_clamped_to_capacity() {
        let registry = HostRegistry::with_shards(nz(2), nz(16));
        assert_eq!(registry.shards.len(), 2);
    }

    #[test]
    fn concurrent_updates_are_not_lost() {
        let registry = Arc::new(HostRegistry::new(nz(100)));
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                thread::spawn(move || {
                    for _ in 0..250 {
                        registry.update("same.example.com", |mut r| {
                            r.failure_count += 1;
                            r
                        });
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        assert_eq!(registry.get("same.example.com").unwrap().failure_count, 2_000);
    }
}
