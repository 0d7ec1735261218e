//! Per-run domain cache with single-flight resolution.
//!
//! Each domain maps to a slot that is filled exactly once. The first caller
//! for a domain runs the lookup; callers arriving while it is in flight wait
//! on the same slot and receive the same outcome. If the caller running the
//! lookup is cancelled, one of the waiters takes over, so a domain never has
//! more than one lookup in flight.
//!
//! The map is split into shards keyed by domain hash. A shard lock is only
//! held to find or create a slot, never across a lookup.

use crate::validation::dnsmx::ResolveFault;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::collections::hash_map::RandomState;
use std::future::Future;
use std::hash::BuildHasher;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::OnceCell;

/// Result of resolving a domain: whether it accepts mail, or why that is unknown.
pub type MxOutcome = Result<bool, ResolveFault>;

const DEFAULT_SHARDS: usize = 16;

type Slot = Arc<OnceCell<MxOutcome>>;

/// Snapshot of one cached domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainCacheEntry {
    pub domain: String,
    pub mx_ok: bool,
    /// `false` while the first lookup is still in flight.
    pub resolved: bool,
    pub fault: Option<ResolveFault>,
}

pub struct DomainCache {
    shards: Box<[Mutex<HashMap<String, Slot>>]>,
    hasher: RandomState,
    hits: AtomicU64,
    lookups: AtomicU64,
}

impl Default for DomainCache {
    fn default() -> Self {
        Self::new()
    }
}

impl DomainCache {
    pub fn new() -> Self {
        Self::with_shards(DEFAULT_SHARDS)
    }

    pub fn with_shards(shards: usize) -> Self {
        Self {
            shards: (0..shards.max(1)).map(|_| Mutex::new(HashMap::new())).collect(),
            hasher: RandomState::new(),
            hits: AtomicU64::new(0),
            lookups: AtomicU64::new(0),
        }
    }

    fn shard(&self, domain: &str) -> &Mutex<HashMap<String, Slot>> {
        let index = self.hasher.hash_one(domain) as usize % self.shards.len();
        &self.shards[index]
    }

    fn slot(&self, domain: &str) -> Slot {
        let mut shard = self.shard(domain).lock();
        if let Some(slot) = shard.get(domain) {
            return slot.clone();
        }
        let slot = Slot::default();
        shard.insert(domain.to_string(), slot.clone());
        slot
    }

    /// Returns the cached outcome for `domain`, running `lookup` if no caller
    /// has resolved it yet.
    ///
    /// `lookup` runs at most once per domain for the lifetime of the cache,
    /// unless a run of it is cancelled before completing.
    pub async fn get_or_resolve<F, Fut>(&self, domain: &str, lookup: F) -> MxOutcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = MxOutcome>,
    {
        let slot = self.slot(domain);
        if let Some(outcome) = slot.get() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return outcome.clone();
        }

        slot.get_or_init(|| {
            self.lookups.fetch_add(1, Ordering::Relaxed);
            lookup()
        })
        .await
        .clone()
    }

    pub fn get(&self, domain: &str) -> Option<DomainCacheEntry> {
        let slot = self.shard(domain).lock().get(domain).cloned()?;
        let entry = match slot.get() {
            Some(Ok(mx_ok)) => DomainCacheEntry {
                domain: domain.to_string(),
                mx_ok: *mx_ok,
                resolved: true,
                fault: None,
            },
            Some(Err(fault)) => DomainCacheEntry {
                domain: domain.to_string(),
                mx_ok: false,
                resolved: true,
                fault: Some(fault.clone()),
            },
            None => DomainCacheEntry {
                domain: domain.to_string(),
                mx_ok: false,
                resolved: false,
                fault: None,
            },
        };
        Some(entry)
    }

    /// Number of domains seen, resolved or in flight.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.lock().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lookups started through this cache.
    pub fn lookups(&self) -> u64 {
        self.lookups.load(Ordering::Relaxed)
    }

    /// Requests answered from an already resolved entry.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }
}
