//! Versioned query cache
//!
//! Holds the last-known value of every cached region together with a
//! per-key version counter. The whole structure sits behind one mutex so
//! every read-modify-write of (value, version) is atomic, and the lock is
//! never held across an await.
//!
//! # Invariants
//!
//! 1. A key's version only grows, and only on optimistic writes.
//! 2. Versions outlive eviction, so a rollback guard taken before an
//!    eviction still compares against the right counter.
//! 3. A pending mutation is rolled back or completed at most once.

use crate::sync::key::CacheKey;
use crate::sync::mutation::PendingMutation;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;
use uuid::Uuid;

/// One cached region
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub key: CacheKey,

    /// Last-known snapshot (optimistic or fetched)
    pub value: Value,

    /// Version of the last optimistic write to this key (0 = never written)
    pub version: u64,

    /// When the value last came from the remote store
    pub fetched_at: Option<DateTime<Utc>>,

    /// Set by invalidation; the next read refetches
    pub stale: bool,
}

/// What a rollback attempt did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rollback {
    /// The previous snapshot is back in the cache
    Restored,
    /// A newer optimistic write owns the key; nothing changed
    Superseded,
    /// The mutation was already settled; nothing changed
    AlreadySettled,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<CacheKey, CacheEntry>,
    versions: HashMap<CacheKey, u64>,
    in_flight: HashSet<Uuid>,
}

impl CacheState {
    fn version(&self, key: &CacheKey) -> u64 {
        self.versions.get(key).copied().unwrap_or(0)
    }

    fn bump(&mut self, key: &CacheKey) -> u64 {
        let version = self.versions.entry(key.clone()).or_insert(0);
        *version += 1;
        *version
    }

    fn write(&mut self, key: &CacheKey, value: Option<Value>, fetched: bool) {
        let version = self.version(key);
        match value {
            Some(value) => {
                let entry = self
                    .entries
                    .entry(key.clone())
                    .or_insert_with(|| CacheEntry {
                        key: key.clone(),
                        value: Value::Null,
                        version,
                        fetched_at: None,
                        stale: false,
                    });
                entry.value = value;
                entry.version = version;
                if fetched {
                    entry.fetched_at = Some(Utc::now());
                    entry.stale = false;
                }
            }
            None => {
                self.entries.remove(key);
            }
        }
    }
}

/// Process-wide keyed cache, owned explicitly by whoever needs it
#[derive(Default)]
pub struct QueryCache {
    state: Mutex<CacheState>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value for a key, without touching the remote store
    pub fn peek(&self, key: &CacheKey) -> Option<Value> {
        self.lock().entries.get(key).map(|entry| entry.value.clone())
    }

    /// Full entry for a key
    pub fn entry(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.lock().entries.get(key).cloned()
    }

    /// Whether a present value may be served without refetching
    pub fn is_fresh(&self, key: &CacheKey) -> bool {
        self.lock()
            .entries
            .get(key)
            .is_some_and(|entry| !entry.stale)
    }

    /// Current version counter for a key
    pub fn version(&self, key: &CacheKey) -> u64 {
        self.lock().version(key)
    }

    /// Apply an optimistic write and register the pending mutation
    ///
    /// `mutate` receives a copy of the current value (or `None`) and returns
    /// the value to expose; `None` removes the entry. It runs under the
    /// cache lock and must not call back into the cache.
    pub fn apply_optimistic<F>(&self, key: CacheKey, mutate: F) -> PendingMutation
    where
        F: FnOnce(Option<Value>) -> Option<Value>,
    {
        let mut state = self.lock();
        let previous = state.entries.get(&key).map(|entry| entry.value.clone());
        let next = mutate(previous.clone());
        let version = state.bump(&key);
        state.write(&key, next, false);

        let pending = PendingMutation::new(key, previous, version);
        state.in_flight.insert(pending.id);
        debug!(
            "Optimistic write to {} at version {}",
            pending.target_key, version
        );
        pending
    }

    /// Restore the snapshot of a failed mutation if it still owns the key
    pub fn rollback(&self, pending: &PendingMutation) -> Rollback {
        let mut state = self.lock();
        if !state.in_flight.remove(&pending.id) {
            return Rollback::AlreadySettled;
        }

        let current = state.version(&pending.target_key);
        if current != pending.applied_version {
            debug!(
                "Skipping rollback of {}: version {} superseded by {}",
                pending.target_key, pending.applied_version, current
            );
            return Rollback::Superseded;
        }

        state.write(
            &pending.target_key,
            pending.previous_snapshot.clone(),
            false,
        );
        debug!(
            "Rolled back {} to pre-mutation snapshot",
            pending.target_key
        );
        Rollback::Restored
    }

    /// Retire a successful mutation; false if it was already settled
    pub fn complete(&self, pending: &PendingMutation) -> bool {
        self.lock().in_flight.remove(&pending.id)
    }

    /// Whether a mutation is still registered as in flight
    pub fn is_in_flight(&self, pending: &PendingMutation) -> bool {
        self.lock().in_flight.contains(&pending.id)
    }

    /// Store a value fetched from the remote store
    ///
    /// Skipped (returns false) when an optimistic write landed on the key
    /// after the fetch started, i.e. the version moved past `seen_version`.
    pub fn store_fetched(&self, key: &CacheKey, value: Value, seen_version: u64) -> bool {
        let mut state = self.lock();
        if state.version(key) != seen_version {
            debug!("Discarding fetch of {}: newer optimistic write", key);
            return false;
        }
        state.write(key, Some(value), true);
        true
    }

    /// Mark keys stale; values stay visible until refetched
    pub fn invalidate<'a, I>(&self, keys: I)
    where
        I: IntoIterator<Item = &'a CacheKey>,
    {
        let mut state = self.lock();
        for key in keys {
            if let Some(entry) = state.entries.get_mut(key) {
                entry.stale = true;
            }
        }
    }

    /// Drop cached values outright
    pub fn evict<'a, I>(&self, keys: I)
    where
        I: IntoIterator<Item = &'a CacheKey>,
    {
        let mut state = self.lock();
        for key in keys {
            state.entries.remove(key);
        }
    }

    /// Cached list keys for a collection
    pub fn list_keys(&self, collection: &str) -> Vec<CacheKey> {
        self.lock()
            .entries
            .keys()
            .filter(|key| key.is_list() && key.collection() == collection)
            .cloned()
            .collect()
    }

    /// Number of cached entries
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
