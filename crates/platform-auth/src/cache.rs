//! Bounded TTL cache for verified credentials
//!
//! Maps a bearer credential to its verified identity so repeated requests
//! within the TTL skip the auth service round-trip. Keys are the SHA-256
//! of the raw credential: a memory dump or debug print of the cache never
//! exposes a usable token. Contents are still sensitive and never logged.
//!
//! Eviction is two-fold: entries past their TTL are removed lazily on
//! read, and when the entry count exceeds the configured maximum the
//! oldest half (by insertion time) is dropped in one pass. Halving
//! amortizes eviction cost instead of churning one entry per insert.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};

struct Entry<V> {
    value: V,
    inserted_at: Instant,
    ttl: Duration,
}

/// Process-wide cache of verified credential lookups.
///
/// One coarse mutex guards the whole map. Entries are cheap and lookups
/// never await while holding the lock, so finer-grained locking buys
/// nothing here.
pub struct TokenCache<V> {
    entries: Mutex<HashMap<String, Entry<V>>>,
    max_entries: usize,
}

impl<V: Clone> TokenCache<V> {
    /// Create a cache holding at most `max_entries` entries.
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            max_entries,
        }
    }

    /// Look up a credential. An entry past its TTL is removed and treated
    /// as absent.
    pub fn get(&self, credential: &str) -> Option<V> {
        let key = cache_key(credential);
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        match entries.get(&key) {
            Some(entry) if entry.inserted_at.elapsed() < entry.ttl => {
                Some(entry.value.clone())
            }
            Some(_) => {
                entries.remove(&key);
                None
            }
            None => None,
        }
    }

    /// Insert a verified value with the given TTL, evicting the oldest
    /// half of the cache if the insert pushed it over capacity.
    pub fn put(&self, credential: &str, value: V, ttl: Duration) {
        let key = cache_key(credential);
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        entries.insert(
            key,
            Entry {
                value,
                inserted_at: Instant::now(),
                ttl,
            },
        );

        if entries.len() > self.max_entries {
            let mut by_age: Vec<(String, Instant)> = entries
                .iter()
                .map(|(k, e)| (k.clone(), e.inserted_at))
                .collect();
            by_age.sort_by_key(|(_, inserted_at)| *inserted_at);
            let evict_count = entries.len() / 2;
            for (key, _) in by_age.into_iter().take(evict_count) {
                entries.remove(&key);
            }
        }
    }

    /// Number of cached entries, including any not yet lazily expired.
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Cache key: URL-safe base64 of the SHA-256 of the raw credential.
fn cache_key(credential: &str) -> String {
    let hash = Sha256::digest(credential.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}
