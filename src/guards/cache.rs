//! Response cache
//!
//! Remembers the last good level per partition for a few seconds so bursts
//! of identical requests (rapid retries, double taps) do not reach the
//! provider. Expiry is lazy: stale entries stay in the map until they are
//! overwritten, but reads ignore them.
//!
//! ## Usage
//!
//! ```no_run
//! use minigame_orchestrator::guards::{MemoryCache, ResponseCache};
//! use minigame_orchestrator::RequestParameters;
//! use std::time::Duration;
//!
//! # fn run() -> Result<(), minigame_orchestrator::ForgeError> {
//! let cache = MemoryCache::new(Duration::from_secs(8));
//! let key = RequestParameters::default().partition_key();
//!
//! if let Some(entry) = cache.get(&key)? {
//!     println!("{}", entry.kind); // replay entry.payload verbatim
//! }
//! # Ok(()) }
//! ```

use dashmap::DashMap;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::level::{Level, LevelKind};
use crate::params::PartitionKey;
use crate::ForgeError;

/// A memoized response.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// When the entry was written.
    pub stored_at: Instant,
    /// Kind of the stored level.
    pub kind: LevelKind,
    /// The level exactly as it was served.
    pub payload: Level,
}

/// Short-lived memoization of the last response per partition.
pub trait ResponseCache: Send + Sync {
    /// Fresh entry for `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`ForgeError::Store`] if the backing store is unavailable.
    fn get(&self, key: &PartitionKey) -> Result<Option<CacheEntry>, ForgeError>;

    /// Store `payload` as the latest response for `key` (last writer wins).
    ///
    /// # Errors
    ///
    /// Returns [`ForgeError::Store`] if the backing store is unavailable.
    fn put(&self, key: &PartitionKey, payload: &Level) -> Result<(), ForgeError>;
}

/// In-memory cache with a fixed TTL.
pub struct MemoryCache {
    store: DashMap<PartitionKey, CacheEntry>,
    ttl: Duration,
}

impl MemoryCache {
    /// Cache whose entries are fresh for `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            store: DashMap::new(),
            ttl,
        }
    }

    /// [`ResponseCache::get`] evaluated at `now`.
    pub fn get_at(&self, key: &PartitionKey, now: Instant) -> Option<CacheEntry> {
        let entry = self.store.get(key)?;
        if now.saturating_duration_since(entry.stored_at) < self.ttl {
            debug!(partition = %key, kind = %entry.kind, "cache hit");
            return Some(entry.clone());
        }
        debug!(partition = %key, "cache entry stale");
        None
    }

    /// [`ResponseCache::put`] stamped with `now`.
    pub fn put_at(&self, key: &PartitionKey, payload: &Level, now: Instant) {
        self.store.insert(
            key.clone(),
            CacheEntry {
                stored_at: now,
                kind: payload.kind(),
                payload: payload.clone(),
            },
        );
        debug!(partition = %key, kind = %payload.kind(), "cached");
    }

    /// Number of stored entries, stale ones included.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// `true` when nothing has been stored.
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Remove every entry.
    pub fn clear(&self) {
        self.store.clear();
        debug!("cleared response cache");
    }
}

impl ResponseCache for MemoryCache {
    fn get(&self, key: &PartitionKey) -> Result<Option<CacheEntry>, ForgeError> {
        Ok(self.get_at(key, Instant::now()))
    }

    fn put(&self, key: &PartitionKey, payload: &Level) -> Result<(), ForgeError> {
        self.put_at(key, payload, Instant::now());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::{LevelBody, Persona};
    use crate::params::{Mood, RequestParameters};

    const TTL: Duration = Duration::from_secs(8);

    fn joke(text: &str) -> Level {
        Level::new(
            Persona::Gigetto,
            LevelBody::JokeBreak { text: text.into() },
            None,
        )
    }

    fn key() -> PartitionKey {
        RequestParameters::default().partition_key()
    }

    #[test]
    fn test_hit_within_ttl() {
        let cache = MemoryCache::new(TTL);
        let t0 = Instant::now();
        cache.put_at(&key(), &joke("a"), t0);

        let entry = cache.get_at(&key(), t0 + Duration::from_secs(7)).unwrap();
        assert_eq!(entry.kind, LevelKind::JokeBreak);
        assert_eq!(entry.payload.body, LevelBody::JokeBreak { text: "a".into() });
    }

    #[test]
    fn test_stale_entry_ignored_but_kept() {
        let cache = MemoryCache::new(TTL);
        let t0 = Instant::now();
        cache.put_at(&key(), &joke("a"), t0);

        assert!(cache.get_at(&key(), t0 + TTL).is_none());
        assert!(cache.get_at(&key(), t0 + Duration::from_secs(60)).is_none());
        assert_eq!(cache.len(), 1, "expiry is lazy");
    }

    #[test]
    fn test_miss_for_other_partition() {
        let cache = MemoryCache::new(TTL);
        cache.put(&key(), &joke("a")).unwrap();

        let other = RequestParameters {
            mood: Mood::Soft,
            ..RequestParameters::default()
        }
        .partition_key();
        assert!(cache.get(&other).unwrap().is_none());
    }

    #[test]
    fn test_newer_entry_supersedes() {
        let cache = MemoryCache::new(TTL);
        cache.put(&key(), &joke("old")).unwrap();
        cache.put(&key(), &joke("new")).unwrap();

        let entry = cache.get(&key()).unwrap().unwrap();
        assert!(matches!(entry.payload.body, LevelBody::JokeBreak { ref text } if text == "new"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_clear_removes_all_entries() {
        let cache = MemoryCache::new(TTL);
        cache.put(&key(), &joke("a")).unwrap();
        assert!(!cache.is_empty());
        cache.clear();
        assert!(cache.is_empty());
    }
}
