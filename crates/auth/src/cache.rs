//! In-memory identity cache with TTL and a fixed capacity
//!
//! Maps a raw wire token to its previously resolved [`Identity`], so repeat
//! requests skip both signature verification and the user-store lookup. This
//! is the dominant request-path optimization: a hit costs a read lock and a
//! map probe, a miss costs a signature check plus a database round-trip.
//!
//! Entry lifetime is `min(requested ttl, configured ceiling)`, so even
//! long-lived tokens cannot pin a stale identity for more than the ceiling.
//! Expiry is lazy: a read past the deadline behaves as a miss whether or not
//! the entry has been physically evicted yet.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use nazonexus_shared::Identity;

/// Cache entry with expiration
struct CacheEntry {
    identity: Identity,
    inserted_at: Instant,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        Instant::now() > self.expires_at
    }
}

/// Thread-safe bounded identity cache.
///
/// Concurrent readers and writers are safe; a lost-update race between two
/// inserts of the same token is harmless since both carry the same identity.
/// When full, insertion evicts an expired entry if one exists, otherwise the
/// least-recently inserted one. Eviction stays on the write path so reads
/// never take the write lock.
pub struct IdentityCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    capacity: usize,
    max_ttl: Duration,
}

impl IdentityCache {
    /// Create a cache holding at most `capacity` entries, each living at most
    /// `max_ttl`.
    pub fn new(capacity: usize, max_ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::with_capacity(capacity)),
            capacity,
            max_ttl,
        }
    }

    /// Look up the identity cached for a wire token.
    ///
    /// Entries past their deadline are treated as absent.
    pub fn get(&self, token: &str) -> Option<Identity> {
        let entries = self.entries.read().ok()?;
        let entry = entries.get(token)?;

        if entry.is_expired() {
            None
        } else {
            Some(entry.identity.clone())
        }
    }

    /// Cache an identity for a wire token.
    ///
    /// The requested `ttl` is clamped to the configured ceiling; a clamped ttl
    /// of zero is not stored at all.
    pub fn put(&self, token: &str, identity: Identity, ttl: Duration) {
        let ttl = ttl.min(self.max_ttl);
        if ttl.is_zero() {
            return;
        }

        let now = Instant::now();
        if let Ok(mut entries) = self.entries.write() {
            if !entries.contains_key(token) && entries.len() >= self.capacity {
                evict_one(&mut entries);
            }
            entries.insert(
                token.to_string(),
                CacheEntry {
                    identity,
                    inserted_at: now,
                    expires_at: now + ttl,
                },
            );
        }
    }

    /// Number of physically present entries (some may already be expired)
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all expired entries (callable periodically for memory hygiene)
    pub fn purge_expired(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.retain(|_, entry| !entry.is_expired());
        }
    }
}

/// Remove one entry to make room: any expired entry first, otherwise the
/// least-recently inserted one.
fn evict_one(entries: &mut HashMap<String, CacheEntry>) {
    let victim = entries
        .iter()
        .find(|(_, entry)| entry.is_expired())
        .or_else(|| entries.iter().min_by_key(|(_, entry)| entry.inserted_at))
        .map(|(token, _)| token.clone());

    if let Some(token) = victim {
        entries.remove(&token);
    }
}
