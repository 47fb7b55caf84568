//! Local cache of collection metadata records.
//!
//! Every request to a collection needs its metadata record; the cache keeps
//! them for a configurable time. Writes through this process invalidate the
//! entry, writes by other processes become visible when it expires.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use docgate_persistence::types::MetadataRecord;
use parking_lot::RwLock;
use tracing::trace;

use crate::config::ServerConfig;

#[derive(Debug)]
struct Entry {
    record: MetadataRecord,
    loaded: Instant,
}

/// A time-bounded cache of metadata records keyed by database and collection.
#[derive(Debug)]
pub struct PropsCache {
    enabled: bool,
    ttl: Duration,
    entries: RwLock<HashMap<(String, String), Entry>>,
}

impl PropsCache {
    /// Creates a cache.
    pub fn new(enabled: bool, ttl: Duration) -> Self {
        Self {
            enabled,
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Creates a cache from the server configuration.
    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(config.local_cache_enabled, config.local_cache_ttl)
    }

    /// Returns a cached record that has not expired.
    pub fn get(&self, db: &str, coll: &str) -> Option<MetadataRecord> {
        if !self.enabled {
            return None;
        }
        let entries = self.entries.read();
        let entry = entries.get(&(db.to_string(), coll.to_string()))?;
        if entry.loaded.elapsed() >= self.ttl {
            trace!(db = %db, coll = %coll, "Cached properties expired");
            return None;
        }
        Some(entry.record.clone())
    }

    /// Stores a record.
    pub fn put(&self, db: &str, coll: &str, record: &MetadataRecord) {
        if !self.enabled {
            return;
        }
        self.entries.write().insert(
            (db.to_string(), coll.to_string()),
            Entry {
                record: record.clone(),
                loaded: Instant::now(),
            },
        );
    }

    /// Drops the record of a collection.
    pub fn invalidate(&self, db: &str, coll: &str) {
        if self
            .entries
            .write()
            .remove(&(db.to_string(), coll.to_string()))
            .is_some()
        {
            trace!(db = %db, coll = %coll, "Invalidated cached properties");
        }
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use docgate_persistence::types::{Document, Etag};

    fn record() -> MetadataRecord {
        MetadataRecord::new(Document::new(), Etag::generate(), Utc::now())
    }

    #[test]
    fn test_put_get_invalidate() {
        let cache = PropsCache::new(true, Duration::from_secs(60));
        let rec = record();
        cache.put("db", "coll", &rec);
        assert_eq!(cache.get("db", "coll"), Some(rec));
        assert_eq!(cache.get("db", "other"), None);

        cache.invalidate("db", "coll");
        assert_eq!(cache.get("db", "coll"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_expired_entries_are_not_returned() {
        let cache = PropsCache::new(true, Duration::ZERO);
        cache.put("db", "coll", &record());
        assert_eq!(cache.get("db", "coll"), None);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_disabled_cache_stores_nothing() {
        let cache = PropsCache::new(false, Duration::from_secs(60));
        cache.put("db", "coll", &record());
        assert!(cache.is_empty());
        assert_eq!(cache.get("db", "coll"), None);
    }
}
