//! Short-lived cache of ranked result lists
//!
//! Pagination links re-run a search with the same parameter token. Instead
//! of querying the backend again, the ranked list from the requester's last
//! search is reused while it is fresh.
//!
//! Keys are `search_start:<identity>`; identity is the member id, or the
//! address for guests. Each key has at most one writer at a time: DashMap
//! holds the shard lock for the whole `replace`.

use std::time::{Duration, Instant};

use boardsearch_core::{RankedMessage, Requester};
use dashmap::DashMap;
use tracing::debug;

/// Key prefix for cached searches
pub const CACHE_KEY_PREFIX: &str = "search_start:";

/// A requester's last completed search
#[derive(Debug, Clone)]
pub struct CachedSearch {
    /// Parameter token the list was computed for
    pub params_token: String,
    /// Ranked results
    pub results: Vec<RankedMessage>,
    stored_at: Instant,
}

impl CachedSearch {
    /// Wrap a freshly ranked list
    pub fn new(params_token: impl Into<String>, results: Vec<RankedMessage>) -> Self {
        CachedSearch {
            params_token: params_token.into(),
            results,
            stored_at: Instant::now(),
        }
    }

    /// Number of cached results
    pub fn total(&self) -> usize {
        self.results.len()
    }
}

/// TTL-bounded result cache
pub struct ResultCache {
    entries: DashMap<String, CachedSearch>,
    ttl: Duration,
}

impl ResultCache {
    /// Create a cache whose entries live for `ttl`
    pub fn new(ttl: Duration) -> Self {
        ResultCache {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Cache key for a requester
    pub fn key_for(requester: &Requester) -> String {
        format!("{}{}", CACHE_KEY_PREFIX, requester.identity())
    }

    /// Fresh entry for `key` computed for `params_token`
    ///
    /// Expired entries are dropped on the way.
    pub fn get(&self, key: &str, params_token: &str) -> Option<CachedSearch> {
        {
            let entry = self.entries.get(key)?;
            if entry.stored_at.elapsed() <= self.ttl {
                return (entry.params_token == params_token).then(|| entry.value().clone());
            }
        }
        self.entries
            .remove_if(key, |_, e| e.stored_at.elapsed() > self.ttl);
        debug!(target: "boardsearch::cache", key, "expired cached search dropped");
        None
    }

    /// Replace the requester's entry after a completed search
    ///
    /// The stale entry is removed explicitly rather than left to expire.
    pub fn replace(&self, key: &str, search: CachedSearch) {
        let stale = self.entries.insert(key.to_string(), search);
        if stale.is_some() {
            debug!(target: "boardsearch::cache", key, "stale cached search replaced");
        }
    }

    /// Drop an entry
    pub fn remove(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Drop every expired entry
    pub fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        let ttl = self.ttl;
        self.entries.retain(|_, e| e.stored_at.elapsed() <= ttl);
        before - self.entries.len()
    }

    /// Number of entries, expired ones included
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is cached
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boardsearch_core::{BoardId, MemberId, MessageId, TopicId};
    use chrono::Utc;

    fn ranked(id: u32) -> RankedMessage {
        RankedMessage {
            message_id: MessageId(id),
            topic_id: TopicId(1),
            board_id: BoardId(1),
            poster_id: MemberId(1),
            posted_at: Utc::now(),
            is_sticky: false,
            relevance: 500.0,
        }
    }

    #[test]
    fn test_key_format() {
        assert_eq!(
            ResultCache::key_for(&Requester::member(MemberId(42), "10.0.0.1")),
            "search_start:42"
        );
        assert_eq!(
            ResultCache::key_for(&Requester::guest("10.0.0.1")),
            "search_start:10.0.0.1"
        );
    }

    #[test]
    fn test_get_requires_matching_token() {
        let cache = ResultCache::new(Duration::from_secs(60));
        cache.replace("search_start:1", CachedSearch::new("tok-a", vec![ranked(1)]));

        assert_eq!(cache.get("search_start:1", "tok-a").unwrap().total(), 1);
        assert!(cache.get("search_start:1", "tok-b").is_none());
        assert!(cache.get("search_start:2", "tok-a").is_none());
    }

    #[test]
    fn test_replace_overwrites_stale_entry() {
        let cache = ResultCache::new(Duration::from_secs(60));
        cache.replace("k", CachedSearch::new("old", vec![ranked(1)]));
        cache.replace("k", CachedSearch::new("new", vec![ranked(2), ranked(3)]));

        assert_eq!(cache.len(), 1);
        assert!(cache.get("k", "old").is_none());
        assert_eq!(cache.get("k", "new").unwrap().total(), 2);
    }

    #[test]
    fn test_expiry() {
        let cache = ResultCache::new(Duration::from_millis(0));
        cache.replace("k", CachedSearch::new("t", vec![ranked(1)]));
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get("k", "t").is_none());
        assert!(cache.is_empty());

        cache.replace("k", CachedSearch::new("t", vec![]));
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.purge_expired(), 1);
    }

    #[test]
    fn test_remove() {
        let cache = ResultCache::new(Duration::from_secs(60));
        cache.replace("k", CachedSearch::new("t", vec![]));
        assert!(cache.remove("k"));
        assert!(!cache.remove("k"));
    }
}
