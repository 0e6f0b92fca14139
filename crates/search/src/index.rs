//! Word index for the fulltext backend
//!
//! This module provides:
//! - InvertedIndex with posting lists keyed by word
//! - Incremental maintenance (`index_message`, `remove_message`)
//! - Version watermark for consistency
//! - FulltextApi: narrows candidates through the index, then verifies them
//!
//! The index is a superset filter. Narrowing may admit messages that do not
//! match; it never drops one that does. Verification is shared with the scan
//! backend so both return the same results.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use boardsearch_core::{ApiResult, ForumStore, Message, MessageId, Result, SearchCriteria};
use dashmap::DashMap;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::api::{unavailable, CandidateCollector, SearchApi};
use crate::tokenizer::tokenize;

// ============================================================================
// PostingEntry
// ============================================================================

/// Entry in a posting list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostingEntry {
    /// Message containing the word
    pub message_id: MessageId,
    /// Occurrences in subject and body together
    pub tf: u32,
}

impl PostingEntry {
    /// Create a new posting entry
    pub fn new(message_id: MessageId, tf: u32) -> Self {
        PostingEntry { message_id, tf }
    }
}

// ============================================================================
// PostingList
// ============================================================================

/// Messages containing a word
#[derive(Debug, Clone, Default)]
pub struct PostingList {
    /// Message entries
    pub entries: Vec<PostingEntry>,
}

impl PostingList {
    /// Create a new empty posting list
    pub fn new() -> Self {
        PostingList { entries: vec![] }
    }

    /// Add an entry to the posting list
    pub fn add(&mut self, entry: PostingEntry) {
        self.entries.push(entry);
    }

    /// Remove entries for a message
    pub fn remove(&mut self, message_id: MessageId) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| e.message_id != message_id);
        before - self.entries.len()
    }

    /// Number of messages containing this word
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if posting list is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn message_ids(&self) -> impl Iterator<Item = MessageId> + '_ {
        self.entries.iter().map(|e| e.message_id)
    }
}

// ============================================================================
// InvertedIndex
// ============================================================================

/// Word index over message subjects and bodies
///
/// # Thread Safety
///
/// Uses DashMap for concurrent access. Multiple readers/writers supported.
///
/// # Version Watermark
///
/// Incremented on every update, so callers can tell whether the index
/// moved under them.
pub struct InvertedIndex {
    /// Word -> PostingList mapping
    postings: DashMap<String, PostingList>,

    /// Message -> indexed words, for removal
    message_words: DashMap<MessageId, Vec<String>>,

    /// Total messages indexed
    total_messages: AtomicUsize,

    /// Version watermark for consistency
    version: AtomicU64,
}

impl Default for InvertedIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl InvertedIndex {
    /// Create an empty index
    pub fn new() -> Self {
        InvertedIndex {
            postings: DashMap::new(),
            message_words: DashMap::new(),
            total_messages: AtomicUsize::new(0),
            version: AtomicU64::new(0),
        }
    }

    /// Clear all index data
    pub fn clear(&self) {
        self.postings.clear();
        self.message_words.clear();
        self.total_messages.store(0, Ordering::Relaxed);
        self.version.fetch_add(1, Ordering::Release);
    }

    /// Rebuild from every message in the store
    pub fn rebuild(&self, forum: &dyn ForumStore) -> Result<()> {
        let started = Instant::now();
        self.clear();
        forum.scan_messages(&mut |message| {
            self.index_message(message);
            true
        })?;
        debug!(
            target: "boardsearch::api",
            messages = self.total_messages(),
            words = self.postings.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "word index rebuilt"
        );
        Ok(())
    }

    // ========================================================================
    // Version Watermark
    // ========================================================================

    /// Get current version
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    // ========================================================================
    // Statistics
    // ========================================================================

    /// Get total number of indexed messages
    pub fn total_messages(&self) -> usize {
        self.total_messages.load(Ordering::Acquire)
    }

    /// Messages containing a word
    pub fn doc_freq(&self, word: &str) -> usize {
        self.postings.get(word).map(|r| r.len()).unwrap_or(0)
    }

    /// Every indexed word, sorted
    pub fn vocabulary(&self) -> Vec<String> {
        let mut words: Vec<String> = self.postings.iter().map(|r| r.key().clone()).collect();
        words.sort();
        words
    }

    // ========================================================================
    // Index Updates
    // ========================================================================

    /// Index a message's subject and body
    ///
    /// A message that is already indexed is removed first, so re-indexing an
    /// edited message never double counts.
    pub fn index_message(&self, message: &Message) {
        if self.message_words.contains_key(&message.id) {
            self.remove_message(message.id);
        }

        let mut tf_map: FxHashMap<String, u32> = FxHashMap::default();
        for token in tokenize(&message.subject)
            .into_iter()
            .chain(tokenize(&message.body))
        {
            *tf_map.entry(token).or_insert(0) += 1;
        }

        let mut words = Vec::with_capacity(tf_map.len());
        for (word, tf) in tf_map {
            self.postings
                .entry(word.clone())
                .or_default()
                .add(PostingEntry::new(message.id, tf));
            words.push(word);
        }

        self.message_words.insert(message.id, words);
        self.total_messages.fetch_add(1, Ordering::Relaxed);
        self.version.fetch_add(1, Ordering::Release);
    }

    /// Remove a message from the index
    pub fn remove_message(&self, message_id: MessageId) {
        let words = match self.message_words.remove(&message_id) {
            Some((_, words)) => words,
            None => return,
        };

        for word in words {
            let now_empty = match self.postings.get_mut(&word) {
                Some(mut list) => {
                    list.remove(message_id);
                    list.is_empty()
                }
                None => false,
            };
            if now_empty {
                self.postings.remove_if(&word, |_, list| list.is_empty());
            }
        }

        self.total_messages.fetch_sub(1, Ordering::Relaxed);
        self.version.fetch_add(1, Ordering::Release);
    }

    // ========================================================================
    // Query
    // ========================================================================

    /// Lookup messages containing a word
    pub fn lookup(&self, word: &str) -> Option<PostingList> {
        self.postings.get(word).map(|r| r.clone())
    }

    /// Superset of the messages a term can match
    ///
    /// Plain words use their posting list. Terms with wildcards or
    /// punctuation may match inside longer words, so each alphanumeric piece
    /// is looked up as a substring of the vocabulary and the pieces are
    /// intersected. `None` means the term cannot be narrowed.
    pub fn candidates_for(&self, term: &str) -> Option<BTreeSet<MessageId>> {
        let term = term.to_lowercase();
        let pieces = tokenize(&term);
        if pieces.is_empty() {
            return None;
        }

        let exact = pieces.len() == 1 && pieces[0] == term;
        if exact {
            return Some(
                self.postings
                    .get(&term)
                    .map(|list| list.message_ids().collect())
                    .unwrap_or_default(),
            );
        }

        let mut result: Option<BTreeSet<MessageId>> = None;
        for piece in pieces {
            let mut ids = BTreeSet::new();
            for entry in self.postings.iter().filter(|e| e.key().contains(&piece)) {
                ids.extend(entry.value().message_ids());
            }
            result = Some(match result {
                Some(acc) => acc.intersection(&ids).copied().collect(),
                None => ids,
            });
        }
        result
    }
}

// ============================================================================
// FulltextApi
// ============================================================================

/// Backend that narrows candidates through the word index
///
/// The index follows the store: before every search the store's revision is
/// compared with the one the index was built at, and a stale index is
/// rebuilt. Searches share a read lock; a rebuild takes the write lock, so
/// no search narrows through a half-built index.
pub struct FulltextApi {
    forum: Arc<dyn ForumStore>,
    index: Arc<InvertedIndex>,
    /// Store revision the index reflects; `None` until first built
    synced: RwLock<Option<u64>>,
}

impl FulltextApi {
    /// Create a backend over a store and its index
    ///
    /// The index is (re)built from the store on first use.
    pub fn new(forum: Arc<dyn ForumStore>, index: Arc<InvertedIndex>) -> Self {
        FulltextApi {
            forum,
            index,
            synced: RwLock::new(None),
        }
    }

    /// The index, for inspection and incremental maintenance
    pub fn index(&self) -> &Arc<InvertedIndex> {
        &self.index
    }

    /// Bring the index up to the store's current revision
    ///
    /// # Errors
    ///
    /// Fails when the store cannot be read; the index is rebuilt on the
    /// next attempt.
    pub fn sync(&self) -> Result<()> {
        self.current().map(drop)
    }

    /// Read guard over an index that reflects the store
    fn current(&self) -> Result<RwLockReadGuard<'_, Option<u64>>> {
        let revision = self.forum.revision()?;
        {
            let synced = self.synced.read();
            if *synced == Some(revision) {
                return Ok(synced);
            }
        }

        let mut synced = self.synced.write();
        if *synced != Some(revision) {
            *synced = None;
            self.index.rebuild(self.forum.as_ref())?;
            *synced = Some(revision);
            debug!(
                target: "boardsearch::api",
                revision,
                messages = self.index.total_messages(),
                "word index caught up with store"
            );
        }
        Ok(RwLockWriteGuard::downgrade(synced))
    }

    fn narrow(&self, criteria: &SearchCriteria) -> Option<BTreeSet<MessageId>> {
        let mut result: Option<BTreeSet<MessageId>> = None;
        for term in criteria.positive_terms() {
            if let Some(ids) = self.index.candidates_for(term) {
                result = Some(match result {
                    Some(acc) => acc.intersection(&ids).copied().collect(),
                    None => ids,
                });
            }
        }
        result
    }
}

impl SearchApi for FulltextApi {
    fn execute(&self, criteria: &SearchCriteria) -> Result<ApiResult> {
        let started = Instant::now();
        let _synced = self.current().map_err(unavailable)?;
        let mut collector = CandidateCollector::new(criteria, self.forum.as_ref())?;

        let narrowed = match self.narrow(criteria) {
            Some(ids) => ids.into_iter().collect::<Vec<_>>(),
            None => {
                let mut all = Vec::new();
                for entry in self.index.message_words.iter() {
                    all.push(*entry.key());
                }
                all
            }
        };

        let mut messages = self.forum.messages(&narrowed).map_err(unavailable)?;
        // Same order as a scan
        messages.sort_by(|a, b| b.posted_at.cmp(&a.posted_at).then(b.id.cmp(&a.id)));
        for message in &messages {
            if !collector.offer(message) {
                break;
            }
        }
        let result = collector.finish()?;

        debug!(
            target: "boardsearch::api",
            backend = "fulltext",
            narrowed = narrowed.len(),
            candidates = result.candidates.len(),
            total = result.total_count,
            elapsed_us = started.elapsed().as_micros() as u64,
            "index search complete"
        );
        Ok(result)
    }

    fn name(&self) -> &str {
        "fulltext"
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::*;
    use crate::store::MemoryForum;
    use boardsearch_core::{BoardId, MemberId, SearchError, TopicId};

    fn message(id: u32, subject: &str, body: &str) -> Message {
        Message {
            id: MessageId(id),
            topic_id: TopicId(id),
            board_id: BoardId(1),
            poster_id: MemberId(1),
            poster_name: "alice".to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
            posted_at: now(),
            smileys_enabled: true,
        }
    }

    fn ids(set: Option<BTreeSet<MessageId>>) -> Vec<u32> {
        set.map(|s| s.into_iter().map(|m| m.get()).collect())
            .unwrap_or_default()
    }

    #[test]
    fn test_index_message() {
        let index = InvertedIndex::new();
        index.index_message(&message(1, "Hello", "hello world test"));

        assert_eq!(index.total_messages(), 1);
        assert_eq!(index.doc_freq("hello"), 1);
        assert_eq!(index.doc_freq("world"), 1);

        let postings = index.lookup("hello").unwrap();
        assert_eq!(postings.len(), 1);
        assert_eq!(postings.entries[0].tf, 2);
    }

    #[test]
    fn test_reindex_does_not_double_count() {
        let index = InvertedIndex::new();
        index.index_message(&message(1, "", "alpha beta"));
        index.index_message(&message(1, "", "alpha gamma"));

        assert_eq!(index.total_messages(), 1);
        assert_eq!(index.doc_freq("alpha"), 1);
        assert_eq!(index.doc_freq("beta"), 0);
        assert!(index.lookup("beta").is_none());
    }

    #[test]
    fn test_remove_message() {
        let index = InvertedIndex::new();
        index.index_message(&message(1, "", "hello world"));
        index.index_message(&message(2, "", "hello there"));

        index.remove_message(MessageId(1));

        assert_eq!(index.total_messages(), 1);
        assert_eq!(index.doc_freq("hello"), 1);
        assert_eq!(index.doc_freq("world"), 0);
        assert_eq!(index.vocabulary(), vec!["hello", "there"]);

        // Unknown ids are ignored
        let v = index.version();
        index.remove_message(MessageId(99));
        assert_eq!(index.version(), v);
    }

    #[test]
    fn test_version_increment() {
        let index = InvertedIndex::new();
        let v0 = index.version();
        index.index_message(&message(1, "", "hello"));
        let v1 = index.version();
        index.clear();
        let v2 = index.version();

        assert!(v1 > v0);
        assert!(v2 > v1);
        assert_eq!(index.total_messages(), 0);
    }

    #[test]
    fn test_candidates_exact_and_substring() {
        let index = InvertedIndex::new();
        index.index_message(&message(1, "", "asp.net core"));
        index.index_message(&message(2, "", "networking basics"));
        index.index_message(&message(3, "", "compiler compile"));

        assert_eq!(ids(index.candidates_for("core")), vec![1]);
        assert_eq!(ids(index.candidates_for("missing")), Vec::<u32>::new());
        // Punctuated terms widen to substrings of the vocabulary
        assert_eq!(ids(index.candidates_for(".net")), vec![1, 2]);
        assert_eq!(ids(index.candidates_for("comp*")), vec![3]);
        assert_eq!(ids(index.candidates_for("asp core")), vec![1]);
        assert!(index.candidates_for("++").is_none());
    }

    #[test]
    fn test_rebuild_from_store() {
        let forum = sample_forum();
        let index = InvertedIndex::new();
        index.rebuild(&forum).unwrap();
        assert_eq!(index.total_messages(), forum.message_count());
        assert!(index.vocabulary().contains(&"borrow".to_string()));
    }

    #[test]
    fn test_fulltext_follows_store_revisions() {
        let forum = Arc::new(MemoryForum::new());
        let index = Arc::new(InvertedIndex::new());
        let api = FulltextApi::new(forum.clone(), index.clone());
        assert!(api.execute(&criteria(&["tokio"])).unwrap().candidates.is_empty());

        post(&forum, 1, 1, 1, "tokio runtime", "spawn tasks", 0);
        let result = api.execute(&criteria(&["tokio"])).unwrap();
        assert_eq!(result.candidates.len(), 1);
        assert_eq!(index.total_messages(), 1);

        // An unchanged store leaves the index alone
        let version = index.version();
        api.execute(&criteria(&["tokio"])).unwrap();
        assert_eq!(index.version(), version);

        assert!(forum.remove_message(MessageId(1)));
        assert!(api.execute(&criteria(&["tokio"])).unwrap().candidates.is_empty());
        assert_eq!(index.total_messages(), 0);
    }

    #[test]
    fn test_fulltext_store_failure_is_unavailable() {
        let forum = Arc::new(MemoryForum::new());
        post(&forum, 1, 1, 1, "tokio runtime", "spawn tasks", 0);
        let api = FulltextApi::new(forum.clone(), Arc::new(InvertedIndex::new()));
        forum.fail_reads(true);
        assert!(matches!(
            api.execute(&criteria(&["tokio"])),
            Err(SearchError::BackendUnavailable { .. })
        ));
        forum.fail_reads(false);
        assert_eq!(api.execute(&criteria(&["tokio"])).unwrap().candidates.len(), 1);
    }
}
