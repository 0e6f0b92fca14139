//! Collaborator traits
//!
//! The search pipeline talks to the rest of the forum only through these
//! traits, so storage, markup and anti-abuse implementations can be swapped
//! without touching the engine.
//!
//! Thread safety: implementations are shared behind `Arc` and must be
//! `Send + Sync`.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::Result;
use crate::search_types::{Board, ForumStats, Message, Topic};
use crate::types::{BoardId, MemberId, MessageId, TopicId};

/// Read access to forum content
pub trait ForumStore: Send + Sync {
    /// Visit every message, newest first. The visitor returns `false` to stop.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn scan_messages(&self, visitor: &mut dyn FnMut(&Message) -> bool) -> Result<()>;

    /// Fetch messages by id. Missing ids are skipped; order follows `ids`.
    fn messages(&self, ids: &[MessageId]) -> Result<Vec<Message>>;

    /// Fetch a topic
    fn topic(&self, id: TopicId) -> Result<Option<Topic>>;

    /// Fetch a board
    fn board(&self, id: BoardId) -> Result<Option<Board>>;

    /// Boards searched when the request names none
    fn searchable_boards(&self) -> Result<BTreeSet<BoardId>>;

    /// Activity statistics
    fn stats(&self) -> Result<ForumStats>;

    /// Content watermark, advanced whenever a message is stored or removed
    ///
    /// Derived structures such as a word index compare it with the value
    /// they were built at to tell whether they are stale.
    fn revision(&self) -> Result<u64>;

    /// Subset of `topics` the member has posted in
    fn topics_participated(
        &self,
        member: MemberId,
        topics: &[TopicId],
    ) -> Result<BTreeSet<TopicId>>;
}

/// Member name lookups
pub trait MemberDirectory: Send + Sync {
    /// Members whose name matches any glob pattern (`*`, `?`).
    ///
    /// Returns at most `limit` ids; callers pass `cap + 1` to detect
    /// overflow.
    fn find_members(&self, patterns: &[String], limit: usize) -> Result<Vec<MemberId>>;

    /// Display names for the given members
    fn member_names(&self, ids: &[MemberId]) -> Result<BTreeMap<MemberId, String>>;
}

/// Turns stored markup into HTML
pub trait MarkupRenderer: Send + Sync {
    /// Render a message body
    fn render_body(&self, text: &str, allow_smileys: bool) -> String;
}

/// Replaces disallowed words
pub trait Censor: Send + Sync {
    /// Censor a piece of text
    fn censor(&self, text: &str) -> String;
}

/// Spelling oracle used for did-you-mean suggestions
pub trait SpellChecker: Send + Sync {
    /// True when the word is spelled correctly
    fn check(&self, word: &str) -> Result<bool>;

    /// Candidate corrections, best first
    fn suggest(&self, word: &str) -> Result<Vec<String>>;
}

/// Anti-abuse challenge
pub trait Verifier: Send + Sync {
    /// Validate the answer carried by the request fields.
    ///
    /// Returns error codes; an empty list means the challenge was passed.
    fn verify(&self, fields: &BTreeMap<String, String>) -> Vec<String>;
}
