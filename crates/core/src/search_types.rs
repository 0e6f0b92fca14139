//! Core search types shared by every stage of the pipeline
//!
//! This module defines:
//! - Forum rows handed out by storage: Message, Topic, Board, ForumStats
//! - SearchCriteria: what a backend is asked to find
//! - Candidate/ApiResult: what a backend answers
//! - RankedMessage: a candidate after relevance scoring
//! - ResultItem/PermissionFlags: a rendered result row
//!
//! These types define the interface contracts for search backends.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::types::{BoardId, MemberId, MessageId, TopicId};

// ============================================================================
// Forum rows
// ============================================================================

/// A stored message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Message id
    pub id: MessageId,
    /// Owning topic
    pub topic_id: TopicId,
    /// Board the topic lives in
    pub board_id: BoardId,
    /// Author, `MemberId::GUEST` for guest posts
    pub poster_id: MemberId,
    /// Author name as recorded on the post
    pub poster_name: String,
    /// Subject line
    pub subject: String,
    /// Raw markup body
    pub body: String,
    /// Time of posting
    pub posted_at: DateTime<Utc>,
    /// Whether smileys are rendered in this post
    pub smileys_enabled: bool,
}

/// A stored topic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    /// Topic id
    pub id: TopicId,
    /// Board the topic lives in
    pub board_id: BoardId,
    /// Opening message
    pub first_message_id: MessageId,
    /// Who started the topic
    pub starter_id: MemberId,
    /// Replies after the opening message
    pub num_replies: u32,
    /// Pinned to the top of its board
    pub is_sticky: bool,
}

/// A stored board
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Board {
    /// Board id
    pub id: BoardId,
    /// Display name
    pub name: String,
    /// Category id
    pub category_id: u32,
    /// Category display name
    pub category_name: String,
}

/// Activity statistics used to size the recent-posts window
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ForumStats {
    /// Number of stored messages
    pub total_messages: usize,
    /// Oldest post time, if any message exists
    pub oldest_post: Option<DateTime<Utc>>,
    /// Newest post time, if any message exists
    pub newest_post: Option<DateTime<Utc>>,
}

impl ForumStats {
    /// Days between the oldest and newest post
    pub fn activity_span_days(&self) -> i64 {
        match (self.oldest_post, self.newest_post) {
            (Some(oldest), Some(newest)) => (newest - oldest).num_days().max(0),
            _ => 0,
        }
    }
}

// ============================================================================
// Criteria
// ============================================================================

/// Who a search is restricted to
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UserFilter {
    /// Anybody
    #[default]
    Any,
    /// Listed members, or guest posts whose recorded name matches a pattern
    Members {
        /// Resolved member ids
        ids: BTreeSet<MemberId>,
        /// Glob patterns (`*`, `?`) for guest poster names
        guest_names: Vec<String>,
    },
    /// Any post whose recorded poster name matches a pattern
    NamePattern(Vec<String>),
}

/// Inclusive age window in whole days before `now`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgeRange {
    /// Youngest admissible age
    pub min_days: u32,
    /// Oldest admissible age
    pub max_days: u32,
}

impl Default for AgeRange {
    fn default() -> Self {
        AgeRange {
            min_days: 0,
            max_days: 9999,
        }
    }
}

impl AgeRange {
    /// True when the post time lies inside the window
    pub fn admits(&self, posted_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        let newest_allowed = now - Duration::days(i64::from(self.min_days));
        let oldest_allowed = now - Duration::days(i64::from(self.max_days));
        posted_at <= newest_allowed && posted_at >= oldest_allowed
    }

    /// True when no restriction applies
    pub fn is_unbounded(&self) -> bool {
        *self == AgeRange::default()
    }
}

/// Everything a backend needs to select candidates
///
/// Both backends honour identical semantics for every field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchCriteria {
    /// Words that must all appear (lower case, may hold `*` wildcards)
    pub required_words: Vec<String>,
    /// Words that must not appear
    pub excluded_words: Vec<String>,
    /// Word sequences that must appear in order
    pub phrases: Vec<String>,
    /// Boards in scope
    pub board_scope: BTreeSet<BoardId>,
    /// Restrict to a single topic
    pub topic: Option<TopicId>,
    /// Restrict by poster
    pub user_filter: UserFilter,
    /// Restrict by age
    pub age_range: AgeRange,
    /// Match the subject line only
    pub subject_only: bool,
    /// Stop collecting after this many candidates
    pub result_cap: usize,
    /// Backend deadline in milliseconds
    pub timeout_ms: u64,
    /// Reference time for the age window
    pub now: DateTime<Utc>,
}

impl SearchCriteria {
    /// Every positive term: phrases then required words
    pub fn positive_terms(&self) -> impl Iterator<Item = &String> {
        self.phrases.iter().chain(self.required_words.iter())
    }
}

// ============================================================================
// Backend results
// ============================================================================

/// A message selected by a backend, with the signals ranking needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Message id
    pub message_id: MessageId,
    /// Owning topic
    pub topic_id: TopicId,
    /// Board
    pub board_id: BoardId,
    /// Author
    pub poster_id: MemberId,
    /// Time of posting
    pub posted_at: DateTime<Utc>,
    /// Topic is sticky
    pub is_sticky: bool,
    /// Message opens its topic
    pub is_first_message: bool,
    /// Replies in the owning topic
    pub topic_replies: u32,
    /// Distinct positive terms found in the subject
    pub subject_hits: u32,
    /// Distinct positive terms found in the body
    pub body_hits: u32,
}

/// Backend answer: candidates in backend order plus the uncapped match count
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiResult {
    /// Selected candidates, newest message first, at most `result_cap`
    pub candidates: Vec<Candidate>,
    /// Number of matching messages before the cap
    pub total_count: usize,
}

/// A candidate after relevance scoring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedMessage {
    /// Message id
    pub message_id: MessageId,
    /// Owning topic
    pub topic_id: TopicId,
    /// Board
    pub board_id: BoardId,
    /// Author
    pub poster_id: MemberId,
    /// Time of posting
    pub posted_at: DateTime<Utc>,
    /// Topic is sticky
    pub is_sticky: bool,
    /// Relevance on a 0..=1000 scale
    pub relevance: f64,
}

// ============================================================================
// Rendered results
// ============================================================================

/// Quick-moderation actions allowed on a result's topic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QuickModFlags {
    /// May lock the topic
    pub lock: bool,
    /// May pin the topic
    pub sticky: bool,
    /// May move the topic
    pub move_topic: bool,
    /// May remove the topic
    pub remove: bool,
}

/// Actions the requester may take on a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PermissionFlags {
    /// May reply
    pub can_reply: bool,
    /// May reply quoting this message
    pub can_quote: bool,
    /// May subscribe to notifications
    pub can_mark_notify: bool,
    /// Moderation subset, present when quick moderation is displayed
    pub quick_mod: Option<QuickModFlags>,
}

/// One display record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultItem {
    /// Owning topic
    pub topic_id: TopicId,
    /// Message id
    pub message_id: MessageId,
    /// Board
    pub board_id: BoardId,
    /// Board display name
    pub board_name: String,
    /// Category display name
    pub category_name: String,
    /// Relevance on a 0..=1000 scale
    pub relevance: f64,
    /// Censored, escaped subject
    pub subject: String,
    /// Subject with matches wrapped in highlight markup
    pub subject_highlighted: String,
    /// Excerpt (compact mode) or rendered body
    pub body: String,
    /// Body with matches wrapped in highlight markup
    pub body_highlighted: String,
    /// Author
    pub poster_id: MemberId,
    /// Author name
    pub poster_name: String,
    /// Time of posting
    pub posted_at: DateTime<Utc>,
    /// Topic is sticky
    pub is_stickied: bool,
    /// Requester has posted in this topic
    pub posted_in: bool,
    /// Position in the overall result list, starting at 1
    pub counter: usize,
    /// Allowed actions
    pub permissions: PermissionFlags,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(days_ago: i64, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::days(days_ago)
    }

    #[test]
    fn test_age_range_default_is_unbounded() {
        let range = AgeRange::default();
        assert!(range.is_unbounded());
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        assert!(range.admits(at(0, now), now));
        assert!(range.admits(at(9999, now), now));
    }

    #[test]
    fn test_age_range_bounds_inclusive() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let range = AgeRange {
            min_days: 2,
            max_days: 10,
        };
        assert!(!range.admits(at(1, now), now));
        assert!(range.admits(at(2, now), now));
        assert!(range.admits(at(10, now), now));
        assert!(!range.admits(at(11, now), now));
    }

    #[test]
    fn test_activity_span() {
        let oldest = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let stats = ForumStats {
            total_messages: 3,
            oldest_post: Some(oldest),
            newest_post: Some(oldest + Duration::days(100)),
        };
        assert_eq!(stats.activity_span_days(), 100);
        assert_eq!(ForumStats::default().activity_span_days(), 0);
    }
}
