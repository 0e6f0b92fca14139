//! Error types for forum search
//!
//! Two layers live here:
//! - [`SearchError`]: what an operation returns when it fails. We use
//!   `thiserror` for the `Display` and `Error` implementations.
//! - [`SearchIssue`]/[`SearchIssues`]: user-facing error keys collected during
//!   validation. Several can be reported together; they are never raised.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

/// Result type alias for search operations
pub type Result<T> = std::result::Result<T, SearchError>;

/// Why a query produced no usable search terms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InvalidReason {
    /// Nothing was typed, or only separators
    Empty,
    /// Every word was shorter than the minimum length
    SmallWords,
    /// Every word was on the stop-list
    Blacklisted,
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            InvalidReason::Empty => "no search terms",
            InvalidReason::SmallWords => "all search words are too short",
            InvalidReason::Blacklisted => "all search words are too common",
        };
        f.write_str(text)
    }
}

/// Error types for the search pipeline
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SearchError {
    /// Empty or entirely filtered token set
    #[error("invalid search query: {reason}")]
    InvalidQuery {
        /// Which filter removed the terms
        reason: InvalidReason,
    },

    /// Raw query longer than the configured limit
    #[error("search string is {length} characters long, limit is {limit}")]
    QueryTooLong {
        /// Length in characters
        length: usize,
        /// Configured limit
        limit: usize,
    },

    /// The backend failed or timed out while executing
    #[error("search backend unavailable: {reason}")]
    BackendUnavailable {
        /// Backend supplied detail
        reason: String,
    },

    /// An anti-abuse challenge is outstanding
    #[error("verification required before searching")]
    VerificationRequired,

    /// Configuration rejected
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// What is wrong
        reason: String,
    },

    /// A storage collaborator failed
    #[error("storage error: {reason}")]
    Storage {
        /// Collaborator supplied detail
        reason: String,
    },

    /// Engine operation called in the wrong lifecycle state
    #[error("invalid state: expected {expected}, found {actual}")]
    InvalidState {
        /// State the operation needs
        expected: &'static str,
        /// Current state
        actual: &'static str,
    },
}

impl SearchError {
    /// Shorthand for `BackendUnavailable`
    pub fn backend(reason: impl Into<String>) -> Self {
        SearchError::BackendUnavailable {
            reason: reason.into(),
        }
    }

    /// Shorthand for `Storage`
    pub fn storage(reason: impl Into<String>) -> Self {
        SearchError::Storage {
            reason: reason.into(),
        }
    }

    /// Shorthand for `InvalidConfig`
    pub fn config(reason: impl Into<String>) -> Self {
        SearchError::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// The issue key reported to the user for this error
    pub fn issue(&self) -> SearchIssue {
        match self {
            SearchError::InvalidQuery {
                reason: InvalidReason::Empty,
            } => SearchIssue::InvalidSearchString,
            SearchError::InvalidQuery {
                reason: InvalidReason::SmallWords,
            } => SearchIssue::SearchStringSmallWords,
            SearchError::InvalidQuery {
                reason: InvalidReason::Blacklisted,
            } => SearchIssue::InvalidSearchStringBlacklist,
            SearchError::QueryTooLong { .. } => SearchIssue::StringTooLong,
            SearchError::VerificationRequired => SearchIssue::NeedVerificationCode,
            SearchError::BackendUnavailable { .. }
            | SearchError::InvalidConfig { .. }
            | SearchError::Storage { .. }
            | SearchError::InvalidState { .. } => SearchIssue::BackendUnavailable,
        }
    }
}

// ============================================================================
// Collected issues
// ============================================================================

/// A user-facing search error key
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SearchIssue {
    /// Nothing searchable was entered
    InvalidSearchString,
    /// Only stop-listed words were entered
    InvalidSearchStringBlacklist,
    /// Only too-short words were entered
    SearchStringSmallWords,
    /// Query over the length limit
    StringTooLong,
    /// Guest must answer the challenge first
    NeedVerificationCode,
    /// The challenge was answered wrongly; carries the verifier's code
    VerificationFailed(String),
    /// Backend failure while executing
    BackendUnavailable,
    /// The age range matches no messages at all
    NoMessagesInTimeFrame,
}

impl SearchIssue {
    /// Stable key, suitable for looking up a translated message
    pub fn key(&self) -> String {
        match self {
            SearchIssue::InvalidSearchString => "invalid_search_string".to_string(),
            SearchIssue::InvalidSearchStringBlacklist => {
                "invalid_search_string_blacklist".to_string()
            }
            SearchIssue::SearchStringSmallWords => "search_string_small_words".to_string(),
            SearchIssue::StringTooLong => "string_too_long".to_string(),
            SearchIssue::NeedVerificationCode => "need_verification_code".to_string(),
            SearchIssue::VerificationFailed(code) => code.clone(),
            SearchIssue::BackendUnavailable => "search_backend_unavailable".to_string(),
            SearchIssue::NoMessagesInTimeFrame => "no_messages_in_time_frame".to_string(),
        }
    }
}

/// Ordered, deduplicated set of issues reported together
///
/// A too-short-words issue makes the generic invalid-string issue
/// redundant, so the generic one is dropped whenever both are present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchIssues {
    issues: BTreeSet<SearchIssue>,
}

impl SearchIssues {
    /// Empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an issue, applying the suppression rule
    pub fn insert(&mut self, issue: SearchIssue) {
        if issue == SearchIssue::InvalidSearchString
            && self.issues.contains(&SearchIssue::SearchStringSmallWords)
        {
            return;
        }
        if issue == SearchIssue::SearchStringSmallWords {
            self.issues.remove(&SearchIssue::InvalidSearchString);
        }
        self.issues.insert(issue);
    }

    /// Test membership
    pub fn contains(&self, issue: &SearchIssue) -> bool {
        self.issues.contains(issue)
    }

    /// True when nothing went wrong
    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    /// Number of distinct issues
    pub fn len(&self) -> usize {
        self.issues.len()
    }

    /// Iterate in stable order
    pub fn iter(&self) -> impl Iterator<Item = &SearchIssue> {
        self.issues.iter()
    }

    /// Keys of every issue, in stable order
    pub fn keys(&self) -> Vec<String> {
        self.issues.iter().map(SearchIssue::key).collect()
    }
}

impl Extend<SearchIssue> for SearchIssues {
    fn extend<I: IntoIterator<Item = SearchIssue>>(&mut self, iter: I) {
        for issue in iter {
            self.insert(issue);
        }
    }
}
