//! Core types and traits for forum search
//!
//! This crate defines the foundational types used throughout the system:
//! - Identifiers: BoardId, TopicId, MessageId, MemberId, Requester
//! - Error: SearchError plus collected SearchIssues
//! - Config: SearchConfig loaded from `boardsearch.toml`
//! - Search types: SearchCriteria, Candidate, RankedMessage, ResultItem
//! - Traits: collaborator contracts (ForumStore, MemberDirectory, ...)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod search_types;
pub mod traits;
pub mod types;

pub use config::{SearchConfig, SearchIndexKind, WeightConfig, CONFIG_FILE_NAME};
pub use error::{InvalidReason, Result, SearchError, SearchIssue, SearchIssues};
pub use search_types::{
    AgeRange, ApiResult, Board, Candidate, ForumStats, Message, PermissionFlags, QuickModFlags,
    RankedMessage, ResultItem, SearchCriteria, Topic, UserFilter,
};
pub use traits::{Censor, ForumStore, MarkupRenderer, MemberDirectory, SpellChecker, Verifier};
pub use types::{BoardId, BoardSet, MemberId, MessageId, Requester, TopicId};
