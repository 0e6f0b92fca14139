//! Boardsearch - forum message search
//!
//! Boardsearch turns a visitor's query into a ranked, paginated, highlighted
//! page of forum messages: query parsing, pluggable backends, relevance
//! ranking, a per-requester result cache, and display rendering.
//!
//! # Quick Start
//!
//! ```ignore
//! use boardsearch::{RequestContext, RequestFields, Requester, SearchConfig,
//!     SearchController, SearchOutcome, SessionState, MemberId};
//!
//! let controller = SearchController::new(Arc::new(SearchConfig::default()),
//!     forum.clone(), forum.clone())?;
//! let ctx = RequestContext::new(Requester::member(MemberId(1), "10.0.0.1"),
//!     RequestFields::new().with("search", "clay soil"));
//! let mut session = SessionState::new();
//!
//! match controller.action_results(&ctx, &mut session)? {
//!     SearchOutcome::Results(page) => { /* render page.items */ }
//!     SearchOutcome::Form(form) => { /* show form.issues */ }
//! }
//! ```
//!
//! # Architecture
//!
//! Requests go through the [`SearchController`], which drives a
//! [`SearchEngine`] over a [`SearchApi`] backend and renders rows with the
//! [`ResultRenderer`]. The host forum plugs in through the collaborator
//! traits ([`ForumStore`], [`MemberDirectory`], [`Censor`], ...).

pub use boardsearch_core::*;
pub use boardsearch_executor::*;
pub use boardsearch_search::*;
