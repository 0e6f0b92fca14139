//! # Boardsearch Executor
//!
//! Request orchestration for forum search. This is the layer a web frontend
//! talks to:
//! - [`SearchController`] - the form and results flows
//! - [`RequestContext`] - one request's requester, fields and permissions
//! - [`SessionState`] - what survives between a visitor's requests
//!
//! ## Quick Start
//!
//! ```text
//! use boardsearch_executor::{RequestContext, SearchController, SessionState};
//!
//! let controller = SearchController::new(config, forum.clone(), forum)?;
//! let mut session = SessionState::new();
//!
//! let ctx = RequestContext::new(requester, fields);
//! match controller.action_results(&ctx, &mut session)? {
//!     SearchOutcome::Results(page) => { /* render rows */ }
//!     SearchOutcome::Form(form) => { /* redisplay with form.issues */ }
//! }
//! ```

#![warn(missing_docs)]

mod context;
mod controller;

// Test modules
#[cfg(test)]
mod tests;

// =============================================================================
// Public API - Everything users need is re-exported here
// =============================================================================

pub use context::{RequestContext, SessionState, VERIFICATION_FIELD};
pub use controller::{
    SearchController, SearchForm, SearchOutcome, SearchResults, DID_YOU_MEAN_TEMPLATE,
};
