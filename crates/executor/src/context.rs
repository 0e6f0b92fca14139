//! Per-request and per-session state handed through the pipeline.
//!
//! [`RequestContext`] carries everything the controller needs to know about
//! one request: who asked, the raw fields, and the permission lookups the
//! host forum already made. [`SessionState`] is the small piece of state
//! that survives between requests of the same visitor.

use boardsearch_core::{Requester, Result, SearchError};
use boardsearch_search::{BoardPermissions, RequestFields};
use serde::{Deserialize, Serialize};

/// Field that marks a request as coming from the verification form
pub const VERIFICATION_FIELD: &str = "search_vv";

/// State kept in the visitor's session between requests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    /// Query text of the last search run, so its pages can be browsed
    /// without another challenge
    pub last_search: Option<String>,
    /// The anti-abuse challenge was passed once; it is not asked again
    pub verification_passed: bool,
}

impl SessionState {
    /// Fresh session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialize for the host's session store.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| SearchError::storage(e.to_string()))
    }

    /// Restore from the host's session store.
    ///
    /// A corrupt entry yields a fresh session.
    pub fn from_json(json: &str) -> Self {
        serde_json::from_str(json).unwrap_or_default()
    }

    /// True when `search` is the query the session last ran.
    pub fn is_repeat_of(&self, search: &str) -> bool {
        self.last_search.as_deref() == Some(search)
    }
}

/// Everything known about one incoming request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Who is searching
    pub requester: Requester,
    /// Raw request fields
    pub fields: RequestFields,
    /// Boards on which the requester holds each permission
    pub permissions: BoardPermissions,
    /// Requester has quick moderation switched on
    pub quick_mod: bool,
}

impl RequestContext {
    /// Create a context with no permissions.
    pub fn new(requester: Requester, fields: RequestFields) -> Self {
        Self {
            requester,
            fields,
            permissions: BoardPermissions::default(),
            quick_mod: false,
        }
    }

    /// Builder: permission lookups.
    pub fn with_permissions(mut self, permissions: BoardPermissions) -> Self {
        self.permissions = permissions;
        self
    }

    /// Builder: quick moderation display.
    pub fn with_quick_mod(mut self, quick_mod: bool) -> Self {
        self.quick_mod = quick_mod;
        self
    }

    /// Offset of the first result to show, from the `start` field.
    pub fn start(&self) -> usize {
        self.fields
            .get("start")
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(0)
    }

    /// True when the request was submitted from the verification form.
    pub fn from_verification_form(&self) -> bool {
        self.fields.contains(VERIFICATION_FIELD)
    }
}
