//! Search request parameters
//!
//! [`SearchParams`] is the normalized form of what a user asked for. It
//! travels between requests as an opaque token (see [`SearchParams::compile_url_params`])
//! so that pagination and sorting links re-run the same search.
//!
//! Token format: `key|'|value` pairs joined by `|"|`, base64 encoded with the
//! URL-safe alphabet and `.` in place of `=` padding. Fields holding their
//! default value are omitted.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use base64::{engine::general_purpose::URL_SAFE, Engine};
use boardsearch_core::{
    BoardId, ForumStore, MemberDirectory, MemberId, Result, TopicId, UserFilter,
};
use tracing::{debug, warn};

const PAIR_SEPARATOR: &str = "|\"|";
const KEY_SEPARATOR: &str = "|'|";

/// Default upper age bound, in days
pub const DEFAULT_MAX_AGE: u32 = 9999;

/// Token grammar applied to the query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchType {
    /// `*` is dropped from terms
    #[default]
    Standard,
    /// `*` survives as a wildcard
    ExtendedWildcard,
}

impl SearchType {
    fn code(self) -> &'static str {
        match self {
            SearchType::Standard => "1",
            SearchType::ExtendedWildcard => "2",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1" | "standard" => Some(SearchType::Standard),
            "2" | "wildcard" | "extended" => Some(SearchType::ExtendedWildcard),
            _ => None,
        }
    }
}

/// Result ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    /// Best match first
    #[default]
    Relevance,
    /// Newest first
    Date,
    /// Grouped by board
    Board,
}

impl SortKey {
    /// Name used in tokens and request fields
    pub fn as_str(self) -> &'static str {
        match self {
            SortKey::Relevance => "relevance",
            SortKey::Date => "date",
            SortKey::Board => "board",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        // Older links carry a direction suffix, e.g. "date|desc"
        let name = s.split('|').next().unwrap_or_default().trim();
        match name.to_ascii_lowercase().as_str() {
            "relevance" => Some(SortKey::Relevance),
            "date" | "id_msg" => Some(SortKey::Date),
            "board" | "id_board" => Some(SortKey::Board),
            _ => None,
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// RequestFields
// ============================================================================

/// Raw request fields, as submitted by a form or link
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestFields {
    fields: BTreeMap<String, String>,
}

impl RequestFields {
    /// No fields
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set a field
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Set a field
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(key.into(), value.into());
    }

    /// Raw value
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// True when the field is present
    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Every field
    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.fields
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RequestFields {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        RequestFields {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "on" | "yes"
    )
}

fn parse_days(value: &str) -> Option<u32> {
    value
        .trim()
        .parse::<i64>()
        .ok()
        .map(|v| v.clamp(0, i64::from(DEFAULT_MAX_AGE)) as u32)
}

// ============================================================================
// SearchParams
// ============================================================================

/// Collaborators `merge` consults
pub struct MergeSources<'a> {
    /// Board list and activity statistics
    pub forum: &'a dyn ForumStore,
    /// Member name lookups
    pub members: &'a dyn MemberDirectory,
}

/// Normalized search parameters
///
/// Equality covers the documented fields only; the user filter resolved by
/// [`SearchParams::merge`] is request-local and never serialized.
#[derive(Debug, Clone)]
pub struct SearchParams {
    /// Raw query text
    pub search: String,
    /// Boards in scope
    pub brd: BTreeSet<BoardId>,
    /// Poster names, `*` for anybody
    pub userspec: String,
    /// Query grammar
    pub searchtype: SearchType,
    /// Youngest admissible age in days
    pub minage: u32,
    /// Oldest admissible age in days
    pub maxage: u32,
    /// Result ordering
    pub sort: SortKey,
    /// Full bodies instead of excerpts
    pub show_complete: bool,
    /// Match subjects only
    pub subject_only: bool,
    /// Search inside a single topic
    pub topic: Option<TopicId>,
    user_filter: Option<UserFilter>,
}

impl Default for SearchParams {
    fn default() -> Self {
        SearchParams {
            search: String::new(),
            brd: BTreeSet::new(),
            userspec: "*".to_string(),
            searchtype: SearchType::Standard,
            minage: 0,
            maxage: DEFAULT_MAX_AGE,
            sort: SortKey::Relevance,
            show_complete: false,
            subject_only: false,
            topic: None,
            user_filter: None,
        }
    }
}

impl PartialEq for SearchParams {
    fn eq(&self, other: &Self) -> bool {
        self.search == other.search
            && self.brd == other.brd
            && self.userspec == other.userspec
            && self.searchtype == other.searchtype
            && self.minage == other.minage
            && self.maxage == other.maxage
            && self.sort == other.sort
            && self.show_complete == other.show_complete
            && self.subject_only == other.subject_only
            && self.topic == other.topic
    }
}

impl SearchParams {
    /// Empty parameter set
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set the query text
    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = search.into();
        self
    }

    /// Builder: restrict to boards
    pub fn with_boards(mut self, boards: impl IntoIterator<Item = BoardId>) -> Self {
        self.brd = boards.into_iter().collect();
        self
    }

    /// Builder: set the sort key
    pub fn with_sort(mut self, sort: SortKey) -> Self {
        self.sort = sort;
        self
    }

    /// Builder: set the query grammar
    pub fn with_searchtype(mut self, searchtype: SearchType) -> Self {
        self.searchtype = searchtype;
        self
    }

    /// Builder: set the age window
    pub fn with_age(mut self, minage: u32, maxage: u32) -> Self {
        self.minage = minage.min(maxage);
        self.maxage = maxage.max(minage);
        self
    }

    /// Builder: subject-only matching
    pub fn with_subject_only(mut self, subject_only: bool) -> Self {
        self.subject_only = subject_only;
        self
    }

    /// Builder: full bodies instead of excerpts
    pub fn with_show_complete(mut self, show_complete: bool) -> Self {
        self.show_complete = show_complete;
        self
    }

    /// Builder: restrict to a user filter that was resolved elsewhere
    pub fn with_user_filter(mut self, userspec: impl Into<String>, filter: UserFilter) -> Self {
        self.userspec = userspec.into();
        self.user_filter = Some(filter);
        self
    }

    /// Parse an opaque token
    ///
    /// Malformed tokens yield an empty parameter set; the failure is logged
    /// and never reaches the caller.
    pub fn decode(token: &str) -> Self {
        match Self::try_decode(token) {
            Ok(params) => params,
            Err(reason) => {
                debug!(target: "boardsearch::params", reason = %reason, "discarding malformed search token");
                Self::default()
            }
        }
    }

    fn try_decode(token: &str) -> std::result::Result<Self, String> {
        let token = token.trim();
        let mut params = Self::default();
        if token.is_empty() {
            return Ok(params);
        }

        let bytes = URL_SAFE
            .decode(token.replace('.', "="))
            .map_err(|e| format!("bad base64: {}", e))?;
        let text = String::from_utf8(bytes).map_err(|e| format!("bad utf-8: {}", e))?;

        for pair in text.split(PAIR_SEPARATOR) {
            let (key, raw) = pair
                .split_once(KEY_SEPARATOR)
                .ok_or_else(|| format!("pair without separator: {:?}", pair))?;
            let value = unescape_value(raw)?;
            params.apply_stored(key, &value);
        }
        Ok(params)
    }

    /// Apply one stored field; unknown keys and unparsable values are skipped
    fn apply_stored(&mut self, key: &str, value: &str) {
        match key {
            "search" => self.search = value.to_string(),
            "brd" => self.brd = parse_board_list(value),
            "userspec" => self.userspec = value.to_string(),
            "searchtype" => {
                if let Some(t) = SearchType::parse(value) {
                    self.searchtype = t;
                }
            }
            "minage" => {
                if let Some(days) = parse_days(value) {
                    self.minage = days;
                }
            }
            "maxage" => {
                if let Some(days) = parse_days(value) {
                    self.maxage = days;
                }
            }
            "sort" => {
                if let Some(sort) = SortKey::parse(value) {
                    self.sort = sort;
                }
            }
            "show_complete" => self.show_complete = parse_flag(value),
            "subject_only" => self.subject_only = parse_flag(value),
            "topic" => self.topic = value.parse().ok(),
            _ => {}
        }
    }

    /// Serialize into an opaque token; inverse of [`SearchParams::decode`]
    pub fn compile_url_params(&self) -> String {
        let defaults = Self::default();
        let mut pairs: Vec<(&str, String)> = Vec::new();

        if !self.search.is_empty() {
            pairs.push(("search", self.search.clone()));
        }
        if !self.brd.is_empty() {
            pairs.push(("brd", join_boards(&self.brd)));
        }
        if self.userspec != defaults.userspec {
            pairs.push(("userspec", self.userspec.clone()));
        }
        if self.searchtype != defaults.searchtype {
            pairs.push(("searchtype", self.searchtype.code().to_string()));
        }
        if self.minage != defaults.minage {
            pairs.push(("minage", self.minage.to_string()));
        }
        if self.maxage != defaults.maxage {
            pairs.push(("maxage", self.maxage.to_string()));
        }
        if self.sort != defaults.sort {
            pairs.push(("sort", self.sort.as_str().to_string()));
        }
        if self.show_complete {
            pairs.push(("show_complete", "1".to_string()));
        }
        if self.subject_only {
            pairs.push(("subject_only", "1".to_string()));
        }
        if let Some(topic) = self.topic {
            pairs.push(("topic", topic.to_string()));
        }

        if pairs.is_empty() {
            return String::new();
        }

        let text = pairs
            .iter()
            .map(|(k, v)| format!("{}{}{}", k, KEY_SEPARATOR, escape_value(v)))
            .collect::<Vec<_>>()
            .join(PAIR_SEPARATOR);
        URL_SAFE.encode(text.as_bytes()).replace('=', ".")
    }

    /// Overlay request fields on top of the decoded parameters
    ///
    /// - text is trimmed, ages are clamped integers, flags accept `1/true/on/yes`
    /// - `maxage=recent` resolves to `ceil(activity span * recent_window_fraction)` days
    /// - reversed age ranges are swapped
    /// - an empty board list means every searchable board
    /// - `userspec` is resolved to member ids, at most `max_user_lookup` of them
    ///
    /// # Errors
    ///
    /// Fails only when the forum store cannot answer. Member lookup failures
    /// degrade to poster-name matching.
    pub fn merge(
        &mut self,
        fields: &RequestFields,
        recent_window_fraction: f64,
        max_user_lookup: usize,
        sources: &MergeSources<'_>,
    ) -> Result<()> {
        if let Some(search) = fields.get("search") {
            self.search = search
                .chars()
                .filter(|c| !c.is_control())
                .collect::<String>()
                .trim()
                .to_string();
        }
        if let Some(brd) = fields.get("brd") {
            self.brd = parse_board_list(brd);
        }
        if let Some(userspec) = fields.get("userspec") {
            let userspec = userspec.trim();
            self.userspec = if userspec.is_empty() {
                "*".to_string()
            } else {
                userspec.to_string()
            };
        }
        if let Some(t) = fields.get("searchtype").and_then(SearchType::parse) {
            self.searchtype = t;
        }
        if let Some(sort) = fields.get("sort").and_then(SortKey::parse) {
            self.sort = sort;
        }
        for flag in ["show_complete", "subject_only"] {
            if let Some(value) = fields.get(flag) {
                self.apply_stored(flag, if parse_flag(value) { "1" } else { "0" });
            }
        }
        if let Some(topic) = fields.get("topic") {
            self.topic = topic.parse().ok().filter(|t: &TopicId| t.get() > 0);
        }
        if self.topic.is_some() {
            self.show_complete = true;
        }

        if let Some(days) = fields.get("minage").and_then(parse_days) {
            self.minage = days;
        }
        match fields.get("maxage") {
            Some(v) if v.trim().eq_ignore_ascii_case("recent") => {
                let span = sources.forum.stats()?.activity_span_days() as f64;
                let window = (span * recent_window_fraction).ceil().max(1.0);
                self.maxage = (window as u32).min(DEFAULT_MAX_AGE);
            }
            Some(v) => {
                if let Some(days) = parse_days(v) {
                    self.maxage = days;
                }
            }
            None => {}
        }
        if self.minage > self.maxage {
            std::mem::swap(&mut self.minage, &mut self.maxage);
        }

        if self.brd.is_empty() {
            self.brd = sources.forum.searchable_boards()?;
        }

        self.user_filter = Some(resolve_userspec(
            &self.userspec,
            max_user_lookup,
            sources.members,
        ));
        Ok(())
    }

    /// Every documented field with its default applied
    pub fn get(&self) -> BTreeMap<String, String> {
        [
            "search",
            "brd",
            "userspec",
            "searchtype",
            "minage",
            "maxage",
            "sort",
            "show_complete",
            "subject_only",
            "topic",
        ]
        .iter()
        .filter_map(|name| self.param(name).map(|v| (name.to_string(), v)))
        .collect()
    }

    /// One documented field, `None` for unknown names
    pub fn param(&self, name: &str) -> Option<String> {
        let value = match name {
            "search" => self.search.clone(),
            "brd" => join_boards(&self.brd),
            "userspec" => self.userspec.clone(),
            "searchtype" => self.searchtype.code().to_string(),
            "minage" => self.minage.to_string(),
            "maxage" => self.maxage.to_string(),
            "sort" => self.sort.as_str().to_string(),
            "show_complete" => u8::from(self.show_complete).to_string(),
            "subject_only" => u8::from(self.subject_only).to_string(),
            "topic" => self.topic.map(|t| t.to_string()).unwrap_or_default(),
            _ => return None,
        };
        Some(value)
    }

    /// Poster restriction
    ///
    /// After `merge` this is the resolved filter; on decoded parameters the
    /// name patterns are matched against recorded poster names.
    pub fn user_filter(&self) -> UserFilter {
        if let Some(filter) = &self.user_filter {
            return filter.clone();
        }
        let names = parse_userspec(&self.userspec);
        if names.is_empty() {
            UserFilter::Any
        } else {
            UserFilter::NamePattern(names)
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn parse_board_list(value: &str) -> BTreeSet<BoardId> {
    value
        .split(',')
        .filter_map(|b| b.parse::<BoardId>().ok())
        .filter(|b| b.get() > 0)
        .collect()
}

fn join_boards(boards: &BTreeSet<BoardId>) -> String {
    boards
        .iter()
        .map(|b| b.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// `|` would collide with the separators, `%` escapes itself
fn escape_value(value: &str) -> String {
    value.replace('%', "%25").replace('|', "%7C")
}

fn unescape_value(value: &str) -> std::result::Result<String, String> {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(pos) = rest.find('%') {
        out.push_str(&rest[..pos]);
        let code = rest.get(pos + 1..pos + 3);
        match code {
            Some("25") => out.push('%'),
            Some("7C") => out.push('|'),
            _ => return Err(format!("bad escape in {:?}", value)),
        }
        rest = &rest[pos + 3..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Split a user spec into name patterns
///
/// Double-quoted names may contain commas. `*` alone means anybody.
pub fn parse_userspec(spec: &str) -> Vec<String> {
    let spec = spec.trim();
    if spec.is_empty() || spec == "*" {
        return Vec::new();
    }

    let mut names = Vec::new();
    let mut unquoted = String::new();
    // Even pieces are outside quotes, odd pieces inside
    let mut inside = false;
    for piece in spec.split('"') {
        if inside {
            names.push(piece.to_string());
        } else {
            unquoted.push_str(piece);
            unquoted.push(',');
        }
        inside = !inside;
    }
    names.extend(unquoted.split(',').map(str::to_string));

    let mut seen = BTreeSet::new();
    names
        .into_iter()
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty() && n != "*")
        .filter(|n| seen.insert(n.to_lowercase()))
        .collect()
}

fn resolve_userspec(spec: &str, cap: usize, members: &dyn MemberDirectory) -> UserFilter {
    let names = parse_userspec(spec);
    if names.is_empty() {
        return UserFilter::Any;
    }

    match members.find_members(&names, cap.saturating_add(1)) {
        Ok(ids) if ids.len() > cap => {
            debug!(target: "boardsearch::params", matches = ids.len(), cap, "user spec too broad, matching poster names");
            UserFilter::NamePattern(names)
        }
        Ok(ids) if ids.is_empty() => UserFilter::Members {
            ids: BTreeSet::new(),
            guest_names: names,
        },
        Ok(ids) => UserFilter::Members {
            ids: ids.into_iter().filter(|id: &MemberId| !id.is_guest()).collect(),
            guest_names: names,
        },
        Err(e) => {
            warn!(target: "boardsearch::params", error = %e, "member lookup failed, matching poster names");
            UserFilter::NamePattern(names)
        }
    }
}
