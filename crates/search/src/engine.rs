//! Search engine: one request's lifecycle
//!
//! ```text
//! Unconfigured -> ParamsSet -> Validated -> Executed -> Rendered
//! ```
//!
//! The engine tokenizes the query, asks a [`SearchApi`] for candidates,
//! ranks them and serves pages of the ranked list. One engine serves exactly
//! one request; nothing in it is shared across requests.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;

use boardsearch_core::{
    AgeRange, Board, BoardId, Censor, ForumStore, InvalidReason, MemberDirectory, MemberId, Message,
    RankedMessage, Requester, Result, SearchConfig, SearchCriteria, SearchError, SearchIssue,
    SearchIssues, SpellChecker, Topic, TopicId,
};
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::api::SearchApi;
use crate::matcher::criteria_admits;
use crate::pagination::PageIndex;
use crate::params::{SearchParams, SearchType};
use crate::scorer::{rank_candidates, ScorerContext, WeightedScorer};
use crate::suggest::{did_you_mean, DidYouMean};
use crate::tokenizer::{parse_query, QueryOptions, SearchTerms};
use crate::weights::WeightFactors;

/// Lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Nothing set yet
    Unconfigured,
    /// Parameters set and tokenized
    ParamsSet,
    /// Validation passed
    Validated,
    /// Ranked results available
    Executed,
    /// Results handed to the renderer
    Rendered,
}

impl EngineState {
    /// State name for errors and logs
    pub fn as_str(self) -> &'static str {
        match self {
            EngineState::Unconfigured => "unconfigured",
            EngineState::ParamsSet => "params_set",
            EngineState::Validated => "validated",
            EngineState::Executed => "executed",
            EngineState::Rendered => "rendered",
        }
    }
}

/// Search engine for a single request
pub struct SearchEngine {
    config: Arc<SearchConfig>,
    forum: Arc<dyn ForumStore>,
    members: Arc<dyn MemberDirectory>,
    state: EngineState,
    weights: Option<WeightFactors>,
    params: SearchParams,
    terms: SearchTerms,
    now: DateTime<Utc>,
    results: Vec<RankedMessage>,
    total_matches: usize,
}

impl SearchEngine {
    /// Create an engine over the forum's collaborators
    pub fn new(
        config: Arc<SearchConfig>,
        forum: Arc<dyn ForumStore>,
        members: Arc<dyn MemberDirectory>,
    ) -> Self {
        SearchEngine {
            config,
            forum,
            members,
            state: EngineState::Unconfigured,
            weights: None,
            params: SearchParams::default(),
            terms: SearchTerms::default(),
            now: Utc::now(),
            results: Vec::new(),
            total_matches: 0,
        }
    }

    /// Builder: fix the reference time for age filters and recency
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    /// Current lifecycle state
    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Configuration in use
    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    fn expect_state(&self, allowed: &[EngineState], expected: &'static str) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(SearchError::InvalidState {
                expected,
                actual: self.state.as_str(),
            })
        }
    }

    // ========================================================================
    // Configuration
    // ========================================================================

    /// Set relevance coefficients
    pub fn set_weights(&mut self, weights: WeightFactors) {
        self.weights = Some(weights);
    }

    /// Set parameters and tokenize the query
    ///
    /// `simple_fulltext` selects the reduced grammar without phrases or
    /// exclusions.
    pub fn set_params(&mut self, params: SearchParams, simple_fulltext: bool) {
        let opts = QueryOptions {
            min_word_length: self.config.min_word_length,
            max_terms: self.config.max_search_terms,
            stop_words: &self.config.stop_words,
            simple: simple_fulltext,
            wildcards: params.searchtype == SearchType::ExtendedWildcard,
        };
        self.terms = parse_query(&params.search, &opts);
        self.params = params;
        self.results.clear();
        self.total_matches = 0;
        self.state = EngineState::ParamsSet;
    }

    /// Parameters in use
    pub fn params(&self) -> &SearchParams {
        &self.params
    }

    // ========================================================================
    // Terms
    // ========================================================================

    /// Positive terms: phrases, then required words
    ///
    /// Empty when nothing searchable was entered; callers check
    /// [`SearchEngine::search_terms`] for the reason.
    pub fn search_array(&self) -> Vec<String> {
        self.terms.search_array()
    }

    /// Every extracted term set
    pub fn search_terms(&self) -> &SearchTerms {
        &self.terms
    }

    /// Terms dropped for being too short
    pub fn ignored(&self) -> &[String] {
        &self.terms.ignored
    }

    /// Words that must not appear
    pub fn excluded_words(&self) -> &[String] {
        &self.terms.excluded_words
    }

    /// True when every candidate word was stop-listed
    pub fn found_blacklisted_words(&self) -> bool {
        self.terms.found_blacklisted_words()
    }

    /// Check the query; moves to `Validated` when no issue is found
    pub fn validate(&mut self) -> Result<SearchIssues> {
        self.expect_state(&[EngineState::ParamsSet, EngineState::Validated], "params_set")?;

        let mut issues = SearchIssues::new();
        let length = self.params.search.chars().count();
        let limit = self.config.search_string_limit;
        if length > limit {
            issues.insert(SearchError::QueryTooLong { length, limit }.issue());
        }
        if let Some(reason) = self.terms.invalid_reason() {
            issues.insert(SearchError::InvalidQuery { reason }.issue());
        }
        if issues.is_empty() {
            self.state = EngineState::Validated;
        }
        Ok(issues)
    }

    // ========================================================================
    // Execution
    // ========================================================================

    /// Criteria handed to the backend
    pub fn criteria(&self) -> SearchCriteria {
        SearchCriteria {
            required_words: self.terms.required_words.clone(),
            excluded_words: self.terms.excluded_words.clone(),
            phrases: self.terms.phrases.clone(),
            board_scope: self.params.brd.clone(),
            topic: self.params.topic,
            user_filter: self.params.user_filter(),
            age_range: self.age_range(),
            subject_only: self.params.subject_only,
            result_cap: self.config.max_message_results(),
            timeout_ms: self.config.backend_timeout_ms,
            now: self.now,
        }
    }

    fn age_range(&self) -> AgeRange {
        AgeRange {
            min_days: self.params.minage.min(self.params.maxage),
            max_days: self.params.maxage.max(self.params.minage),
        }
    }

    fn recent_window_days(&self) -> Result<f64> {
        let span = self.forum.stats()?.activity_span_days() as f64;
        Ok((span * self.config.recent_window_fraction).ceil().max(1.0))
    }

    /// Run the query and rank the candidates
    ///
    /// # Errors
    ///
    /// - `InvalidQuery` when no searchable term is left
    /// - `BackendUnavailable` when the backend fails; no partial result is kept
    pub fn search_query(&mut self, api: &dyn SearchApi) -> Result<Vec<RankedMessage>> {
        self.expect_state(&[EngineState::ParamsSet, EngineState::Validated], "validated")?;
        if self.terms.is_empty() {
            let reason = self.terms.invalid_reason().unwrap_or(InvalidReason::Empty);
            return Err(SearchError::InvalidQuery { reason });
        }

        let started = Instant::now();
        let criteria = self.criteria();
        let fail = |e: SearchError| {
            warn!(target: "boardsearch::engine", backend = api.name(), error = %e, "search backend failed");
            match e {
                SearchError::BackendUnavailable { .. } => e,
                other => SearchError::backend(other.to_string()),
            }
        };

        let found = api.execute(&criteria).map_err(fail)?;
        let recent_window = self.recent_window_days().map_err(fail)?;

        let weights = self
            .weights
            .unwrap_or_else(|| WeightFactors::from_config(&self.config.weights, false));
        let mut ctx = ScorerContext::new(self.now, self.terms.search_array().len())
            .with_recent_window(recent_window)
            .with_humungous_topic_posts(self.config.humungous_topic_posts);
        ctx.count_topics(found.candidates.iter());

        self.results = rank_candidates(
            &found.candidates,
            &WeightedScorer::new(weights),
            &ctx,
            self.config.max_message_results(),
            self.params.sort,
        );
        self.total_matches = found.total_count;
        self.state = EngineState::Executed;

        info!(
            target: "boardsearch::engine",
            backend = api.name(),
            terms = ctx.term_count,
            matches = found.total_count,
            kept = self.results.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "search complete"
        );
        Ok(self.results.clone())
    }

    /// Reuse a ranked list from an earlier request (pagination)
    pub fn restore_results(&mut self, results: Vec<RankedMessage>) -> Result<()> {
        self.expect_state(&[EngineState::ParamsSet, EngineState::Validated], "validated")?;
        self.total_matches = results.len();
        self.results = results;
        self.state = EngineState::Executed;
        Ok(())
    }

    /// Ranked results
    pub fn results(&self) -> &[RankedMessage] {
        &self.results
    }

    /// Number of ranked results
    pub fn get_num_results(&self) -> usize {
        self.results.len()
    }

    /// Matches the backend reported before any cap
    pub fn total_matches(&self) -> usize {
        self.total_matches
    }

    /// Excerpts instead of full bodies
    pub fn is_compact(&self) -> bool {
        !self.params.show_complete
    }

    /// Page boundaries for a start offset
    pub fn page(&self, start: usize) -> PageIndex {
        PageIndex::new(self.results.len(), self.config.results_per_page, start)
    }

    /// Best-effort did-you-mean; every failure is swallowed
    pub fn load_suggestions(
        &self,
        checker: &dyn SpellChecker,
        censor: &dyn Censor,
        template: &str,
    ) -> Option<DidYouMean> {
        if !self.config.enable_spell_checking {
            return None;
        }
        match did_you_mean(&self.terms, &self.params, checker, censor, template) {
            Ok(suggestion) => suggestion,
            Err(e) => {
                debug!(target: "boardsearch::engine", error = %e, "spelling suggestions unavailable");
                None
            }
        }
    }

    // ========================================================================
    // Page data
    // ========================================================================

    /// Messages of one page, in ranked order
    ///
    /// Messages deleted since ranking are skipped.
    pub fn load_messages_request(
        &self,
        page: &PageIndex,
    ) -> Result<Vec<(RankedMessage, Message)>> {
        self.expect_state(&[EngineState::Executed, EngineState::Rendered], "executed")?;
        let slice = &self.results[page.range()];
        let ids: Vec<_> = slice.iter().map(|r| r.message_id).collect();
        let mut by_id: BTreeMap<_, _> = self
            .forum
            .messages(&ids)?
            .into_iter()
            .map(|m| (m.id, m))
            .collect();
        Ok(slice
            .iter()
            .filter_map(|r| by_id.remove(&r.message_id).map(|m| (r.clone(), m)))
            .collect())
    }

    /// Display names of posters
    pub fn load_posters(&self, posters: &[MemberId]) -> Result<BTreeMap<MemberId, String>> {
        let ids: Vec<MemberId> = posters
            .iter()
            .copied()
            .filter(|id| !id.is_guest())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if ids.is_empty() {
            return Ok(BTreeMap::new());
        }
        self.members.member_names(&ids)
    }

    /// Topics of the given ids; missing topics are skipped
    pub fn load_topics(&self, topics: &[TopicId]) -> Result<BTreeMap<TopicId, Topic>> {
        let mut out = BTreeMap::new();
        for id in topics.iter().copied().collect::<BTreeSet<_>>() {
            if let Some(topic) = self.forum.topic(id)? {
                out.insert(id, topic);
            }
        }
        Ok(out)
    }

    /// Boards of the given ids; missing boards are skipped
    pub fn load_boards(&self, boards: &[BoardId]) -> Result<BTreeMap<BoardId, Board>> {
        let mut out = BTreeMap::new();
        for id in boards.iter().copied().collect::<BTreeSet<_>>() {
            if let Some(board) = self.forum.board(id)? {
                out.insert(id, board);
            }
        }
        Ok(out)
    }

    /// Topics among `topics` the requester has posted in
    pub fn get_participants(
        &self,
        requester: &Requester,
        topics: &[TopicId],
    ) -> Result<BTreeSet<TopicId>> {
        if !self.config.enable_participation || requester.is_guest() || topics.is_empty() {
            return Ok(BTreeSet::new());
        }
        self.forum.topics_participated(requester.id, topics)
    }

    /// True when no message at all falls inside the age range and board scope
    pub fn no_messages(&self) -> Result<bool> {
        let mut widened = self.criteria();
        widened.user_filter = boardsearch_core::UserFilter::Any;
        widened.topic = None;
        let mut found = false;
        self.forum.scan_messages(&mut |message| {
            found = criteria_admits(&widened, message);
            !found
        })?;
        Ok(!found)
    }

    /// Hand-off to the renderer is complete
    pub fn mark_rendered(&mut self) -> Result<()> {
        self.expect_state(&[EngineState::Executed, EngineState::Rendered], "executed")?;
        self.state = EngineState::Rendered;
        Ok(())
    }
}
