//! The search controller - request-level orchestration.
//!
//! Two flows, mirroring the forum's two search screens:
//!
//! - [`SearchController::action_search`] prepares the search form, refilled
//!   from an earlier parameter token and annotated with any issues.
//! - [`SearchController::action_results`] runs a search and renders one page
//!   of results, or falls back to the form when something is wrong.
//!
//! Validation problems are collected and reported together. A backend
//! failure aborts the search and redisplays the form with the query intact.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use boardsearch_core::{
    Censor, ForumStore, MarkupRenderer, MemberDirectory, Result, ResultItem, SearchConfig,
    SearchError, SearchIssue, SearchIssues, SpellChecker, TopicId, Verifier,
};
use boardsearch_search::{
    select_api, CachedSearch, DidYouMean, MergeSources, PageIndex, PlainMarkup, ResultCache,
    ResultRenderer, SearchApi, SearchEngine, SearchParams, WeightFactors, WordCensor,
};
use tracing::{debug, info, warn};

use crate::context::{RequestContext, SessionState};

/// Template wrapped around corrected words in did-you-mean output
pub const DID_YOU_MEAN_TEMPLATE: &str = "<em><strong>{word}</strong></em>";

/// The search form, possibly redisplayed with issues.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchForm {
    /// Documented parameters with defaults applied
    pub params: BTreeMap<String, String>,
    /// Problems to show above the form
    pub issues: SearchIssues,
    /// The form must carry an anti-abuse challenge
    pub require_verification: bool,
    /// Search restricted to this topic
    pub topic: Option<TopicId>,
    /// Query length limit in characters
    pub search_string_limit: usize,
}

/// One rendered page of results.
#[derive(Debug, Clone)]
pub struct SearchResults {
    /// Display rows of this page
    pub items: Vec<ResultItem>,
    /// Page boundaries
    pub page: PageIndex,
    /// Token for pagination links and "refine search"
    pub params_token: String,
    /// Documented parameters, for the refine form
    pub params: BTreeMap<String, String>,
    /// Terms dropped for being too short
    pub ignored: Vec<String>,
    /// Spelling suggestion, when enabled and found
    pub did_you_mean: Option<DidYouMean>,
    /// Excerpts instead of full bodies
    pub compact: bool,
    /// The ranked list came from the result cache
    pub from_cache: bool,
}

/// What a results request produced.
#[derive(Debug, Clone)]
pub enum SearchOutcome {
    /// A page of results
    Results(SearchResults),
    /// Back to the form
    Form(SearchForm),
}

impl SearchOutcome {
    /// Issues when the outcome is the form.
    pub fn issues(&self) -> Option<&SearchIssues> {
        match self {
            SearchOutcome::Form(form) => Some(&form.issues),
            SearchOutcome::Results(_) => None,
        }
    }
}

/// Request-level search orchestration.
///
/// # Thread Safety
///
/// The controller is `Send + Sync` and shared by every request; it holds no
/// per-request state. The result cache is its only mutable state.
pub struct SearchController {
    config: Arc<SearchConfig>,
    forum: Arc<dyn ForumStore>,
    members: Arc<dyn MemberDirectory>,
    api: Arc<dyn SearchApi>,
    cache: Arc<ResultCache>,
    markup: Arc<dyn MarkupRenderer>,
    censor: Arc<dyn Censor>,
    verifier: Option<Arc<dyn Verifier>>,
    speller: Option<Arc<dyn SpellChecker>>,
}

impl SearchController {
    /// Create a controller with the configured backend.
    ///
    /// # Errors
    ///
    /// Fails when the configuration is invalid or the fulltext index cannot
    /// be built.
    pub fn new(
        config: Arc<SearchConfig>,
        forum: Arc<dyn ForumStore>,
        members: Arc<dyn MemberDirectory>,
    ) -> Result<Self> {
        config.validate()?;
        let api = select_api(&config, forum.clone())?;
        let cache = Arc::new(ResultCache::new(Duration::from_secs(config.cache_ttl_secs)));
        Ok(Self {
            config,
            forum,
            members,
            api,
            cache,
            markup: Arc::new(PlainMarkup),
            censor: Arc::new(WordCensor::default()),
            verifier: None,
            speller: None,
        })
    }

    /// Builder: replace the backend.
    pub fn with_api(mut self, api: Arc<dyn SearchApi>) -> Self {
        self.api = api;
        self
    }

    /// Builder: markup renderer.
    pub fn with_markup(mut self, markup: Arc<dyn MarkupRenderer>) -> Self {
        self.markup = markup;
        self
    }

    /// Builder: censor.
    pub fn with_censor(mut self, censor: Arc<dyn Censor>) -> Self {
        self.censor = censor;
        self
    }

    /// Builder: anti-abuse challenge for guests.
    pub fn with_verifier(mut self, verifier: Arc<dyn Verifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    /// Builder: spell checker for did-you-mean.
    pub fn with_spell_checker(mut self, speller: Arc<dyn SpellChecker>) -> Self {
        self.speller = Some(speller);
        self
    }

    /// Configuration in use.
    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Shared result cache.
    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    // =========================================================================
    // Form flow
    // =========================================================================

    /// Prepare the search form.
    ///
    /// A `params` token restores an earlier search; a `search` field
    /// overrides its query; a `topic` field restricts the search to a topic
    /// and forces full bodies.
    pub fn action_search(
        &self,
        ctx: &RequestContext,
        session: &SessionState,
        issues: SearchIssues,
    ) -> SearchForm {
        let mut params = ctx
            .fields
            .get("params")
            .map(SearchParams::decode)
            .unwrap_or_default();
        if let Some(search) = ctx.fields.get("search") {
            params.search = search.trim().to_string();
        }
        if let Some(topic) = ctx
            .fields
            .get("topic")
            .and_then(|t| t.trim().parse::<TopicId>().ok())
            .filter(|t| t.get() > 0)
        {
            params.topic = Some(topic);
            params.show_complete = true;
        }

        SearchForm {
            params: params.get(),
            issues,
            require_verification: self.needs_challenge(ctx, session),
            topic: params.topic,
            search_string_limit: self.config.search_string_limit,
        }
    }

    fn needs_challenge(&self, ctx: &RequestContext, session: &SessionState) -> bool {
        ctx.requester.is_guest() && self.config.enable_captcha && !session.verification_passed
    }

    // =========================================================================
    // Results flow
    // =========================================================================

    /// Run a search and render the requested page.
    ///
    /// Every validation problem sends the requester back to the form;
    /// so does a backend failure. Storage failures while rendering the page
    /// are returned as errors.
    pub fn action_results(
        &self,
        ctx: &RequestContext,
        session: &mut SessionState,
    ) -> Result<SearchOutcome> {
        let requester = &ctx.requester;
        let mut engine =
            SearchEngine::new(self.config.clone(), self.forum.clone(), self.members.clone());
        engine.set_weights(WeightFactors::from_config(
            &self.config.weights,
            !requester.is_guest(),
        ));

        let mut params = ctx
            .fields
            .get("params")
            .map(SearchParams::decode)
            .unwrap_or_default();
        let sources = MergeSources {
            forum: self.forum.as_ref(),
            members: self.members.as_ref(),
        };
        if let Err(e) = params.merge(
            &ctx.fields,
            self.config.recent_window_fraction,
            self.config.max_members_to_search,
            &sources,
        ) {
            warn!(target: "boardsearch::controller", error = %e, "could not merge search parameters");
            return Ok(self.back_to_form(ctx, session, params, e.issue()));
        }
        engine.set_params(params, self.config.simple_fulltext);

        let mut issues = engine.validate()?;

        let did_you_mean = self.speller.as_ref().and_then(|speller| {
            engine.load_suggestions(speller.as_ref(), self.censor.as_ref(), DID_YOU_MEAN_TEMPLATE)
        });

        self.control_verifications(ctx, session, engine.params().search.as_str(), &mut issues);

        if !issues.is_empty() {
            debug!(target: "boardsearch::controller", issues = ?issues.keys(), "search rejected");
            return Ok(SearchOutcome::Form(self.form_for(
                ctx,
                session,
                engine.params(),
                issues,
            )));
        }

        // Remember the query so its pages can be browsed
        session.last_search = Some(engine.params().search.clone());

        let key = ResultCache::key_for(requester);
        let token = engine.params().compile_url_params();
        let from_cache = match self.cache.get(&key, &token) {
            Some(cached) => {
                engine.restore_results(cached.results)?;
                true
            }
            None => {
                let ranked = match engine.search_query(self.api.as_ref()) {
                    Ok(ranked) => ranked,
                    Err(e) => {
                        let params = engine.params().clone();
                        return Ok(self.back_to_form(ctx, session, params, e.issue()));
                    }
                };
                // Search complete: the previous entry is replaced, never left to expire
                self.cache.replace(&key, CachedSearch::new(token.clone(), ranked));
                false
            }
        };

        if engine.get_num_results() == 0
            && !engine.criteria().age_range.is_unbounded()
            && engine.no_messages()?
        {
            let params = engine.params().clone();
            return Ok(self.back_to_form(
                ctx,
                session,
                params,
                SearchIssue::NoMessagesInTimeFrame,
            ));
        }

        let page = engine.page(ctx.start());
        let renderer =
            ResultRenderer::new(self.config.clone(), self.markup.clone(), self.censor.clone());
        let items = renderer.render_page(
            &mut engine,
            &page,
            requester,
            &ctx.permissions,
            ctx.quick_mod,
        )?;

        info!(
            target: "boardsearch::controller",
            requester = %requester.identity(),
            results = engine.get_num_results(),
            page = page.current_page(),
            from_cache,
            "search results rendered"
        );

        Ok(SearchOutcome::Results(SearchResults {
            items,
            page,
            params_token: token,
            params: engine.params().get(),
            ignored: engine.ignored().to_vec(),
            did_you_mean,
            compact: engine.is_compact(),
            from_cache,
        }))
    }

    /// Guest challenge: asked once per session, skipped when browsing the
    /// pages of the query the session already ran.
    fn control_verifications(
        &self,
        ctx: &RequestContext,
        session: &mut SessionState,
        search: &str,
        issues: &mut SearchIssues,
    ) {
        if !self.needs_challenge(ctx, session) || session.is_repeat_of(search) {
            return;
        }
        if !ctx.from_verification_form() {
            issues.insert(SearchError::VerificationRequired.issue());
            return;
        }
        let errors = match &self.verifier {
            Some(verifier) => verifier.verify(ctx.fields.as_map()),
            None => Vec::new(),
        };
        if errors.is_empty() {
            session.verification_passed = true;
        } else {
            issues.extend(errors.into_iter().map(SearchIssue::VerificationFailed));
        }
    }

    fn back_to_form(
        &self,
        ctx: &RequestContext,
        session: &SessionState,
        params: SearchParams,
        issue: SearchIssue,
    ) -> SearchOutcome {
        let mut issues = SearchIssues::new();
        issues.insert(issue);
        SearchOutcome::Form(self.form_for(ctx, session, &params, issues))
    }

    fn form_for(
        &self,
        ctx: &RequestContext,
        session: &SessionState,
        params: &SearchParams,
        issues: SearchIssues,
    ) -> SearchForm {
        SearchForm {
            params: params.get(),
            issues,
            require_verification: self.needs_challenge(ctx, session),
            topic: params.topic,
            search_string_limit: self.config.search_string_limit,
        }
    }
}
