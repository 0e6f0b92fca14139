//! Search backend contract
//!
//! A [`SearchApi`] selects candidate messages for a [`SearchCriteria`]. Two
//! implementations ship with this crate:
//! - [`StandardApi`](crate::scan::StandardApi): scans every message in scope
//! - [`FulltextApi`](crate::index::FulltextApi): narrows through the word index
//!
//! Both verify candidates with the same [`TermMatcher`], so they honour
//! identical criteria semantics and return identical results.

use std::sync::Arc;
use std::time::{Duration, Instant};

use boardsearch_core::{
    ApiResult, Candidate, ForumStore, Message, Result, SearchConfig, SearchCriteria, SearchError,
    SearchIndexKind, Topic, TopicId,
};
use rustc_hash::FxHashMap;

use crate::index::{FulltextApi, InvertedIndex};
use crate::matcher::{criteria_admits, TermMatcher};
use crate::scan::StandardApi;

/// Pluggable candidate retrieval
///
/// # Errors
///
/// Any failure, including an expired deadline, is reported as
/// `SearchError::BackendUnavailable`; partial results are never returned.
pub trait SearchApi: Send + Sync {
    /// Select candidates for the criteria
    fn execute(&self, criteria: &SearchCriteria) -> Result<ApiResult>;

    /// Backend name for logging
    fn name(&self) -> &str;
}

/// Build the backend the configuration asks for
///
/// The fulltext backend starts from an index built over the store's current
/// content and keeps it in step with the store's revision.
pub fn select_api(
    config: &SearchConfig,
    forum: Arc<dyn ForumStore>,
) -> Result<Arc<dyn SearchApi>> {
    Ok(match config.index {
        SearchIndexKind::Standard => Arc::new(StandardApi::new(forum)),
        SearchIndexKind::Fulltext => {
            let api = FulltextApi::new(forum, Arc::new(InvertedIndex::new()));
            api.sync()?;
            Arc::new(api)
        }
    })
}

// ============================================================================
// Shared candidate collection
// ============================================================================

/// Deadline for one backend call
#[derive(Debug, Clone, Copy)]
pub(crate) struct Deadline {
    expires: Instant,
    budget_ms: u64,
}

impl Deadline {
    pub(crate) fn start(budget_ms: u64) -> Self {
        Deadline {
            expires: Instant::now() + Duration::from_millis(budget_ms),
            budget_ms,
        }
    }

    pub(crate) fn check(&self) -> Result<()> {
        if Instant::now() > self.expires {
            Err(SearchError::backend(format!(
                "search exceeded {} ms deadline",
                self.budget_ms
            )))
        } else {
            Ok(())
        }
    }
}

/// Filters, matches and caps messages offered in newest-first order
pub(crate) struct CandidateCollector<'a> {
    criteria: &'a SearchCriteria,
    matcher: TermMatcher,
    forum: &'a dyn ForumStore,
    topics: FxHashMap<TopicId, Option<Topic>>,
    deadline: Deadline,
    result: ApiResult,
    failure: Option<SearchError>,
}

impl<'a> CandidateCollector<'a> {
    pub(crate) fn new(criteria: &'a SearchCriteria, forum: &'a dyn ForumStore) -> Result<Self> {
        Ok(CandidateCollector {
            criteria,
            matcher: TermMatcher::from_criteria(criteria)?,
            forum,
            topics: FxHashMap::default(),
            deadline: Deadline::start(criteria.timeout_ms),
            result: ApiResult::default(),
            failure: None,
        })
    }

    /// Offer one message; returns `false` once collection must stop
    pub(crate) fn offer(&mut self, message: &Message) -> bool {
        if let Err(e) = self.deadline.check() {
            self.failure = Some(e);
            return false;
        }
        if !criteria_admits(self.criteria, message) {
            return true;
        }
        let hits = match self.matcher.evaluate(&message.subject, &message.body) {
            Some(hits) => hits,
            None => return true,
        };

        self.result.total_count += 1;
        if self.result.candidates.len() >= self.criteria.result_cap {
            return true;
        }

        let topic = match self.topic(message.topic_id) {
            Ok(topic) => topic,
            Err(e) => {
                self.failure = Some(SearchError::backend(e.to_string()));
                return false;
            }
        };
        self.result.candidates.push(Candidate {
            message_id: message.id,
            topic_id: message.topic_id,
            board_id: message.board_id,
            poster_id: message.poster_id,
            posted_at: message.posted_at,
            is_sticky: topic.as_ref().map_or(false, |t| t.is_sticky),
            is_first_message: topic.as_ref().map_or(false, |t| t.first_message_id == message.id),
            topic_replies: topic.as_ref().map_or(0, |t| t.num_replies),
            subject_hits: hits.subject,
            body_hits: hits.body,
        });
        true
    }

    fn topic(&mut self, id: TopicId) -> Result<Option<Topic>> {
        if let Some(topic) = self.topics.get(&id) {
            return Ok(topic.clone());
        }
        let topic = self.forum.topic(id)?;
        self.topics.insert(id, topic.clone());
        Ok(topic)
    }

    pub(crate) fn finish(self) -> Result<ApiResult> {
        match self.failure {
            Some(e) => Err(e),
            None => Ok(self.result),
        }
    }
}

/// Map a storage failure into the backend taxonomy
pub(crate) fn unavailable(e: SearchError) -> SearchError {
    match e {
        SearchError::BackendUnavailable { .. } => e,
        other => SearchError::backend(other.to_string()),
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use boardsearch_core::{AgeRange, BoardId};

    fn both(forum: Arc<crate::store::MemoryForum>) -> Vec<Arc<dyn SearchApi>> {
        let standard = SearchConfig::default();
        let fulltext = SearchConfig {
            index: SearchIndexKind::Fulltext,
            ..SearchConfig::default()
        };
        vec![
            select_api(&standard, forum.clone()).unwrap(),
            select_api(&fulltext, forum).unwrap(),
        ]
    }

    #[test]
    fn test_select_api_by_config() {
        let forum = Arc::new(sample_forum());
        let apis = both(forum);
        assert_eq!(apis[0].name(), "standard");
        assert_eq!(apis[1].name(), "fulltext");
    }

    #[test]
    fn test_backends_agree_on_criteria() {
        let forum = Arc::new(sample_forum());
        let mut cases = vec![
            criteria(&["rust"]),
            criteria(&["rust", "borrow"]),
            criteria(&[".net"]),
            criteria(&["comp*"]),
        ];
        let mut excluded = criteria(&["rust"]);
        excluded.excluded_words = vec!["bike".to_string()];
        cases.push(excluded);
        let mut phrase = criteria(&[]);
        phrase.phrases = vec!["borrow checker".to_string()];
        cases.push(phrase);
        let mut scoped = criteria(&["rust"]);
        scoped.board_scope = [BoardId(2)].into_iter().collect();
        cases.push(scoped);
        let mut subject = criteria(&["rust"]);
        subject.subject_only = true;
        cases.push(subject);

        for c in &cases {
            let results: Vec<ApiResult> = both(forum.clone())
                .iter()
                .map(|api| api.execute(c).unwrap())
                .collect();
            assert_eq!(results[0], results[1], "criteria {:?}", c);
        }
    }

    #[test]
    fn test_age_filter_excludes_strong_match() {
        let forum = Arc::new(sample_forum());
        let mut c = criteria(&["rust"]);
        c.age_range = AgeRange {
            min_days: 0,
            max_days: 30,
        };
        for api in both(forum.clone()) {
            let result = api.execute(&c).unwrap();
            assert!(!ids(&result).contains(&5));
            assert_eq!(ids(&result), vec![4, 3, 2, 1]);
        }
    }

    #[test]
    fn test_cap_keeps_total() {
        let forum = Arc::new(sample_forum());
        let mut c = criteria(&["rust"]);
        c.result_cap = 2;
        for api in both(forum.clone()) {
            let result = api.execute(&c).unwrap();
            assert_eq!(result.candidates.len(), 2);
            assert_eq!(result.total_count, 5);
        }
    }

    #[test]
    fn test_storage_failure_is_backend_unavailable() {
        let forum = Arc::new(sample_forum());
        let apis = both(forum.clone());
        forum.fail_reads(true);
        for api in apis {
            let err = api.execute(&criteria(&["rust"])).unwrap_err();
            assert!(matches!(err, SearchError::BackendUnavailable { .. }));
        }
    }

    #[test]
    fn test_expired_deadline() {
        let deadline = Deadline::start(0);
        std::thread::sleep(Duration::from_millis(2));
        let err = deadline.check().unwrap_err();
        assert!(matches!(err, SearchError::BackendUnavailable { .. }));
        assert!(Deadline::start(60_000).check().is_ok());
    }

    #[test]
    fn test_candidate_signals() {
        let forum = Arc::new(sample_forum());
        forum.set_sticky(TopicId(1), true);
        let result = StandardApi::new(forum).execute(&criteria(&["borrow"])).unwrap();
        let first = &result.candidates[1];
        assert_eq!(first.message_id.get(), 1);
        assert!(first.is_first_message);
        assert!(first.is_sticky);
        assert_eq!(first.topic_replies, 1);
        assert_eq!(first.subject_hits, 1);
        assert_eq!(first.body_hits, 0);
        assert!(!result.candidates[0].is_first_message);
    }
}
