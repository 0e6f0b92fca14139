//! Relevance scoring
//!
//! This module provides:
//! - Scorer trait for pluggable scoring algorithms
//! - ScorerContext for candidate-set statistics
//! - WeightedScorer default implementation
//! - rank_candidates: score, order, truncate, re-sort
//!
//! Relevance is a weighted mean of signals in `[0, 1]`, scaled to
//! `0..=1000`, so it stays comparable when coefficients change.

use boardsearch_core::{Candidate, RankedMessage, TopicId};
use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use std::cmp::Ordering;

use crate::params::SortKey;
use crate::weights::WeightFactors;

/// Upper bound of the relevance scale
pub const MAX_RELEVANCE: f64 = 1000.0;

// ============================================================================
// ScorerContext
// ============================================================================

/// Statistics over the whole candidate set
///
/// Built once per search, before any candidate is scored.
#[derive(Debug, Clone)]
pub struct ScorerContext {
    /// Reference time for recency
    pub now: DateTime<Utc>,
    /// Positive terms in the query
    pub term_count: usize,
    /// Age, in days, at which recency drops to one half
    pub recent_window_days: f64,
    /// Topics with more replies get no frequency credit
    pub humungous_topic_posts: u32,
    /// Matching candidates per topic
    pub topic_matches: FxHashMap<TopicId, u32>,
}

impl ScorerContext {
    /// Create a context for a query with `term_count` positive terms
    pub fn new(now: DateTime<Utc>, term_count: usize) -> Self {
        ScorerContext {
            now,
            term_count,
            recent_window_days: 30.0,
            humungous_topic_posts: 200,
            topic_matches: FxHashMap::default(),
        }
    }

    /// Builder: set the recency half-life
    pub fn with_recent_window(mut self, days: f64) -> Self {
        self.recent_window_days = days.max(1.0);
        self
    }

    /// Builder: set the large-topic threshold
    pub fn with_humungous_topic_posts(mut self, posts: u32) -> Self {
        self.humungous_topic_posts = posts;
        self
    }

    /// Count matching candidates per topic
    pub fn count_topics<'a>(&mut self, candidates: impl IntoIterator<Item = &'a Candidate>) {
        for c in candidates {
            *self.topic_matches.entry(c.topic_id).or_insert(0) += 1;
        }
    }

    /// Recency in `[0, 1]`, decaying monotonically with age
    pub fn recency(&self, posted_at: DateTime<Utc>) -> f64 {
        let age_days = (self.now - posted_at).num_seconds().max(0) as f64 / 86_400.0;
        1.0 / (1.0 + age_days / self.recent_window_days)
    }

    /// Matching share of a topic in `[0, 1]`
    pub fn frequency(&self, candidate: &Candidate) -> f64 {
        if candidate.topic_replies > self.humungous_topic_posts {
            return 0.0;
        }
        let matches = self
            .topic_matches
            .get(&candidate.topic_id)
            .copied()
            .unwrap_or(1);
        (f64::from(matches) / f64::from(candidate.topic_replies + 1)).min(1.0)
    }
}

// ============================================================================
// Scorer Trait
// ============================================================================

/// Pluggable scoring interface
///
/// Higher scores indicate more relevant messages.
pub trait Scorer: Send + Sync {
    /// Score a candidate on the `0..=1000` scale
    fn score(&self, candidate: &Candidate, ctx: &ScorerContext) -> f64;

    /// Name for debugging and logging
    fn name(&self) -> &str;
}

// ============================================================================
// WeightedScorer
// ============================================================================

/// Weighted mean of the ranking signals
///
/// ```text
/// relevance = 1000 * Σ(weight_i * signal_i) / Σ weight_i
/// ```
///
/// Signals: subject hits / terms, body hits / terms, topic frequency,
/// recency, first message, sticky.
#[derive(Debug, Clone, Copy)]
pub struct WeightedScorer {
    weights: WeightFactors,
}

impl WeightedScorer {
    /// Create a scorer with fixed coefficients
    pub fn new(weights: WeightFactors) -> Self {
        WeightedScorer { weights }
    }

    /// Coefficients in use
    pub fn weights(&self) -> &WeightFactors {
        &self.weights
    }
}

impl Scorer for WeightedScorer {
    fn score(&self, candidate: &Candidate, ctx: &ScorerContext) -> f64 {
        let w = &self.weights;
        let total = w.total();
        if total <= 0.0 {
            return 0.0;
        }

        let terms = ctx.term_count.max(1) as f64;
        let share = |hits: u32| (f64::from(hits) / terms).min(1.0);
        let flag = |b: bool| if b { 1.0 } else { 0.0 };

        let sum = w.subject * share(candidate.subject_hits)
            + w.body * share(candidate.body_hits)
            + w.frequency * ctx.frequency(candidate)
            + w.age * ctx.recency(candidate.posted_at)
            + w.first_message * flag(candidate.is_first_message)
            + w.sticky * flag(candidate.is_sticky);

        (MAX_RELEVANCE * sum / total).clamp(0.0, MAX_RELEVANCE)
    }

    fn name(&self) -> &str {
        "weighted"
    }
}

// ============================================================================
// Ranking
// ============================================================================

/// Total order on ranked messages: relevance desc, posted_at desc, id asc
pub fn relevance_order(a: &RankedMessage, b: &RankedMessage) -> Ordering {
    b.relevance
        .total_cmp(&a.relevance)
        .then_with(|| b.posted_at.cmp(&a.posted_at))
        .then_with(|| a.message_id.cmp(&b.message_id))
}

/// Score, order and truncate candidates
///
/// Relevance always decides which messages survive the cap; `sort` only
/// reorders the survivors.
pub fn rank_candidates(
    candidates: &[Candidate],
    scorer: &dyn Scorer,
    ctx: &ScorerContext,
    cap: usize,
    sort: SortKey,
) -> Vec<RankedMessage> {
    let mut ranked: Vec<RankedMessage> = candidates
        .iter()
        .map(|c| RankedMessage {
            message_id: c.message_id,
            topic_id: c.topic_id,
            board_id: c.board_id,
            poster_id: c.poster_id,
            posted_at: c.posted_at,
            is_sticky: c.is_sticky,
            relevance: scorer.score(c, ctx),
        })
        .collect();

    ranked.sort_by(relevance_order);
    ranked.truncate(cap);

    match sort {
        SortKey::Relevance => {}
        SortKey::Date => ranked.sort_by(|a, b| {
            b.posted_at
                .cmp(&a.posted_at)
                .then_with(|| a.message_id.cmp(&b.message_id))
        }),
        // Stable: relevance order within a board
        SortKey::Board => ranked.sort_by_key(|r| r.board_id),
    }
    ranked
}

// ============================================================================
// Tests
// ============================================================================
