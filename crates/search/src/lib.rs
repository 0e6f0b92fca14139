//! Forum search pipeline
//!
//! This crate provides:
//! - SearchParams: request parameters, token encoding and merge
//! - Tokenizer: query grammar into phrases, required and excluded words
//! - WeightFactors and WeightedScorer: relevance ranking
//! - SearchApi: pluggable backends (StandardApi scan, FulltextApi index)
//! - SearchEngine: one request's lifecycle from params to ranked pages
//! - ResultCache and PageIndex: pagination of a ranked list
//! - ResultRenderer: censored, highlighted display rows
//!
//! # Usage
//!
//! ```ignore
//! let mut engine = SearchEngine::new(config, forum.clone(), forum.clone());
//! engine.set_weights(WeightFactors::from_config(&config.weights, true));
//! engine.set_params(params, config.simple_fulltext);
//! let issues = engine.validate()?;
//! let ranked = engine.search_query(api.as_ref())?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod api;
pub mod cache;
pub mod engine;
pub mod highlight;
pub mod index;
pub mod matcher;
pub mod pagination;
pub mod params;
pub mod render;
pub mod scan;
pub mod scorer;
pub mod store;
pub mod suggest;
pub mod tokenizer;
pub mod weights;

// Re-export commonly used types
pub use api::{select_api, SearchApi};
pub use cache::{CachedSearch, ResultCache, CACHE_KEY_PREFIX};
pub use engine::{EngineState, SearchEngine};
pub use highlight::{escape_html, excerpt, highlight_body, highlight_subject};
pub use index::{FulltextApi, InvertedIndex, PostingEntry, PostingList};
pub use matcher::TermMatcher;
pub use pagination::PageIndex;
pub use params::{MergeSources, RequestFields, SearchParams, SearchType, SortKey};
pub use render::{BoardPermissions, PlainMarkup, ResultRenderer, RowContext, WordCensor};
pub use scan::StandardApi;
pub use scorer::{rank_candidates, Scorer, ScorerContext, WeightedScorer, MAX_RELEVANCE};
pub use store::MemoryForum;
pub use suggest::{DidYouMean, VocabularySpeller};
pub use tokenizer::{parse_query, tokenize, tokenize_unique, QueryOptions, SearchTerms};
pub use weights::WeightFactors;
