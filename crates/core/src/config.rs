//! Search configuration via `boardsearch.toml`
//!
//! Every field has a default, so an empty file is a valid configuration.
//! The configuration is read once and shared read-only (behind an `Arc`)
//! by every stage of a request.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Result, SearchError};

/// Config file name
pub const CONFIG_FILE_NAME: &str = "boardsearch.toml";

/// Which backend executes queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchIndexKind {
    /// Substring scan over every message in scope
    #[default]
    Standard,
    /// Word index narrows candidates before verification
    Fulltext,
}

/// Relevance coefficients, one per ranking signal
///
/// Each coefficient is a non-negative weight; the relevance of a message is
/// the weighted mean of its signals scaled to 0..=1000.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightConfig {
    /// Matching messages in the topic relative to its size
    pub frequency: f64,
    /// How recent the message is
    pub age: f64,
    /// Share of terms found in the body
    pub body: f64,
    /// Share of terms found in the subject
    pub subject: f64,
    /// Bonus for the opening message of a topic
    pub first_message: f64,
    /// Bonus for sticky topics
    pub sticky: f64,
}

impl Default for WeightConfig {
    fn default() -> Self {
        WeightConfig {
            frequency: 30.0,
            age: 25.0,
            body: 20.0,
            subject: 15.0,
            first_message: 10.0,
            sticky: 0.0,
        }
    }
}

impl WeightConfig {
    /// Sum of every coefficient
    pub fn total(&self) -> f64 {
        self.frequency + self.age + self.body + self.subject + self.first_message + self.sticky
    }
}

/// Search configuration loaded from `boardsearch.toml`.
///
/// # Example
///
/// ```toml
/// index = "fulltext"
/// min_word_length = 3
/// excerpt_chars = 50
///
/// [weights]
/// subject = 25
/// sticky = 5
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Backend used to execute queries
    pub index: SearchIndexKind,
    /// Reduced tokenizer without phrase or exclusion parsing
    pub simple_fulltext: bool,
    /// Words shorter than this (in characters) are ignored
    pub min_word_length: usize,
    /// At most this many terms take part in a search
    pub max_search_terms: usize,
    /// Words too common to search for
    pub stop_words: Vec<String>,
    /// Longest accepted query, in characters
    pub search_string_limit: usize,
    /// Results per page
    pub results_per_page: usize,
    /// Page-count bound on results; 0 derives it from `results_per_page`
    pub max_results: usize,
    /// Absolute cap on candidates requested from a backend
    pub hard_result_ceiling: usize,
    /// Backend deadline in milliseconds
    pub backend_timeout_ms: u64,
    /// Topics with more replies than this get no frequency credit
    pub humungous_topic_posts: u32,
    /// Fraction of the forum's activity span treated as recent
    pub recent_window_fraction: f64,
    /// Upper bound on members a user filter may resolve to
    pub max_members_to_search: usize,
    /// Characters of context around each match in compact excerpts
    pub excerpt_chars: usize,
    /// Guests must pass a challenge before searching
    pub enable_captcha: bool,
    /// Offer did-you-mean corrections
    pub enable_spell_checking: bool,
    /// Mark topics the requester posted in
    pub enable_participation: bool,
    /// Quote markup is enabled on the forum
    pub quote_enabled: bool,
    /// Lifetime of cached result sets, in seconds
    pub cache_ttl_secs: u64,
    /// Relevance coefficients
    pub weights: WeightConfig,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            index: SearchIndexKind::Standard,
            simple_fulltext: false,
            min_word_length: 2,
            max_search_terms: 10,
            stop_words: default_stop_words(),
            search_string_limit: 100,
            results_per_page: 30,
            max_results: 0,
            hard_result_ceiling: 5_000,
            backend_timeout_ms: 2_000,
            humungous_topic_posts: 200,
            recent_window_fraction: 0.30,
            max_members_to_search: 500,
            excerpt_chars: 50,
            enable_captcha: false,
            enable_spell_checking: false,
            enable_participation: false,
            quote_enabled: true,
            cache_ttl_secs: 90,
            weights: WeightConfig::default(),
        }
    }
}

fn default_stop_words() -> Vec<String> {
    [
        "img", "url", "quote", "www", "http", "the", "is", "it", "are", "if", "in",
    ]
    .iter()
    .map(|w| w.to_string())
    .collect()
}

impl SearchConfig {
    /// Effective page-count bound on results
    pub fn max_results(&self) -> usize {
        if self.max_results == 0 {
            self.results_per_page.saturating_mul(200)
        } else {
            self.max_results
        }
    }

    /// Number of ranked messages a single search keeps
    ///
    /// Five times the result bound, never above the hard ceiling.
    pub fn max_message_results(&self) -> usize {
        self.max_results()
            .saturating_mul(5)
            .min(self.hard_result_ceiling)
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<()> {
        if self.results_per_page == 0 {
            return Err(SearchError::config("results_per_page must be positive"));
        }
        if !(self.recent_window_fraction > 0.0 && self.recent_window_fraction <= 1.0) {
            return Err(SearchError::config(format!(
                "recent_window_fraction must be in (0, 1], got {}",
                self.recent_window_fraction
            )));
        }
        let w = &self.weights;
        let all = [w.frequency, w.age, w.body, w.subject, w.first_message, w.sticky];
        if all.iter().any(|v| *v < 0.0 || !v.is_finite()) {
            return Err(SearchError::config("search weights must be non-negative"));
        }
        if w.total() <= 0.0 {
            return Err(SearchError::config("at least one search weight must be set"));
        }
        Ok(())
    }

    /// Parse and validate TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: SearchConfig = toml::from_str(content)
            .map_err(|e| SearchError::config(format!("failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SearchError::config(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# Forum search configuration
#
# Backend: "standard" scans messages, "fulltext" uses the word index
index = "standard"

# Skip phrase and exclusion parsing (large forums)
simple_fulltext = false

# Words shorter than this are ignored and reported back
min_word_length = 2

results_per_page = 30
excerpt_chars = 50
backend_timeout_ms = 2000

# Guests answer a challenge before their first search
enable_captcha = false

[weights]
frequency = 30
age = 25
body = 20
subject = 15
first_message = 10
sticky = 0
"#
    }

    /// Write the default config file if it does not already exist.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                SearchError::config(format!(
                    "failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_is_valid() {
        let config = SearchConfig::default();
        config.validate().unwrap();
        assert_eq!(config.index, SearchIndexKind::Standard);
        assert_eq!(config.search_string_limit, 100);
    }

    #[test]
    fn derived_result_caps() {
        let config = SearchConfig::default();
        assert_eq!(config.max_results(), 6_000);
        // 30_000 clipped by the hard ceiling
        assert_eq!(config.max_message_results(), 5_000);

        let config = SearchConfig {
            max_results: 20,
            ..SearchConfig::default()
        };
        assert_eq!(config.max_message_results(), 100);
    }

    #[test]
    fn extreme_result_caps_saturate() {
        let config = SearchConfig {
            results_per_page: usize::MAX,
            ..SearchConfig::default()
        };
        assert_eq!(config.max_results(), usize::MAX);
        assert_eq!(config.max_message_results(), 5_000);

        let config = SearchConfig {
            max_results: usize::MAX / 2,
            hard_result_ceiling: usize::MAX,
            ..SearchConfig::default()
        };
        assert_eq!(config.max_message_results(), usize::MAX);
    }

    #[test]
    fn default_toml_parses_correctly() {
        let config = SearchConfig::from_toml_str(SearchConfig::default_toml()).unwrap();
        assert_eq!(config.min_word_length, 2);
        assert_eq!(config.weights, WeightConfig::default());
    }

    #[test]
    fn parse_fulltext_and_partial_weights() {
        let config =
            SearchConfig::from_toml_str("index = \"fulltext\"\n[weights]\nsticky = 5\n").unwrap();
        assert_eq!(config.index, SearchIndexKind::Fulltext);
        assert_eq!(config.weights.sticky, 5.0);
        assert_eq!(config.weights.subject, 15.0);
    }

    #[test]
    fn zero_weights_rejected() {
        let toml = "[weights]\nfrequency = 0\nage = 0\nbody = 0\nsubject = 0\nfirst_message = 0\n";
        assert!(SearchConfig::from_toml_str(toml).is_err());
    }

    #[test]
    fn bad_fraction_rejected() {
        assert!(SearchConfig::from_toml_str("recent_window_fraction = 1.5").is_err());
        assert!(SearchConfig::from_toml_str("results_per_page = 0").is_err());
    }

    #[test]
    fn write_default_creates_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        assert!(!path.exists());

        SearchConfig::write_default_if_missing(&path).unwrap();
        assert!(path.exists());

        let config = SearchConfig::from_file(&path).unwrap();
        assert_eq!(config.results_per_page, 30);
    }

    #[test]
    fn write_default_does_not_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "excerpt_chars = 12\n").unwrap();

        SearchConfig::write_default_if_missing(&path).unwrap();

        let config = SearchConfig::from_file(&path).unwrap();
        assert_eq!(config.excerpt_chars, 12);
    }

    #[test]
    fn missing_file_is_config_error() {
        let dir = TempDir::new().unwrap();
        let err = SearchConfig::from_file(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, SearchError::InvalidConfig { .. }));
    }
}
