//! Tokenizers for search
//!
//! Two grammars live here:
//! - [`tokenize`]: splits stored text into index words (lowercase, split on
//!   non-alphanumeric characters). Used by the word index.
//! - [`parse_query`]: turns a raw search string into [`SearchTerms`]
//!   (phrases, required, excluded, ignored and stop-listed words).

use std::collections::HashSet;

use boardsearch_core::InvalidReason;
use once_cell::sync::Lazy;
use regex::Regex;

/// Characters trimmed from both ends of every query term
const TERM_TRIM: &[char] = &['-', '_', '\'', ' '];

/// Quoted phrase, optionally negated: `"some words"` or `-"some words"`
static PHRASE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"(-?)"([^"]+)""#).unwrap());

/// Runs of separator characters and entity-escaped separators inside phrases
static SEPARATOR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:[\s\x{A0}\x{0B}\x{00}(){}\[\]<>!@$%^*.,:+=`~?/\\]+|&(?:amp|lt|gt|quot);)+"#)
        .unwrap()
});

/// Tokenize text into index words
///
/// - Lowercase
/// - Split on non-alphanumeric characters
///
/// # Example
///
/// ```
/// use boardsearch_search::tokenizer::tokenize;
///
/// let tokens = tokenize("Hello, World!");
/// assert_eq!(tokens, vec!["hello", "world"]);
/// ```
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Tokenize and deduplicate, preserving first-seen order
///
/// # Example
///
/// ```
/// use boardsearch_search::tokenizer::tokenize_unique;
///
/// let tokens = tokenize_unique("test test TEST");
/// assert_eq!(tokens, vec!["test"]);
/// ```
pub fn tokenize_unique(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    tokenize(text)
        .into_iter()
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

// ============================================================================
// Query grammar
// ============================================================================

/// Knobs for [`parse_query`]
#[derive(Debug, Clone)]
pub struct QueryOptions<'a> {
    /// Terms shorter than this many characters are ignored
    pub min_word_length: usize,
    /// Keep at most this many positive terms
    pub max_terms: usize,
    /// Stop-listed words
    pub stop_words: &'a [String],
    /// Reduced grammar: no phrases, no exclusions
    pub simple: bool,
    /// Keep `*` as a wildcard instead of dropping it
    pub wildcards: bool,
}

/// Terms extracted from a raw query
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchTerms {
    /// Quoted spans, in query order
    pub phrases: Vec<String>,
    /// Words that must appear
    pub required_words: Vec<String>,
    /// Words that must not appear
    pub excluded_words: Vec<String>,
    /// Terms dropped for being too short
    pub ignored: Vec<String>,
    /// Terms dropped for being stop-listed
    pub blacklisted: Vec<String>,
}

impl SearchTerms {
    /// Positive terms in search order: phrases first, then words
    pub fn search_array(&self) -> Vec<String> {
        self.phrases
            .iter()
            .chain(self.required_words.iter())
            .cloned()
            .collect()
    }

    /// True when no positive term survived
    pub fn is_empty(&self) -> bool {
        self.phrases.is_empty() && self.required_words.is_empty()
    }

    /// True when every candidate term was dropped for being stop-listed
    pub fn found_blacklisted_words(&self) -> bool {
        self.is_empty() && self.ignored.is_empty() && !self.blacklisted.is_empty()
    }

    /// Why nothing is left to search for, if that is the case
    pub fn invalid_reason(&self) -> Option<InvalidReason> {
        if !self.is_empty() {
            None
        } else if !self.ignored.is_empty() {
            Some(InvalidReason::SmallWords)
        } else if self.found_blacklisted_words() {
            Some(InvalidReason::Blacklisted)
        } else {
            Some(InvalidReason::Empty)
        }
    }
}

/// Parse a raw search string
///
/// Grammar:
/// - whitespace separates words; `"..."` groups a phrase
/// - a leading `-` excludes a word (`-word`) or phrase (`-"some words"`)
/// - terms are lower-cased and trimmed of `-`, `_`, `'`
/// - short terms go to `ignored`, stop-listed ones to `blacklisted`
/// - duplicates are dropped keeping the first occurrence
///
/// # Example
///
/// ```
/// use boardsearch_search::tokenizer::{parse_query, QueryOptions};
///
/// let opts = QueryOptions {
///     min_word_length: 2,
///     max_terms: 10,
///     stop_words: &[],
///     simple: false,
///     wildcards: false,
/// };
/// let terms = parse_query("hello -world \"quoted phrase\"", &opts);
/// assert_eq!(terms.required_words, vec!["hello"]);
/// assert_eq!(terms.excluded_words, vec!["world"]);
/// assert_eq!(terms.phrases, vec!["quoted phrase"]);
/// ```
pub fn parse_query(raw: &str, opts: &QueryOptions<'_>) -> SearchTerms {
    let mut query = raw.to_lowercase();
    if opts.simple {
        query.retain(|c| c != '"');
    }

    let mut terms = SearchTerms::default();
    let mut phrase_candidates = Vec::new();
    let mut excluded = Vec::new();

    // Phrases first; the matched spans are blanked out of the word text
    let mut word_text = String::with_capacity(query.len());
    let mut last = 0;
    for caps in PHRASE_RE.captures_iter(&query) {
        let whole = caps.get(0).map_or(0..0, |m| m.range());
        let starts_clean = query[..whole.start]
            .chars()
            .next_back()
            .map_or(true, char::is_whitespace);
        let ends_clean = query[whole.end..]
            .chars()
            .next()
            .map_or(true, char::is_whitespace);
        if !(starts_clean && ends_clean) {
            continue;
        }

        word_text.push_str(&query[last..whole.start]);
        word_text.push(' ');
        last = whole.end;

        let phrase = SEPARATOR_RE.replace_all(&caps[2], " ");
        let phrase = phrase
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        if &caps[1] == "-" {
            excluded.push(phrase);
        } else {
            phrase_candidates.push(phrase);
        }
    }
    word_text.push_str(&query[last..]);

    let mut word_candidates = Vec::new();
    for word in word_text.split_whitespace() {
        if !opts.simple && word.starts_with('-') {
            excluded.push(word.to_string());
        } else {
            word_candidates.push(word.to_string());
        }
    }

    // Exclusions: trimmed, stop-listed ones silently dropped
    let mut seen_excluded = HashSet::new();
    for word in excluded {
        let word = clean_term(&word, opts.wildcards);
        if word.is_empty() || is_stop_word(&word, opts.stop_words) {
            continue;
        }
        if seen_excluded.insert(word.clone()) {
            terms.excluded_words.push(word);
        }
    }

    // Positive terms, phrases before words
    let mut seen = HashSet::new();
    let mut kept = 0;
    let tagged = phrase_candidates
        .into_iter()
        .map(|p| (true, p))
        .chain(word_candidates.into_iter().map(|w| (false, w)));
    for (is_phrase, term) in tagged {
        let term = clean_term(&term, opts.wildcards);
        if term.is_empty() {
            continue;
        }
        if is_stop_word(&term, opts.stop_words) {
            push_unique(&mut terms.blacklisted, term);
            continue;
        }
        if term.chars().filter(|c| *c != '*').count() < opts.min_word_length {
            push_unique(&mut terms.ignored, term);
            continue;
        }
        if seen_excluded.contains(&term) || !seen.insert(term.clone()) {
            continue;
        }
        if kept >= opts.max_terms {
            continue;
        }
        kept += 1;
        if is_phrase && term.contains(' ') {
            terms.phrases.push(term);
        } else {
            terms.required_words.push(term);
        }
    }

    terms
}

fn clean_term(term: &str, wildcards: bool) -> String {
    let term: String = if wildcards {
        term.to_string()
    } else {
        term.chars().filter(|c| *c != '*').collect()
    };
    term.trim_matches(TERM_TRIM).to_string()
}

fn is_stop_word(term: &str, stop_words: &[String]) -> bool {
    stop_words.iter().any(|w| w == term)
}

fn push_unique(list: &mut Vec<String>, term: String) {
    if !list.contains(&term) {
        list.push(term);
    }
}
