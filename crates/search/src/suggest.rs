//! Did-you-mean suggestions
//!
//! Every required word is run past a [`SpellChecker`]. Misspelled words are
//! replaced by the first suggestion that is a real change and survives the
//! censor untouched. Phrases and numbers are never corrected.

use std::collections::BTreeSet;

use boardsearch_core::{Censor, Result, SpellChecker};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::highlight::escape_html;
use crate::index::InvertedIndex;
use crate::params::SearchParams;
use crate::tokenizer::SearchTerms;

static PLAIN_WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\w+$").unwrap());

/// Placeholder replaced by a corrected word in the display template
pub const WORD_PLACEHOLDER: &str = "{word}";

/// A corrected query
#[derive(Debug, Clone, PartialEq)]
pub struct DidYouMean {
    /// Escaped query with corrections wrapped by the template
    pub display: String,
    /// Parameter token that searches for the corrected query
    pub params: String,
    /// Corrected raw query
    pub search: String,
}

/// Build a suggestion, or `None` when every word is spelled correctly
///
/// # Errors
///
/// Propagates spell checker failures.
pub fn did_you_mean(
    terms: &SearchTerms,
    params: &SearchParams,
    checker: &dyn SpellChecker,
    censor: &dyn Censor,
    template: &str,
) -> Result<Option<DidYouMean>> {
    let mut search = Vec::new();
    let mut display = Vec::new();
    let mut corrected = false;

    for phrase in &terms.phrases {
        let quoted = format!("\"{}\"", phrase);
        display.push(escape_html(&quoted));
        search.push(quoted);
    }

    for word in &terms.required_words {
        if word.chars().all(|c| c.is_ascii_digit()) || checker.check(word)? {
            display.push(escape_html(word));
            search.push(word.clone());
            continue;
        }

        let replacement = checker
            .suggest(word)?
            .into_iter()
            .find(|s| !s.eq_ignore_ascii_case(word) && censor.censor(s) == *s);

        match replacement {
            Some(better) => {
                corrected = true;
                display.push(template.replace(WORD_PLACEHOLDER, &escape_html(&better)));
                search.push(better);
            }
            None => {
                display.push(escape_html(word));
                search.push(word.clone());
            }
        }
    }

    if !corrected {
        return Ok(None);
    }

    for word in &terms.excluded_words {
        let term = if PLAIN_WORD_RE.is_match(word) {
            format!("-{}", word)
        } else {
            format!("-\"{}\"", word)
        };
        display.push(escape_html(&term));
        search.push(term);
    }

    let search = search.join(" ");
    let token = params.clone().with_search(search.clone()).compile_url_params();
    Ok(Some(DidYouMean {
        display: display.join(" "),
        params: token,
        search,
    }))
}

// ============================================================================
// VocabularySpeller
// ============================================================================

/// Spell checker backed by a fixed word list
///
/// A word is correct when it is in the list. Suggestions are list words
/// within `max_distance` edits, closest first.
#[derive(Debug, Clone)]
pub struct VocabularySpeller {
    words: BTreeSet<String>,
    max_distance: usize,
}

impl VocabularySpeller {
    /// Create from a word list
    pub fn new(words: impl IntoIterator<Item = impl Into<String>>) -> Self {
        VocabularySpeller {
            words: words.into_iter().map(|w| w.into().to_lowercase()).collect(),
            max_distance: 2,
        }
    }

    /// Use the fulltext index's vocabulary
    pub fn from_index(index: &InvertedIndex) -> Self {
        Self::new(index.vocabulary())
    }

    /// Builder: edit distance limit
    pub fn with_max_distance(mut self, max_distance: usize) -> Self {
        self.max_distance = max_distance;
        self
    }

    /// Number of known words
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// True when the word list is empty
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

impl SpellChecker for VocabularySpeller {
    fn check(&self, word: &str) -> Result<bool> {
        Ok(self.words.contains(&word.to_lowercase()))
    }

    fn suggest(&self, word: &str) -> Result<Vec<String>> {
        let word = word.to_lowercase();
        let mut scored: Vec<(usize, &String)> = self
            .words
            .iter()
            .map(|candidate| (strsim::levenshtein(&word, candidate), candidate))
            .filter(|(distance, _)| *distance <= self.max_distance)
            .collect();
        scored.sort();
        Ok(scored.into_iter().map(|(_, w)| w.clone()).collect())
    }
}
