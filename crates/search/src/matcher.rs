//! Term matching shared by every backend and by highlighting
//!
//! A term matches on word boundaries, case-insensitively. When a term begins
//! or ends with punctuation (`.net`, `c++`) word boundaries make no sense, so
//! the term matches as a plain substring instead. `*` inside a term matches
//! any run of word characters; the words of a phrase may be separated by any
//! whitespace.

use boardsearch_core::{Message, MemberId, Result, SearchCriteria, SearchError, UserFilter};
use regex::{Regex, RegexBuilder};

/// Regex source for a single term
pub fn term_pattern(term: &str) -> String {
    let term = term.trim();
    let words: Vec<String> = term
        .split_whitespace()
        .map(|word| {
            word.split('*')
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join(r"\w*")
        })
        .collect();
    let body = words.join(r"\s+");

    if is_substring_term(term) {
        body
    } else {
        format!(r"\b{}\b", body)
    }
}

/// True when the term must match as a substring rather than a whole word
pub fn is_substring_term(term: &str) -> bool {
    let is_punct = |c: char| !(c.is_alphanumeric() || c == '_' || c == '*');
    let first = term.chars().next();
    let last = term.chars().next_back();
    first.map_or(false, is_punct) || last.map_or(false, is_punct)
}

/// Compile a term into a case-insensitive regex
pub fn compile_term(term: &str) -> Result<Regex> {
    RegexBuilder::new(&term_pattern(term))
        .case_insensitive(true)
        .build()
        .map_err(|e| SearchError::backend(format!("bad search term {:?}: {}", term, e)))
}

/// Per-message hit counts for the positive terms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TermHits {
    /// Distinct terms found in the subject
    pub subject: u32,
    /// Distinct terms found in the body
    pub body: u32,
}

/// Compiled positive and excluded terms
#[derive(Debug, Clone)]
pub struct TermMatcher {
    positive: Vec<Regex>,
    excluded: Vec<Regex>,
    subject_only: bool,
}

impl TermMatcher {
    /// Compile every term of the criteria
    pub fn from_criteria(criteria: &SearchCriteria) -> Result<Self> {
        Ok(TermMatcher {
            positive: criteria
                .positive_terms()
                .map(|t| compile_term(t))
                .collect::<Result<_>>()?,
            excluded: criteria
                .excluded_words
                .iter()
                .map(|t| compile_term(t))
                .collect::<Result<_>>()?,
            subject_only: criteria.subject_only,
        })
    }

    /// Number of positive terms
    pub fn term_count(&self) -> usize {
        self.positive.len()
    }

    /// Check a subject/body pair
    ///
    /// Every positive term must appear (in the subject, or the body unless
    /// matching subjects only) and no excluded term may appear.
    pub fn evaluate(&self, subject: &str, body: &str) -> Option<TermHits> {
        let search_body = !self.subject_only;
        if self
            .excluded
            .iter()
            .any(|re| re.is_match(subject) || (search_body && re.is_match(body)))
        {
            return None;
        }

        let mut hits = TermHits::default();
        for re in &self.positive {
            let in_subject = re.is_match(subject);
            let in_body = search_body && re.is_match(body);
            if !(in_subject || in_body) {
                return None;
            }
            hits.subject += u32::from(in_subject);
            hits.body += u32::from(in_body);
        }
        Some(hits)
    }
}

// ============================================================================
// Criteria filters
// ============================================================================

/// Case-insensitive glob match supporting `*` and `?`
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.to_lowercase().chars().collect();
    let t: Vec<char> = text.to_lowercase().chars().collect();

    let (mut pi, mut ti) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;
    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            backtrack = Some((pi, ti));
            pi += 1;
        } else if let Some((star, matched)) = backtrack {
            pi = star + 1;
            ti = matched + 1;
            backtrack = Some((star, matched + 1));
        } else {
            return false;
        }
    }
    p[pi..].iter().all(|c| *c == '*')
}

/// True when the poster passes the user filter
pub fn user_filter_admits(filter: &UserFilter, poster_id: MemberId, poster_name: &str) -> bool {
    let name_matches = |patterns: &[String]| patterns.iter().any(|p| glob_match(p, poster_name));
    match filter {
        UserFilter::Any => true,
        UserFilter::Members { ids, guest_names } => {
            ids.contains(&poster_id) || (poster_id.is_guest() && name_matches(guest_names))
        }
        UserFilter::NamePattern(patterns) => name_matches(patterns),
    }
}

/// Board, topic, poster and age filters; term matching is separate
pub fn criteria_admits(criteria: &SearchCriteria, message: &Message) -> bool {
    criteria.board_scope.contains(&message.board_id)
        && criteria.topic.map_or(true, |t| t == message.topic_id)
        && criteria.age_range.admits(message.posted_at, criteria.now)
        && user_filter_admits(&criteria.user_filter, message.poster_id, &message.poster_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use boardsearch_core::AgeRange;
    use chrono::Utc;
    use std::collections::BTreeSet;

    fn matcher(required: &[&str], excluded: &[&str], phrases: &[&str], subject_only: bool) -> TermMatcher {
        let criteria = SearchCriteria {
            required_words: required.iter().map(|s| s.to_string()).collect(),
            excluded_words: excluded.iter().map(|s| s.to_string()).collect(),
            phrases: phrases.iter().map(|s| s.to_string()).collect(),
            board_scope: BTreeSet::new(),
            topic: None,
            user_filter: UserFilter::Any,
            age_range: AgeRange::default(),
            subject_only,
            result_cap: 10,
            timeout_ms: 1000,
            now: Utc::now(),
        };
        TermMatcher::from_criteria(&criteria).unwrap()
    }

    #[test]
    fn test_word_boundary_match() {
        let re = compile_term("fox").unwrap();
        assert!(re.is_match("The quick brown Fox."));
        assert!(!re.is_match("firefoxes"));
    }

    #[test]
    fn test_punctuation_switches_to_substring() {
        assert!(is_substring_term(".net"));
        assert!(is_substring_term("c++"));
        assert!(!is_substring_term("rust"));

        let re = compile_term(".net").unwrap();
        assert!(re.is_match("asp.net core"));
        let re = compile_term("c++").unwrap();
        assert!(re.is_match("written in c++11"));
    }

    #[test]
    fn test_wildcard_and_phrase() {
        let re = compile_term("comp*").unwrap();
        assert!(re.is_match("a compiler"));
        assert!(!re.is_match("uncompiled"));

        let re = compile_term("quick brown").unwrap();
        assert!(re.is_match("the quick\n  brown fox"));
        assert!(!re.is_match("quick red brown"));
    }

    #[test]
    fn test_multibyte_terms() {
        let re = compile_term("café").unwrap();
        assert!(re.is_match("Un CAFÉ noir"));
    }

    #[test]
    fn test_evaluate_requires_every_term() {
        let m = matcher(&["rust", "cargo"], &[], &[], false);
        assert_eq!(
            m.evaluate("Rust tips", "cargo build"),
            Some(TermHits {
                subject: 1,
                body: 1
            })
        );
        assert_eq!(m.evaluate("Rust tips", "nothing here"), None);
    }

    #[test]
    fn test_evaluate_exclusion() {
        let m = matcher(&["rust"], &["oxide"], &[], false);
        assert!(m.evaluate("rust", "iron oxide").is_none());
        assert!(m.evaluate("rust", "borrow checker").is_some());
    }

    #[test]
    fn test_evaluate_subject_only() {
        let m = matcher(&["rust"], &["oxide"], &[], true);
        assert!(m.evaluate("other", "rust").is_none());
        // Body is not consulted for exclusions either
        assert_eq!(
            m.evaluate("rust", "iron oxide"),
            Some(TermHits {
                subject: 1,
                body: 0
            })
        );
    }

    #[test]
    fn test_evaluate_phrase() {
        let m = matcher(&[], &[], &["brown fox"], false);
        assert!(m.evaluate("", "quick brown fox").is_some());
        assert!(m.evaluate("", "brown quick fox").is_none());
        assert_eq!(m.term_count(), 1);
    }

    #[test]
    fn test_glob_match() {
        assert!(glob_match("ali*", "Alice"));
        assert!(glob_match("*a*", "bart"));
        assert!(glob_match("b?b", "BOB"));
        assert!(!glob_match("b?b", "bobby"));
        assert!(glob_match("*", ""));
        assert!(!glob_match("alice", "alicia"));
    }

    #[test]
    fn test_user_filter_admits() {
        let members = UserFilter::Members {
            ids: [MemberId(4)].into_iter().collect(),
            guest_names: vec!["visitor*".to_string()],
        };
        assert!(user_filter_admits(&members, MemberId(4), "dave"));
        assert!(user_filter_admits(&members, MemberId::GUEST, "visitor42"));
        // Guest names only apply to guest posts
        assert!(!user_filter_admits(&members, MemberId(5), "visitor42"));

        let pattern = UserFilter::NamePattern(vec!["da*".to_string()]);
        assert!(user_filter_admits(&pattern, MemberId(5), "dave"));
        assert!(!user_filter_admits(&pattern, MemberId(5), "erin"));
        assert!(user_filter_admits(&UserFilter::Any, MemberId(9), "x"));
    }
}
