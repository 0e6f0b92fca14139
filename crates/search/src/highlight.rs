//! Highlighting and compact excerpts
//!
//! Highlighting runs on escaped HTML. Tags and entities are never split, and
//! text already inside a highlight element is left alone, so highlighting
//! its own output again changes nothing.
//!
//! Excerpts run on plain text: windows are cut in character offsets, merged
//! when they overlap, escaped once, and only then highlighted.

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};

use crate::matcher::{compile_term, term_pattern};

/// Opening markup around body matches
pub const BODY_OPEN: &str = "<span class=\"highlight\">";
/// Closing markup around body matches
pub const BODY_CLOSE: &str = "</span>";
/// Opening markup around subject matches
pub const SUBJECT_OPEN: &str = "<strong class=\"highlight\">";
/// Closing markup around subject matches
pub const SUBJECT_CLOSE: &str = "</strong>";

/// Marker between and around excerpt windows
pub const ELLIPSIS: &str = "…";

static MARKUP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<[^>]*>|&(?:#[0-9]+|#x[0-9a-fA-F]+|[a-zA-Z][a-zA-Z0-9]*);").unwrap());

/// Escape text for HTML
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(c),
        }
    }
    out
}

/// Inverse of [`escape_html`], plus `&nbsp;`
pub fn unescape_html(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#039;", "'")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// A bare `*` would match every word
fn has_literal(term: &str) -> bool {
    term.chars().any(|c| c != '*' && !c.is_whitespace())
}

/// Compile every term into one alternation, longest term first
fn combined_pattern(terms: &[String]) -> Option<Regex> {
    let mut terms: Vec<String> = terms
        .iter()
        .map(|t| t.trim().to_string())
        .filter(|t| has_literal(t))
        .collect();
    if terms.is_empty() {
        return None;
    }
    terms.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()).then(a.cmp(b)));
    terms.dedup();
    let source = terms
        .iter()
        .map(|t| format!("(?:{})", term_pattern(&escape_html(t))))
        .collect::<Vec<_>>()
        .join("|");
    RegexBuilder::new(&source).case_insensitive(true).build().ok()
}

/// Wrap term matches in escaped HTML with `open`/`close`
pub fn highlight(html: &str, terms: &[String], open: &str, close: &str) -> String {
    let re = match combined_pattern(terms) {
        Some(re) => re,
        None => return html.to_string(),
    };

    let mut out = String::with_capacity(html.len() + 32);
    let mut inside = false;
    let mut last = 0;

    // Walk tag-delimited text runs; entities stay inside runs but must not be split
    let flush = |out: &mut String, run: &str, inside: bool| {
        if inside {
            out.push_str(run);
        } else {
            highlight_run(out, run, &re, open, close);
        }
    };

    for m in MARKUP_RE.find_iter(html) {
        if !m.as_str().starts_with('<') {
            continue;
        }
        flush(&mut out, &html[last..m.start()], inside);
        let tag = m.as_str();
        if tag == open {
            inside = true;
        } else if inside && tag == close {
            inside = false;
        }
        out.push_str(tag);
        last = m.end();
    }
    flush(&mut out, &html[last..], inside);
    out
}

fn highlight_run(out: &mut String, run: &str, re: &Regex, open: &str, close: &str) {
    let entities: Vec<(usize, usize)> = MARKUP_RE
        .find_iter(run)
        .map(|m| (m.start(), m.end()))
        .collect();
    let splits_entity = |pos: usize| entities.iter().any(|(s, e)| pos > *s && pos < *e);

    let mut last = 0;
    for m in re.find_iter(run) {
        if m.start() == m.end() || splits_entity(m.start()) || splits_entity(m.end()) {
            continue;
        }
        out.push_str(&run[last..m.start()]);
        out.push_str(open);
        out.push_str(m.as_str());
        out.push_str(close);
        last = m.end();
    }
    out.push_str(&run[last..]);
}

/// Highlight a rendered body
pub fn highlight_body(html: &str, terms: &[String]) -> String {
    highlight(html, terms, BODY_OPEN, BODY_CLOSE)
}

/// Highlight an escaped subject
pub fn highlight_subject(html: &str, terms: &[String]) -> String {
    highlight(html, terms, SUBJECT_OPEN, SUBJECT_CLOSE)
}

// ============================================================================
// Excerpts
// ============================================================================

/// Escaped excerpt of `text` around every term match
///
/// Each match keeps `window` characters of context on either side. The
/// leading edge extends back to the start of its word; the trailing edge may
/// stop inside a word. Overlapping windows merge. [`ELLIPSIS`] marks every
/// cut that is not a text boundary. Without any match, the excerpt is the
/// start of the text.
pub fn excerpt(text: &str, terms: &[String], window: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    let spans = match_spans(text, terms);

    if spans.is_empty() {
        let end = chars.len().min(window.saturating_mul(2).max(1));
        let head: String = chars[..end].iter().collect();
        let mut out = escape_html(head.trim_end());
        if end < chars.len() {
            out.push_str(ELLIPSIS);
        }
        return out;
    }

    let mut windows: Vec<(usize, usize)> = Vec::new();
    for (s, e) in spans {
        let mut start = s;
        while start > 0 && chars[start - 1].is_whitespace() {
            start -= 1;
        }
        start = start.saturating_sub(window);
        while start > 0 && chars[start - 1].is_alphanumeric() {
            start -= 1;
        }

        let mut end = e;
        while end < chars.len() && chars[end].is_whitespace() {
            end += 1;
        }
        end = (end + window).min(chars.len());

        match windows.last_mut() {
            Some(last) if start <= last.1 => last.1 = last.1.max(end),
            _ => windows.push((start, end)),
        }
    }

    let mut out = String::new();
    for (i, (start, end)) in windows.iter().enumerate() {
        if i > 0 || *start > 0 {
            out.push_str(ELLIPSIS);
        }
        let piece: String = chars[*start..*end].iter().collect();
        out.push_str(&escape_html(piece.trim()));
    }
    if windows.last().map_or(false, |(_, end)| *end < chars.len()) {
        out.push_str(ELLIPSIS);
    }
    out
}

/// Character-offset spans of every term match, sorted
fn match_spans(text: &str, terms: &[String]) -> Vec<(usize, usize)> {
    // byte offset -> char offset
    let mut char_at = vec![0usize; text.len() + 1];
    let mut n = 0;
    for (byte, c) in text.char_indices() {
        for slot in &mut char_at[byte..byte + c.len_utf8()] {
            *slot = n;
        }
        n += 1;
    }
    char_at[text.len()] = n;

    let mut spans: Vec<(usize, usize)> = terms
        .iter()
        .filter(|t| has_literal(t))
        .filter_map(|t| compile_term(t).ok())
        .flat_map(|re| {
            re.find_iter(text)
                .filter(|m| m.start() < m.end())
                .map(|m| (char_at[m.start()], char_at[m.end()]))
                .collect::<Vec<_>>()
        })
        .collect();
    spans.sort_unstable();
    spans.dedup();
    spans
}
