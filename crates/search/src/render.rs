//! Result rows for display
//!
//! [`ResultRenderer`] turns a ranked message into a [`ResultItem`]: censored
//! and highlighted subject, full rendered body or compact excerpt, and the
//! permission flags for the requester.
//!
//! Also ships the plain [`MarkupRenderer`] and [`Censor`] implementations
//! used when the host forum supplies none.

use std::collections::BTreeMap;
use std::sync::Arc;

use boardsearch_core::{
    Board, BoardId, BoardSet, Censor, MarkupRenderer, MemberId, Message, PermissionFlags,
    QuickModFlags, RankedMessage, Requester, Result, ResultItem, SearchConfig, Topic, TopicId,
};
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};

use crate::engine::SearchEngine;
use crate::highlight::{escape_html, excerpt, highlight_body, highlight_subject, unescape_html};
use crate::pagination::PageIndex;

/// Subject shown for messages without one
pub const NO_SUBJECT: &str = "(No subject)";

// ============================================================================
// Plain markup
// ============================================================================

static BBCODE_RULES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"(?is)\[b\](.*?)\[/b\]", "<strong>$1</strong>"),
        (r"(?is)\[i\](.*?)\[/i\]", "<em>$1</em>"),
        (r"(?is)\[u\](.*?)\[/u\]", "<u>$1</u>"),
        (r"(?is)\[s\](.*?)\[/s\]", "<del>$1</del>"),
        (r"(?is)\[code\](.*?)\[/code\]", "<code>$1</code>"),
        (
            r"(?is)\[quote(?:=[^\]]*)?\](.*?)\[/quote\]",
            "<blockquote>$1</blockquote>",
        ),
        (
            r"(?is)\[url=(https?://[^\]\s]+)\](.*?)\[/url\]",
            "<a href=\"$1\">$2</a>",
        ),
        (
            r"(?is)\[url\](https?://[^\[\s]+)\[/url\]",
            "<a href=\"$1\">$1</a>",
        ),
    ]
    .into_iter()
    .map(|(pattern, replacement)| (Regex::new(pattern).unwrap(), replacement))
    .collect()
});

static SMILEY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(^|\s)(:\)|;\)|:\(|:D)").unwrap());
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());
static BREAK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<br\s*/?>").unwrap());

/// Escapes text and renders a small BBCode subset
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainMarkup;

impl MarkupRenderer for PlainMarkup {
    fn render_body(&self, text: &str, allow_smileys: bool) -> String {
        let mut html = escape_html(text);
        for (re, replacement) in BBCODE_RULES.iter() {
            html = re.replace_all(&html, *replacement).into_owned();
        }
        if allow_smileys {
            html = SMILEY_RE
                .replace_all(&html, "$1<img class=\"smiley\" alt=\"$2\">")
                .into_owned();
        }
        html.replace("\r\n", "\n").replace('\n', "<br>")
    }
}

/// Flatten rendered HTML back to plain text
pub fn strip_tags(html: &str) -> String {
    let text = BREAK_RE.replace_all(html, "\n");
    unescape_html(&TAG_RE.replace_all(&text, ""))
}

// ============================================================================
// Censor
// ============================================================================

/// Replaces listed words, whole words only, ignoring case
#[derive(Debug, Clone, Default)]
pub struct WordCensor {
    pattern: Option<Regex>,
    replacement: String,
}

impl WordCensor {
    /// Censor `words` with `replacement`
    pub fn new(words: impl IntoIterator<Item = impl AsRef<str>>, replacement: &str) -> Self {
        let alternation = words
            .into_iter()
            .map(|w| regex::escape(w.as_ref().trim()))
            .filter(|w| !w.is_empty())
            .collect::<Vec<_>>()
            .join("|");
        let pattern = if alternation.is_empty() {
            None
        } else {
            RegexBuilder::new(&format!(r"\b(?:{})\b", alternation))
                .case_insensitive(true)
                .build()
                .ok()
        };
        WordCensor {
            pattern,
            replacement: replacement.to_string(),
        }
    }
}

impl Censor for WordCensor {
    fn censor(&self, text: &str) -> String {
        match &self.pattern {
            Some(re) => re
                .replace_all(text, regex::NoExpand(&self.replacement))
                .into_owned(),
            None => text.to_string(),
        }
    }
}

// ============================================================================
// Permissions
// ============================================================================

/// Boards on which the requester holds each permission
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoardPermissions {
    /// Reply to any topic
    pub post_reply_any: BoardSet,
    /// Reply to topics the requester started
    pub post_reply_own: BoardSet,
    /// Subscribe to notifications
    pub mark_any_notify: BoardSet,
    /// Lock any topic
    pub lock_any: BoardSet,
    /// Lock topics the requester started
    pub lock_own: BoardSet,
    /// Pin topics
    pub make_sticky: BoardSet,
    /// Move any topic
    pub move_any: BoardSet,
    /// Move topics the requester started
    pub move_own: BoardSet,
    /// Remove any topic
    pub remove_any: BoardSet,
    /// Remove topics the requester started
    pub remove_own: BoardSet,
}

impl BoardPermissions {
    /// Every permission on every board
    pub fn everything() -> Self {
        let all = BoardSet::everywhere();
        BoardPermissions {
            post_reply_any: all.clone(),
            post_reply_own: all.clone(),
            mark_any_notify: all.clone(),
            lock_any: all.clone(),
            lock_own: all.clone(),
            make_sticky: all.clone(),
            move_any: all.clone(),
            move_own: all.clone(),
            remove_any: all.clone(),
            remove_own: all,
        }
    }

    /// Flags for one row
    pub fn flags(
        &self,
        board: BoardId,
        started_by_requester: bool,
        requester: &Requester,
        quote_enabled: bool,
        quick_mod: bool,
    ) -> PermissionFlags {
        let own = |any: &BoardSet, own: &BoardSet| {
            any.contains(board) || (started_by_requester && own.contains(board))
        };
        let can_reply = own(&self.post_reply_any, &self.post_reply_own);
        PermissionFlags {
            can_reply,
            can_quote: can_reply && quote_enabled,
            can_mark_notify: !requester.is_guest() && self.mark_any_notify.contains(board),
            quick_mod: quick_mod.then(|| QuickModFlags {
                lock: own(&self.lock_any, &self.lock_own),
                sticky: self.make_sticky.contains(board),
                move_topic: own(&self.move_any, &self.move_own),
                remove: own(&self.remove_any, &self.remove_own),
            }),
        }
    }
}

// ============================================================================
// ResultRenderer
// ============================================================================

/// Per-row inputs that come from page-level lookups
#[derive(Debug, Clone)]
pub struct RowContext<'a> {
    /// Position in the whole result list, starting at 1
    pub counter: usize,
    /// Board the message lives in, if still present
    pub board: Option<&'a Board>,
    /// Owning topic, if still present
    pub topic: Option<&'a Topic>,
    /// Display name of a registered poster
    pub poster_name: Option<&'a str>,
    /// Requester has posted in the topic
    pub posted_in: bool,
    /// Who is looking
    pub requester: &'a Requester,
    /// Requester's board permissions
    pub permissions: &'a BoardPermissions,
    /// Show quick-moderation actions
    pub quick_mod: bool,
    /// Positive search terms
    pub terms: &'a [String],
    /// Excerpts instead of full bodies
    pub compact: bool,
}

/// Builds display records from ranked messages
pub struct ResultRenderer {
    config: Arc<SearchConfig>,
    markup: Arc<dyn MarkupRenderer>,
    censor: Arc<dyn Censor>,
}

impl ResultRenderer {
    /// Create a renderer
    pub fn new(
        config: Arc<SearchConfig>,
        markup: Arc<dyn MarkupRenderer>,
        censor: Arc<dyn Censor>,
    ) -> Self {
        ResultRenderer {
            config,
            markup,
            censor,
        }
    }

    /// Render one row
    pub fn render_row(
        &self,
        ranked: &RankedMessage,
        message: &Message,
        ctx: &RowContext<'_>,
    ) -> ResultItem {
        let subject = self.censor.censor(message.subject.trim());
        let subject = if subject.is_empty() {
            NO_SUBJECT.to_string()
        } else {
            escape_html(&subject)
        };

        let raw_body = if message.body.replace("&nbsp;", " ").trim().is_empty() {
            ""
        } else {
            message.body.as_str()
        };

        let body = if ctx.compact {
            let censored = self.censor.censor(raw_body);
            let text = strip_tags(&self.markup.render_body(&censored, message.smileys_enabled));
            excerpt(&text, ctx.terms, self.config.excerpt_chars)
        } else {
            let html = self.markup.render_body(raw_body, message.smileys_enabled);
            self.censor.censor(&html)
        };

        let started_by_requester = !ctx.requester.is_guest()
            && ctx.topic.map_or(false, |t| t.starter_id == ctx.requester.id);

        ResultItem {
            topic_id: message.topic_id,
            message_id: message.id,
            board_id: message.board_id,
            board_name: ctx.board.map(|b| b.name.clone()).unwrap_or_default(),
            category_name: ctx.board.map(|b| b.category_name.clone()).unwrap_or_default(),
            relevance: ranked.relevance,
            subject_highlighted: highlight_subject(&subject, ctx.terms),
            subject,
            body_highlighted: highlight_body(&body, ctx.terms),
            body,
            poster_id: message.poster_id,
            poster_name: ctx
                .poster_name
                .map(str::to_string)
                .unwrap_or_else(|| message.poster_name.clone()),
            posted_at: message.posted_at,
            is_stickied: ranked.is_sticky,
            posted_in: ctx.posted_in,
            counter: ctx.counter,
            permissions: ctx.permissions.flags(
                message.board_id,
                started_by_requester,
                ctx.requester,
                self.config.quote_enabled,
                ctx.quick_mod,
            ),
        }
    }

    /// Render one page of the engine's ranked list
    ///
    /// Moves the engine to `Rendered`.
    pub fn render_page(
        &self,
        engine: &mut SearchEngine,
        page: &PageIndex,
        requester: &Requester,
        permissions: &BoardPermissions,
        quick_mod: bool,
    ) -> Result<Vec<ResultItem>> {
        let rows = engine.load_messages_request(page)?;

        let posters: Vec<MemberId> = rows.iter().map(|(_, m)| m.poster_id).collect();
        let topics: Vec<TopicId> = rows.iter().map(|(_, m)| m.topic_id).collect();
        let boards: Vec<BoardId> = rows.iter().map(|(_, m)| m.board_id).collect();

        let names: BTreeMap<MemberId, String> = engine.load_posters(&posters)?;
        let participated = engine.get_participants(requester, &topics)?;
        let topic_rows = engine.load_topics(&topics)?;
        let board_rows = engine.load_boards(&boards)?;
        let terms = engine.search_array();
        let compact = engine.is_compact();

        // Rows deleted since ranking are skipped but keep their counter slot
        let items = rows
            .iter()
            .map(|(ranked, message)| {
                let position = engine
                    .results()
                    .iter()
                    .position(|r| r.message_id == ranked.message_id)
                    .unwrap_or(page.start);
                let ctx = RowContext {
                    counter: position + 1,
                    board: board_rows.get(&message.board_id),
                    topic: topic_rows.get(&message.topic_id),
                    poster_name: names.get(&message.poster_id).map(String::as_str),
                    posted_in: participated.contains(&message.topic_id),
                    requester,
                    permissions,
                    quick_mod,
                    terms: &terms,
                    compact,
                };
                self.render_row(ranked, message, &ctx)
            })
            .collect();

        engine.mark_rendered()?;
        Ok(items)
    }
}
