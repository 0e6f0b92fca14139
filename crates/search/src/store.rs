//! In-memory forum store
//!
//! [`MemoryForum`] implements [`ForumStore`] and [`MemberDirectory`] over
//! plain maps behind a `parking_lot::RwLock`. It backs tests, benches and
//! small embedded deployments.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use boardsearch_core::{
    Board, BoardId, ForumStats, ForumStore, MemberDirectory, MemberId, Message, MessageId,
    Result, SearchError, Topic, TopicId,
};
use parking_lot::RwLock;

use crate::matcher::glob_match;

#[derive(Debug, Default)]
struct ForumData {
    messages: BTreeMap<MessageId, Message>,
    topics: BTreeMap<TopicId, Topic>,
    boards: BTreeMap<BoardId, Board>,
    hidden_boards: BTreeSet<BoardId>,
    members: BTreeMap<MemberId, String>,
}

/// Forum content held in memory
#[derive(Debug, Default)]
pub struct MemoryForum {
    data: RwLock<ForumData>,
    revision: AtomicU64,
    failing: AtomicBool,
}

impl MemoryForum {
    /// Empty forum
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a board; new boards are searchable
    pub fn add_board(&self, board: Board) {
        self.data.write().boards.insert(board.id, board);
    }

    /// Include or exclude a board from the default search scope
    pub fn set_board_searchable(&self, board: BoardId, searchable: bool) {
        let mut data = self.data.write();
        if searchable {
            data.hidden_boards.remove(&board);
        } else {
            data.hidden_boards.insert(board);
        }
    }

    /// Register a member name
    pub fn add_member(&self, id: MemberId, name: impl Into<String>) {
        self.data.write().members.insert(id, name.into());
    }

    /// Add or replace a topic
    pub fn add_topic(&self, topic: Topic) {
        self.data.write().topics.insert(topic.id, topic);
    }

    /// Pin or unpin a topic
    pub fn set_sticky(&self, topic: TopicId, sticky: bool) {
        if let Some(t) = self.data.write().topics.get_mut(&topic) {
            t.is_sticky = sticky;
        }
    }

    /// Store a message, creating its topic on first use
    ///
    /// The earliest message id of a topic is its opening message; later
    /// ones count as replies.
    pub fn add_message(&self, message: Message) {
        let mut guard = self.data.write();
        let data = &mut *guard;
        let replaced = data.messages.insert(message.id, message.clone()).is_some();

        match data.topics.get_mut(&message.topic_id) {
            Some(topic) => {
                if !replaced {
                    topic.num_replies += 1;
                }
                if message.id < topic.first_message_id {
                    topic.first_message_id = message.id;
                    topic.starter_id = message.poster_id;
                }
            }
            None => {
                data.topics.insert(
                    message.topic_id,
                    Topic {
                        id: message.topic_id,
                        board_id: message.board_id,
                        first_message_id: message.id,
                        starter_id: message.poster_id,
                        num_replies: 0,
                        is_sticky: false,
                    },
                );
            }
        }
        self.revision.fetch_add(1, Ordering::Release);
    }

    /// Delete a message; returns `false` when it was not stored
    pub fn remove_message(&self, id: MessageId) -> bool {
        let mut guard = self.data.write();
        let data = &mut *guard;
        let removed = match data.messages.remove(&id) {
            Some(message) => message,
            None => return false,
        };
        let topic_empty = !data
            .messages
            .values()
            .any(|m| m.topic_id == removed.topic_id);
        if topic_empty {
            data.topics.remove(&removed.topic_id);
        } else if let Some(topic) = data.topics.get_mut(&removed.topic_id) {
            topic.num_replies = topic.num_replies.saturating_sub(1);
            if topic.first_message_id == id {
                if let Some(first) = data
                    .messages
                    .values()
                    .filter(|m| m.topic_id == removed.topic_id)
                    .min_by_key(|m| m.id)
                {
                    topic.first_message_id = first.id;
                    topic.starter_id = first.poster_id;
                }
            }
        }
        self.revision.fetch_add(1, Ordering::Release);
        true
    }

    /// Number of stored messages
    pub fn message_count(&self) -> usize {
        self.data.read().messages.len()
    }

    /// Make every read fail, simulating an unreachable database
    pub fn fail_reads(&self, failing: bool) {
        self.failing.store(failing, Ordering::Release);
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::Acquire) {
            Err(SearchError::storage("forum store unavailable"))
        } else {
            Ok(())
        }
    }
}

impl ForumStore for MemoryForum {
    fn scan_messages(&self, visitor: &mut dyn FnMut(&Message) -> bool) -> Result<()> {
        self.check()?;
        // Snapshot first so the visitor may call back into the store
        let mut snapshot: Vec<Message> = self.data.read().messages.values().cloned().collect();
        snapshot.sort_by(|a, b| b.posted_at.cmp(&a.posted_at).then(b.id.cmp(&a.id)));
        for message in &snapshot {
            if !visitor(message) {
                break;
            }
        }
        Ok(())
    }

    fn messages(&self, ids: &[MessageId]) -> Result<Vec<Message>> {
        self.check()?;
        let data = self.data.read();
        Ok(ids
            .iter()
            .filter_map(|id| data.messages.get(id).cloned())
            .collect())
    }

    fn topic(&self, id: TopicId) -> Result<Option<Topic>> {
        self.check()?;
        Ok(self.data.read().topics.get(&id).cloned())
    }

    fn board(&self, id: BoardId) -> Result<Option<Board>> {
        self.check()?;
        Ok(self.data.read().boards.get(&id).cloned())
    }

    fn searchable_boards(&self) -> Result<BTreeSet<BoardId>> {
        self.check()?;
        let data = self.data.read();
        Ok(data
            .boards
            .keys()
            .filter(|b| !data.hidden_boards.contains(*b))
            .copied()
            .collect())
    }

    fn stats(&self) -> Result<ForumStats> {
        self.check()?;
        let data = self.data.read();
        let times = data.messages.values().map(|m| m.posted_at);
        Ok(ForumStats {
            total_messages: data.messages.len(),
            oldest_post: times.clone().min(),
            newest_post: times.max(),
        })
    }

    fn revision(&self) -> Result<u64> {
        self.check()?;
        Ok(self.revision.load(Ordering::Acquire))
    }

    fn topics_participated(
        &self,
        member: MemberId,
        topics: &[TopicId],
    ) -> Result<BTreeSet<TopicId>> {
        self.check()?;
        if member.is_guest() {
            return Ok(BTreeSet::new());
        }
        let wanted: BTreeSet<TopicId> = topics.iter().copied().collect();
        Ok(self
            .data
            .read()
            .messages
            .values()
            .filter(|m| m.poster_id == member && wanted.contains(&m.topic_id))
            .map(|m| m.topic_id)
            .collect())
    }
}

impl MemberDirectory for MemoryForum {
    fn find_members(&self, patterns: &[String], limit: usize) -> Result<Vec<MemberId>> {
        self.check()?;
        Ok(self
            .data
            .read()
            .members
            .iter()
            .filter(|(_, name)| patterns.iter().any(|p| glob_match(p, name)))
            .map(|(id, _)| *id)
            .take(limit)
            .collect())
    }

    fn member_names(&self, ids: &[MemberId]) -> Result<BTreeMap<MemberId, String>> {
        self.check()?;
        let data = self.data.read();
        Ok(ids
            .iter()
            .filter_map(|id| data.members.get(id).map(|name| (*id, name.clone())))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn message(id: u32, topic: u32, poster: u32, days: i64) -> Message {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Message {
            id: MessageId(id),
            topic_id: TopicId(topic),
            board_id: BoardId(1),
            poster_id: MemberId(poster),
            poster_name: format!("member{}", poster),
            subject: format!("subject {}", id),
            body: "body".to_string(),
            posted_at: base + Duration::days(days),
            smileys_enabled: true,
        }
    }

    #[test]
    fn test_topic_bookkeeping() {
        let forum = MemoryForum::new();
        forum.add_message(message(2, 1, 7, 1));
        forum.add_message(message(3, 1, 8, 2));
        // Earlier id arriving late becomes the opener
        forum.add_message(message(1, 1, 9, 0));

        let topic = forum.topic(TopicId(1)).unwrap().unwrap();
        assert_eq!(topic.first_message_id, MessageId(1));
        assert_eq!(topic.starter_id, MemberId(9));
        assert_eq!(topic.num_replies, 2);

        // Replacing a message is not a new reply
        forum.add_message(message(3, 1, 8, 2));
        assert_eq!(forum.topic(TopicId(1)).unwrap().unwrap().num_replies, 2);
    }

    #[test]
    fn test_remove_message_and_revision() {
        let forum = MemoryForum::new();
        let start = forum.revision().unwrap();
        forum.add_message(message(1, 1, 7, 2));
        forum.add_message(message(2, 1, 8, 1));
        assert_eq!(forum.revision().unwrap(), start + 2);

        // Removing the opener promotes the next message
        assert!(forum.remove_message(MessageId(1)));
        let topic = forum.topic(TopicId(1)).unwrap().unwrap();
        assert_eq!(topic.first_message_id, MessageId(2));
        assert_eq!(topic.starter_id, MemberId(8));
        assert_eq!(topic.num_replies, 0);
        assert_eq!(forum.revision().unwrap(), start + 3);

        assert!(!forum.remove_message(MessageId(1)));
        assert_eq!(forum.revision().unwrap(), start + 3);
        assert!(forum.remove_message(MessageId(2)));
        assert!(forum.topic(TopicId(1)).unwrap().is_none());
    }

    #[test]
    fn test_scan_newest_first_and_stop() {
        let forum = MemoryForum::new();
        for (id, day) in [(1, 0), (2, 5), (3, 3)] {
            forum.add_message(message(id, id, 1, day));
        }
        let mut seen = Vec::new();
        forum
            .scan_messages(&mut |m| {
                seen.push(m.id.get());
                seen.len() < 2
            })
            .unwrap();
        assert_eq!(seen, vec![2, 3]);
    }

    #[test]
    fn test_stats_and_searchable_boards() {
        let forum = MemoryForum::new();
        for id in [1, 2] {
            forum.add_board(Board {
                id: BoardId(id),
                name: format!("board {}", id),
                category_id: 1,
                category_name: "cat".to_string(),
            });
        }
        forum.set_board_searchable(BoardId(2), false);
        assert_eq!(
            forum.searchable_boards().unwrap(),
            [BoardId(1)].into_iter().collect()
        );

        forum.add_message(message(1, 1, 1, 0));
        forum.add_message(message(2, 1, 1, 10));
        let stats = forum.stats().unwrap();
        assert_eq!(stats.total_messages, 2);
        assert_eq!(stats.activity_span_days(), 10);
    }

    #[test]
    fn test_participation() {
        let forum = MemoryForum::new();
        forum.add_message(message(1, 1, 7, 0));
        forum.add_message(message(2, 2, 8, 0));
        let topics = forum
            .topics_participated(MemberId(7), &[TopicId(1), TopicId(2)])
            .unwrap();
        assert_eq!(topics, [TopicId(1)].into_iter().collect());
        assert!(forum
            .topics_participated(MemberId::GUEST, &[TopicId(1)])
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_find_members_limit() {
        let forum = MemoryForum::new();
        forum.add_member(MemberId(1), "alice");
        forum.add_member(MemberId(2), "alicia");
        forum.add_member(MemberId(3), "bob");
        let found = forum.find_members(&["ali*".to_string()], 10).unwrap();
        assert_eq!(found, vec![MemberId(1), MemberId(2)]);
        assert_eq!(forum.find_members(&["*".to_string()], 2).unwrap().len(), 2);
        let names = forum.member_names(&[MemberId(3), MemberId(4)]).unwrap();
        assert_eq!(names.get(&MemberId(3)).map(String::as_str), Some("bob"));
        assert_eq!(names.len(), 1);
    }

    #[test]
    fn test_failing_reads() {
        let forum = MemoryForum::new();
        forum.fail_reads(true);
        assert!(matches!(forum.stats(), Err(SearchError::Storage { .. })));
        forum.fail_reads(false);
        assert!(forum.stats().is_ok());
    }
}
