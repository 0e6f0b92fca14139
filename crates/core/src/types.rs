//! Core identifier types for forum search
//!
//! This module defines the foundational types:
//! - BoardId, TopicId, MessageId, MemberId: numeric row identifiers
//! - Requester: who is asking (member or guest) and what they may see
//! - BoardSet: a set of boards, or "every board"

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl $name {
            /// Raw numeric value
            pub fn get(self) -> u32 {
                self.0
            }
        }

        impl From<u32> for $name {
            fn from(v: u32) -> Self {
                Self(v)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse::<u32>().map(Self)
            }
        }
    };
}

numeric_id!(
    /// Identifier of a board (forum section)
    BoardId
);
numeric_id!(
    /// Identifier of a topic (thread)
    TopicId
);
numeric_id!(
    /// Identifier of a single message (post)
    MessageId
);
numeric_id!(
    /// Identifier of a registered member; `MemberId::GUEST` for guests
    MemberId
);

impl MemberId {
    /// Poster id recorded for guest posts
    pub const GUEST: MemberId = MemberId(0);

    /// True for the guest id
    pub fn is_guest(self) -> bool {
        self == Self::GUEST
    }
}

// ============================================================================
// Requester
// ============================================================================

/// The person a search request is executed for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requester {
    /// Member id, `MemberId::GUEST` for anonymous visitors
    pub id: MemberId,
    /// Remote address, identifies guests
    pub ip: String,
    /// Administrators unlock otherwise gated weighting dimensions
    pub is_admin: bool,
}

impl Requester {
    /// A guest identified by address
    pub fn guest(ip: impl Into<String>) -> Self {
        Requester {
            id: MemberId::GUEST,
            ip: ip.into(),
            is_admin: false,
        }
    }

    /// A logged in member
    pub fn member(id: MemberId, ip: impl Into<String>) -> Self {
        Requester {
            id,
            ip: ip.into(),
            is_admin: false,
        }
    }

    /// Builder: mark as administrator
    pub fn with_admin(mut self, is_admin: bool) -> Self {
        self.is_admin = is_admin;
        self
    }

    /// True when nobody is logged in
    pub fn is_guest(&self) -> bool {
        self.id.is_guest()
    }

    /// Stable identity used for per-requester state: member id or guest address
    pub fn identity(&self) -> String {
        if self.is_guest() {
            self.ip.clone()
        } else {
            self.id.to_string()
        }
    }
}

// ============================================================================
// BoardSet
// ============================================================================

/// A set of boards that may also mean "every board"
///
/// Permission lookups answer either with an explicit board list or with a
/// global grant; both are represented here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardSet {
    /// Global grant, covers every board
    pub all: bool,
    /// Explicitly listed boards
    pub boards: BTreeSet<BoardId>,
}

impl BoardSet {
    /// Empty set
    pub fn none() -> Self {
        Self::default()
    }

    /// Every board
    pub fn everywhere() -> Self {
        BoardSet {
            all: true,
            boards: BTreeSet::new(),
        }
    }

    /// Explicit board list
    pub fn of(boards: impl IntoIterator<Item = BoardId>) -> Self {
        BoardSet {
            all: false,
            boards: boards.into_iter().collect(),
        }
    }

    /// Membership test honouring the global grant
    pub fn contains(&self, board: BoardId) -> bool {
        self.all || self.boards.contains(&board)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_parse_and_display() {
        let id: MessageId = " 42 ".parse().unwrap();
        assert_eq!(id, MessageId(42));
        assert_eq!(id.to_string(), "42");
        assert!("x".parse::<BoardId>().is_err());
    }

    #[test]
    fn test_guest_identity_uses_ip() {
        let guest = Requester::guest("10.0.0.1");
        assert!(guest.is_guest());
        assert_eq!(guest.identity(), "10.0.0.1");

        let member = Requester::member(MemberId(7), "10.0.0.1");
        assert!(!member.is_guest());
        assert_eq!(member.identity(), "7");
    }

    #[test]
    fn test_board_set_contains() {
        let set = BoardSet::of([BoardId(1), BoardId(3)]);
        assert!(set.contains(BoardId(1)));
        assert!(!set.contains(BoardId(2)));
        assert!(BoardSet::everywhere().contains(BoardId(2)));
        assert!(!BoardSet::none().contains(BoardId(1)));
    }

    #[test]
    fn test_id_serde_transparent() {
        let json = serde_json::to_string(&TopicId(9)).unwrap();
        assert_eq!(json, "9");
    }
}
