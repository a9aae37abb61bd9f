//! View numbers, protocol phases and message kinds.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A numbered round owned by a rotating leader.
pub type ViewNumber = u64;

/// Sub-step within a view.
///
/// The basic variant cycles `NewView → Prepare → PreCommit → Commit → Decide`.
/// The chained variant collapses all of them into `Generic`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    NewView,
    Prepare,
    PreCommit,
    Commit,
    Decide,
    Generic,
}

impl Phase {
    /// Next phase in the basic five-phase cycle. `Generic` maps to itself.
    pub fn next(self) -> Self {
        match self {
            Self::NewView => Self::Prepare,
            Self::Prepare => Self::PreCommit,
            Self::PreCommit => Self::Commit,
            Self::Commit => Self::Decide,
            Self::Decide => Self::NewView,
            Self::Generic => Self::Generic,
        }
    }

    /// The leader broadcast that opens this phase, if any.
    pub fn message_type(self) -> Option<MessageType> {
        match self {
            Self::NewView => None,
            Self::Prepare => Some(MessageType::Prepare),
            Self::PreCommit => Some(MessageType::PreCommit),
            Self::Commit => Some(MessageType::Commit),
            Self::Decide => Some(MessageType::Decide),
            Self::Generic => Some(MessageType::Generic),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NewView => "new_view",
            Self::Prepare => "prepare",
            Self::PreCommit => "pre_commit",
            Self::Commit => "commit",
            Self::Decide => "decide",
            Self::Generic => "generic",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every kind of consensus message carried on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    NewView,
    Prepare,
    PreCommit,
    Commit,
    Decide,
    Vote,
    Generic,
}

impl MessageType {
    /// Whether this is a leader-to-replica proposal (as opposed to a
    /// replica-to-leader NewView or Vote).
    pub fn is_proposal(self) -> bool {
        !matches!(self, Self::NewView | Self::Vote)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NewView => "new_view",
            Self::Prepare => "prepare",
            Self::PreCommit => "pre_commit",
            Self::Commit => "commit",
            Self::Decide => "decide",
            Self::Vote => "vote",
            Self::Generic => "generic",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
