//! Protocol Messages
//!
//! Wire format for client-server communication over WebSocket. All
//! messages are JSON, tagged with a camelCase `type` field.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::content::pool::CHOICE_COUNT;
use crate::game::room::{ConnectionId, RoomId};

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
///
/// Disconnection has no message of its own: it is transport-level.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Enter the matchmaking queue.
    JoinQueue {
        /// Character the player queues with.
        character: String,
    },

    /// Pull the caller's next question. Questions are never pushed
    /// unprompted.
    RequestQuestion {
        /// Target room.
        room: RoomId,
    },

    /// Submit an answer for a question index issued earlier.
    Answer {
        /// Target room.
        room: RoomId,
        /// Question index being answered.
        index: usize,
        /// The chosen answer text.
        answer: String,
    },
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    /// Queued alone; a match forms when another player arrives.
    Waiting,

    /// A match formed; sent to both members.
    MatchFound(MatchFoundInfo),

    /// A question, sent to the requesting player only.
    Question(QuestionInfo),

    /// Updated totals for both players, sent to the whole room.
    ScoreUpdate {
        /// Points per player.
        points: BTreeMap<ConnectionId, u32>,
    },

    /// The named player left an active match; sent to the remaining
    /// member.
    PlayerDisconnected {
        /// The departing connection.
        id: ConnectionId,
    },

    /// The match is over; final standings. Best-effort: may reach only
    /// the remaining member if the other already disconnected.
    MatchEnded(MatchEndInfo),
}

/// A matched player as presented to both clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchPlayer {
    /// Connection identifier.
    pub id: ConnectionId,
    /// Character chosen at queue time.
    pub character: String,
}

/// Payload of `matchFound`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchFoundInfo {
    /// Room identifier for subsequent requests.
    pub room: RoomId,
    /// Both matched players, pairing order first.
    pub players: Vec<MatchPlayer>,
    /// Session duration in seconds.
    pub time: u64,
}

/// Payload of `question`. Never carries the correct choice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionInfo {
    /// Index of this question in the caller's sequence.
    pub index: usize,
    /// Question text.
    pub q: String,
    /// The four answer choices.
    pub choices: [String; CHOICE_COUNT],
}

/// Payload of `matchEnded`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchEndInfo {
    /// Final points for both players.
    pub points: BTreeMap<ConnectionId, u32>,
    /// Winning connection; null on a tie.
    pub winner: Option<ConnectionId>,
    /// Winner's character; null on a tie.
    pub winner_character: Option<String>,
}

// =============================================================================
// SERIALIZATION HELPERS
// =============================================================================

impl ClientMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}
