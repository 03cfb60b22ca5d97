//! Room State
//!
//! Per-match state for exactly two players: scores, per-player progress
//! cursors, answered-index sets, and the shared append-only question
//! sequence. Pure state machine; all I/O, locking, and timers live in
//! `network/`. Uses BTreeMap keyed by ConnectionId for deterministic
//! iteration order.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::content::{ContentPool, QuestionItem};

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Opaque per-connection identifier.
///
/// Allocated when a connection opens, never reused. Implements Ord for
/// deterministic BTreeMap ordering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Allocate a fresh identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// Unique room identifier as carried on the wire.
pub type RoomId = String;

/// Allocate a fresh room identifier.
pub fn new_room_id() -> RoomId {
    format!("room_{}", Uuid::new_v4().simple())
}

// =============================================================================
// ROOM
// =============================================================================

/// Room lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomPhase {
    /// Match running, events accepted.
    Active,
    /// Finalized; all further mutation is rejected.
    Ended,
}

/// Room state machine errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    /// Caller is not one of the room's two players.
    #[error("Not a room member")]
    NotAMember,

    /// Room already finalized.
    #[error("Room already ended")]
    Ended,

    /// Answer references an index never issued to this player.
    #[error("Index {0} was never issued")]
    StaleIndex(usize),

    /// The content pool produced no questions to issue.
    #[error("Content pool is empty")]
    NoQuestions,
}

/// Result of recording an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerOutcome {
    /// First submission for this index; `correct` says whether it scored.
    Recorded {
        /// Whether the answer matched the item's correct choice.
        correct: bool,
    },
    /// Index already answered by this player; nothing changed.
    Duplicate,
}

/// Final standings of a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchOutcome {
    /// Final points for both players.
    pub points: BTreeMap<ConnectionId, u32>,
    /// Strictly higher score wins; None is a tie.
    pub winner: Option<ConnectionId>,
}

/// Per-match state for exactly two players.
///
/// The question sequence is shared but each player's cursor advances
/// independently, so the two sides need not be on the same question.
/// Mutation attempts that race past teardown hit `RoomPhase::Ended` and
/// are rejected without touching scores.
#[derive(Debug)]
pub struct Room {
    /// Unique room identifier.
    pub id: RoomId,
    /// The two matched players.
    players: [ConnectionId; 2],
    /// Points per player. Never decremented.
    points: BTreeMap<ConnectionId, u32>,
    /// Next-question cursor per player.
    progress: BTreeMap<ConnectionId, usize>,
    /// Question indices already scored per player.
    answered: BTreeMap<ConnectionId, BTreeSet<usize>>,
    /// Shared question sequence. Append-only: issued indices stay stable.
    questions: Vec<QuestionItem>,
    /// When the room was created.
    created_at: Instant,
    /// Lifecycle phase.
    phase: RoomPhase,
}

impl Room {
    /// Create a room for two players with an initial question sequence.
    pub fn new(id: RoomId, players: [ConnectionId; 2], questions: Vec<QuestionItem>) -> Self {
        let mut points = BTreeMap::new();
        let mut progress = BTreeMap::new();
        let mut answered = BTreeMap::new();
        for p in players {
            points.insert(p, 0);
            progress.insert(p, 0);
            answered.insert(p, BTreeSet::new());
        }
        Self {
            id,
            players,
            points,
            progress,
            answered,
            questions,
            created_at: Instant::now(),
            phase: RoomPhase::Active,
        }
    }

    /// The two matched players.
    pub fn players(&self) -> [ConnectionId; 2] {
        self.players
    }

    /// Whether `id` is one of the room's players.
    pub fn is_member(&self, id: &ConnectionId) -> bool {
        self.players.contains(id)
    }

    /// The opponent of `id`, if `id` is a member.
    pub fn opponent_of(&self, id: &ConnectionId) -> Option<ConnectionId> {
        match self.players {
            [a, b] if a == *id => Some(b),
            [a, b] if b == *id => Some(a),
            _ => None,
        }
    }

    /// Current points for both players.
    pub fn points(&self) -> &BTreeMap<ConnectionId, u32> {
        &self.points
    }

    /// Next-question cursor for `id`.
    pub fn progress_of(&self, id: &ConnectionId) -> Option<usize> {
        self.progress.get(id).copied()
    }

    /// Length of the shared question sequence.
    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    /// When the room was created.
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> RoomPhase {
        self.phase
    }

    /// Issue the next question to `player` and advance their cursor.
    ///
    /// Extends the shared sequence with a fresh draw when the cursor has
    /// run past it. The sequence is never replaced: indices already issued
    /// keep scoring against the same items. The opponent's cursor is
    /// untouched.
    pub fn issue_question(
        &mut self,
        player: &ConnectionId,
        pool: &ContentPool,
    ) -> Result<(usize, QuestionItem), RoomError> {
        if self.phase == RoomPhase::Ended {
            return Err(RoomError::Ended);
        }
        let idx = *self.progress.get(player).ok_or(RoomError::NotAMember)?;
        if idx >= self.questions.len() {
            self.questions.extend(pool.draw());
        }
        let question = self
            .questions
            .get(idx)
            .cloned()
            .ok_or(RoomError::NoQuestions)?;
        self.progress.insert(*player, idx + 1);
        Ok((idx, question))
    }

    /// Record `player`'s answer for question `index`.
    ///
    /// Duplicate submissions for an already-answered index leave all state
    /// untouched. A first submission marks the index answered and scores
    /// one point on an exact match with the item's correct choice.
    pub fn record_answer(
        &mut self,
        player: &ConnectionId,
        index: usize,
        answer: &str,
    ) -> Result<AnswerOutcome, RoomError> {
        if self.phase == RoomPhase::Ended {
            return Err(RoomError::Ended);
        }
        let cursor = *self.progress.get(player).ok_or(RoomError::NotAMember)?;
        if index >= cursor {
            // Only indices already issued to this player can be scored.
            return Err(RoomError::StaleIndex(index));
        }
        let answered = self.answered.get_mut(player).ok_or(RoomError::NotAMember)?;
        if !answered.insert(index) {
            return Ok(AnswerOutcome::Duplicate);
        }
        let correct = self.questions[index].correct == answer;
        if correct {
            *self.points.entry(*player).or_insert(0) += 1;
        }
        Ok(AnswerOutcome::Recorded { correct })
    }

    /// Final standings: strictly higher score wins, equal is a tie.
    pub fn outcome(&self) -> MatchOutcome {
        let [a, b] = self.players;
        let pa = self.points.get(&a).copied().unwrap_or(0);
        let pb = self.points.get(&b).copied().unwrap_or(0);
        let winner = if pa > pb {
            Some(a)
        } else if pb > pa {
            Some(b)
        } else {
            None
        };
        MatchOutcome {
            points: self.points.clone(),
            winner,
        }
    }

    /// Transition Active -> Ended. Returns whether the room was active.
    pub fn end(&mut self) -> bool {
        if self.phase == RoomPhase::Active {
            self.phase = RoomPhase::Ended;
            true
        } else {
            false
        }
    }
}
