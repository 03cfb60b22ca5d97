//! Game Logic Module
//!
//! The matchmaking queue and per-room match rules. Pure data types with no
//! I/O; all locking, timers, and transport live in `network/`.
//!
//! ## Module Structure
//!
//! - `queue`: strict-FIFO waiting list for unpaired connections
//! - `room`: per-match scores, cursors, and idempotent answer recording

pub mod queue;
pub mod room;

// Re-export key types
pub use queue::MatchQueue;
pub use room::{
    new_room_id, AnswerOutcome, ConnectionId, MatchOutcome, Room, RoomError, RoomId, RoomPhase,
};
