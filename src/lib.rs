//! # Trivia Duel Server
//!
//! Matchmaking server for anonymous two-player trivia duels. Connections
//! queue with a chosen character, pair strictly first-come-first-served,
//! and play against a 120-second deadline; each player pulls questions at
//! their own pace while scores stay in sync over a room broadcast.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    TRIVIA DUEL SERVER                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  content/          - Question source                         │
//! │  └── pool.rs       - Canonical dataset + shuffled draws      │
//! │                                                              │
//! │  game/             - Match rules (pure, no I/O)              │
//! │  ├── queue.rs      - Strict FIFO matchmaking queue           │
//! │  └── room.rs       - Scores, cursors, idempotent answers     │
//! │                                                              │
//! │  network/          - Transport and session plumbing          │
//! │  ├── protocol.rs   - Tagged JSON wire messages               │
//! │  ├── session.rs    - Registry, room store, deadline timers   │
//! │  ├── controller.rs - The session state machine               │
//! │  └── server.rs     - WebSocket accept loop                   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Teardown Guarantee
//!
//! Exactly one of deadline expiry, natural completion, or opponent
//! disconnect tears a room down. `RoomStore::take` is the sole deletion
//! path: the first finalize consumes the room, and every later trigger
//! finds it gone and no-ops.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod content;
pub mod game;
pub mod network;

// Re-export commonly used types
pub use content::{ContentPool, QuestionItem};
pub use game::{ConnectionId, MatchQueue, Room, RoomId};
pub use network::{
    ClientMessage, GameServer, ServerConfig, ServerMessage, SessionController,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Fixed match duration in seconds, measured from room creation.
pub const SESSION_DURATION_SECS: u64 = 120;
