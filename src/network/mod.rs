//! Network Layer
//!
//! WebSocket transport, wire protocol, and the session state machine.
//! All match rules live in `game/`; this layer only moves events and
//! owns the locks and timers around them.

pub mod controller;
pub mod protocol;
pub mod server;
pub mod session;

pub use controller::{ControllerError, SessionController};
pub use protocol::{
    ClientMessage, MatchEndInfo, MatchFoundInfo, MatchPlayer, QuestionInfo, ServerMessage,
};
pub use server::{GameServer, GameServerError, ServerConfig};
pub use session::{ConnectionState, MatchRoom, RoomMember, RoomStore, SessionHandle};
