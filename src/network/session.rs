//! Session State
//!
//! Connection registry entries, the network-layer room wrapper, and the
//! room store. `RoomStore::take` is the sole deletion path for rooms: the
//! first finalize consumes the room and every later trigger finds it gone,
//! which is what keeps teardown idempotent.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;

use crate::game::room::{ConnectionId, Room, RoomId};
use crate::network::protocol::ServerMessage;

// =============================================================================
// SESSION HANDLES
// =============================================================================

/// Per-connection state as seen by the matchmaker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// Connected, neither queued nor in a match.
    Idle,
    /// Waiting in the matchmaking queue.
    Queued,
    /// Member of an active room.
    InMatch {
        /// The owning room.
        room: RoomId,
    },
}

/// Registry entry for one open connection.
///
/// Created on connect, destroyed on disconnect. The character is recorded
/// once, at queue time.
#[derive(Debug)]
pub struct SessionHandle {
    /// Connection identifier.
    pub id: ConnectionId,
    /// Character chosen at queue time, if any.
    pub character: Option<String>,
    /// Current matchmaking state.
    pub state: ConnectionState,
    /// Message channel to this connection.
    pub sender: mpsc::Sender<ServerMessage>,
}

// =============================================================================
// MATCH ROOM
// =============================================================================

/// A room member's delivery endpoint and recorded character.
///
/// The character is copied out of the registry at match creation so a
/// departed winner still has one at finalize time.
#[derive(Debug)]
pub struct RoomMember {
    /// Character recorded at match creation.
    pub character: String,
    /// Message channel to this member.
    pub sender: mpsc::Sender<ServerMessage>,
}

/// Network-layer wrapper around a [`Room`]: delivery endpoints for both
/// members plus the armed deadline task.
#[derive(Debug)]
pub struct MatchRoom {
    /// The pure game state.
    pub room: Room,
    members: BTreeMap<ConnectionId, RoomMember>,
    deadline: Option<JoinHandle<()>>,
}

impl MatchRoom {
    /// Wrap a room with its members' delivery endpoints.
    pub fn new(room: Room, members: BTreeMap<ConnectionId, RoomMember>) -> Self {
        Self {
            room,
            members,
            deadline: None,
        }
    }

    /// Character recorded for `id` at match creation.
    pub fn character_of(&self, id: &ConnectionId) -> Option<&str> {
        self.members.get(id).map(|m| m.character.as_str())
    }

    /// Send `message` to every member. Closed channels (a member that
    /// already disconnected) are skipped silently.
    pub async fn broadcast(&self, message: ServerMessage) {
        for member in self.members.values() {
            let _ = member.sender.send(message.clone()).await;
        }
    }

    /// Send `message` to a single member.
    pub async fn send_to(&self, id: &ConnectionId, message: ServerMessage) {
        if let Some(member) = self.members.get(id) {
            let _ = member.sender.send(message).await;
        }
    }

    /// Arm the deadline task. A previously armed task is aborted.
    pub fn arm_deadline(&mut self, task: JoinHandle<()>) {
        if let Some(old) = self.deadline.replace(task) {
            old.abort();
        }
    }

    /// Remove the deadline handle without aborting it. The deadline task
    /// calls this on itself before finalizing, so finalize never aborts
    /// the task that is running it.
    pub fn take_deadline(&mut self) -> Option<JoinHandle<()>> {
        self.deadline.take()
    }

    /// Abort and drop the deadline task if still armed.
    pub fn disarm_deadline(&mut self) {
        if let Some(task) = self.deadline.take() {
            task.abort();
        }
    }
}

impl Drop for MatchRoom {
    fn drop(&mut self) {
        self.disarm_deadline();
    }
}

// =============================================================================
// ROOM STORE
// =============================================================================

/// All active rooms keyed by id, plus the player -> room index.
#[derive(Debug, Default)]
pub struct RoomStore {
    rooms: RwLock<BTreeMap<RoomId, Arc<RwLock<MatchRoom>>>>,
    player_rooms: RwLock<BTreeMap<ConnectionId, RoomId>>,
}

impl RoomStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a room and index both members.
    pub async fn insert(&self, room: MatchRoom) -> Arc<RwLock<MatchRoom>> {
        let id = room.room.id.clone();
        let players = room.room.players();
        let shared = Arc::new(RwLock::new(room));

        self.rooms.write().await.insert(id.clone(), shared.clone());
        let mut index = self.player_rooms.write().await;
        for p in players {
            index.insert(p, id.clone());
        }

        shared
    }

    /// Look up a room by id.
    pub async fn get(&self, id: &RoomId) -> Option<Arc<RwLock<MatchRoom>>> {
        self.rooms.read().await.get(id).cloned()
    }

    /// Room id a player currently belongs to.
    pub async fn room_of(&self, player: &ConnectionId) -> Option<RoomId> {
        self.player_rooms.read().await.get(player).cloned()
    }

    /// Atomically remove a room and its member index entries.
    ///
    /// The sole deletion path: the first caller gets the room, every
    /// later caller gets None.
    pub async fn take(&self, id: &RoomId) -> Option<Arc<RwLock<MatchRoom>>> {
        let removed = self.rooms.write().await.remove(id)?;

        let players = removed.read().await.room.players();
        let mut index = self.player_rooms.write().await;
        for p in players {
            if index.get(&p) == Some(id) {
                index.remove(&p);
            }
        }

        Some(removed)
    }

    /// Number of active rooms.
    pub async fn len(&self) -> usize {
        self.rooms.read().await.len()
    }

    /// Whether no rooms are active.
    pub async fn is_empty(&self) -> bool {
        self.rooms.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::room::new_room_id;

    fn test_room() -> (MatchRoom, ConnectionId, ConnectionId, TestReceivers) {
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        let (tx_a, rx_a) = mpsc::channel(8);
        let (tx_b, rx_b) = mpsc::channel(8);

        let mut members = BTreeMap::new();
        members.insert(
            a,
            RoomMember {
                character: "fox".to_string(),
                sender: tx_a,
            },
        );
        members.insert(
            b,
            RoomMember {
                character: "wolf".to_string(),
                sender: tx_b,
            },
        );

        let room = Room::new(new_room_id(), [a, b], Vec::new());
        (MatchRoom::new(room, members), a, b, (rx_a, rx_b))
    }

    type TestReceivers = (
        mpsc::Receiver<ServerMessage>,
        mpsc::Receiver<ServerMessage>,
    );

    #[tokio::test]
    async fn broadcast_reaches_both_members() {
        let (room, _a, _b, (mut rx_a, mut rx_b)) = test_room();

        room.broadcast(ServerMessage::Waiting).await;

        assert!(matches!(rx_a.recv().await, Some(ServerMessage::Waiting)));
        assert!(matches!(rx_b.recv().await, Some(ServerMessage::Waiting)));
    }

    #[tokio::test]
    async fn send_to_targets_one_member() {
        let (room, a, _b, (mut rx_a, mut rx_b)) = test_room();

        room.send_to(&a, ServerMessage::Waiting).await;

        assert!(matches!(rx_a.recv().await, Some(ServerMessage::Waiting)));
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn broadcast_skips_closed_channels() {
        let (room, _a, _b, (rx_a, mut rx_b)) = test_room();
        drop(rx_a);

        room.broadcast(ServerMessage::Waiting).await;

        assert!(matches!(rx_b.recv().await, Some(ServerMessage::Waiting)));
    }

    #[tokio::test]
    async fn characters_recorded_at_creation() {
        let (room, a, b, _rx) = test_room();
        assert_eq!(room.character_of(&a), Some("fox"));
        assert_eq!(room.character_of(&b), Some("wolf"));
        assert_eq!(room.character_of(&ConnectionId::new()), None);
    }

    #[tokio::test]
    async fn take_is_the_single_deletion_path() {
        let store = RoomStore::new();
        let (room, a, _b, _rx) = test_room();
        let id = room.room.id.clone();

        store.insert(room).await;
        assert_eq!(store.len().await, 1);
        assert_eq!(store.room_of(&a).await, Some(id.clone()));

        assert!(store.take(&id).await.is_some());
        assert!(store.take(&id).await.is_none());
        assert!(store.is_empty().await);
        assert_eq!(store.room_of(&a).await, None);
    }

    #[tokio::test]
    async fn get_after_take_is_none() {
        let store = RoomStore::new();
        let (room, _a, _b, _rx) = test_room();
        let id = room.room.id.clone();

        store.insert(room).await;
        assert!(store.get(&id).await.is_some());

        store.take(&id).await;
        assert!(store.get(&id).await.is_none());
    }
}
