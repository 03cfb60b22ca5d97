//! Session Controller
//!
//! The protocol state machine: queue joins, question pulls, answer
//! submission, and the single finalize teardown path. Owns the connection
//! registry, the matchmaking queue, the room store, and the content pool;
//! constructed once at process start and shared behind an `Arc`.
//!
//! Lock discipline: rooms-map before room, room before registry; the
//! queue and the registry are never held across a call that acquires
//! another lock.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{debug, info};

use crate::content::ContentPool;
use crate::game::queue::MatchQueue;
use crate::game::room::{new_room_id, AnswerOutcome, ConnectionId, Room, RoomError, RoomId};
use crate::network::protocol::{
    MatchEndInfo, MatchFoundInfo, MatchPlayer, QuestionInfo, ServerMessage,
};
use crate::network::session::{
    ConnectionState, MatchRoom, RoomMember, RoomStore, SessionHandle,
};

/// Controller errors.
///
/// Every variant is externally a silent no-op: the dispatch layer logs it
/// and drops the event, so a malformed or late event never reaches the
/// other rooms or crashes the session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ControllerError {
    /// Connection unknown to the registry.
    #[error("Unknown connection")]
    UnknownConnection,

    /// Event not permitted in the connection's current state.
    #[error("Invalid state for this event")]
    InvalidState,

    /// Room no longer exists. Usually benign: the match may have just
    /// ended.
    #[error("Room not found")]
    StaleRoom,

    /// Caller is not a member of the referenced room.
    #[error("Not a room member")]
    NotAMember,

    /// Answer referenced an index never issued to the caller.
    #[error("Stale question index")]
    StaleIndex,
}

impl From<RoomError> for ControllerError {
    fn from(err: RoomError) -> Self {
        match err {
            RoomError::NotAMember => Self::NotAMember,
            RoomError::StaleIndex(_) => Self::StaleIndex,
            RoomError::Ended | RoomError::NoQuestions => Self::StaleRoom,
        }
    }
}

/// The matchmaking and session state machine.
pub struct SessionController {
    /// Per-connection handles.
    registry: RwLock<BTreeMap<ConnectionId, SessionHandle>>,
    /// Waiting list, paired strictly first-come-first-served.
    queue: Mutex<MatchQueue>,
    /// Active rooms.
    rooms: RoomStore,
    /// Question source.
    content: ContentPool,
    /// Fixed match duration from room creation.
    session_duration: Duration,
}

impl SessionController {
    /// Create a controller with its own queue, registry, and room store.
    pub fn new(content: ContentPool, session_duration: Duration) -> Self {
        Self {
            registry: RwLock::new(BTreeMap::new()),
            queue: Mutex::new(MatchQueue::new()),
            rooms: RoomStore::new(),
            content,
            session_duration,
        }
    }

    /// Fixed duration applied to new rooms.
    pub fn session_duration(&self) -> Duration {
        self.session_duration
    }

    /// Register a newly opened connection. Returns its fresh identifier.
    pub async fn connect(&self, sender: mpsc::Sender<ServerMessage>) -> ConnectionId {
        let id = ConnectionId::new();
        let handle = SessionHandle {
            id,
            character: None,
            state: ConnectionState::Idle,
            sender,
        };
        self.registry.write().await.insert(id, handle);
        debug!(connection = %id, "connection registered");
        id
    }

    /// Number of registered connections.
    pub async fn connection_count(&self) -> usize {
        self.registry.read().await.len()
    }

    /// Number of active rooms.
    pub async fn room_count(&self) -> usize {
        self.rooms.len().await
    }

    /// Number of waiting connections.
    pub async fn queue_len(&self) -> usize {
        self.queue.lock().await.len()
    }

    /// Current matchmaking state of a connection, if registered.
    pub async fn connection_state(&self, id: &ConnectionId) -> Option<ConnectionState> {
        self.registry.read().await.get(id).map(|h| h.state.clone())
    }

    /// Queue join: Idle -> Queued, then attempt a FIFO pairing.
    ///
    /// A join from a connection already Queued or InMatch is rejected and
    /// changes nothing.
    pub async fn join_queue(
        self: Arc<Self>,
        id: ConnectionId,
        character: String,
    ) -> Result<(), ControllerError> {
        let sender = {
            let mut registry = self.registry.write().await;
            let handle = registry
                .get_mut(&id)
                .ok_or(ControllerError::UnknownConnection)?;
            if handle.state != ConnectionState::Idle {
                return Err(ControllerError::InvalidState);
            }
            handle.character = Some(character);
            handle.state = ConnectionState::Queued;
            handle.sender.clone()
        };

        // Enqueue and pair under one guard so two concurrent joiners can
        // never both claim the same opponent; `waiting` goes out before
        // the guard drops so it cannot trail a matchFound for the same
        // connection.
        let paired = {
            let mut queue = self.queue.lock().await;
            queue.enqueue(id);
            let paired = queue.try_pair();
            if paired.is_none() {
                let _ = sender.send(ServerMessage::Waiting).await;
            }
            paired
        };

        if let Some((first, second)) = paired {
            self.create_room(first, second).await;
        }
        Ok(())
    }

    /// Build the room for a freshly formed pair, announce it, and arm the
    /// deadline.
    ///
    /// A partner's handle may have vanished between dequeue and here; the
    /// survivor then goes back to the head of the queue with its arrival
    /// priority intact and is told it is waiting again.
    async fn create_room(self: Arc<Self>, first: ConnectionId, second: ConnectionId) {
        let room_id = new_room_id();

        let mut members = BTreeMap::new();
        let mut players = Vec::with_capacity(2);
        {
            let mut registry = self.registry.write().await;
            for pid in [first, second] {
                if let Some(handle) = registry.get(&pid) {
                    let character = handle.character.clone().unwrap_or_default();
                    members.insert(
                        pid,
                        RoomMember {
                            character: character.clone(),
                            sender: handle.sender.clone(),
                        },
                    );
                    players.push(MatchPlayer { id: pid, character });
                }
            }
            if members.len() == 2 {
                for pid in [first, second] {
                    if let Some(handle) = registry.get_mut(&pid) {
                        handle.state = ConnectionState::InMatch {
                            room: room_id.clone(),
                        };
                    }
                }
            }
        }

        if members.len() < 2 {
            debug!(room = %room_id, "pairing fell apart before the room formed");
            let mut queue = self.queue.lock().await;
            for (pid, member) in &members {
                queue.requeue_front(*pid);
                let _ = member.sender.send(ServerMessage::Waiting).await;
            }
            return;
        }

        let room = Room::new(room_id.clone(), [first, second], self.content.draw());
        let shared = self.rooms.insert(MatchRoom::new(room, members)).await;

        let found = MatchFoundInfo {
            room: room_id.clone(),
            players,
            time: self.session_duration.as_secs(),
        };

        {
            let mut guard = shared.write().await;
            guard.broadcast(ServerMessage::MatchFound(found)).await;

            let controller = Arc::clone(&self);
            let deadline_room = room_id.clone();
            let duration = self.session_duration;
            guard.arm_deadline(tokio::spawn(async move {
                tokio::time::sleep(duration).await;
                // Pull our own handle out first: finalize aborts whatever
                // deadline task is still armed, and that must never be
                // the task running it.
                if let Some(room) = controller.rooms.get(&deadline_room).await {
                    room.write().await.take_deadline();
                }
                controller.finalize(&deadline_room).await;
            }));
        }

        info!(room = %room_id, player_a = %first, player_b = %second, "match created");
    }

    /// Pull the caller's next question for `room_id`. The question goes
    /// to the caller alone; the opponent's cursor is unaffected.
    pub async fn request_question(
        &self,
        id: ConnectionId,
        room_id: &RoomId,
    ) -> Result<(), ControllerError> {
        let shared = self
            .rooms
            .get(room_id)
            .await
            .ok_or(ControllerError::StaleRoom)?;

        let mut guard = shared.write().await;
        let (index, question) = guard.room.issue_question(&id, &self.content)?;
        guard
            .send_to(
                &id,
                ServerMessage::Question(QuestionInfo {
                    index,
                    q: question.prompt,
                    choices: question.choices,
                }),
            )
            .await;
        Ok(())
    }

    /// Record an answer. The first submission for an index broadcasts the
    /// updated totals to the whole room, right or wrong; duplicates change
    /// nothing and stay silent.
    pub async fn submit_answer(
        &self,
        id: ConnectionId,
        room_id: &RoomId,
        index: usize,
        answer: &str,
    ) -> Result<(), ControllerError> {
        let shared = self
            .rooms
            .get(room_id)
            .await
            .ok_or(ControllerError::StaleRoom)?;

        let mut guard = shared.write().await;
        match guard.room.record_answer(&id, index, answer)? {
            AnswerOutcome::Duplicate => {}
            AnswerOutcome::Recorded { .. } => {
                let points = guard.room.points().clone();
                guard.broadcast(ServerMessage::ScoreUpdate { points }).await;
            }
        }
        Ok(())
    }

    /// Transport-level disconnect: destroy the handle and unwind whatever
    /// state the connection held. Scores stand as they are; the departing
    /// player is neither penalized nor zeroed.
    pub async fn disconnect(&self, id: ConnectionId) {
        let handle = self.registry.write().await.remove(&id);
        let Some(handle) = handle else { return };

        match handle.state {
            ConnectionState::Idle => {}
            ConnectionState::Queued => {
                self.queue.lock().await.remove(&id);
            }
            ConnectionState::InMatch { room } => {
                if let Some(shared) = self.rooms.get(&room).await {
                    let guard = shared.read().await;
                    if let Some(opponent) = guard.room.opponent_of(&id) {
                        guard
                            .send_to(&opponent, ServerMessage::PlayerDisconnected { id })
                            .await;
                    }
                }
                self.finalize(&room).await;
            }
        }
        debug!(connection = %id, "connection removed");
    }

    /// The single teardown path, shared by deadline expiry, natural end,
    /// and disconnect. Idempotent: the first caller consumes the room via
    /// `RoomStore::take`; later callers find it gone and return.
    pub async fn finalize(&self, room_id: &RoomId) {
        let Some(shared) = self.rooms.take(room_id).await else {
            return;
        };

        let mut guard = shared.write().await;
        guard.disarm_deadline();
        guard.room.end();

        let outcome = guard.room.outcome();
        let winner_character = outcome
            .winner
            .as_ref()
            .and_then(|w| guard.character_of(w))
            .map(str::to_owned);

        guard
            .broadcast(ServerMessage::MatchEnded(MatchEndInfo {
                points: outcome.points,
                winner: outcome.winner,
                winner_character,
            }))
            .await;

        let players = guard.room.players();
        drop(guard);

        // Surviving members go back to Idle.
        let mut registry = self.registry.write().await;
        for pid in players {
            if let Some(handle) = registry.get_mut(&pid) {
                if matches!(&handle.state, ConnectionState::InMatch { room } if room == room_id) {
                    handle.state = ConnectionState::Idle;
                }
            }
        }

        info!(room = %room_id, "match ended");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::QuestionItem;
    use tokio::sync::mpsc::Receiver;

    fn single_question_pool() -> ContentPool {
        ContentPool::new(vec![QuestionItem::new(
            "What is 2 + 2?",
            ["3", "4", "5", "6"],
            "4",
        )])
    }

    fn controller() -> Arc<SessionController> {
        Arc::new(SessionController::new(
            single_question_pool(),
            Duration::from_secs(120),
        ))
    }

    async fn client(
        controller: &Arc<SessionController>,
    ) -> (ConnectionId, Receiver<ServerMessage>) {
        let (tx, rx) = mpsc::channel(32);
        let id = controller.connect(tx).await;
        (id, rx)
    }

    async fn join(controller: &Arc<SessionController>, id: ConnectionId, character: &str) {
        controller
            .clone()
            .join_queue(id, character.to_string())
            .await
            .unwrap();
    }

    fn expect_match_found(msg: Option<ServerMessage>) -> MatchFoundInfo {
        match msg {
            Some(ServerMessage::MatchFound(info)) => info,
            other => panic!("expected matchFound, got {other:?}"),
        }
    }

    fn expect_match_ended(msg: Option<ServerMessage>) -> MatchEndInfo {
        match msg {
            Some(ServerMessage::MatchEnded(info)) => info,
            other => panic!("expected matchEnded, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn lone_connection_waits() {
        let ctrl = controller();
        let (a, mut rx_a) = client(&ctrl).await;

        join(&ctrl, a, "fox").await;

        assert!(matches!(rx_a.recv().await, Some(ServerMessage::Waiting)));
        assert_eq!(ctrl.queue_len().await, 1);
        assert_eq!(ctrl.room_count().await, 0);
    }

    #[tokio::test]
    async fn pairs_in_arrival_order() {
        let ctrl = controller();
        let (a, mut rx_a) = client(&ctrl).await;
        let (b, mut rx_b) = client(&ctrl).await;
        let (c, mut rx_c) = client(&ctrl).await;

        join(&ctrl, a, "fox").await;
        join(&ctrl, b, "wolf").await;
        join(&ctrl, c, "owl").await;

        // a saw `waiting` before the pair formed.
        assert!(matches!(rx_a.recv().await, Some(ServerMessage::Waiting)));
        let info_a = expect_match_found(rx_a.recv().await);
        let info_b = expect_match_found(rx_b.recv().await);
        assert_eq!(info_a.room, info_b.room);
        assert_eq!(info_a.players[0].id, a);
        assert_eq!(info_a.players[1].id, b);
        assert_eq!(info_a.time, 120);

        // The third connection only ever hears `waiting`.
        assert!(matches!(rx_c.recv().await, Some(ServerMessage::Waiting)));
        assert!(rx_c.try_recv().is_err());

        let (d, mut rx_d) = client(&ctrl).await;
        join(&ctrl, d, "bear").await;
        let info_c = expect_match_found(rx_c.recv().await);
        let info_d = expect_match_found(rx_d.recv().await);
        assert_eq!(info_c.room, info_d.room);
        assert_eq!(info_c.players[0].id, c);
        assert_eq!(info_c.players[1].id, d);
    }

    #[tokio::test]
    async fn join_while_queued_is_rejected() {
        let ctrl = controller();
        let (a, _rx_a) = client(&ctrl).await;

        join(&ctrl, a, "fox").await;
        let second = ctrl.clone().join_queue(a, "fox".to_string()).await;

        assert_eq!(second, Err(ControllerError::InvalidState));
        assert_eq!(ctrl.queue_len().await, 1);
    }

    #[tokio::test]
    async fn join_while_in_match_is_rejected() {
        let ctrl = controller();
        let (a, _rx_a) = client(&ctrl).await;
        let (b, _rx_b) = client(&ctrl).await;

        join(&ctrl, a, "fox").await;
        join(&ctrl, b, "wolf").await;

        let again = ctrl.clone().join_queue(a, "fox".to_string()).await;
        assert_eq!(again, Err(ControllerError::InvalidState));
        assert_eq!(ctrl.room_count().await, 1);
    }

    #[tokio::test]
    async fn question_goes_to_requester_only() {
        let ctrl = controller();
        let (a, mut rx_a) = client(&ctrl).await;
        let (b, mut rx_b) = client(&ctrl).await;

        join(&ctrl, a, "fox").await;
        join(&ctrl, b, "wolf").await;

        assert!(matches!(rx_a.recv().await, Some(ServerMessage::Waiting)));
        let room = expect_match_found(rx_a.recv().await).room;
        expect_match_found(rx_b.recv().await);

        ctrl.request_question(a, &room).await.unwrap();

        match rx_a.recv().await {
            Some(ServerMessage::Question(q)) => {
                assert_eq!(q.index, 0);
                assert_eq!(q.q, "What is 2 + 2?");
            }
            other => panic!("expected question, got {other:?}"),
        }
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn cursors_diverge_independently() {
        let ctrl = controller();
        let (a, mut rx_a) = client(&ctrl).await;
        let (b, mut rx_b) = client(&ctrl).await;

        join(&ctrl, a, "fox").await;
        join(&ctrl, b, "wolf").await;
        assert!(matches!(rx_a.recv().await, Some(ServerMessage::Waiting)));
        let room = expect_match_found(rx_a.recv().await).room;
        expect_match_found(rx_b.recv().await);

        // a pulls twice; the one-question pool forces a sequence extension.
        ctrl.request_question(a, &room).await.unwrap();
        ctrl.request_question(a, &room).await.unwrap();
        // b still starts at index 0.
        ctrl.request_question(b, &room).await.unwrap();

        let indices_a: Vec<usize> = [rx_a.recv().await, rx_a.recv().await]
            .into_iter()
            .map(|msg| match msg {
                Some(ServerMessage::Question(q)) => q.index,
                other => panic!("expected question, got {other:?}"),
            })
            .collect();
        assert_eq!(indices_a, vec![0, 1]);

        match rx_b.recv().await {
            Some(ServerMessage::Question(q)) => assert_eq!(q.index, 0),
            other => panic!("expected question, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn score_update_broadcasts_and_duplicates_stay_silent() {
        let ctrl = controller();
        let (a, mut rx_a) = client(&ctrl).await;
        let (b, mut rx_b) = client(&ctrl).await;

        join(&ctrl, a, "fox").await;
        join(&ctrl, b, "wolf").await;
        assert!(matches!(rx_a.recv().await, Some(ServerMessage::Waiting)));
        let room = expect_match_found(rx_a.recv().await).room;
        expect_match_found(rx_b.recv().await);

        ctrl.request_question(a, &room).await.unwrap();
        let _ = rx_a.recv().await;

        ctrl.submit_answer(a, &room, 0, "4").await.unwrap();

        for rx in [&mut rx_a, &mut rx_b] {
            match rx.recv().await {
                Some(ServerMessage::ScoreUpdate { points }) => {
                    assert_eq!(points[&a], 1);
                    assert_eq!(points[&b], 0);
                }
                other => panic!("expected scoreUpdate, got {other:?}"),
            }
        }

        // Duplicate delivery: accepted, but no state change and no
        // broadcast.
        ctrl.submit_answer(a, &room, 0, "4").await.unwrap();
        assert!(rx_a.try_recv().is_err());
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn wrong_answer_still_broadcasts_totals() {
        let ctrl = controller();
        let (a, mut rx_a) = client(&ctrl).await;
        let (b, mut rx_b) = client(&ctrl).await;

        join(&ctrl, a, "fox").await;
        join(&ctrl, b, "wolf").await;
        assert!(matches!(rx_a.recv().await, Some(ServerMessage::Waiting)));
        let room = expect_match_found(rx_a.recv().await).room;
        expect_match_found(rx_b.recv().await);

        ctrl.request_question(b, &room).await.unwrap();
        let _ = rx_b.recv().await;

        ctrl.submit_answer(b, &room, 0, "3").await.unwrap();

        match rx_b.recv().await {
            Some(ServerMessage::ScoreUpdate { points }) => {
                assert_eq!(points[&a], 0);
                assert_eq!(points[&b], 0);
            }
            other => panic!("expected scoreUpdate, got {other:?}"),
        }
        assert!(matches!(
            rx_a.recv().await,
            Some(ServerMessage::ScoreUpdate { .. })
        ));
    }

    #[tokio::test]
    async fn disconnect_ends_the_match_with_frozen_scores() {
        let ctrl = controller();
        let (a, mut rx_a) = client(&ctrl).await;
        let (b, mut rx_b) = client(&ctrl).await;

        join(&ctrl, a, "fox").await;
        join(&ctrl, b, "wolf").await;
        assert!(matches!(rx_a.recv().await, Some(ServerMessage::Waiting)));
        let room = expect_match_found(rx_a.recv().await).room;
        expect_match_found(rx_b.recv().await);

        ctrl.request_question(a, &room).await.unwrap();
        let _ = rx_a.recv().await;
        ctrl.submit_answer(a, &room, 0, "4").await.unwrap();
        let _ = rx_a.recv().await;

        ctrl.disconnect(b).await;

        match rx_a.recv().await {
            Some(ServerMessage::PlayerDisconnected { id }) => assert_eq!(id, b),
            other => panic!("expected playerDisconnected, got {other:?}"),
        }
        let ended = expect_match_ended(rx_a.recv().await);
        assert_eq!(ended.winner, Some(a));
        assert_eq!(ended.winner_character.as_deref(), Some("fox"));
        assert_eq!(ended.points[&a], 1);
        assert_eq!(ended.points[&b], 0);

        assert_eq!(ctrl.room_count().await, 0);
        assert_eq!(
            ctrl.connection_state(&a).await,
            Some(ConnectionState::Idle)
        );
        assert_eq!(ctrl.connection_state(&b).await, None);
    }

    #[tokio::test]
    async fn disconnect_while_queued_leaves_no_ghost() {
        let ctrl = controller();
        let (a, _rx_a) = client(&ctrl).await;
        let (b, mut rx_b) = client(&ctrl).await;

        join(&ctrl, a, "fox").await;
        ctrl.disconnect(a).await;
        assert_eq!(ctrl.queue_len().await, 0);

        join(&ctrl, b, "wolf").await;
        assert!(matches!(rx_b.recv().await, Some(ServerMessage::Waiting)));
        assert_eq!(ctrl.room_count().await, 0);
    }

    #[tokio::test]
    async fn finalize_twice_is_a_noop() {
        let ctrl = controller();
        let (a, mut rx_a) = client(&ctrl).await;
        let (b, _rx_b) = client(&ctrl).await;

        join(&ctrl, a, "fox").await;
        join(&ctrl, b, "wolf").await;
        assert!(matches!(rx_a.recv().await, Some(ServerMessage::Waiting)));
        let room = expect_match_found(rx_a.recv().await).room;

        ctrl.finalize(&room).await;
        expect_match_ended(rx_a.recv().await);

        // Second trigger: no broadcast, no panic.
        ctrl.finalize(&room).await;
        assert!(rx_a.try_recv().is_err());

        // Late events against the dead room are silently rejected.
        assert_eq!(
            ctrl.submit_answer(a, &room, 0, "4").await,
            Err(ControllerError::StaleRoom)
        );
    }

    #[tokio::test]
    async fn unknown_room_is_ignored() {
        let ctrl = controller();
        let (a, _rx_a) = client(&ctrl).await;

        assert_eq!(
            ctrl.request_question(a, &"room_missing".to_string()).await,
            Err(ControllerError::StaleRoom)
        );
    }

    #[tokio::test]
    async fn vanished_partner_requeues_the_survivor() {
        let ctrl = controller();
        let (b, mut rx_b) = client(&ctrl).await;

        join(&ctrl, b, "wolf").await;
        assert!(matches!(rx_b.recv().await, Some(ServerMessage::Waiting)));

        // Simulate a pairing whose first member vanished before the room
        // could form.
        let ghost = ConnectionId::new();
        ctrl.clone().create_room(ghost, b).await;

        assert!(matches!(rx_b.recv().await, Some(ServerMessage::Waiting)));
        assert_eq!(ctrl.room_count().await, 0);

        // The survivor keeps its place at the head of the queue.
        let (c, mut rx_c) = client(&ctrl).await;
        join(&ctrl, c, "owl").await;
        let info = expect_match_found(rx_b.recv().await);
        assert_eq!(info.players[0].id, b);
        assert_eq!(info.players[1].id, c);
        expect_match_found(rx_c.recv().await);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_ends_a_tied_match() {
        let ctrl = controller();
        let (a, mut rx_a) = client(&ctrl).await;
        let (b, mut rx_b) = client(&ctrl).await;

        join(&ctrl, a, "fox").await;
        join(&ctrl, b, "wolf").await;
        assert!(matches!(rx_a.recv().await, Some(ServerMessage::Waiting)));
        expect_match_found(rx_a.recv().await);
        expect_match_found(rx_b.recv().await);

        // The paused clock auto-advances to the deadline while both
        // receivers sit idle.
        let ended_a = expect_match_ended(rx_a.recv().await);
        let ended_b = expect_match_ended(rx_b.recv().await);
        assert_eq!(ended_a.winner, None);
        assert_eq!(ended_a.winner_character, None);
        assert_eq!(ended_b.winner, None);

        assert_eq!(ctrl.room_count().await, 0);
        assert_eq!(
            ctrl.connection_state(&a).await,
            Some(ConnectionState::Idle)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_after_disconnect_finalize_is_harmless() {
        let ctrl = controller();
        let (a, mut rx_a) = client(&ctrl).await;
        let (b, _rx_b) = client(&ctrl).await;

        join(&ctrl, a, "fox").await;
        join(&ctrl, b, "wolf").await;
        assert!(matches!(rx_a.recv().await, Some(ServerMessage::Waiting)));
        expect_match_found(rx_a.recv().await);

        ctrl.disconnect(b).await;
        assert!(matches!(
            rx_a.recv().await,
            Some(ServerMessage::PlayerDisconnected { .. })
        ));
        expect_match_ended(rx_a.recv().await);

        // Let the clock run past the would-be deadline; the cancelled
        // timer must not produce a second matchEnded.
        tokio::time::advance(Duration::from_secs(180)).await;
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn rejoin_after_match_is_allowed() {
        let ctrl = controller();
        let (a, mut rx_a) = client(&ctrl).await;
        let (b, _rx_b) = client(&ctrl).await;

        join(&ctrl, a, "fox").await;
        join(&ctrl, b, "wolf").await;
        assert!(matches!(rx_a.recv().await, Some(ServerMessage::Waiting)));
        let room = expect_match_found(rx_a.recv().await).room;

        ctrl.finalize(&room).await;
        expect_match_ended(rx_a.recv().await);

        join(&ctrl, a, "fox").await;
        assert!(matches!(rx_a.recv().await, Some(ServerMessage::Waiting)));
        assert_eq!(ctrl.queue_len().await, 1);
    }
}
