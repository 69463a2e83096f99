use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::mpsc;

use crate::error::CoreError;
use crate::models::{Participant, ServerMessage, SignalKind};

/// Maximum simultaneous members of an interview room
pub const ROOM_CAPACITY: usize = 2;

/// Outbound half of a connection's message channel
pub type Outbound = mpsc::UnboundedSender<ServerMessage>;

struct Connection {
    identity: String,
    sender: Outbound,
}

#[derive(Default)]
struct Room {
    /// In join order
    members: Vec<Participant>,
}

#[derive(Default)]
struct RelayState {
    connections: HashMap<String, Connection>,
    rooms: HashMap<String, Room>,
}

impl RelayState {
    /// Best-effort delivery; a closed channel is logged and otherwise ignored
    fn deliver(&self, connection_id: &str, message: &ServerMessage) -> bool {
        let result = match self.connections.get(connection_id) {
            Some(conn) => conn
                .sender
                .send(message.clone())
                .map_err(|_| CoreError::Transport(format!("connection {} closed", connection_id))),
            None => Err(CoreError::Transport(format!("connection {} not registered", connection_id))),
        };

        match result {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("{}", e);
                false
            }
        }
    }

    fn remove_member(&mut self, room_id: &str, connection_id: &str) -> Option<Departure> {
        let room = self.rooms.get_mut(room_id)?;
        let index = room.members.iter().position(|m| m.connection_id == connection_id)?;
        let participant = room.members.remove(index);
        let remaining: Vec<String> = room.members.iter().map(|m| m.connection_id.clone()).collect();

        let room_deleted = remaining.is_empty();
        if room_deleted {
            self.rooms.remove(room_id);
            tracing::debug!("Room {} deleted after last member left", room_id);
        } else {
            let notice = ServerMessage::UserLeft {
                room_id: room_id.to_string(),
                identity: participant.identity.clone(),
                connection_id: participant.connection_id.clone(),
            };
            for member in &remaining {
                self.deliver(member, &notice);
            }
        }

        Some(Departure {
            room_id: room_id.to_string(),
            participant,
            remaining: remaining.len(),
            room_deleted,
        })
    }
}

/// Result of a successful room join
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinOutcome {
    /// Room now holds `ROOM_CAPACITY` members
    pub full: bool,
    /// The connection was already a member; nothing changed
    pub already_member: bool,
}

/// A connection removed from a room
#[derive(Debug, Clone, PartialEq)]
pub struct Departure {
    pub room_id: String,
    pub participant: Participant,
    pub remaining: usize,
    pub room_deleted: bool,
}

/// Room membership and WebRTC signaling fan-out
///
/// Delivery is at-most-once with no acknowledgement or retry. Messages from a
/// single sender reach each recipient in send order because every send happens
/// under the relay lock into that recipient's FIFO channel.
#[derive(Default)]
pub struct SignalingRelay {
    state: Mutex<RelayState>,
}

impl SignalingRelay {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, RelayState> {
        // Relay state holds no invariants a panicking holder could break halfway
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a connection's outbound channel
    pub fn connect(&self, connection_id: &str, identity: &str, sender: Outbound) {
        self.state().connections.insert(
            connection_id.to_string(),
            Connection {
                identity: identity.to_string(),
                sender,
            },
        );
        tracing::debug!("Connection {} registered for {}", connection_id, identity);
    }

    /// Drop a connection from every room and forget its channel
    pub fn disconnect(&self, connection_id: &str) -> Vec<Departure> {
        let departures = self.leave(connection_id);
        self.state().connections.remove(connection_id);
        departures
    }

    /// Create an empty room if it does not exist yet
    pub fn open_room(&self, room_id: &str) {
        self.state().rooms.entry(room_id.to_string()).or_default();
    }

    /// Add a participant, creating the room on demand
    ///
    /// A join beyond `ROOM_CAPACITY` is rejected with a state error.
    pub fn join(&self, room_id: &str, participant: Participant) -> Result<JoinOutcome, CoreError> {
        let mut state = self.state();
        let room = state.rooms.entry(room_id.to_string()).or_default();

        if room.members.iter().any(|m| m.connection_id == participant.connection_id) {
            return Ok(JoinOutcome {
                full: room.members.len() >= ROOM_CAPACITY,
                already_member: true,
            });
        }

        if room.members.len() >= ROOM_CAPACITY {
            return Err(CoreError::State(format!("room {} is full", room_id)));
        }

        let existing: Vec<String> = room.members.iter().map(|m| m.connection_id.clone()).collect();
        let notice = ServerMessage::UserJoined {
            room_id: room_id.to_string(),
            identity: participant.identity.clone(),
            connection_id: participant.connection_id.clone(),
        };
        tracing::debug!(
            "{} ({}) joined room {}",
            participant.identity,
            participant.connection_id,
            room_id
        );
        room.members.push(participant);
        let full = room.members.len() >= ROOM_CAPACITY;

        for member in &existing {
            state.deliver(member, &notice);
        }

        Ok(JoinOutcome {
            full,
            already_member: false,
        })
    }

    /// Forward signaling metadata to every other member of the room
    ///
    /// Returns how many recipients accepted the message. The sender must be a
    /// member of the room and never receives its own message.
    pub fn relay(
        &self,
        kind: SignalKind,
        payload: Value,
        room_id: &str,
        sender_connection_id: &str,
    ) -> Result<usize, CoreError> {
        let state = self.state();
        let room = state
            .rooms
            .get(room_id)
            .ok_or_else(|| CoreError::NotFound(format!("room {}", room_id)))?;

        if !room.members.iter().any(|m| m.connection_id == sender_connection_id) {
            return Err(CoreError::Authorization(format!(
                "connection {} is not a member of room {}",
                sender_connection_id, room_id
            )));
        }

        let message = ServerMessage::signal(kind, room_id, sender_connection_id, payload);
        let delivered = room
            .members
            .iter()
            .filter(|m| m.connection_id != sender_connection_id)
            .filter(|m| state.deliver(&m.connection_id, &message))
            .count();

        tracing::debug!("Relayed {:?} in room {} to {} recipient(s)", kind, room_id, delivered);
        Ok(delivered)
    }

    /// Remove a connection from every room it belongs to
    pub fn leave(&self, connection_id: &str) -> Vec<Departure> {
        let mut state = self.state();
        let room_ids: Vec<String> = state
            .rooms
            .iter()
            .filter(|(_, room)| room.members.iter().any(|m| m.connection_id == connection_id))
            .map(|(id, _)| id.clone())
            .collect();

        room_ids
            .iter()
            .filter_map(|room_id| state.remove_member(room_id, connection_id))
            .collect()
    }

    /// Remove a connection from a single room
    pub fn leave_room(&self, room_id: &str, connection_id: &str) -> Option<Departure> {
        self.state().remove_member(room_id, connection_id)
    }

    /// Tear a room down, returning the members it still had
    pub fn close_room(&self, room_id: &str) -> Vec<Participant> {
        let members = self
            .state()
            .rooms
            .remove(room_id)
            .map(|room| room.members)
            .unwrap_or_default();
        tracing::debug!("Room {} closed ({} member(s))", room_id, members.len());
        members
    }

    /// Send a message to every current member of a room
    pub fn broadcast(&self, room_id: &str, message: &ServerMessage) -> usize {
        let state = self.state();
        let Some(room) = state.rooms.get(room_id) else {
            return 0;
        };
        room.members
            .iter()
            .filter(|m| state.deliver(&m.connection_id, message))
            .count()
    }

    /// Send a message to every connection authenticated as `identity`
    pub fn send_to_identity(&self, identity: &str, message: &ServerMessage) -> usize {
        let state = self.state();
        state
            .connections
            .iter()
            .filter(|(_, conn)| conn.identity == identity)
            .filter(|(id, _)| state.deliver(id, message))
            .count()
    }

    /// Send a message to one connection
    pub fn send_to_connection(&self, connection_id: &str, message: &ServerMessage) -> bool {
        self.state().deliver(connection_id, message)
    }

    pub fn members(&self, room_id: &str) -> Vec<Participant> {
        self.state()
            .rooms
            .get(room_id)
            .map(|room| room.members.clone())
            .unwrap_or_default()
    }

    /// Rooms the connection currently belongs to
    pub fn rooms_of(&self, connection_id: &str) -> Vec<String> {
        self.state()
            .rooms
            .iter()
            .filter(|(_, room)| room.members.iter().any(|m| m.connection_id == connection_id))
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn room_exists(&self, room_id: &str) -> bool {
        self.state().rooms.contains_key(room_id)
    }

    pub fn room_count(&self) -> usize {
        self.state().rooms.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn connect(relay: &SignalingRelay, connection_id: &str, identity: &str) -> UnboundedReceiver<ServerMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        relay.connect(connection_id, identity, tx);
        rx
    }

    fn drain(rx: &mut UnboundedReceiver<ServerMessage>) -> Vec<ServerMessage> {
        let mut out = Vec::new();
        while let Ok(message) = rx.try_recv() {
            out.push(message);
        }
        out
    }

    #[test]
    fn test_join_reports_full_at_capacity() {
        let relay = SignalingRelay::new();
        let _a = connect(&relay, "a", "alice");
        let _b = connect(&relay, "b", "bob");

        let first = relay.join("room", Participant::new("alice", "a")).unwrap();
        assert!(!first.full);
        let second = relay.join("room", Participant::new("bob", "b")).unwrap();
        assert!(second.full);
    }

    #[test]
    fn test_third_join_rejected() {
        let relay = SignalingRelay::new();
        relay.join("room", Participant::new("alice", "a")).unwrap();
        relay.join("room", Participant::new("bob", "b")).unwrap();

        let err = relay.join("room", Participant::new("carol", "c")).unwrap_err();
        assert!(matches!(err, CoreError::State(_)));
        assert_eq!(relay.members("room").len(), 2);
    }

    #[test]
    fn test_rejoin_same_connection_is_noop() {
        let relay = SignalingRelay::new();
        relay.join("room", Participant::new("alice", "a")).unwrap();
        let again = relay.join("room", Participant::new("alice", "a")).unwrap();

        assert!(again.already_member);
        assert_eq!(relay.members("room").len(), 1);
    }

    #[test]
    fn test_relay_never_echoes_sender() {
        let relay = SignalingRelay::new();
        let mut a = connect(&relay, "a", "alice");
        let mut b = connect(&relay, "b", "bob");
        relay.join("room", Participant::new("alice", "a")).unwrap();
        relay.join("room", Participant::new("bob", "b")).unwrap();
        drain(&mut a);

        let delivered = relay
            .relay(SignalKind::Offer, json!({ "sdp": "v=0" }), "room", "a")
            .unwrap();

        assert_eq!(delivered, 1);
        assert!(drain(&mut a).is_empty());
        let received = drain(&mut b);
        assert_eq!(
            received,
            vec![ServerMessage::Offer {
                room_id: "room".into(),
                from: "a".into(),
                payload: json!({ "sdp": "v=0" }),
            }]
        );
    }

    #[test]
    fn test_relay_preserves_sender_order() {
        let relay = SignalingRelay::new();
        let _a = connect(&relay, "a", "alice");
        let mut b = connect(&relay, "b", "bob");
        relay.join("room", Participant::new("alice", "a")).unwrap();
        relay.join("room", Participant::new("bob", "b")).unwrap();

        for i in 0..5 {
            relay
                .relay(SignalKind::IceCandidate, json!({ "seq": i }), "room", "a")
                .unwrap();
        }

        let seqs: Vec<i64> = drain(&mut b)
            .into_iter()
            .filter_map(|m| match m {
                ServerMessage::IceCandidate { payload, .. } => payload["seq"].as_i64(),
                _ => None,
            })
            .collect();
        assert_eq!(seqs, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_relay_from_non_member_rejected() {
        let relay = SignalingRelay::new();
        relay.join("room", Participant::new("alice", "a")).unwrap();

        let err = relay.relay(SignalKind::Answer, json!({}), "room", "x").unwrap_err();
        assert!(matches!(err, CoreError::Authorization(_)));
    }

    #[test]
    fn test_closed_channel_does_not_fail_relay() {
        let relay = SignalingRelay::new();
        let _a = connect(&relay, "a", "alice");
        let b = connect(&relay, "b", "bob");
        relay.join("room", Participant::new("alice", "a")).unwrap();
        relay.join("room", Participant::new("bob", "b")).unwrap();
        drop(b);

        let delivered = relay.relay(SignalKind::Offer, json!({}), "room", "a").unwrap();
        assert_eq!(delivered, 0);
    }

    #[test]
    fn test_leave_notifies_and_deletes_empty_rooms() {
        let relay = SignalingRelay::new();
        let mut a = connect(&relay, "a", "alice");
        let _b = connect(&relay, "b", "bob");
        relay.join("one", Participant::new("alice", "a")).unwrap();
        relay.join("one", Participant::new("bob", "b")).unwrap();
        relay.join("two", Participant::new("bob", "b")).unwrap();
        drain(&mut a);

        let mut departures = relay.leave("b");
        departures.sort_by(|x, y| x.room_id.cmp(&y.room_id));

        assert_eq!(departures.len(), 2);
        assert_eq!(departures[0].remaining, 1);
        assert!(!departures[0].room_deleted);
        assert!(departures[1].room_deleted);
        assert!(!relay.room_exists("two"));
        assert!(matches!(drain(&mut a).as_slice(), [ServerMessage::UserLeft { identity, .. }] if identity == "bob"));
    }

    #[test]
    fn test_send_to_identity_reaches_all_connections() {
        let relay = SignalingRelay::new();
        let mut a1 = connect(&relay, "a1", "alice");
        let mut a2 = connect(&relay, "a2", "alice");
        let mut b = connect(&relay, "b", "bob");

        let sent = relay.send_to_identity("alice", &ServerMessage::error("ping"));
        assert_eq!(sent, 2);
        assert_eq!(drain(&mut a1).len(), 1);
        assert_eq!(drain(&mut a2).len(), 1);
        assert!(drain(&mut b).is_empty());
    }
}
