use std::{collections::HashMap, sync::RwLock, time::Instant};

use streamhub_common::types::{PeerId, PeerRole, RoomId, UserTier};
use streamhub_protocol::{ConnectionHealthStatus, OutboundFrame, OutboundSender};

use crate::error::{Error, Result};

/// One connected peer (spec §3 "Peer / Connection Session"). Created with a
/// fresh UUID and `anonymous` role on connect; `join-room` promotes it.
#[derive(Debug, Clone)]
pub struct ConnectionSession {
    pub peer_id: PeerId,
    pub username: Option<String>,
    pub role: PeerRole,
    pub tier: UserTier,
    pub room_id: Option<RoomId>,
    pub remote_ip: Option<String>,
    pub health: ConnectionHealthStatus,
    pub connected_at: Instant,
    pub last_activity: Instant,
    outbound: OutboundSender,
}

impl ConnectionSession {
    pub fn new(peer_id: PeerId, remote_ip: Option<String>, outbound: OutboundSender) -> Self {
        let now = Instant::now();
        Self {
            peer_id,
            username: None,
            role: PeerRole::Anonymous,
            tier: UserTier::Anonymous,
            room_id: None,
            remote_ip,
            health: ConnectionHealthStatus::Healthy,
            connected_at: now,
            last_activity: now,
            outbound,
        }
    }

    /// Queue a frame on this session's write task. Fails silently (the
    /// caller cannot do anything useful with a dead receiver beyond logging)
    /// when the connection has already dropped its read side.
    pub fn send(&self, frame: OutboundFrame) {
        let _ = self.outbound.send(frame);
    }
}

/// Registry of live connection sessions, keyed by `peer_id`.
///
/// Mirrors the teacher's node registry shape: a single map behind one lock,
/// because writes (join/leave/role-change) are rare relative to reads
/// (broadcast fan-out, rate-limit lookups).
pub struct SessionRegistry {
    sessions: RwLock<HashMap<PeerId, ConnectionSession>>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn register(&self, session: ConnectionSession) {
        self.sessions
            .write()
            .expect("session registry lock poisoned")
            .insert(session.peer_id.clone(), session);
    }

    /// Remove the session. Cascade cleanup (pending queue, room leave,
    /// `user-left` emission) is the caller's responsibility — spec §4.6's
    /// five-step order spans `streamhub-rooms`, so this registry only owns
    /// step 4 (delete from the connection table).
    pub fn unregister(&self, peer_id: &str) -> Option<ConnectionSession> {
        self.sessions
            .write()
            .expect("session registry lock poisoned")
            .remove(peer_id)
    }

    pub fn get(&self, peer_id: &str) -> Option<ConnectionSession> {
        self.sessions
            .read()
            .expect("session registry lock poisoned")
            .get(peer_id)
            .cloned()
    }

    pub fn touch(&self, peer_id: &str) -> Result<()> {
        let mut sessions = self.sessions.write().expect("session registry lock poisoned");
        let session = sessions.get_mut(peer_id).ok_or(Error::SessionNotFound)?;
        session.last_activity = Instant::now();
        Ok(())
    }

    pub fn set_username(&self, peer_id: &str, username: impl Into<String>) -> Result<()> {
        let mut sessions = self.sessions.write().expect("session registry lock poisoned");
        let session = sessions.get_mut(peer_id).ok_or(Error::SessionNotFound)?;
        session.username = Some(username.into());
        Ok(())
    }

    pub fn set_role(&self, peer_id: &str, role: PeerRole, tier: UserTier) -> Result<()> {
        let mut sessions = self.sessions.write().expect("session registry lock poisoned");
        let session = sessions.get_mut(peer_id).ok_or(Error::SessionNotFound)?;
        session.role = role;
        session.tier = tier;
        Ok(())
    }

    pub fn set_room(&self, peer_id: &str, room_id: Option<RoomId>) -> Result<()> {
        let mut sessions = self.sessions.write().expect("session registry lock poisoned");
        let session = sessions.get_mut(peer_id).ok_or(Error::SessionNotFound)?;
        session.room_id = room_id;
        Ok(())
    }

    pub fn set_health(&self, peer_id: &str, health: ConnectionHealthStatus) -> Result<()> {
        let mut sessions = self.sessions.write().expect("session registry lock poisoned");
        let session = sessions.get_mut(peer_id).ok_or(Error::SessionNotFound)?;
        session.health = health;
        Ok(())
    }

    pub fn send_to(&self, peer_id: &str, frame: OutboundFrame) -> Result<()> {
        let sessions = self.sessions.read().expect("session registry lock poisoned");
        let session = sessions.get(peer_id).ok_or(Error::SessionNotFound)?;
        session.send(frame);
        Ok(())
    }

    pub fn peers_in_room(&self, room_id: &str) -> Vec<PeerId> {
        self.sessions
            .read()
            .expect("session registry lock poisoned")
            .values()
            .filter(|s| s.room_id.as_deref() == Some(room_id))
            .map(|s| s.peer_id.clone())
            .collect()
    }

    pub fn count(&self) -> usize {
        self.sessions.read().expect("session registry lock poisoned").len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outbound() -> OutboundSender {
        tokio::sync::mpsc::unbounded_channel().0
    }

    #[test]
    fn register_and_unregister_round_trip() {
        let registry = SessionRegistry::new();
        registry.register(ConnectionSession::new(
            "peer-1".to_string(),
            Some("127.0.0.1".to_string()),
            outbound(),
        ));
        assert_eq!(registry.count(), 1);
        assert!(registry.get("peer-1").is_some());

        let removed = registry.unregister("peer-1");
        assert!(removed.is_some());
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn mutating_missing_session_errors() {
        let registry = SessionRegistry::new();
        assert!(matches!(
            registry.touch("missing"),
            Err(Error::SessionNotFound)
        ));
    }

    #[test]
    fn peers_in_room_filters_by_room() {
        let registry = SessionRegistry::new();
        registry.register(ConnectionSession::new("a".into(), None, outbound()));
        registry.register(ConnectionSession::new("b".into(), None, outbound()));
        registry.set_room("a", Some("room-1".to_string())).unwrap();

        let peers = registry.peers_in_room("room-1");
        assert_eq!(peers, vec!["a".to_string()]);
    }
}
