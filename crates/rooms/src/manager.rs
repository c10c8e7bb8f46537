//! Room Manager: the authoritative state machine for room membership
//! (spec §4.3). Mutations are serialized per room by a `std::sync::Mutex`
//! held only across the in-memory transition — store writes and bus
//! publishes always run after the guard drops (spec §5).

use std::sync::{Arc, Mutex};

use streamhub_bus::{Bus, BusChannel, BusEvent};
use streamhub_common::types::{PeerId, RoomId, is_valid_room_id, is_valid_username, now_ms};
use streamhub_metrics::{counter, gauge, room as room_metrics};
use streamhub_protocol::{ChatPayload, ServerMessage};
use streamhub_store::StoreGateway;

use crate::{
    error::{Error, Result},
    model::{ApprovalRequest, HealthStatus, Room, Streamer},
    notify::Notify,
    outcome::{JoinOutcome, RejectReason},
    snapshot::{CACHE_TTL, RoomSnapshot, STORE_DEADLINE, store_key},
};

pub const PENDING_APPROVAL_TIMEOUT_MS: u64 = crate::model::PENDING_APPROVAL_TIMEOUT_MS;

pub struct RoomManager {
    rooms: dashmap::DashMap<RoomId, Arc<Mutex<Room>>>,
    store: Arc<StoreGateway>,
    bus: Arc<Bus>,
}

impl RoomManager {
    pub fn new(store: Arc<StoreGateway>, bus: Arc<Bus>) -> Self {
        Self { rooms: dashmap::DashMap::new(), store, bus }
    }

    fn room_handle(&self, room_id: &str) -> Arc<Mutex<Room>> {
        self.rooms
            .entry(room_id.to_string())
            .or_insert_with(|| {
                counter!(room_metrics::ROOMS_CREATED_TOTAL).increment(1);
                gauge!(room_metrics::ROOMS_ACTIVE).increment(1.0);
                Arc::new(Mutex::new(Room::new(room_id.to_string())))
            })
            .clone()
    }

    async fn persist(&self, room_id: &str) -> Result<()> {
        let snapshot = {
            let handle = self.room_handle(room_id);
            let room = handle.lock().unwrap_or_else(|e| e.into_inner());
            RoomSnapshot::from(&*room)
        };
        tokio::time::timeout(STORE_DEADLINE, self.store.set(&store_key(room_id), &snapshot, Some(CACHE_TTL)))
            .await
            .map_err(|_| Error::Message("store deadline exceeded".into()))?
            .map_err(Error::from)
    }

    async fn publish(&self, event: BusEvent) {
        self.bus.publish(BusChannel::RoomEvents, event).await;
    }

    fn maybe_gc(&self, room_id: &str) {
        let handle = self.room_handle(room_id);
        let empty = { handle.lock().unwrap_or_else(|e| e.into_inner()).is_empty() };
        if empty {
            self.rooms.remove(room_id);
            gauge!(room_metrics::ROOMS_ACTIVE).decrement(1.0);
            counter!(room_metrics::ROOMS_CLOSED_TOTAL).increment(1);
        }
    }

    /// `Join(peerId, username, roomId, isStreamer, clientIp)` (spec §4.3).
    /// Shard ownership is checked by the caller before this is invoked.
    pub async fn join(
        &self,
        peer_id: &PeerId,
        username: &str,
        room_id: &str,
        is_streamer: bool,
    ) -> Result<(JoinOutcome, Vec<Notify>)> {
        counter!(room_metrics::JOIN_REQUESTS_TOTAL).increment(1);

        if !is_valid_room_id(room_id) {
            counter!(room_metrics::JOIN_REJECTED_TOTAL).increment(1);
            return Ok((JoinOutcome::Rejected(RejectReason::InvalidRoomId), vec![]));
        }
        if !is_valid_username(username) {
            counter!(room_metrics::JOIN_REJECTED_TOTAL).increment(1);
            return Ok((JoinOutcome::Rejected(RejectReason::InvalidUsername), vec![]));
        }

        let handle = self.room_handle(room_id);
        let (outcome, notify) = {
            let mut room = handle.lock().unwrap_or_else(|e| e.into_inner());
            if is_streamer {
                if room.streamer.is_some() {
                    counter!(room_metrics::JOIN_REJECTED_TOTAL).increment(1);
                    (JoinOutcome::Rejected(RejectReason::StreamerPresent), vec![])
                } else {
                    room.streamer = Some(Streamer {
                        peer_id: peer_id.clone(),
                        username: username.to_string(),
                        session_start: now_ms(),
                    });
                    (JoinOutcome::AdmittedStreamer, vec![])
                }
            } else if room.settings.auto_accept || room.streamer.is_none() {
                if room.viewer_count() >= room.settings.max_viewers {
                    counter!(room_metrics::JOIN_REJECTED_TOTAL).increment(1);
                    counter!(room_metrics::ROOM_FULL_TOTAL).increment(1);
                    (JoinOutcome::Rejected(RejectReason::RoomFull), vec![])
                } else {
                    room.record_viewer_join(peer_id.clone(), username.to_string());
                    let viewer_count = room.viewer_count();
                    let notify = vec![Notify::ToRoomExcept(
                        room_id.to_string(),
                        peer_id.clone(),
                        ServerMessage::UserJoined { username: username.to_string(), viewer_count },
                    )];
                    (JoinOutcome::AdmittedViewer { viewer_count }, notify)
                }
            } else {
                room.pending_approvals.push_back(ApprovalRequest {
                    peer_id: peer_id.clone(),
                    username: username.to_string(),
                    created_at: now_ms(),
                });
                gauge!(room_metrics::PENDING_APPROVALS_ACTIVE).increment(1.0);
                let notify = room
                    .streamer
                    .as_ref()
                    .map(|s| {
                        vec![Notify::ToPeer(
                            s.peer_id.clone(),
                            ServerMessage::JoinRequest { user_id: peer_id.clone(), username: username.to_string() },
                        )]
                    })
                    .unwrap_or_default();
                (JoinOutcome::PendingApproval, notify)
            }
        };

        if matches!(outcome, JoinOutcome::AdmittedStreamer | JoinOutcome::AdmittedViewer { .. }) {
            if let Err(err) = self.persist(room_id).await {
                let mut room = handle.lock().unwrap_or_else(|e| e.into_inner());
                if is_streamer {
                    room.streamer = None;
                } else {
                    room.remove_viewer(peer_id);
                }
                return Err(err);
            }
            let event = if is_streamer {
                BusEvent::RoomCreated { room_id: room_id.to_string() }
            } else {
                BusEvent::UserJoined { room_id: room_id.to_string(), peer_id: peer_id.clone(), username: username.to_string() }
            };
            self.publish(event).await;
        }

        Ok((outcome, notify))
    }

    /// `AcceptUser(streamerId, targetPeerId, roomId)` (spec §4.3).
    pub async fn accept_user(&self, streamer_id: &str, target_peer_id: &str, room_id: &str) -> Result<(bool, Vec<Notify>)> {
        let handle = self.room_handle(room_id);
        let accepted = {
            let mut room = handle.lock().unwrap_or_else(|e| e.into_inner());
            if !Self::is_seated_streamer(&room, streamer_id) {
                return Ok((false, vec![]));
            }
            let Some(request) = room.take_pending(target_peer_id) else {
                return Ok((false, vec![]));
            };
            gauge!(room_metrics::PENDING_APPROVALS_ACTIVE).decrement(1.0);
            room.record_viewer_join(request.peer_id.clone(), request.username.clone());
            let viewer_count = room.viewer_count();
            let notify = vec![
                Notify::ToPeer(target_peer_id.to_string(), ServerMessage::JoinAccepted),
                Notify::ToRoomExcept(
                    room_id.to_string(),
                    target_peer_id.to_string(),
                    ServerMessage::UserJoined { username: request.username.clone(), viewer_count },
                ),
            ];
            (true, notify, request.username)
        };

        if accepted.0 {
            self.persist(room_id).await?;
            self.publish(BusEvent::UserJoined {
                room_id: room_id.to_string(),
                peer_id: target_peer_id.to_string(),
                username: accepted.2.clone(),
            })
            .await;
        }
        Ok((accepted.0, accepted.1))
    }

    /// `RejectUser(streamerId, targetPeerId, roomId)`.
    pub fn reject_user(&self, streamer_id: &str, target_peer_id: &str, room_id: &str) -> Result<(bool, Vec<Notify>)> {
        let handle = self.room_handle(room_id);
        let mut room = handle.lock().unwrap_or_else(|e| e.into_inner());
        if !Self::is_seated_streamer(&room, streamer_id) {
            return Ok((false, vec![]));
        }
        if room.take_pending(target_peer_id).is_none() {
            return Ok((false, vec![]));
        }
        gauge!(room_metrics::PENDING_APPROVALS_ACTIVE).decrement(1.0);
        Ok((true, vec![Notify::ToPeer(target_peer_id.to_string(), ServerMessage::JoinRejected { reason: None })]))
    }

    /// `AcceptAll`/`RejectAll`: bulk forms, single combined notification set.
    pub async fn accept_all(&self, streamer_id: &str, room_id: &str) -> Result<(u32, Vec<Notify>)> {
        let handle = self.room_handle(room_id);
        let (accepted, notify) = {
            let mut room = handle.lock().unwrap_or_else(|e| e.into_inner());
            if !Self::is_seated_streamer(&room, streamer_id) {
                return Ok((0, vec![]));
            }
            let waiters: Vec<_> = room.pending_approvals.drain(..).collect();
            gauge!(room_metrics::PENDING_APPROVALS_ACTIVE).set(0.0);
            let mut notify = Vec::new();
            for waiter in &waiters {
                room.record_viewer_join(waiter.peer_id.clone(), waiter.username.clone());
                notify.push(Notify::ToPeer(waiter.peer_id.clone(), ServerMessage::JoinAccepted));
            }
            let viewer_count = room.viewer_count();
            if !waiters.is_empty() {
                notify.push(Notify::ToRoom(room_id.to_string(), ServerMessage::UserJoined {
                    username: format!("{} viewers", waiters.len()),
                    viewer_count,
                }));
            }
            (waiters.len() as u32, notify)
        };
        if accepted > 0 {
            self.persist(room_id).await?;
        }
        Ok((accepted, notify))
    }

    pub fn reject_all(&self, streamer_id: &str, room_id: &str) -> Result<(u32, Vec<Notify>)> {
        let handle = self.room_handle(room_id);
        let mut room = handle.lock().unwrap_or_else(|e| e.into_inner());
        if !Self::is_seated_streamer(&room, streamer_id) {
            return Ok((0, vec![]));
        }
        let waiters: Vec<_> = room.pending_approvals.drain(..).collect();
        gauge!(room_metrics::PENDING_APPROVALS_ACTIVE).set(0.0);
        let notify = waiters
            .iter()
            .map(|w| Notify::ToPeer(w.peer_id.clone(), ServerMessage::JoinRejected { reason: None }))
            .collect();
        Ok((waiters.len() as u32, notify))
    }

    /// `UpdateAutoAccept(streamerId, roomId, bool)`. false→true drains the
    /// pending queue in insertion order (spec §4.3).
    pub async fn update_auto_accept(&self, streamer_id: &str, room_id: &str, auto_accept: bool) -> Result<Vec<Notify>> {
        let handle = self.room_handle(room_id);
        let (drained, notify) = {
            let mut room = handle.lock().unwrap_or_else(|e| e.into_inner());
            if !Self::is_seated_streamer(&room, streamer_id) {
                return Ok(vec![]);
            }
            let was_off = !room.settings.auto_accept;
            room.settings.auto_accept = auto_accept;
            if was_off && auto_accept {
                let waiters: Vec<_> = room.pending_approvals.drain(..).collect();
                gauge!(room_metrics::PENDING_APPROVALS_ACTIVE).set(0.0);
                let mut notify = Vec::new();
                for waiter in &waiters {
                    room.record_viewer_join(waiter.peer_id.clone(), waiter.username.clone());
                    notify.push(Notify::ToPeer(waiter.peer_id.clone(), ServerMessage::JoinAccepted));
                }
                (!waiters.is_empty(), notify)
            } else {
                (false, vec![])
            }
        };
        if drained {
            self.persist(room_id).await?;
        }
        Ok(notify)
    }

    /// `Leave(peerId)` for a known `room_id` (the caller tracks which room a
    /// peer occupies via the session registry).
    pub async fn leave(&self, peer_id: &str, room_id: &str) -> Result<Vec<Notify>> {
        let handle = self.room_handle(room_id);
        let (notify, was_streamer) = {
            let mut room = handle.lock().unwrap_or_else(|e| e.into_inner());
            room.take_pending(peer_id);

            if room.streamer.as_ref().is_some_and(|s| s.peer_id == peer_id) {
                room.streamer = None;
                room.stats.ended_at = Some(now_ms());
                (
                    vec![Notify::ToRoom(room_id.to_string(), ServerMessage::StreamEnded {
                        reason: "streamer_left".into(),
                        message: "the streamer has left the room".into(),
                        reconnect_possible: true,
                    })],
                    true,
                )
            } else if let Some(viewer) = room.remove_viewer(peer_id) {
                let viewer_count = room.viewer_count();
                (
                    vec![Notify::ToRoom(room_id.to_string(), ServerMessage::UserLeft {
                        username: viewer.username,
                        viewer_count,
                        is_streamer: false,
                    })],
                    false,
                )
            } else {
                (vec![], false)
            }
        };

        if was_streamer {
            self.publish(BusEvent::StreamEnded { room_id: room_id.to_string(), reason: "streamer_left".into() }).await;
        } else if !notify.is_empty() {
            self.publish(BusEvent::UserLeft { room_id: room_id.to_string(), peer_id: peer_id.to_string() }).await;
        }

        self.maybe_gc(room_id);
        Ok(notify)
    }

    /// `Tick()`: times out stale pending approvals and GCs empty rooms
    /// (spec §4.3, default threshold 60 s).
    pub fn tick(&self) -> Vec<(RoomId, Vec<Notify>)> {
        let now = now_ms();
        let mut out = Vec::new();
        let room_ids: Vec<RoomId> = self.rooms.iter().map(|e| e.key().clone()).collect();

        for room_id in room_ids {
            let Some(handle) = self.rooms.get(&room_id).map(|e| e.clone()) else { continue };
            let mut notify = Vec::new();
            {
                let mut room = handle.lock().unwrap_or_else(|e| e.into_inner());
                let stale: Vec<_> = room
                    .pending_approvals
                    .iter()
                    .filter(|req| now.saturating_sub(req.created_at) > PENDING_APPROVAL_TIMEOUT_MS)
                    .map(|req| req.peer_id.clone())
                    .collect();
                for peer_id in stale {
                    if room.take_pending(&peer_id).is_some() {
                        counter!(room_metrics::PENDING_APPROVAL_TIMEOUT_TOTAL).increment(1);
                        notify.push(Notify::ToPeer(peer_id, ServerMessage::JoinRejected { reason: Some("TIMEOUT".into()) }));
                    }
                }
            }
            if !notify.is_empty() {
                out.push((room_id.clone(), notify));
            }
            self.maybe_gc(&room_id);
        }
        out
    }

    pub fn chat(&self, room_id: &str, username: &str, message: &str, is_streamer: bool) -> Option<(ChatPayload, Vec<Notify>)> {
        let handle = self.rooms.get(room_id).map(|e| e.clone())?;
        let mut room = handle.lock().unwrap_or_else(|e| e.into_inner());
        let payload = room.push_message(ChatPayload {
            id: 0,
            username: username.to_string(),
            message: message.to_string(),
            timestamp: now_ms(),
            is_system: false,
            is_streamer,
        });
        let notify = vec![Notify::ToRoom(room_id.to_string(), ServerMessage::ChatMessage(payload.clone()))];
        Some((payload, notify))
    }

    /// The last `limit` chat messages, newest last (spec §3's rolling
    /// `room:<id>:messages:<limit>` caches).
    pub fn recent_messages(&self, room_id: &str, limit: usize) -> Vec<ChatPayload> {
        let Some(handle) = self.rooms.get(room_id).map(|e| e.clone()) else { return vec![] };
        let room = handle.lock().unwrap_or_else(|e| e.into_inner());
        let skip = room.messages.len().saturating_sub(limit);
        room.messages.iter().skip(skip).cloned().collect()
    }

    pub fn snapshot(&self, room_id: &str) -> Option<RoomSnapshot> {
        self.rooms.get(room_id).map(|e| {
            let room = e.lock().unwrap_or_else(|err| err.into_inner());
            RoomSnapshot::from(&*room)
        })
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// All room ids currently tracked, for the HTTP room directory (spec §6.3).
    pub fn room_ids(&self) -> Vec<RoomId> {
        self.rooms.iter().map(|entry| entry.key().clone()).collect()
    }

    /// The seated streamer's `peer_id`, if any (spec §4.5 targeting rules).
    pub fn streamer_of(&self, room_id: &str) -> Option<PeerId> {
        let handle = self.rooms.get(room_id)?.clone();
        let room = handle.lock().unwrap_or_else(|e| e.into_inner());
        room.streamer.as_ref().map(|s| s.peer_id.clone())
    }

    /// Current viewer peer ids, for offer fan-out.
    pub fn viewers_of(&self, room_id: &str) -> Vec<PeerId> {
        let Some(handle) = self.rooms.get(room_id).map(|e| e.clone()) else { return vec![] };
        let room = handle.lock().unwrap_or_else(|e| e.into_inner());
        room.viewers.keys().cloned().collect()
    }

    pub fn is_viewer(&self, room_id: &str, peer_id: &str) -> bool {
        let Some(handle) = self.rooms.get(room_id).map(|e| e.clone()) else { return false };
        let room = handle.lock().unwrap_or_else(|e| e.into_inner());
        room.viewers.contains_key(peer_id)
    }

    /// Record a viewer's self-reported connection health; returns a
    /// notification for the streamer when the viewer degrades (spec §4.5).
    pub fn report_viewer_health(
        &self,
        room_id: &str,
        peer_id: &str,
        status: HealthStatus,
    ) -> Vec<Notify> {
        let Some(handle) = self.rooms.get(room_id).map(|e| e.clone()) else { return vec![] };
        let mut room = handle.lock().unwrap_or_else(|e| e.into_inner());
        let Some(viewer) = room.viewers.get_mut(peer_id) else { return vec![] };
        viewer.health = status;
        if matches!(status, HealthStatus::Healthy) {
            viewer.consecutive_failures = 0;
            return vec![];
        }
        viewer.consecutive_failures += 1;
        let Some(streamer) = room.streamer.as_ref() else { return vec![] };
        vec![Notify::ToPeer(
            streamer.peer_id.clone(),
            ServerMessage::ViewerDisconnected { user_id: peer_id.to_string(), status },
        )]
    }

    fn is_seated_streamer(room: &Room, streamer_id: &str) -> bool {
        room.streamer.as_ref().is_some_and(|s| s.peer_id == streamer_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_is_created_lazily_and_destroyed_when_empty() {
        let room = Room::new("ABC123".into());
        assert!(room.is_empty());
    }

    #[test]
    fn pending_approvals_preserve_insertion_order() {
        let mut room = Room::new("ROOM01".into());
        room.pending_approvals.push_back(ApprovalRequest { peer_id: "p1".into(), username: "a".into(), created_at: 1 });
        room.pending_approvals.push_back(ApprovalRequest { peer_id: "p2".into(), username: "b".into(), created_at: 2 });
        let first = room.take_pending("p1");
        assert_eq!(first.map(|r| r.peer_id), Some("p1".to_string()));
        assert_eq!(room.pending_approvals.len(), 1);
    }
}
