//! Offer/answer/ICE routing with targeting and connection-health bookkeeping
//! (spec §4.5). Emits the same `Notify` shape as `streamhub-rooms`; local
//! delivery and the cross-shard `webrtc:signaling` bus fallback for peers
//! not connected to this instance are the caller's job (spec §4.5: "if the
//! target peer is connected to another instance, the relay publishes on
//! `webrtc:signaling`").

use streamhub_common::types::{PeerId, RoomId, now_ms};
use streamhub_metrics::{counter, signaling as signaling_metrics};
use streamhub_protocol::{ConnectionHealthStatus, IceCandidatePayload, ServerMessage, SessionDescription};
use streamhub_rooms::{Notify, RoomManager};

use crate::error::{Error, Result};

pub struct SignalingRelay {
    rooms: std::sync::Arc<RoomManager>,
}

impl SignalingRelay {
    pub fn new(rooms: std::sync::Arc<RoomManager>) -> Self {
        Self { rooms }
    }

    /// Offer (streamer → room): fanned out to every current viewer.
    pub fn relay_offer(&self, streamer_id: &PeerId, room_id: &RoomId, offer: SessionDescription) -> Result<Vec<Notify>> {
        if self.rooms.streamer_of(room_id).as_deref() != Some(streamer_id.as_str()) {
            return Err(Error::NotStreamer(streamer_id.clone()));
        }
        counter!(signaling_metrics::OFFERS_RELAYED_TOTAL).increment(1);
        let msg = ServerMessage::Offer { offer, streamer_id: streamer_id.clone(), timestamp: now_ms() };
        Ok(self
            .rooms
            .viewers_of(room_id)
            .into_iter()
            .map(|viewer_id| Notify::ToPeer(viewer_id, msg.clone()))
            .collect())
    }

    /// Answer (viewer → streamer): targeted to the room's seated streamer.
    pub fn relay_answer(&self, viewer_id: &PeerId, room_id: &RoomId, streamer_id: &str, answer: SessionDescription) -> Result<Vec<Notify>> {
        if !self.rooms.is_viewer(room_id, viewer_id) {
            return Err(Error::NotInRoom(viewer_id.clone()));
        }
        let Some(seated) = self.rooms.streamer_of(room_id) else {
            counter!(signaling_metrics::RELAY_TARGET_MISSING_TOTAL).increment(1);
            return Ok(vec![]);
        };
        if seated != streamer_id {
            return Err(Error::NotStreamer(streamer_id.to_string()));
        }
        counter!(signaling_metrics::ANSWERS_RELAYED_TOTAL).increment(1);
        let msg = ServerMessage::Answer { answer, viewer_id: viewer_id.clone(), timestamp: now_ms() };
        Ok(vec![Notify::ToPeer(seated, msg)])
    }

    /// ICE candidate: targeted (has `target_id`) or fan-out (streamer only,
    /// no target). Sender identity is always server-assigned.
    pub fn relay_ice(
        &self,
        sender_id: &PeerId,
        room_id: &RoomId,
        target_id: Option<&str>,
        candidate: IceCandidatePayload,
    ) -> Result<Vec<Notify>> {
        let msg = ServerMessage::IceCandidate { candidate, sender_id: sender_id.clone(), timestamp: now_ms() };
        counter!(signaling_metrics::ICE_CANDIDATES_RELAYED_TOTAL).increment(1);

        if let Some(target_id) = target_id {
            let is_streamer = self.rooms.streamer_of(room_id).as_deref() == Some(sender_id.as_str());
            let is_viewer = self.rooms.is_viewer(room_id, sender_id);
            if !is_streamer && !is_viewer {
                return Err(Error::NotInRoom(sender_id.clone()));
            }
            return Ok(vec![Notify::ToPeer(target_id.to_string(), msg)]);
        }

        // Fan-out mode: only the seated streamer may omit a target.
        if self.rooms.streamer_of(room_id).as_deref() != Some(sender_id.as_str()) {
            return Err(Error::NotStreamer(sender_id.clone()));
        }
        Ok(self.rooms.viewers_of(room_id).into_iter().map(|viewer_id| Notify::ToPeer(viewer_id, msg.clone())).collect())
    }

    /// `connection-health` bookkeeping. On `lost`, if the reporter is the
    /// seated streamer, every viewer is told `stream-ended`; otherwise the
    /// streamer is told `viewer-disconnected` (spec §4.5).
    pub fn report_health(&self, room_id: &RoomId, peer_id: &PeerId, status: ConnectionHealthStatus) -> Vec<Notify> {
        if self.rooms.streamer_of(room_id).as_deref() == Some(peer_id.as_str()) {
            if matches!(status, ConnectionHealthStatus::Lost) {
                return vec![Notify::ToRoom(room_id.clone(), ServerMessage::StreamEnded {
                    reason: "streamer_disconnected".into(),
                    message: "the streamer's connection was lost".into(),
                    reconnect_possible: true,
                })];
            }
            return vec![];
        }
        self.rooms.report_viewer_health(room_id, peer_id, status)
    }
}
