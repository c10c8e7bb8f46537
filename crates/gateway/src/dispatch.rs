//! Routes one decoded [`ClientMessage`] from an already-admitted connection
//! to the Room Manager, Signaling Relay, or Chat Service, then turns the
//! resulting `Notify` list into actual deliveries (spec §2 "Flow", §4.9).

use std::sync::Arc;

use streamhub_batcher::Priority;
use streamhub_common::types::{PeerId, PeerRole, UserTier};
use streamhub_protocol::{ClientMessage, ConnectionHealthStatus, OutboundFrame, ServerMessage, error_codes};
use streamhub_ratelimit::{Decision, MessageKind};
use streamhub_rooms::{JoinOutcome, Notify};
use streamhub_routing::RouteDecision;

use crate::state::GatewayState;

/// Dispatch one inbound frame from `peer_id`. Errors are surfaced to the
/// caller as an `error` frame rather than propagated — a malformed or
/// rejected request never drops the connection (spec §4.8 scenario 5).
pub async fn handle(state: &GatewayState, peer_id: &PeerId, remote_ip: &str, message: ClientMessage) {
    let kind = message_kind(&message);
    let tier = state.sessions.get(peer_id).map(|s| s.tier).unwrap_or(UserTier::Anonymous);

    if !matches!(state.limiter.check(peer_id, remote_ip, tier, kind), Decision::Allowed) {
        send_direct(state, peer_id, ServerMessage::error(error_codes::RATE_LIMIT_EXCEEDED, "rate limit exceeded"));
        return;
    }

    let _ = state.sessions.touch(peer_id);

    let result = match message {
        ClientMessage::JoinRoom { room_id, username, is_streamer } => {
            join_room(state, peer_id, remote_ip, &room_id, &username, is_streamer).await
        },
        ClientMessage::LeaveRoom => leave_room(state, peer_id).await,
        ClientMessage::ChatMessage { room_id, message } => chat_message(state, peer_id, &room_id, &message).await,
        ClientMessage::UpdateAutoAccept { room_id, auto_accept } => {
            state.rooms.update_auto_accept(peer_id, &room_id, auto_accept).await.map(|n| admit_accepted(state, &room_id, n)).map_err(Into::into)
        },
        ClientMessage::AcceptUser { user_id, room_id } => {
            state.rooms.accept_user(peer_id, &user_id, &room_id).await.map(|(_, n)| admit_accepted(state, &room_id, n)).map_err(Into::into)
        },
        ClientMessage::RejectUser { user_id, room_id } => {
            state.rooms.reject_user(peer_id, &user_id, &room_id).map(|(_, n)| n).map_err(Into::into)
        },
        ClientMessage::AcceptAll { room_id } => {
            state.rooms.accept_all(peer_id, &room_id).await.map(|(_, n)| admit_accepted(state, &room_id, n)).map_err(Into::into)
        },
        ClientMessage::RejectAll { room_id } => state.rooms.reject_all(peer_id, &room_id).map(|(_, n)| n).map_err(Into::into),
        ClientMessage::Offer { offer, room_id, .. } => state.signaling.relay_offer(peer_id, &room_id, offer).map_err(Into::into),
        ClientMessage::Answer { answer, streamer_id, .. } => {
            let room_id = state.sessions.get(peer_id).and_then(|s| s.room_id);
            match room_id {
                Some(room_id) => state.signaling.relay_answer(peer_id, &room_id, &streamer_id, answer).map_err(Into::into),
                None => Ok(vec![]),
            }
        },
        ClientMessage::IceCandidate { candidate, room_id, target_id, .. } => {
            let room_id = room_id.or_else(|| state.sessions.get(peer_id).and_then(|s| s.room_id));
            match room_id {
                Some(room_id) => state
                    .signaling
                    .relay_ice(peer_id, &room_id, target_id.as_deref(), candidate)
                    .map_err(Into::into),
                None => Ok(vec![]),
            }
        },
        ClientMessage::ConnectionHealth { status, .. } => connection_health(state, peer_id, status).await,
    };

    match result {
        Ok(notify) => fanout(state, notify),
        Err(error) => {
            tracing::debug!(%error, peer_id, "dispatch rejected request");
            send_direct(state, peer_id, ServerMessage::error("INTERNAL", error.to_string()));
        },
    }
}

fn message_kind(message: &ClientMessage) -> MessageKind {
    match message {
        ClientMessage::JoinRoom { .. } => MessageKind::JoinRoom,
        ClientMessage::ChatMessage { .. } => MessageKind::ChatMessage,
        ClientMessage::Offer { .. } => MessageKind::Offer,
        ClientMessage::Answer { .. } => MessageKind::Answer,
        ClientMessage::IceCandidate { .. } => MessageKind::IceCandidate,
        _ => MessageKind::Other,
    }
}

async fn join_room(
    state: &GatewayState,
    peer_id: &PeerId,
    _remote_ip: &str,
    room_id: &str,
    username: &str,
    is_streamer: bool,
) -> crate::error::Result<Vec<Notify>> {
    let active = state.bus.active_servers.active_servers();
    match state.router.resolve(&room_id.to_string(), &active) {
        RouteDecision::Redirect(target) => {
            send_direct(state, peer_id, ServerMessage::RedirectServer { target_server: target, room_id: room_id.to_string() });
            return Ok(vec![]);
        },
        RouteDecision::Unavailable => {
            send_direct(state, peer_id, ServerMessage::error(error_codes::UNAVAILABLE, "no instance currently owns this room's shard"));
            return Ok(vec![]);
        },
        RouteDecision::Local => {},
    }

    let (outcome, notify) = state.rooms.join(peer_id, username, room_id, is_streamer).await?;
    let _ = state.sessions.set_username(peer_id, username);
    match outcome {
        JoinOutcome::AdmittedStreamer => {
            let _ = state.sessions.set_role(peer_id, PeerRole::Streamer, UserTier::Streamer);
            let _ = state.sessions.set_room(peer_id, Some(room_id.to_string()));
            send_room_info(state, peer_id, room_id);
        },
        JoinOutcome::AdmittedViewer { .. } => {
            let _ = state.sessions.set_role(peer_id, PeerRole::Viewer, UserTier::Viewer);
            let _ = state.sessions.set_room(peer_id, Some(room_id.to_string()));
            send_room_info(state, peer_id, room_id);
        },
        JoinOutcome::PendingApproval => {
            let _ = state.sessions.set_role(peer_id, PeerRole::Pending, UserTier::Viewer);
            send_direct(state, peer_id, ServerMessage::WaitingApproval);
        },
        JoinOutcome::Rejected(reason) => {
            send_direct(state, peer_id, ServerMessage::error(reason.code(), "join rejected"));
        },
        JoinOutcome::Redirect(target) => {
            send_direct(state, peer_id, ServerMessage::RedirectServer { target_server: target, room_id: room_id.to_string() });
        },
    }
    Ok(notify)
}

fn send_room_info(state: &GatewayState, peer_id: &PeerId, room_id: &str) {
    if let Some(message) = room_info(state, room_id) {
        send_direct(state, peer_id, message);
    }
}

fn room_info(state: &GatewayState, room_id: &str) -> Option<ServerMessage> {
    let snapshot = state.rooms.snapshot(room_id)?;
    let messages = state.rooms.recent_messages(room_id, streamhub_protocol::CHAT_HISTORY_CAPACITY);
    Some(ServerMessage::RoomInfo { room_id: room_id.to_string(), viewer_count: snapshot.viewer_count, messages })
}

/// `accept-user`/`accept-all`/an auto-accept drain each move a peer from
/// `pending` to `viewer` inside `RoomManager`, which only knows about room
/// membership, not connection state. Every such admission carries a
/// `Notify::ToPeer(peer_id, JoinAccepted)` in its notify list; mirror that
/// transition into the session registry and splice a `room-info` right
/// after each one so it lands after `join-accepted` for that peer (spec
/// scenario 2) once the whole list is fanned out in order.
fn admit_accepted(state: &GatewayState, room_id: &str, notify: Vec<Notify>) -> Vec<Notify> {
    let mut result = Vec::with_capacity(notify.len());
    for item in notify {
        if let Notify::ToPeer(peer_id, ServerMessage::JoinAccepted) = &item {
            let _ = state.sessions.set_role(peer_id, PeerRole::Viewer, UserTier::Viewer);
            let _ = state.sessions.set_room(peer_id, Some(room_id.to_string()));
            let info = room_info(state, room_id).map(|message| Notify::ToPeer(peer_id.clone(), message));
            result.push(item);
            result.extend(info);
        } else {
            result.push(item);
        }
    }
    result
}

async fn leave_room(state: &GatewayState, peer_id: &PeerId) -> crate::error::Result<Vec<Notify>> {
    let Some(room_id) = state.sessions.get(peer_id).and_then(|s| s.room_id) else {
        return Ok(vec![]);
    };
    let notify = state.rooms.leave(peer_id, &room_id).await?;
    let _ = state.sessions.set_room(peer_id, None);
    Ok(notify)
}

async fn chat_message(state: &GatewayState, peer_id: &PeerId, room_id: &str, text: &str) -> crate::error::Result<Vec<Notify>> {
    let Some(session) = state.sessions.get(peer_id) else { return Ok(vec![]) };
    let is_streamer = session.room_id.as_deref() == Some(room_id) && matches!(session.role, PeerRole::Streamer);
    let username = session.username.clone().unwrap_or_else(|| "anonymous".to_string());

    let (payload, mut notify) = state.chat.send(peer_id, &room_id.to_string(), &username, text, is_streamer).await?;
    notify.push(Notify::ToPeer(peer_id.clone(), ServerMessage::ChatMessage(payload)));
    Ok(notify)
}

async fn connection_health(state: &GatewayState, peer_id: &PeerId, status: ConnectionHealthStatus) -> crate::error::Result<Vec<Notify>> {
    let _ = state.sessions.set_health(peer_id, status);
    let Some(room_id) = state.sessions.get(peer_id).and_then(|s| s.room_id) else {
        return Ok(vec![]);
    };
    Ok(state.signaling.report_health(&room_id, peer_id, status))
}

/// Send straight to one peer's socket, bypassing the batcher (used for
/// control-plane replies that must land before any fanned-out broadcast).
fn send_direct(state: &GatewayState, peer_id: &PeerId, message: ServerMessage) {
    let _ = state.sessions.send_to(peer_id, OutboundFrame::Json(message));
}

/// Deliver every queued notification: `ToPeer` sends bypass the batcher
/// (priority 0, signaling/control traffic); `ToRoom`/`ToRoomExcept` route
/// through the per-room batcher so high-fanout events amortize (spec §4.9).
pub(crate) fn fanout(state: &GatewayState, notify: Vec<Notify>) {
    for item in notify {
        match item {
            Notify::ToPeer(peer_id, message) => send_direct(state, &peer_id, message),
            Notify::ToRoom(room_id, message) => enqueue_room(state, room_id, None, message),
            Notify::ToRoomExcept(room_id, except, message) => enqueue_room(state, room_id, Some(except), message),
        }
    }
}

fn enqueue_room(state: &GatewayState, room_id: String, except: Option<PeerId>, message: ServerMessage) {
    let priority = batch_priority(&message);
    let Ok(bytes) = serde_json::to_vec(&RoomBroadcast { message, except }) else { return };
    state.batcher.enqueue(room_id, priority, bytes);
}

fn batch_priority(message: &ServerMessage) -> Priority {
    match message {
        ServerMessage::Offer { .. } | ServerMessage::Answer { .. } | ServerMessage::IceCandidate { .. } | ServerMessage::ViewerDisconnected { .. } => {
            Priority::Immediate
        },
        ServerMessage::ChatMessage(_) => Priority::Default,
        _ => Priority::Fast,
    }
}

/// What actually sits in a batched queue entry: the payload plus the one
/// peer (if any) excluded from the room-wide fan-out.
#[derive(serde::Serialize, serde::Deserialize)]
struct RoomBroadcast {
    message: ServerMessage,
    except: Option<PeerId>,
}

/// Build the sink every `Batcher` flush calls: fan a batch's messages out to
/// every session currently in `room_id` via the session registry.
pub fn batch_sink(sessions: Arc<streamhub_sessions::SessionRegistry>) -> streamhub_batcher::BatchSink {
    Arc::new(move |room_id, batch| {
        let peers = sessions.peers_in_room(&room_id);
        for raw in batch.messages {
            let Ok(broadcast) = serde_json::from_slice::<RoomBroadcast>(&raw) else { continue };
            for peer_id in &peers {
                if broadcast.except.as_deref() == Some(peer_id.as_str()) {
                    continue;
                }
                let _ = sessions.send_to(peer_id, OutboundFrame::Json(broadcast.message.clone()));
            }
        }
    })
}
