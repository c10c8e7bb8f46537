//! Room data model (spec §3).

use std::collections::{HashMap, VecDeque};

use streamhub_common::types::{PeerId, now_ms};
use streamhub_protocol::ChatPayload;

pub const DEFAULT_MAX_VIEWERS: u32 = streamhub_protocol::DEFAULT_MAX_VIEWERS;
pub const CHAT_HISTORY_CAPACITY: usize = streamhub_protocol::CHAT_HISTORY_CAPACITY;
pub const PENDING_APPROVAL_TIMEOUT_MS: u64 = streamhub_protocol::PENDING_APPROVAL_TIMEOUT_MS;

/// Self-reported peer connection health (spec §4.5's `connection-health`).
pub type HealthStatus = streamhub_protocol::ConnectionHealthStatus;

#[derive(Debug, Clone)]
pub struct Streamer {
    pub peer_id: PeerId,
    pub username: String,
    pub session_start: u64,
}

#[derive(Debug, Clone)]
pub struct Viewer {
    pub peer_id: PeerId,
    pub username: String,
    pub joined_at: u64,
    pub health: HealthStatus,
    pub consecutive_failures: u32,
}

#[derive(Debug, Clone)]
pub struct ApprovalRequest {
    pub peer_id: PeerId,
    pub username: String,
    pub created_at: u64,
}

#[derive(Debug, Clone)]
pub struct RoomSettings {
    pub auto_accept: bool,
    pub max_viewers: u32,
    pub is_private: bool,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self { auto_accept: false, max_viewers: DEFAULT_MAX_VIEWERS, is_private: false }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RoomStats {
    pub total_viewers: u64,
    pub current_viewers: u32,
    pub peak_viewers: u32,
    pub started_at: u64,
    pub ended_at: Option<u64>,
}

/// The authoritative, single-writer-owned state for one room (spec §3).
pub struct Room {
    pub room_id: String,
    pub streamer: Option<Streamer>,
    pub viewers: HashMap<PeerId, Viewer>,
    /// Insertion-ordered, as the spec requires for FIFO acceptance order.
    pub pending_approvals: VecDeque<ApprovalRequest>,
    pub messages: VecDeque<ChatPayload>,
    pub next_message_id: u64,
    pub settings: RoomSettings,
    pub stats: RoomStats,
    pub seq: u64,
}

impl Room {
    pub fn new(room_id: String) -> Self {
        Self {
            room_id,
            streamer: None,
            viewers: HashMap::new(),
            pending_approvals: VecDeque::new(),
            messages: VecDeque::with_capacity(CHAT_HISTORY_CAPACITY),
            next_message_id: 1,
            settings: RoomSettings::default(),
            stats: RoomStats { started_at: now_ms(), ..Default::default() },
            seq: 0,
        }
    }

    pub fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    pub fn push_message(&mut self, mut message: ChatPayload) -> ChatPayload {
        message.id = self.next_message_id;
        self.next_message_id += 1;
        if self.messages.len() >= CHAT_HISTORY_CAPACITY {
            self.messages.pop_front();
        }
        self.messages.push_back(message.clone());
        message
    }

    pub fn viewer_count(&self) -> u32 {
        self.viewers.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.streamer.is_none() && self.viewers.is_empty() && self.pending_approvals.is_empty()
    }

    pub fn record_viewer_join(&mut self, peer_id: PeerId, username: String) {
        self.viewers.insert(peer_id.clone(), Viewer {
            peer_id,
            username,
            joined_at: now_ms(),
            health: HealthStatus::Healthy,
            consecutive_failures: 0,
        });
        self.stats.total_viewers += 1;
        self.stats.current_viewers = self.viewer_count();
        self.stats.peak_viewers = self.stats.peak_viewers.max(self.stats.current_viewers);
    }

    pub fn remove_viewer(&mut self, peer_id: &str) -> Option<Viewer> {
        let viewer = self.viewers.remove(peer_id);
        self.stats.current_viewers = self.viewer_count();
        viewer
    }

    pub fn take_pending(&mut self, peer_id: &str) -> Option<ApprovalRequest> {
        let index = self.pending_approvals.iter().position(|req| req.peer_id == peer_id)?;
        self.pending_approvals.remove(index)
    }

    pub fn is_pending(&self, peer_id: &str) -> bool {
        self.pending_approvals.iter().any(|req| req.peer_id == peer_id)
    }
}
