//! Metric name and label definitions.
//!
//! Centralizing these as constants keeps emitter call sites and the
//! Prometheus bucket configuration in `recorder.rs` from drifting apart.

/// WebSocket connection lifecycle metrics (gateway `ws.rs`).
pub mod websocket {
    pub const CONNECTIONS_TOTAL: &str = "streamhub_websocket_connections_total";
    pub const CONNECTIONS_ACTIVE: &str = "streamhub_websocket_connections_active";
    pub const CONNECTIONS_CLOSED_TOTAL: &str = "streamhub_websocket_connections_closed_total";
    pub const HANDSHAKE_TIMEOUT_TOTAL: &str = "streamhub_websocket_handshake_timeout_total";
    pub const MESSAGES_RECEIVED_TOTAL: &str = "streamhub_websocket_messages_received_total";
    pub const MESSAGES_SENT_TOTAL: &str = "streamhub_websocket_messages_sent_total";
    pub const MESSAGE_DECODE_ERRORS_TOTAL: &str = "streamhub_websocket_message_decode_errors_total";
    pub const SEND_QUEUE_DEPTH: &str = "streamhub_websocket_send_queue_depth";
}

/// Room lifecycle and membership metrics (`streamhub-rooms`).
pub mod room {
    pub const ROOMS_ACTIVE: &str = "streamhub_rooms_active";
    pub const ROOMS_CREATED_TOTAL: &str = "streamhub_rooms_created_total";
    pub const ROOMS_CLOSED_TOTAL: &str = "streamhub_rooms_closed_total";
    pub const VIEWERS_ACTIVE: &str = "streamhub_room_viewers_active";
    pub const JOIN_REQUESTS_TOTAL: &str = "streamhub_room_join_requests_total";
    pub const JOIN_REJECTED_TOTAL: &str = "streamhub_room_join_rejected_total";
    pub const ROOM_FULL_TOTAL: &str = "streamhub_room_full_total";
    pub const PENDING_APPROVALS_ACTIVE: &str = "streamhub_room_pending_approvals_active";
    pub const PENDING_APPROVAL_TIMEOUT_TOTAL: &str = "streamhub_room_pending_approval_timeout_total";
}

/// Signaling relay metrics (`streamhub-signaling`).
pub mod signaling {
    pub const OFFERS_RELAYED_TOTAL: &str = "streamhub_signaling_offers_relayed_total";
    pub const ANSWERS_RELAYED_TOTAL: &str = "streamhub_signaling_answers_relayed_total";
    pub const ICE_CANDIDATES_RELAYED_TOTAL: &str = "streamhub_signaling_ice_candidates_relayed_total";
    pub const RELAY_TARGET_MISSING_TOTAL: &str = "streamhub_signaling_relay_target_missing_total";
    pub const RELAY_LATENCY_SECONDS: &str = "streamhub_signaling_relay_latency_seconds";
}

/// Chat fan-out metrics (`streamhub-chat`).
pub mod chat {
    pub const MESSAGES_TOTAL: &str = "streamhub_chat_messages_total";
    pub const HISTORY_TRIMMED_TOTAL: &str = "streamhub_chat_history_trimmed_total";
}

/// Rate limiter metrics (`streamhub-ratelimit`).
pub mod ratelimit {
    pub const CHECKS_TOTAL: &str = "streamhub_ratelimit_checks_total";
    pub const THROTTLED_TOTAL: &str = "streamhub_ratelimit_throttled_total";
    pub const BUCKETS_ACTIVE: &str = "streamhub_ratelimit_buckets_active";
}

/// Multi-level cache metrics (`streamhub-cache`).
pub mod cache {
    pub const L1_HITS_TOTAL: &str = "streamhub_cache_l1_hits_total";
    pub const L1_MISSES_TOTAL: &str = "streamhub_cache_l1_misses_total";
    pub const L2_HITS_TOTAL: &str = "streamhub_cache_l2_hits_total";
    pub const L2_MISSES_TOTAL: &str = "streamhub_cache_l2_misses_total";
    pub const INVALIDATIONS_TOTAL: &str = "streamhub_cache_invalidations_total";
    pub const ENTRIES_ACTIVE: &str = "streamhub_cache_entries_active";
}

/// Message batcher metrics (`streamhub-batcher`).
pub mod batcher {
    pub const BATCHES_FLUSHED_TOTAL: &str = "streamhub_batcher_batches_flushed_total";
    pub const MESSAGES_BATCHED_TOTAL: &str = "streamhub_batcher_messages_batched_total";
    pub const MESSAGES_DROPPED_TOTAL: &str = "streamhub_batcher_messages_dropped_total";
    pub const FLUSH_LATENCY_SECONDS: &str = "streamhub_batcher_flush_latency_seconds";
    pub const QUEUE_DEPTH: &str = "streamhub_batcher_queue_depth";
}

/// Store gateway and cross-server bus metrics (`streamhub-store`, `streamhub-bus`).
pub mod store {
    pub const COMMANDS_TOTAL: &str = "streamhub_store_commands_total";
    pub const COMMAND_ERRORS_TOTAL: &str = "streamhub_store_command_errors_total";
    pub const RECONNECTS_TOTAL: &str = "streamhub_store_reconnects_total";
    pub const BUS_EVENTS_PUBLISHED_TOTAL: &str = "streamhub_bus_events_published_total";
    pub const BUS_EVENTS_RECEIVED_TOTAL: &str = "streamhub_bus_events_received_total";
    pub const BUS_EVENTS_SUPPRESSED_TOTAL: &str = "streamhub_bus_events_suppressed_echo_total";
}

/// HTTP surface metrics (`streamhub-gateway` http.rs).
pub mod http {
    pub const REQUESTS_TOTAL: &str = "streamhub_http_requests_total";
    pub const REQUEST_DURATION_SECONDS: &str = "streamhub_http_request_duration_seconds";
    pub const REQUESTS_IN_FLIGHT: &str = "streamhub_http_requests_in_flight";
}

/// Process-level metrics.
pub mod system {
    pub const UPTIME_SECONDS: &str = "streamhub_uptime_seconds";
}

/// Histogram bucket sets shared by the recorder.
pub mod buckets {
    pub const HTTP_DURATION: [f64; 10] = [
        0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5,
    ];
    pub const RELAY_LATENCY: [f64; 9] = [
        0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25,
    ];
    pub const FLUSH_LATENCY: [f64; 8] = [0.005, 0.01, 0.025, 0.05, 0.1, 0.2, 0.5, 1.0];
}
