use streamhub_common::types::ServerId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    StreamerPresent,
    RoomFull,
    Timeout,
    InvalidRoomId,
    InvalidUsername,
}

impl RejectReason {
    pub fn code(&self) -> &'static str {
        use streamhub_protocol::error_codes::*;
        match self {
            RejectReason::StreamerPresent => STREAMER_PRESENT,
            RejectReason::RoomFull => ROOM_FULL,
            RejectReason::Timeout => "TIMEOUT",
            RejectReason::InvalidRoomId => INVALID_ROOM_ID,
            RejectReason::InvalidUsername => INVALID_USERNAME,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    AdmittedStreamer,
    AdmittedViewer { viewer_count: u32 },
    PendingApproval,
    Rejected(RejectReason),
    Redirect(ServerId),
}
