use streamhub_common::types::{PeerId, RoomId};
use streamhub_protocol::ServerMessage;

/// A delivery the caller must perform after a `RoomManager` call returns.
/// `RoomManager` never touches a connection directly — see spec §5's rule
/// that a room mutation releases its lock before any I/O runs.
#[derive(Debug, Clone)]
pub enum Notify {
    ToPeer(PeerId, ServerMessage),
    ToRoom(RoomId, ServerMessage),
    ToRoomExcept(RoomId, PeerId, ServerMessage),
}
