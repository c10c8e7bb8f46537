use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0} is not the seated streamer of this room")]
    NotStreamer(String),

    #[error("{0} is not a viewer of this room")]
    NotInRoom(String),

    #[error(transparent)]
    Rooms(#[from] streamhub_rooms::Error),

    #[error("{0}")]
    Message(String),
}

pub type Result<T> = std::result::Result<T, Error>;
