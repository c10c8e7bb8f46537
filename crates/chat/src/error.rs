use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("room not found: {0}")]
    RoomNotFound(String),

    #[error("message too long ({len} > {max})")]
    MessageTooLong { len: usize, max: usize },

    #[error(transparent)]
    Rooms(#[from] streamhub_rooms::Error),

    #[error(transparent)]
    Cache(#[from] streamhub_cache::Error),

    #[error("{0}")]
    Message(String),
}

pub type Result<T> = std::result::Result<T, Error>;
