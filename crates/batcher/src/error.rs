use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("room batcher for {0} is no longer running")]
    RoomClosed(String),

    #[error("{0}")]
    Message(String),
}

pub type Result<T> = std::result::Result<T, Error>;
