use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Store(#[from] streamhub_store::Error),

    #[error("room not found")]
    NotFound,

    #[error("room is owned by another shard")]
    Redirect,

    #[error("{0}")]
    Message(String),
}

pub type Result<T> = std::result::Result<T, Error>;
