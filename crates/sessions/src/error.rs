use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("no session for connection")]
    SessionNotFound,

    #[error("{0}")]
    Message(String),
}

pub type Result<T> = std::result::Result<T, Error>;
