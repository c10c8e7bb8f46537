use {streamhub_common::FromMessage, thiserror::Error};

#[derive(Debug, Error)]
pub enum Error {
    /// The backing store is unreachable. Callers treat this as "cold" and
    /// fall back to authoritative in-process state where possible (spec §4.1).
    #[error("store backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error(transparent)]
    Redis(#[from] redis::RedisError),

    #[error(transparent)]
    Codec(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Message(String),
}

impl FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Message(message)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

streamhub_common::impl_context!();
