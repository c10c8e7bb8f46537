use streamhub_common::FromMessage;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Rooms(#[from] streamhub_rooms::Error),

    #[error(transparent)]
    Signaling(#[from] streamhub_signaling::Error),

    #[error(transparent)]
    Chat(#[from] streamhub_chat::Error),

    #[error(transparent)]
    Store(#[from] streamhub_store::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

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
