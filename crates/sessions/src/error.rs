use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Message(String),

    #[error("session {0} not found")]
    NotFound(u64),

    #[error("session {0} not authenticated")]
    NotAuthenticated(u64),

    #[error("shared store error: {0}")]
    Store(#[from] gg_service_traits::ServiceError),

    #[error("{0}")]
    Serde(#[from] serde_json::Error),
}

impl gg_common::FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Message(message)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

gg_common::impl_context!();
