use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Message(String),

    #[error("routing failed: {0}")]
    Routing(#[from] gg_routing::Error),

    #[error("rpc call failed: {0}")]
    Rpc(#[from] gg_rpc::Error),
}

impl gg_common::FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Message(message)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

gg_common::impl_context!();
