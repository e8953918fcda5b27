use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Message(String),

    #[error("connection pool exhausted: {active}/{max_concurrent} connections in use")]
    PoolExhausted { active: usize, max_concurrent: usize },

    #[error("not authenticated")]
    NotAuthenticated,

    #[error(transparent)]
    Queue(#[from] gg_queue::Error),

    #[error(transparent)]
    Routing(#[from] gg_routing::Error),

    #[error(transparent)]
    Rpc(#[from] gg_rpc::Error),

    #[error(transparent)]
    Sessions(#[from] gg_sessions::Error),

    #[error(transparent)]
    Config(#[from] gg_config::Error),

    #[error(transparent)]
    Service(#[from] gg_service_traits::ServiceError),

    #[error(transparent)]
    Common(#[from] gg_common::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Id(#[from] gg_common::IdGeneratorError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl gg_common::FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Message(message)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

gg_common::impl_context!();
