use thiserror::Error;

#[derive(Error, Debug)]
pub enum SitRoomError {
    /// Bad input shape — rejected before any external call.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Classifier/search/feed unreachable or malformed. Isolated to the
    /// item or source by callers; never fatal to a whole cycle on its own.
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Write medium unavailable, or a constraint violation other than the
    /// expected dedup conflict. Propagates — the cycle runner must know.
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
