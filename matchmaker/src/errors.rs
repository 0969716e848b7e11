use thiserror::Error;

/// Business and transport-layer error taxonomy for the matchmaker.
/// The first five variants are well-formed RPC outcomes, never
/// transport failures; `Internal` is fatal and must never occur in a
/// correct implementation.
#[derive(Debug, Error)]
pub enum MatchmakerError {
    #[error("player is already in the queue")]
    AlreadyInQueue,
    #[error("player is already in a match")]
    InMatch,
    #[error("server {0} is not registered")]
    UnknownServer(String),
    #[error("admin transition rejected: {0}")]
    Conflict(String),
    #[error("invariant violation: {0}")]
    Internal(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("frame codec error: {0}")]
    Codec(#[from] schema::CodecError),
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}
