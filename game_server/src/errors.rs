use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("frame codec error: {0}")]
    Codec(#[from] schema::CodecError),
    #[error("matchmaker sent an unexpected response variant")]
    UnexpectedResponse,
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
