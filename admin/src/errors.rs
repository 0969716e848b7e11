use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("frame codec error: {0}")]
    Codec(#[from] schema::CodecError),
    #[error("matchmaker sent an unexpected response variant")]
    UnexpectedResponse,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
