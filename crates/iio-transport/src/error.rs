use thiserror::Error;

pub type Result<T, E = TransportError> = core::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("endpoint unreachable: {0}")]
    Unreachable(String),
    #[error("no such attribute: {0}")]
    NoSuchAttribute(String),
    #[error("I/O error: {0}")]
    Io(String),
    #[error("operation not supported on this backend: {0}")]
    Unsupported(&'static str),
}
