use thiserror::Error;

pub type Result<T> = std::result::Result<T, BufferError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BufferError {
    #[error("buffer is closed")]
    Closed,
}
