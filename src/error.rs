use thiserror::Error;

/// Top-level error for batch operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Export(#[from] crate::export::ExportError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
