use missive_blob::BlobError;
use missive_store::StoreError;
use thiserror::Error;

/// Failures surfaced by the sync core.
///
/// Every store and facade operation returns one of these; nothing in this
/// crate terminates the process on a bad record or a rejected write.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Fetch failed: {0}")]
    Fetch(String),

    #[error("Decode failed: {0}")]
    Decode(String),

    #[error("Write failed: {0}")]
    Write(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error(transparent)]
    Blob(#[from] BlobError),
}

impl From<StoreError> for SyncError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Fetch { path, reason } => Self::Fetch(format!("{}: {}", path, reason)),
            StoreError::Write { path, reason } => Self::Write(format!("{}: {}", path, reason)),
            StoreError::NotFound { path } => Self::NotFound(path),
            StoreError::Timeout { path } => Self::Timeout(path),
            StoreError::InvalidPath(path) => Self::Write(format!("invalid path {}", path)),
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
