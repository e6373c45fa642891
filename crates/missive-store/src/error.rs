use thiserror::Error;

/// Failures surfaced by the document store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Fetch failed for {path}: {reason}")]
    Fetch { path: String, reason: String },

    #[error("Write failed for {path}: {reason}")]
    Write { path: String, reason: String },

    #[error("Not found: {path}")]
    NotFound { path: String },

    #[error("Operation on {path} timed out")]
    Timeout { path: String },

    #[error("Invalid document path: {0}")]
    InvalidPath(String),
}

impl StoreError {
    pub(crate) fn fetch(path: &str, reason: impl ToString) -> Self {
        Self::Fetch {
            path: path.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn write(path: &str, reason: impl ToString) -> Self {
        Self::Write {
            path: path.to_string(),
            reason: reason.to_string(),
        }
    }
}
