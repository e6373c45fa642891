//! Document store configuration

use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the JSON document store
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Directory holding the document files
    pub documents_dir: PathBuf,
    /// Deadline for a single store operation
    pub op_timeout: Duration,
    /// Buffered events per document subscription channel
    pub watch_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            documents_dir: missive_common::documents_dir(),
            op_timeout: Duration::from_secs(10),
            watch_capacity: 64,
        }
    }
}

impl StoreConfig {
    /// Create config rooted at a custom base directory
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            documents_dir: base_dir.into().join("documents"),
            ..Self::default()
        }
    }

    /// Ensure the documents directory exists
    pub async fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        tokio::fs::create_dir_all(&self.documents_dir).await?;
        Ok(())
    }
}
