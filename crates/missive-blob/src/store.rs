use std::path::{Path, PathBuf};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::fs;
use tracing::{info, warn};
use url::Url;

/// Failures surfaced by the blob store
#[derive(Error, Debug)]
pub enum BlobError {
    #[error("Failed to upload blob {path}: {reason}")]
    Upload { path: String, reason: String },

    #[error("No blob at {path}")]
    NotFound { path: String },

    #[error("Blob I/O failed at {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Checksum mismatch for blob {path}: expected {expected}, got {actual}")]
    Corrupt {
        path: String,
        expected: String,
        actual: String,
    },

    #[error("Could not resolve a URL for blob {path}")]
    Resolve { path: String },

    #[error("Invalid blob path: {0}")]
    InvalidPath(String),
}

/// Configuration for the blob store
#[derive(Clone, Debug)]
pub struct BlobConfig {
    /// Directory holding blob files and their metadata sidecars
    pub blobs_dir: PathBuf,
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            blobs_dir: missive_common::blobs_dir(),
        }
    }
}

impl BlobConfig {
    /// Create config rooted at a custom base directory
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            blobs_dir: base_dir.into().join("blobs"),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlobMetadata {
    pub path: String,
    pub content_hash: String,
    pub size: u64,
}

/// File-backed blob store with content-hash integrity checks
pub struct BlobStore {
    config: BlobConfig,
}

impl BlobStore {
    pub async fn new(config: BlobConfig) -> Result<Self, BlobError> {
        fs::create_dir_all(&config.blobs_dir)
            .await
            .map_err(|e| BlobError::Upload {
                path: "<blobs_dir>".to_string(),
                reason: e.to_string(),
            })?;

        info!("[Blob] Blob store initialized at {:?}", config.blobs_dir);
        Ok(Self { config })
    }

    /// Store bytes under `path` and return the URL callers embed in messages
    pub async fn upload(&self, data: Bytes, path: &str) -> Result<Url, BlobError> {
        validate_path(path)?;

        let file = self.file_path(path);
        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent).await.map_err(|e| BlobError::Upload {
                path: path.to_string(),
                reason: e.to_string(),
            })?;
        }

        let meta = BlobMetadata {
            path: path.to_string(),
            content_hash: content_hash(&data),
            size: data.len() as u64,
        };

        fs::write(&file, &data).await.map_err(|e| BlobError::Upload {
            path: path.to_string(),
            reason: e.to_string(),
        })?;

        let meta_json = serde_json::to_string_pretty(&meta).map_err(|e| BlobError::Upload {
            path: path.to_string(),
            reason: e.to_string(),
        })?;
        fs::write(self.meta_path(path), meta_json)
            .await
            .map_err(|e| BlobError::Upload {
                path: path.to_string(),
                reason: e.to_string(),
            })?;

        info!("[Blob] Uploaded {} ({} bytes)", path, meta.size);
        self.resolve_url(path).await
    }

    /// Read a blob back, verifying its content hash when metadata is present
    pub async fn get(&self, path: &str) -> Result<Bytes, BlobError> {
        validate_path(path)?;

        let file = self.file_path(path);
        let data = match fs::read(&file).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(BlobError::NotFound {
                    path: path.to_string(),
                })
            }
            Err(e) => {
                return Err(BlobError::Io {
                    path: path.to_string(),
                    reason: e.to_string(),
                })
            }
        };

        if let Some(meta) = self.read_meta(path).await {
            let actual = content_hash(&data);
            if actual != meta.content_hash {
                return Err(BlobError::Corrupt {
                    path: path.to_string(),
                    expected: meta.content_hash,
                    actual,
                });
            }
        } else {
            warn!("[Blob] No metadata for {}, skipping hash check", path);
        }

        Ok(Bytes::from(data))
    }

    /// Resolvable URL for an already-stored blob
    pub async fn resolve_url(&self, path: &str) -> Result<Url, BlobError> {
        validate_path(path)?;

        let file = self.file_path(path);
        let absolute = fs::canonicalize(&file)
            .await
            .map_err(|_| BlobError::NotFound {
                path: path.to_string(),
            })?;

        Url::from_file_path(&absolute).map_err(|_| BlobError::Resolve {
            path: path.to_string(),
        })
    }

    async fn read_meta(&self, path: &str) -> Option<BlobMetadata> {
        let content = fs::read_to_string(self.meta_path(path)).await.ok()?;
        match serde_json::from_str(&content) {
            Ok(meta) => Some(meta),
            Err(e) => {
                warn!("[Blob] Unreadable metadata for {}: {}", path, e);
                None
            }
        }
    }

    fn file_path(&self, path: &str) -> PathBuf {
        self.config.blobs_dir.join(path)
    }

    fn meta_path(&self, path: &str) -> PathBuf {
        self.config.blobs_dir.join(format!("{}.meta.json", path))
    }
}

fn content_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

fn validate_path(path: &str) -> Result<(), BlobError> {
    let ok = !path.is_empty()
        && !path.contains('\\')
        && Path::new(path)
            .components()
            .all(|c| matches!(c, std::path::Component::Normal(_)));
    if ok {
        Ok(())
    } else {
        Err(BlobError::InvalidPath(path.to_string()))
    }
}
