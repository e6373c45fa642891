//! Key-addressed JSON document storage with live subscriptions
//!
//! Every document gets its own lock and its own broadcast channel. Mutations
//! (`write`, `update`, `remove`) run under the document's write lock and are
//! persisted with a temp-file-then-rename, so a document on disk is never
//! half-written and two writers can never interleave a read-modify-write.

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;
use tokio::fs;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

use crate::config::StoreConfig;
use crate::error::StoreError;

/// One revision of a document, pushed to subscribers
#[derive(Clone, Debug)]
pub struct DocEvent {
    pub path: String,
    pub revision: u64,
    /// `None` when the document was removed
    pub value: Option<Value>,
}

/// Snapshot plus live feed for one document
pub struct Watch {
    pub snapshot: Option<Value>,
    pub revision: u64,
    rx: broadcast::Receiver<DocEvent>,
}

impl Watch {
    /// Next revision of the document. Returns `None` once the store is gone.
    /// A lagged subscription skips to the newest buffered revision.
    pub async fn next(&mut self) -> Option<DocEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("[Store] Watch lagged, skipped {} revisions", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

struct DocSlot {
    value: Option<Value>,
    revision: u64,
}

/// The one configured store handle, constructed at startup and injected into
/// every component that needs it
pub struct DocStore {
    config: StoreConfig,
    docs: RwLock<HashMap<String, Arc<RwLock<DocSlot>>>>,
    channels: RwLock<HashMap<String, broadcast::Sender<DocEvent>>>,
}

impl DocStore {
    /// Create a new document store
    pub async fn new(config: StoreConfig) -> Result<Self, StoreError> {
        config
            .ensure_dirs()
            .await
            .map_err(|e| StoreError::write("<documents_dir>", e))?;

        let store = Self {
            config,
            docs: RwLock::new(HashMap::new()),
            channels: RwLock::new(HashMap::new()),
        };

        info!(
            "[Store] Document store initialized at {:?}",
            store.config.documents_dir
        );

        Ok(store)
    }

    /// Read the current value of a document, if any
    pub async fn read(&self, path: &str) -> Result<Option<Value>, StoreError> {
        validate_path(path)?;
        self.timed(path, self.read_inner(path)).await
    }

    /// Overwrite a document wholesale
    pub async fn write(&self, path: &str, value: Value) -> Result<(), StoreError> {
        validate_path(path)?;
        self.timed(path, self.write_inner(path, value)).await
    }

    /// Atomic read-modify-write. The transform runs under the document's
    /// write lock: concurrent updates to the same document serialize, so an
    /// append can never be lost to an overlapping writer.
    pub async fn update<F>(&self, path: &str, transform: F) -> Result<Value, StoreError>
    where
        F: FnOnce(Option<Value>) -> Result<Value, StoreError> + Send,
    {
        validate_path(path)?;
        self.timed(path, self.update_inner(path, transform)).await
    }

    /// Remove a document. Returns whether it existed.
    pub async fn remove(&self, path: &str) -> Result<bool, StoreError> {
        validate_path(path)?;
        self.timed(path, self.remove_inner(path)).await
    }

    /// Current snapshot plus a push-based subscription delivering every
    /// subsequent revision of the document
    pub async fn watch(&self, path: &str) -> Result<Watch, StoreError> {
        validate_path(path)?;
        let slot = self.slot(path).await?;
        let rx = self.sender(path).await.subscribe();
        let guard = slot.read().await;
        Ok(Watch {
            snapshot: guard.value.clone(),
            revision: guard.revision,
            rx,
        })
    }

    async fn read_inner(&self, path: &str) -> Result<Option<Value>, StoreError> {
        let slot = self.slot(path).await?;
        let guard = slot.read().await;
        Ok(guard.value.clone())
    }

    async fn write_inner(&self, path: &str, value: Value) -> Result<(), StoreError> {
        let slot = self.slot(path).await?;
        let mut guard = slot.write().await;
        self.persist(path, &value).await?;
        guard.value = Some(value.clone());
        guard.revision += 1;
        self.publish(path, guard.revision, Some(value)).await;
        Ok(())
    }

    async fn update_inner<F>(&self, path: &str, transform: F) -> Result<Value, StoreError>
    where
        F: FnOnce(Option<Value>) -> Result<Value, StoreError> + Send,
    {
        let slot = self.slot(path).await?;
        let mut guard = slot.write().await;
        let next = transform(guard.value.clone())?;
        self.persist(path, &next).await?;
        guard.value = Some(next.clone());
        guard.revision += 1;
        self.publish(path, guard.revision, Some(next.clone())).await;
        Ok(next)
    }

    async fn remove_inner(&self, path: &str) -> Result<bool, StoreError> {
        let slot = self.slot(path).await?;
        let mut guard = slot.write().await;
        if guard.value.is_none() {
            return Ok(false);
        }

        let file = self.file_path(path);
        match fs::remove_file(&file).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(StoreError::write(path, e)),
        }

        guard.value = None;
        guard.revision += 1;
        self.publish(path, guard.revision, None).await;
        Ok(true)
    }

    /// Get or lazily load the in-memory slot for a document
    async fn slot(&self, path: &str) -> Result<Arc<RwLock<DocSlot>>, StoreError> {
        {
            let docs = self.docs.read().await;
            if let Some(slot) = docs.get(path) {
                return Ok(slot.clone());
            }
        }

        // Load from disk outside the map lock
        let value = self.load_from_disk(path).await?;

        let mut docs = self.docs.write().await;
        // Another task may have loaded it while we read the file
        if let Some(slot) = docs.get(path) {
            return Ok(slot.clone());
        }
        let slot = Arc::new(RwLock::new(DocSlot { value, revision: 0 }));
        docs.insert(path.to_string(), slot.clone());
        Ok(slot)
    }

    async fn load_from_disk(&self, path: &str) -> Result<Option<Value>, StoreError> {
        let file = self.file_path(path);
        let content = match fs::read_to_string(&file).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::fetch(path, e)),
        };

        let value = serde_json::from_str(&content).map_err(|e| StoreError::fetch(path, e))?;
        Ok(Some(value))
    }

    /// Persist a document atomically (temp file + rename)
    async fn persist(&self, path: &str, value: &Value) -> Result<(), StoreError> {
        let file = self.file_path(path);
        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::write(path, e))?;
        }

        let json =
            serde_json::to_string_pretty(value).map_err(|e| StoreError::write(path, e))?;

        let temp = file.with_extension("tmp");
        fs::write(&temp, json)
            .await
            .map_err(|e| StoreError::write(path, e))?;
        fs::rename(&temp, &file)
            .await
            .map_err(|e| StoreError::write(path, e))?;

        Ok(())
    }

    async fn publish(&self, path: &str, revision: u64, value: Option<Value>) {
        let sender = self.sender(path).await;
        let event = DocEvent {
            path: path.to_string(),
            revision,
            value,
        };
        match sender.send(event) {
            Ok(subscribers) => {
                debug!("[Store] {} rev {} -> {} subscribers", path, revision, subscribers);
            }
            Err(_) => {
                debug!("[Store] {} rev {} -> no subscribers", path, revision);
            }
        }
    }

    async fn sender(&self, path: &str) -> broadcast::Sender<DocEvent> {
        let mut channels = self.channels.write().await;
        channels
            .entry(path.to_string())
            .or_insert_with(|| broadcast::channel(self.config.watch_capacity).0)
            .clone()
    }

    fn file_path(&self, path: &str) -> PathBuf {
        self.config.documents_dir.join(format!("{}.json", path))
    }

    async fn timed<T>(
        &self,
        path: &str,
        op: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        tokio::time::timeout(self.config.op_timeout, op)
            .await
            .map_err(|_| StoreError::Timeout {
                path: path.to_string(),
            })?
    }
}

/// Interpret a document as a JSON array of records, treating anything else
/// as corruption. Absent documents read as empty; lists are created on
/// first append.
pub fn doc_entries(
    current: Option<Value>,
    path: &str,
) -> Result<Vec<Value>, StoreError> {
    match current {
        None => Ok(Vec::new()),
        Some(Value::Array(entries)) => Ok(entries),
        Some(_) => Err(StoreError::Fetch {
            path: path.to_string(),
            reason: "expected a JSON array".to_string(),
        }),
    }
}

fn validate_path(path: &str) -> Result<(), StoreError> {
    let ok = !path.is_empty()
        && !path.contains('\\')
        && path
            .split('/')
            .all(|segment| !segment.is_empty() && segment != "." && segment != "..");
    if ok {
        Ok(())
    } else {
        Err(StoreError::InvalidPath(path.to_string()))
    }
}
