//! User profiles and the global search directory

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use missive_store::{doc_entries, DocStore};

use crate::error::{Result, SyncError};
use crate::identity::UserKey;

/// Document path of the global user directory
const USERS_PATH: &str = "users";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub first_name: String,
    pub last_name: String,
}

impl UserProfile {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// One searchable directory entry; `email` holds the canonical key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub name: String,
    pub email: String,
}

/// Profile records plus the append-only search directory
#[derive(Clone)]
pub struct UserDirectory {
    store: Arc<DocStore>,
}

impl UserDirectory {
    pub fn new(store: Arc<DocStore>) -> Self {
        Self { store }
    }

    /// Write the profile record and add the user to the search directory.
    /// The directory append is keyed by email, so re-registering is a no-op
    /// rather than a duplicate entry.
    pub async fn register(&self, raw_address: &str, profile: UserProfile) -> Result<UserKey> {
        let key = UserKey::canonicalize(raw_address);

        let profile_doc = serde_json::to_value(&profile)
            .map_err(|e| SyncError::Write(format!("profile for {}: {}", key, e)))?;
        self.store.write(key.profile_path(), profile_doc).await?;

        let entry = DirectoryEntry {
            name: profile.full_name(),
            email: key.as_str().to_string(),
        };
        self.store
            .update(USERS_PATH, move |current| {
                let mut entries = doc_entries(current, USERS_PATH)?;
                let exists = entries.iter().any(|e| e["email"] == entry.email.as_str());
                if !exists {
                    entries.push(serde_json::json!({
                        "name": entry.name,
                        "email": entry.email,
                    }));
                }
                Ok(Value::Array(entries))
            })
            .await?;

        info!("[Users] Registered {}", key);
        Ok(key)
    }

    /// Whether a profile record exists for this address
    pub async fn exists(&self, raw_address: &str) -> Result<bool> {
        let key = UserKey::canonicalize(raw_address);
        Ok(self.store.read(key.profile_path()).await?.is_some())
    }

    /// Load a profile; registration is a precondition for conversations
    pub async fn profile(&self, key: &UserKey) -> Result<UserProfile> {
        let value = self
            .store
            .read(key.profile_path())
            .await?
            .ok_or_else(|| SyncError::NotFound(format!("user {} is not registered", key)))?;
        serde_json::from_value(value)
            .map_err(|e| SyncError::Decode(format!("profile for {}: {}", key, e)))
    }

    /// The whole search directory. Absent directory is a fetch failure;
    /// individual malformed entries are skipped.
    pub async fn all_users(&self) -> Result<Vec<DirectoryEntry>> {
        let value = self
            .store
            .read(USERS_PATH)
            .await?
            .ok_or_else(|| SyncError::Fetch("user directory is empty".to_string()))?;

        let Value::Array(entries) = value else {
            return Err(SyncError::Fetch("user directory is malformed".to_string()));
        };

        Ok(entries
            .iter()
            .filter_map(|entry| match serde_json::from_value(entry.clone()) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("[Users] Skipping malformed directory entry: {}", e);
                    None
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use missive_store::StoreConfig;
    use tempfile::TempDir;

    async fn directory(temp: &TempDir) -> UserDirectory {
        let store = DocStore::new(StoreConfig::with_base_dir(temp.path()))
            .await
            .unwrap();
        UserDirectory::new(Arc::new(store))
    }

    fn ada() -> UserProfile {
        UserProfile {
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
        }
    }

    #[tokio::test]
    async fn test_register_then_lookup() {
        let temp = TempDir::new().unwrap();
        let directory = directory(&temp).await;

        let key = directory.register("a@x.com", ada()).await.unwrap();
        assert_eq!(key.as_str(), "a-x-com");
        assert!(directory.exists("a@x.com").await.unwrap());
        assert!(!directory.exists("ghost@x.com").await.unwrap());

        let profile = directory.profile(&key).await.unwrap();
        assert_eq!(profile.full_name(), "Ada Lovelace");
    }

    #[tokio::test]
    async fn test_directory_append_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let directory = directory(&temp).await;

        directory.register("a@x.com", ada()).await.unwrap();
        directory.register("a@x.com", ada()).await.unwrap();

        let users = directory.all_users().await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].email, "a-x-com");
    }

    #[tokio::test]
    async fn test_all_users_without_directory_is_fetch() {
        let temp = TempDir::new().unwrap();
        let directory = directory(&temp).await;
        assert!(matches!(
            directory.all_users().await,
            Err(SyncError::Fetch(_))
        ));
    }

    #[tokio::test]
    async fn test_unregistered_profile_is_not_found() {
        let temp = TempDir::new().unwrap();
        let directory = directory(&temp).await;
        let key = UserKey::canonicalize("ghost@x.com");
        assert!(matches!(
            directory.profile(&key).await,
            Err(SyncError::NotFound(_))
        ));
    }
}
