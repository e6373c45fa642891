//! The ordered message log for one conversation
//!
//! The log is a single document (`{conversation_id}/messages`) holding a JSON
//! array of flat records. Storage order is chronology: appends go through the
//! store's atomic `update`, so two participants sending at once both land and
//! neither overwrites the other.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use missive_store::{doc_entries, DocStore, Watch};

use crate::error::{Result, SyncError};
use crate::message::{self, Message};

/// Snapshot of a conversation's history plus its live feed
pub struct MessageFeed {
    pub messages: Vec<Message>,
    watch: Watch,
}

impl MessageFeed {
    /// The decoded log as of the next revision; `None` once the store is gone
    pub async fn next(&mut self) -> Option<Vec<Message>> {
        let event = self.watch.next().await?;
        Some(match event.value {
            Some(Value::Array(entries)) => message::decode_log(&entries),
            _ => Vec::new(),
        })
    }
}

/// Append-only access to per-conversation message logs
#[derive(Clone)]
pub struct MessageStore {
    store: Arc<DocStore>,
}

impl MessageStore {
    pub fn new(store: Arc<DocStore>) -> Self {
        Self { store }
    }

    /// Create the log for a brand-new conversation with its first message
    pub async fn seed(&self, conversation_id: &str, first_message: &Message) -> Result<()> {
        self.append(conversation_id, first_message).await?;
        info!(
            "[Messages] Seeded log for {} with {}",
            conversation_id, first_message.id
        );
        Ok(())
    }

    /// Append one message. Idempotent: a record whose id is already in the
    /// log is left alone, so a retried send cannot duplicate it.
    pub async fn append(&self, conversation_id: &str, message: &Message) -> Result<()> {
        let path = log_path(conversation_id);
        let record = serde_json::to_value(message::encode(message))
            .map_err(|e| SyncError::Write(format!("message {}: {}", message.id, e)))?;
        let id = message.id.clone();
        let doc = path.clone();

        self.store
            .update(&path, move |current| {
                let mut entries = doc_entries(current, &doc)?;
                if entries.iter().any(|e| e["id"] == id.as_str()) {
                    debug!("[Messages] {} already in log, skipping append", id);
                } else {
                    entries.push(record);
                }
                Ok(Value::Array(entries))
            })
            .await?;

        Ok(())
    }

    /// Full decoded history plus a push-based subscription for new arrivals.
    /// A conversation with no log at all is a fetch failure; individual
    /// undecodable records are skipped.
    pub async fn load_all(&self, conversation_id: &str) -> Result<MessageFeed> {
        let path = log_path(conversation_id);
        let watch = self.store.watch(&path).await?;

        let messages = match &watch.snapshot {
            None => {
                return Err(SyncError::Fetch(format!(
                    "no message log for {}",
                    conversation_id
                )))
            }
            Some(Value::Array(entries)) => message::decode_log(entries),
            Some(_) => {
                return Err(SyncError::Fetch(format!(
                    "message log for {} is malformed",
                    conversation_id
                )))
            }
        };

        Ok(MessageFeed { messages, watch })
    }
}

fn log_path(conversation_id: &str) -> String {
    format!("{}/messages", conversation_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::UserKey;
    use crate::message::MessageKind;
    use missive_store::StoreConfig;
    use tempfile::TempDir;

    async fn store(temp: &TempDir) -> MessageStore {
        let store = DocStore::new(StoreConfig::with_base_dir(temp.path()))
            .await
            .unwrap();
        MessageStore::new(Arc::new(store))
    }

    fn text(body: &str) -> Message {
        Message::new(
            &UserKey::canonicalize("a@x.com"),
            &UserKey::canonicalize("b@x.com"),
            "Ada",
            MessageKind::Text(body.into()),
        )
    }

    #[tokio::test]
    async fn test_append_then_load_all_on_empty_log() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp).await;
        let msg = text("hi");

        store.append("conversation_1", &msg).await.unwrap();

        let feed = store.load_all("conversation_1").await.unwrap();
        assert_eq!(feed.messages, vec![msg]);
    }

    #[tokio::test]
    async fn test_load_all_missing_log_is_fetch() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp).await;
        assert!(matches!(
            store.load_all("conversation_void").await,
            Err(SyncError::Fetch(_))
        ));
    }

    #[tokio::test]
    async fn test_append_preserves_storage_order() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp).await;

        for body in ["one", "two", "three"] {
            store.append("conversation_1", &text(body)).await.unwrap();
        }

        let feed = store.load_all("conversation_1").await.unwrap();
        let bodies: Vec<_> = feed
            .messages
            .iter()
            .map(|m| m.kind.content())
            .collect();
        assert_eq!(bodies, vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn test_append_is_idempotent_by_id() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp).await;
        let msg = text("only once");

        store.append("conversation_1", &msg).await.unwrap();
        store.append("conversation_1", &msg).await.unwrap();

        let feed = store.load_all("conversation_1").await.unwrap();
        assert_eq!(feed.messages.len(), 1);
    }

    #[tokio::test]
    async fn test_feed_delivers_new_messages() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp).await;

        store.append("conversation_1", &text("first")).await.unwrap();
        let mut feed = store.load_all("conversation_1").await.unwrap();
        assert_eq!(feed.messages.len(), 1);

        store.append("conversation_1", &text("second")).await.unwrap();
        let latest = feed.next().await.unwrap();
        assert_eq!(latest.len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_appends_both_survive() {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(store(&temp).await);

        let a = {
            let store = store.clone();
            let msg = text("from a");
            tokio::spawn(async move { store.append("conversation_race", &msg).await })
        };
        let b = {
            let store = store.clone();
            let msg = text("from b");
            tokio::spawn(async move { store.append("conversation_race", &msg).await })
        };
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        let feed = store.load_all("conversation_race").await.unwrap();
        assert_eq!(feed.messages.len(), 2);
    }
}
