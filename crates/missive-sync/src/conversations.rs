//! Per-user conversation summary lists
//!
//! A conversation is shared state between exactly two participants, but each
//! participant owns an independent summary of it in their own list: same
//! conversation id, swapped counterparty fields, and a privately mutated
//! `latest_message` cache. Writes mirror to both lists; each list write is
//! atomic and idempotent, so a failed mirror converges on retry or on the
//! next send's self-healing repair.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use missive_store::{doc_entries, DocStore, StoreError, Watch};

use crate::error::{Result, SyncError};
use crate::identity::UserKey;
use crate::message::Message;
use crate::messages::MessageStore;

/// Denormalized cache of the most recent message, one copy per participant
#[derive(Debug, Clone, PartialEq)]
pub struct LatestMessage {
    pub sent_at: DateTime<Utc>,
    pub text: String,
    pub is_read: bool,
}

/// One participant's view of a conversation
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationSummary {
    pub id: String,
    pub counterparty_key: UserKey,
    pub display_name: String,
    pub latest_message: LatestMessage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LatestMessageRecord {
    date: String,
    message: String,
    is_read: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SummaryRecord {
    id: String,
    other_user_email: String,
    name: String,
    latest_message: LatestMessageRecord,
}

/// Conversation id derived from the first message; stable for the
/// conversation's lifetime
fn conversation_id_for(first_message: &Message) -> String {
    format!("conversation_{}", first_message.id)
}

fn latest_record(message: &Message) -> LatestMessageRecord {
    LatestMessageRecord {
        date: message.sent_at.to_rfc3339(),
        message: message.kind.content(),
        is_read: message.is_read,
    }
}

fn decode_summary(value: &Value) -> Result<ConversationSummary> {
    let record: SummaryRecord = serde_json::from_value(value.clone())
        .map_err(|e| SyncError::Decode(format!("conversation summary: {}", e)))?;
    let sent_at = DateTime::parse_from_rfc3339(&record.latest_message.date)
        .map_err(|e| SyncError::Decode(format!("summary {}: bad date: {}", record.id, e)))?
        .with_timezone(&Utc);

    Ok(ConversationSummary {
        id: record.id,
        counterparty_key: UserKey::canonicalize(&record.other_user_email),
        display_name: record.name,
        latest_message: LatestMessage {
            sent_at,
            text: record.latest_message.message,
            is_read: record.latest_message.is_read,
        },
    })
}

/// Decode a summary list, dropping entries with missing or unparseable
/// fields instead of failing the whole list
fn decode_list(values: &[Value]) -> Vec<ConversationSummary> {
    values
        .iter()
        .filter_map(|value| match decode_summary(value) {
            Ok(summary) => Some(summary),
            Err(e) => {
                warn!("[Conversations] Skipping malformed summary: {}", e);
                None
            }
        })
        .collect()
}

/// Snapshot of a user's conversation list plus its live feed
pub struct ConversationFeed {
    pub summaries: Vec<ConversationSummary>,
    watch: Watch,
}

impl ConversationFeed {
    /// The decoded list as of the next revision; `None` once the store is gone
    pub async fn next(&mut self) -> Option<Vec<ConversationSummary>> {
        let event = self.watch.next().await?;
        Some(match event.value {
            Some(Value::Array(entries)) => decode_list(&entries),
            _ => Vec::new(),
        })
    }
}

/// Owns the per-user summary lists and the mirroring between them
#[derive(Clone)]
pub struct ConversationStore {
    store: Arc<DocStore>,
    messages: MessageStore,
}

impl ConversationStore {
    pub fn new(store: Arc<DocStore>) -> Self {
        Self {
            messages: MessageStore::new(store.clone()),
            store,
        }
    }

    /// Create a conversation from its first message: one summary appended to
    /// each participant's list (owner's view and counterparty's view, fields
    /// swapped), then the message log seeded. The owner must already be
    /// registered.
    pub async fn create(
        &self,
        owner: &UserKey,
        owner_display_name: &str,
        counterparty: &UserKey,
        counterparty_display_name: &str,
        first_message: &Message,
    ) -> Result<String> {
        if self.store.read(owner.profile_path()).await?.is_none() {
            return Err(SyncError::NotFound(format!(
                "user {} is not registered",
                owner
            )));
        }

        let conversation_id = conversation_id_for(first_message);
        let latest = latest_record(first_message);

        let owner_view = SummaryRecord {
            id: conversation_id.clone(),
            other_user_email: counterparty.as_str().to_string(),
            name: counterparty_display_name.to_string(),
            latest_message: latest.clone(),
        };
        let counterparty_view = SummaryRecord {
            id: conversation_id.clone(),
            other_user_email: owner.as_str().to_string(),
            name: owner_display_name.to_string(),
            latest_message: latest,
        };

        self.upsert(owner, owner_view).await?;
        self.mirror(counterparty, counterparty_view).await?;
        self.messages.seed(&conversation_id, first_message).await?;

        info!(
            "[Conversations] Created {} between {} and {}",
            conversation_id, owner, counterparty
        );
        Ok(conversation_id)
    }

    /// Append a message to the log, then refresh `latest_message` on both
    /// participants' summaries. A summary that has gone missing from either
    /// list is synthesized back (self-healing repair). The three writes are
    /// each atomic but independent; the two mirrored copies may transiently
    /// diverge.
    pub async fn append_and_mirror(
        &self,
        conversation_id: &str,
        counterparty: &UserKey,
        counterparty_display_name: &str,
        message: &Message,
    ) -> Result<()> {
        self.messages.append(conversation_id, message).await?;

        let owner = &message.sender_key;
        let latest = latest_record(message);

        let owner_view = SummaryRecord {
            id: conversation_id.to_string(),
            other_user_email: counterparty.as_str().to_string(),
            name: counterparty_display_name.to_string(),
            latest_message: latest.clone(),
        };
        let counterparty_view = SummaryRecord {
            id: conversation_id.to_string(),
            other_user_email: owner.as_str().to_string(),
            name: message.sender_display_name.clone(),
            latest_message: latest,
        };

        self.set_latest(owner, owner_view).await?;

        let path = counterparty.conversations_path();
        if let Err(e) = self.set_latest(counterparty, counterparty_view.clone()).await {
            warn!("[Conversations] Mirror update of {} failed, retrying: {}", path, e);
            self.set_latest(counterparty, counterparty_view).await?;
        }

        Ok(())
    }

    /// A user's conversation list, live
    pub async fn list(&self, owner: &UserKey) -> Result<ConversationFeed> {
        let watch = self.store.watch(&owner.conversations_path()).await?;
        let summaries = match &watch.snapshot {
            Some(Value::Array(entries)) => decode_list(entries),
            Some(_) => {
                warn!(
                    "[Conversations] List for {} is not an array, treating as empty",
                    owner
                );
                Vec::new()
            }
            None => Vec::new(),
        };
        Ok(ConversationFeed { summaries, watch })
    }

    /// Look for an existing conversation between the two users by scanning
    /// the counterparty's list for a summary pointing back at the owner.
    /// First match wins.
    pub async fn find_existing(
        &self,
        owner: &UserKey,
        counterparty: &UserKey,
    ) -> Result<Option<String>> {
        let value = self.store.read(&counterparty.conversations_path()).await?;
        let Some(Value::Array(entries)) = value else {
            return Ok(None);
        };

        for entry in &entries {
            if entry["other_user_email"] == owner.as_str() {
                if let Some(id) = entry["id"].as_str() {
                    return Ok(Some(id.to_string()));
                }
            }
        }
        Ok(None)
    }

    /// Remove a conversation from the owner's own list. The counterparty's
    /// mirrored summary and the shared message log are left untouched.
    pub async fn delete(&self, owner: &UserKey, conversation_id: &str) -> Result<()> {
        let path = owner.conversations_path();
        let doc = path.clone();
        let id = conversation_id.to_string();

        self.store
            .update(&path, move |current| {
                let Some(value) = current else {
                    return Err(StoreError::Fetch {
                        path: doc,
                        reason: "conversation list missing".to_string(),
                    });
                };
                let Value::Array(mut entries) = value else {
                    return Err(StoreError::Fetch {
                        path: doc,
                        reason: "expected a JSON array".to_string(),
                    });
                };
                let before = entries.len();
                entries.retain(|e| e["id"] != id.as_str());
                if entries.len() == before {
                    warn!("[Conversations] {} not in list, nothing to delete", id);
                }
                Ok(Value::Array(entries))
            })
            .await?;

        info!("[Conversations] {} removed {}", owner, conversation_id);
        Ok(())
    }

    /// Flip `latest_message.is_read` on the owner's summary copy only
    pub async fn mark_read(&self, owner: &UserKey, conversation_id: &str) -> Result<()> {
        let path = owner.conversations_path();
        let doc = path.clone();
        let id = conversation_id.to_string();

        self.store
            .update(&path, move |current| {
                let mut entries = match current {
                    Some(Value::Array(entries)) => entries,
                    Some(_) => {
                        return Err(StoreError::Fetch {
                            path: doc,
                            reason: "expected a JSON array".to_string(),
                        })
                    }
                    None => {
                        return Err(StoreError::Fetch {
                            path: doc,
                            reason: "conversation list missing".to_string(),
                        })
                    }
                };
                let Some(entry) = entries.iter_mut().find(|e| e["id"] == id.as_str()) else {
                    return Err(StoreError::NotFound {
                        path: format!("{} in {}", id, doc),
                    });
                };
                entry["latest_message"]["is_read"] = Value::Bool(true);
                Ok(Value::Array(entries))
            })
            .await?;

        Ok(())
    }

    /// Upsert with one bounded retry, for the mirrored (counterparty-side)
    /// write of `create`. The upsert is idempotent, so the retry cannot
    /// duplicate the summary.
    async fn mirror(&self, list_owner: &UserKey, record: SummaryRecord) -> Result<()> {
        if let Err(e) = self.upsert(list_owner, record.clone()).await {
            warn!(
                "[Conversations] Mirror write of {} failed, retrying: {}",
                list_owner.conversations_path(),
                e
            );
            self.upsert(list_owner, record).await?;
        }
        Ok(())
    }

    /// Insert the summary, or overwrite a summary with the same id
    async fn upsert(&self, list_owner: &UserKey, record: SummaryRecord) -> Result<()> {
        let path = list_owner.conversations_path();
        let doc = path.clone();
        let id = record.id.clone();
        let value = serde_json::to_value(&record)
            .map_err(|e| SyncError::Write(format!("summary {}: {}", record.id, e)))?;

        self.store
            .update(&path, move |current| {
                let mut entries = doc_entries(current, &doc)?;
                match entries.iter_mut().find(|e| e["id"] == id.as_str()) {
                    Some(slot) => *slot = value,
                    None => entries.push(value),
                }
                Ok(Value::Array(entries))
            })
            .await?;
        Ok(())
    }

    /// Overwrite `latest_message` on the matching summary, or synthesize the
    /// whole summary if the list has lost it
    async fn set_latest(&self, list_owner: &UserKey, record: SummaryRecord) -> Result<()> {
        let path = list_owner.conversations_path();
        let doc = path.clone();
        let id = record.id.clone();
        let latest = serde_json::to_value(&record.latest_message)
            .map_err(|e| SyncError::Write(format!("summary {}: {}", record.id, e)))?;
        let fallback = serde_json::to_value(&record)
            .map_err(|e| SyncError::Write(format!("summary {}: {}", record.id, e)))?;

        self.store
            .update(&path, move |current| {
                let mut entries = doc_entries(current, &doc)?;
                match entries.iter_mut().find(|e| e["id"] == id.as_str()) {
                    Some(entry) => entry["latest_message"] = latest,
                    None => {
                        warn!("[Conversations] {} missing from {}, repairing", id, doc);
                        entries.push(fallback);
                    }
                }
                Ok(Value::Array(entries))
            })
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageKind;
    use missive_store::StoreConfig;
    use serde_json::json;
    use tempfile::TempDir;

    fn ada() -> UserKey {
        UserKey::canonicalize("a@x.com")
    }

    fn bea() -> UserKey {
        UserKey::canonicalize("b@x.com")
    }

    async fn setup(temp: &TempDir) -> (Arc<DocStore>, ConversationStore) {
        let store = Arc::new(
            DocStore::new(StoreConfig::with_base_dir(temp.path()))
                .await
                .unwrap(),
        );
        // Only the conversation owner needs a profile record
        store
            .write(
                ada().profile_path(),
                json!({"first_name": "Ada", "last_name": "Lovelace"}),
            )
            .await
            .unwrap();
        (store.clone(), ConversationStore::new(store))
    }

    fn text_from_ada(body: &str) -> Message {
        Message::new(&ada(), &bea(), "Ada Lovelace", MessageKind::Text(body.into()))
    }

    fn text_from_bea(body: &str) -> Message {
        Message::new(&bea(), &ada(), "Bea Wright", MessageKind::Text(body.into()))
    }

    async fn created(store: &ConversationStore) -> String {
        store
            .create(&ada(), "Ada Lovelace", &bea(), "Bea Wright", &text_from_ada("hi"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_mirrors_both_lists() {
        let temp = TempDir::new().unwrap();
        let (_, store) = setup(&temp).await;

        let id = created(&store).await;
        assert!(id.starts_with("conversation_"));

        let ada_list = store.list(&ada()).await.unwrap().summaries;
        assert_eq!(ada_list.len(), 1);
        assert_eq!(ada_list[0].id, id);
        assert_eq!(ada_list[0].counterparty_key, bea());
        assert_eq!(ada_list[0].display_name, "Bea Wright");
        assert_eq!(ada_list[0].latest_message.text, "hi");

        let bea_list = store.list(&bea()).await.unwrap().summaries;
        assert_eq!(bea_list.len(), 1);
        assert_eq!(bea_list[0].id, id);
        assert_eq!(bea_list[0].counterparty_key, ada());
        assert_eq!(bea_list[0].display_name, "Ada Lovelace");
        assert_eq!(bea_list[0].latest_message.text, "hi");
    }

    #[tokio::test]
    async fn test_create_requires_registered_owner() {
        let temp = TempDir::new().unwrap();
        let (_, store) = setup(&temp).await;

        let msg = text_from_bea("hello");
        let result = store
            .create(&bea(), "Bea Wright", &ada(), "Ada Lovelace", &msg)
            .await;
        assert!(matches!(result, Err(SyncError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_append_and_mirror_updates_both_latest() {
        let temp = TempDir::new().unwrap();
        let (_, store) = setup(&temp).await;
        let id = created(&store).await;

        let reply = text_from_ada("how are you?");
        store
            .append_and_mirror(&id, &bea(), "Bea Wright", &reply)
            .await
            .unwrap();

        let ada_latest = &store.list(&ada()).await.unwrap().summaries[0].latest_message;
        let bea_latest = &store.list(&bea()).await.unwrap().summaries[0].latest_message;
        assert_eq!(ada_latest.text, "how are you?");
        assert_eq!(bea_latest.text, "how are you?");
        assert_eq!(ada_latest.sent_at, bea_latest.sent_at);
    }

    #[tokio::test]
    async fn test_append_and_mirror_repairs_missing_summary() {
        let temp = TempDir::new().unwrap();
        let (doc_store, store) = setup(&temp).await;
        let id = created(&store).await;

        // Bea's list is wiped out from under the conversation
        doc_store
            .write(&bea().conversations_path(), json!([]))
            .await
            .unwrap();

        let reply = text_from_ada("still there?");
        store
            .append_and_mirror(&id, &bea(), "Bea Wright", &reply)
            .await
            .unwrap();

        let bea_list = store.list(&bea()).await.unwrap().summaries;
        assert_eq!(bea_list.len(), 1);
        assert_eq!(bea_list[0].id, id);
        assert_eq!(bea_list[0].counterparty_key, ada());
        assert_eq!(bea_list[0].latest_message.text, "still there?");
    }

    #[tokio::test]
    async fn test_find_existing() {
        let temp = TempDir::new().unwrap();
        let (_, store) = setup(&temp).await;

        assert!(store.find_existing(&ada(), &bea()).await.unwrap().is_none());

        let id = created(&store).await;
        assert_eq!(store.find_existing(&ada(), &bea()).await.unwrap(), Some(id));
    }

    #[tokio::test]
    async fn test_delete_removes_own_entry_only() {
        let temp = TempDir::new().unwrap();
        let (_, store) = setup(&temp).await;
        let id = created(&store).await;

        store.delete(&ada(), &id).await.unwrap();

        assert!(store.list(&ada()).await.unwrap().summaries.is_empty());
        assert_eq!(store.list(&bea()).await.unwrap().summaries.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_without_list_is_fetch() {
        let temp = TempDir::new().unwrap();
        let (_, store) = setup(&temp).await;
        let result = store.delete(&ada(), "conversation_none").await;
        assert!(matches!(result, Err(SyncError::Fetch(_))));
    }

    #[tokio::test]
    async fn test_mark_read_flips_own_copy_only() {
        let temp = TempDir::new().unwrap();
        let (_, store) = setup(&temp).await;
        let id = created(&store).await;

        store.mark_read(&ada(), &id).await.unwrap();

        assert!(store.list(&ada()).await.unwrap().summaries[0].latest_message.is_read);
        assert!(!store.list(&bea()).await.unwrap().summaries[0].latest_message.is_read);
    }

    #[tokio::test]
    async fn test_list_skips_malformed_entries() {
        let temp = TempDir::new().unwrap();
        let (doc_store, store) = setup(&temp).await;
        let id = created(&store).await;

        // A partial record sneaks into the list
        doc_store
            .update(&ada().conversations_path(), |current| {
                let mut entries = match current {
                    Some(Value::Array(entries)) => entries,
                    _ => Vec::new(),
                };
                entries.push(json!({"id": "conversation_broken"}));
                Ok(Value::Array(entries))
            })
            .await
            .unwrap();

        let summaries = store.list(&ada()).await.unwrap().summaries;
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].id, id);
    }

    #[tokio::test]
    async fn test_feed_sees_new_conversations() {
        let temp = TempDir::new().unwrap();
        let (_, store) = setup(&temp).await;

        let mut feed = store.list(&bea()).await.unwrap();
        assert!(feed.summaries.is_empty());

        created(&store).await;

        let summaries = feed.next().await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].counterparty_key, ada());
    }
}
