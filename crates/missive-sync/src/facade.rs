//! The public entry point for UI intents
//!
//! `Messenger` composes the identity codec, the codecs-backed stores, and the
//! external collaborators (Auth Provider, Blob Store). UI events like a send
//! button, a row tap, or a delete swipe map one-to-one onto methods here.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{error, info};
use url::Url;

use missive_blob::BlobStore;
use missive_store::DocStore;

use crate::auth::AuthProvider;
use crate::conversations::{ConversationFeed, ConversationStore};
use crate::error::{Result, SyncError};
use crate::identity::UserKey;
use crate::message::{Message, MessageKind};
use crate::messages::{MessageFeed, MessageStore};
use crate::users::{DirectoryEntry, UserDirectory, UserProfile};

/// Outcome of resolving a counterparty before the first send
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationHandle {
    /// A conversation already exists; send into it
    Existing(String),
    /// Nothing yet; the next send should go through `send_first_message`
    New,
}

/// The sync facade: one instance per signed-in client
pub struct Messenger {
    blobs: Arc<BlobStore>,
    auth: Arc<dyn AuthProvider>,
    users: UserDirectory,
    conversations: ConversationStore,
    messages: MessageStore,
}

impl Messenger {
    /// Wire the facade to its collaborators. The store handle is created
    /// once at startup and shared; nothing here owns a global.
    pub fn new(store: Arc<DocStore>, blobs: Arc<BlobStore>, auth: Arc<dyn AuthProvider>) -> Self {
        Self {
            blobs,
            auth,
            users: UserDirectory::new(store.clone()),
            conversations: ConversationStore::new(store.clone()),
            messages: MessageStore::new(store),
        }
    }

    /// Canonical key and display name of the signed-in user
    async fn current_identity(&self) -> Result<(UserKey, String)> {
        let address = self
            .auth
            .current_user_address()
            .await
            .ok_or_else(|| SyncError::NotFound("no signed-in user".to_string()))?;
        let display_name = self
            .auth
            .current_user_display_name()
            .await
            .ok_or_else(|| SyncError::NotFound("signed-in user has no display name".to_string()))?;
        Ok((UserKey::canonicalize(&address), display_name))
    }

    // --- Account & directory ---

    /// Register the profile record and directory entry for a new user
    pub async fn register_user(&self, address: &str, profile: UserProfile) -> Result<UserKey> {
        self.users.register(address, profile).await
    }

    pub async fn user_exists(&self, address: &str) -> Result<bool> {
        self.users.exists(address).await
    }

    /// Directory entries whose display name starts with the query,
    /// case-insensitively
    pub async fn search_users(&self, query: &str) -> Result<Vec<DirectoryEntry>> {
        let needle = query.to_lowercase();
        let users = self.users.all_users().await?;
        Ok(users
            .into_iter()
            .filter(|entry| entry.name.to_lowercase().starts_with(&needle))
            .collect())
    }

    /// Store the signed-in user's profile picture, returning its URL
    pub async fn upload_profile_picture(&self, data: Bytes) -> Result<Url> {
        let (self_key, _) = self.current_identity().await?;
        let path = missive_blob::profile_picture_path(self_key.as_str());
        Ok(self.blobs.upload(data, &path).await?)
    }

    // --- Conversations ---

    /// Resolve whether a conversation with this counterparty already exists
    pub async fn start_or_resume(&self, counterparty_address: &str) -> Result<ConversationHandle> {
        let (self_key, _) = self.current_identity().await?;
        let counterparty = UserKey::canonicalize(counterparty_address);
        match self
            .conversations
            .find_existing(&self_key, &counterparty)
            .await?
        {
            Some(id) => Ok(ConversationHandle::Existing(id)),
            None => Ok(ConversationHandle::New),
        }
    }

    /// First send to a counterparty: creates the conversation, both mirrored
    /// summaries, and the seeded message log. Returns the conversation id.
    pub async fn send_first_message(
        &self,
        counterparty_address: &str,
        counterparty_display_name: &str,
        text: &str,
    ) -> Result<String> {
        let (self_key, self_name) = self.current_identity().await?;
        let counterparty = UserKey::canonicalize(counterparty_address);
        let message = Message::new(
            &self_key,
            &counterparty,
            &self_name,
            MessageKind::Text(text.to_string()),
        );

        let result = self
            .conversations
            .create(
                &self_key,
                &self_name,
                &counterparty,
                counterparty_display_name,
                &message,
            )
            .await;

        match &result {
            Ok(id) => info!("[Messenger] Started {} with {}", id, counterparty),
            Err(e) => error!("[Messenger] Failed to start conversation: {}", e),
        }
        result
    }

    /// Send a text message into an existing conversation
    pub async fn send_text(
        &self,
        conversation_id: &str,
        counterparty_address: &str,
        counterparty_display_name: &str,
        text: &str,
    ) -> Result<()> {
        self.dispatch(
            conversation_id,
            counterparty_address,
            counterparty_display_name,
            MessageKind::Text(text.to_string()),
        )
        .await
    }

    /// Upload a photo to the blob store, then send its URL
    pub async fn send_photo(
        &self,
        conversation_id: &str,
        counterparty_address: &str,
        counterparty_display_name: &str,
        data: Bytes,
        file_name: &str,
    ) -> Result<()> {
        let url = self
            .blobs
            .upload(data, &missive_blob::message_photo_path(file_name))
            .await?;
        self.dispatch(
            conversation_id,
            counterparty_address,
            counterparty_display_name,
            MessageKind::Photo(url),
        )
        .await
    }

    /// Upload a video to the blob store, then send its URL
    pub async fn send_video(
        &self,
        conversation_id: &str,
        counterparty_address: &str,
        counterparty_display_name: &str,
        data: Bytes,
        file_name: &str,
    ) -> Result<()> {
        let url = self
            .blobs
            .upload(data, &missive_blob::message_video_path(file_name))
            .await?;
        self.dispatch(
            conversation_id,
            counterparty_address,
            counterparty_display_name,
            MessageKind::Video(url),
        )
        .await
    }

    /// Send a coordinate pair
    pub async fn send_location(
        &self,
        conversation_id: &str,
        counterparty_address: &str,
        counterparty_display_name: &str,
        longitude: f64,
        latitude: f64,
    ) -> Result<()> {
        self.dispatch(
            conversation_id,
            counterparty_address,
            counterparty_display_name,
            MessageKind::Location {
                longitude,
                latitude,
            },
        )
        .await
    }

    async fn dispatch(
        &self,
        conversation_id: &str,
        counterparty_address: &str,
        counterparty_display_name: &str,
        kind: MessageKind,
    ) -> Result<()> {
        let (self_key, self_name) = self.current_identity().await?;
        let counterparty = UserKey::canonicalize(counterparty_address);
        let message = Message::new(&self_key, &counterparty, &self_name, kind);

        let result = self
            .conversations
            .append_and_mirror(
                conversation_id,
                &counterparty,
                counterparty_display_name,
                &message,
            )
            .await;

        if let Err(e) = &result {
            // Surface promptly; the UI decides how to react. No automatic retry.
            error!("[Messenger] Send into {} failed: {}", conversation_id, e);
        }
        result
    }

    /// The signed-in user's conversation list, live
    pub async fn conversations(&self) -> Result<ConversationFeed> {
        let (self_key, _) = self.current_identity().await?;
        self.conversations.list(&self_key).await
    }

    /// Full history of one conversation, live
    pub async fn history(&self, conversation_id: &str) -> Result<MessageFeed> {
        self.messages.load_all(conversation_id).await
    }

    /// Remove the conversation from the signed-in user's own list. The
    /// counterparty keeps their copy and the log stays.
    pub async fn delete_conversation(&self, conversation_id: &str) -> Result<()> {
        let (self_key, _) = self.current_identity().await?;
        self.conversations.delete(&self_key, conversation_id).await
    }

    /// Mark the conversation read on the signed-in user's summary
    pub async fn mark_read(&self, conversation_id: &str) -> Result<()> {
        let (self_key, _) = self.current_identity().await?;
        self.conversations
            .mark_read(&self_key, conversation_id)
            .await
    }
}
