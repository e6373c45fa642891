//! Conversation and message synchronization core for Missive
//!
//! One-to-one conversations live as mirrored state: each participant's list
//! holds an independent summary of the shared conversation, and a single
//! message log holds the ordered history both sides read. This crate owns the
//! logic that keeps those views consistent: canonical user keys, the flat
//! message codec, summary mirroring, atomic log appends, and the `Messenger`
//! facade the UI talks to.
//!
//! Presentation, media capture, and login flows are out of scope; they reach
//! this layer through [`Messenger`] and the [`AuthProvider`] contract.

mod auth;
mod conversations;
mod error;
mod facade;
mod identity;
mod message;
mod messages;
mod users;

pub use auth::{AuthProvider, StaticAuth};
pub use conversations::{ConversationFeed, ConversationStore, ConversationSummary, LatestMessage};
pub use error::{Result, SyncError};
pub use facade::{ConversationHandle, Messenger};
pub use identity::UserKey;
pub use message::{decode, decode_value, encode, Message, MessageKind, MessageRecord};
pub use messages::{MessageFeed, MessageStore};
pub use users::{DirectoryEntry, UserDirectory, UserProfile};

// Re-exported so embedders only add one crate for the common path
pub use missive_blob::{BlobConfig, BlobStore};
pub use missive_store::{DocStore, StoreConfig};
