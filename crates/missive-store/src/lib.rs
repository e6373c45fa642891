//! JSON document store for Missive
//!
//! Documents are addressed by slash-separated paths (`a-x-com/conversations`)
//! and persisted one-per-file with atomic writes. Every mutation goes through
//! a per-document write lock, so concurrent writers serialize instead of
//! overwriting each other, and every revision is pushed to subscribers over a
//! broadcast channel.

mod config;
mod error;
mod store;

pub use config::StoreConfig;
pub use error::StoreError;
pub use store::{doc_entries, DocEvent, DocStore, Watch};
