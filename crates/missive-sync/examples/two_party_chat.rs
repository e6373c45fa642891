//! Two-party chat walkthrough against a throwaway store.
//!
//! Run with: `cargo run --example two_party_chat`

use std::sync::Arc;

use missive_sync::{
    BlobConfig, BlobStore, ConversationHandle, DocStore, Messenger, StaticAuth, StoreConfig,
    UserProfile,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let temp = tempfile::TempDir::new()?;
    let store = Arc::new(DocStore::new(StoreConfig::with_base_dir(temp.path())).await?);
    let blobs = Arc::new(BlobStore::new(BlobConfig::with_base_dir(temp.path())).await?);

    let ada = Messenger::new(
        store.clone(),
        blobs.clone(),
        Arc::new(StaticAuth::new("a@x.com", "Ada Lovelace")),
    );
    let bea = Messenger::new(
        store.clone(),
        blobs.clone(),
        Arc::new(StaticAuth::new("b@x.com", "Bea Wright")),
    );

    ada.register_user(
        "a@x.com",
        UserProfile {
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
        },
    )
    .await?;
    bea.register_user(
        "b@x.com",
        UserProfile {
            first_name: "Bea".into(),
            last_name: "Wright".into(),
        },
    )
    .await?;

    // Ada opens a conversation with Bea
    let id = match ada.start_or_resume("b@x.com").await? {
        ConversationHandle::Existing(id) => id,
        ConversationHandle::New => {
            ada.send_first_message("b@x.com", "Bea Wright", "hi Bea!")
                .await?
        }
    };

    bea.send_text(&id, "a@x.com", "Ada Lovelace", "hi Ada, good to hear from you")
        .await?;
    ada.send_location(&id, "b@x.com", "Bea Wright", 127.0, 37.5)
        .await?;

    for summary in bea.conversations().await?.summaries {
        println!(
            "[{}] {}: {}",
            summary.id, summary.display_name, summary.latest_message.text
        );
    }

    println!("--- history ---");
    for message in ada.history(&id).await?.messages {
        println!(
            "{} {}: {}",
            message.sent_at.format("%H:%M:%S"),
            message.sender_display_name,
            message.kind.content()
        );
    }

    Ok(())
}
