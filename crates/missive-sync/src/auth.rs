//! Auth Provider contract
//!
//! Identity resolution lives outside this layer (login screens, social
//! providers, session storage). The sync core only ever asks two questions.

use async_trait::async_trait;

/// Resolves the currently signed-in user. `None` means signed out.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn current_user_address(&self) -> Option<String>;
    async fn current_user_display_name(&self) -> Option<String>;
}

/// Fixed identity, for demos and tests
pub struct StaticAuth {
    address: String,
    display_name: String,
}

impl StaticAuth {
    pub fn new(address: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            display_name: display_name.into(),
        }
    }
}

#[async_trait]
impl AuthProvider for StaticAuth {
    async fn current_user_address(&self) -> Option<String> {
        Some(self.address.clone())
    }

    async fn current_user_display_name(&self) -> Option<String> {
        Some(self.display_name.clone())
    }
}
