//! Canonical, storage-safe user keys

use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical key for a user, derived from their raw address.
///
/// `.` and `@` are not allowed as storage path segments, so both map to `-`.
/// The derivation is deterministic and total; two addresses that collide
/// after replacement share a key, which is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserKey(String);

impl UserKey {
    pub fn canonicalize(raw_address: &str) -> Self {
        Self(raw_address.replace(['.', '@'], "-"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Document path of this user's profile record
    pub fn profile_path(&self) -> &str {
        &self.0
    }

    /// Document path of this user's conversation-summary list
    pub fn conversations_path(&self) -> String {
        format!("{}/conversations", self.0)
    }
}

impl fmt::Display for UserKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for UserKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalize_replaces_dots_and_at() {
        assert_eq!(UserKey::canonicalize("a@x.com").as_str(), "a-x-com");
        assert_eq!(
            UserKey::canonicalize("first.last@mail.example.org").as_str(),
            "first-last-mail-example-org"
        );
    }

    #[test]
    fn test_canonicalize_is_idempotent() {
        let once = UserKey::canonicalize("a@x.com");
        let twice = UserKey::canonicalize(once.as_str());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_paths() {
        let key = UserKey::canonicalize("b@x.com");
        assert_eq!(key.profile_path(), "b-x-com");
        assert_eq!(key.conversations_path(), "b-x-com/conversations");
    }
}
