//! Profile model
//!
//! The public identity bound 1:1 to an [`Account`](crate::Account):
//! human-chosen unique username and avatar reference. A committed account
//! always has a profile; the linking flow enforces this inside a single
//! transaction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::account::AccountId;

/// Platform fallback when a provider supplies no usable avatar.
pub const DEFAULT_AVATAR_URL: &str = "https://static.wicket.dev/avatars/default.png";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub account_id: AccountId,

    pub username: String,

    pub avatar_url: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert payload for a new profile.
#[derive(Debug, Clone)]
pub struct NewProfile {
    pub account_id: AccountId,
    pub username: String,
    pub avatar_url: String,
}

impl NewProfile {
    pub fn new(account_id: AccountId, username: impl Into<String>) -> Self {
        Self {
            account_id,
            username: username.into(),
            avatar_url: DEFAULT_AVATAR_URL.to_string(),
        }
    }

    pub fn with_avatar(mut self, avatar_url: Option<String>) -> Self {
        if let Some(url) = avatar_url {
            self.avatar_url = url;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_profile_defaults_avatar() {
        let profile = NewProfile::new(AccountId::new_random(), "foo");
        assert_eq!(profile.avatar_url, DEFAULT_AVATAR_URL);
    }

    #[test]
    fn test_new_profile_provider_avatar_wins() {
        let profile = NewProfile::new(AccountId::new_random(), "foo")
            .with_avatar(Some("https://lh3.example.com/me.png".to_string()));
        assert_eq!(profile.avatar_url, "https://lh3.example.com/me.png");

        let profile = NewProfile::new(AccountId::new_random(), "foo").with_avatar(None);
        assert_eq!(profile.avatar_url, DEFAULT_AVATAR_URL);
    }
}
