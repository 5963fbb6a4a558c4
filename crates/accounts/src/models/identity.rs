//! Account identity as seen by callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use studyhall_core::{Email, IdentityId};

use crate::models::profile::ProfileRecord;

/// The authoritative account record held by the credential store.
///
/// `id` and `email` are immutable after creation. The display fields are
/// mutable and may be overridden by the profile record when the two are
/// merged for presentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    /// Provider-assigned identity ID, immutable for the account lifetime.
    pub id: IdentityId,
    /// Address the account was registered under.
    pub email: Email,
    /// Display name chosen at registration, if any.
    pub display_name: Option<String>,
    /// Avatar URL, if set.
    pub photo_url: Option<String>,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
    /// Last successful credential verification.
    pub last_login_at: DateTime<Utc>,
}

impl Identity {
    /// Merge profile record fields over this identity.
    ///
    /// Profile `username` and `photo_url` take precedence for display data
    /// when present; `id`, `email` and the timestamps always come from the
    /// credential store.
    #[must_use]
    pub fn merged_with(&self, profile: &ProfileRecord) -> Self {
        Self {
            display_name: profile
                .username
                .clone()
                .or_else(|| self.display_name.clone()),
            photo_url: profile.photo_url.clone().or_else(|| self.photo_url.clone()),
            ..self.clone()
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn identity() -> Identity {
        Identity {
            id: IdentityId::new("u1"),
            email: Email::parse("a@x.com").unwrap(),
            display_name: Some("provider-name".to_string()),
            photo_url: None,
            created_at: Utc::now(),
            last_login_at: Utc::now(),
        }
    }

    #[test]
    fn test_merge_prefers_profile_fields() {
        let profile = ProfileRecord {
            username: Some("profile-name".to_string()),
            photo_url: Some("https://img.example/p.png".to_string()),
            ..ProfileRecord::default()
        };

        let merged = identity().merged_with(&profile);
        assert_eq!(merged.display_name.as_deref(), Some("profile-name"));
        assert_eq!(
            merged.photo_url.as_deref(),
            Some("https://img.example/p.png")
        );
    }

    #[test]
    fn test_merge_keeps_identity_fields_when_profile_is_sparse() {
        let merged = identity().merged_with(&ProfileRecord::default());
        assert_eq!(merged.display_name.as_deref(), Some("provider-name"));
        assert_eq!(merged.photo_url, None);
        assert_eq!(merged.id, IdentityId::new("u1"));
    }

    #[test]
    fn test_merge_never_touches_id_or_email() {
        let profile = ProfileRecord {
            email: Some(Email::parse("other@x.com").unwrap()),
            ..ProfileRecord::default()
        };

        let merged = identity().merged_with(&profile);
        assert_eq!(merged.email.as_str(), "a@x.com");
    }
}
