//! Profile records stored in the document store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use studyhall_core::Email;

use crate::models::identity::Identity;

/// Denormalized profile document, keyed by identity ID.
///
/// Every field is optional: documents may have been written by older
/// versions of the product or only partially populated. The record is a
/// best-effort copy; the credential store stays authoritative for
/// `id` and `email`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRecord {
    /// Display name, overrides the credential store's when present.
    pub username: Option<String>,
    /// Avatar URL, overrides the credential store's when present.
    pub photo_url: Option<String>,
    /// Address copied at registration time.
    pub email: Option<Email>,
    /// Account creation time copied at registration time.
    pub created_at: Option<DateTime<Utc>>,
    /// Updated on every successful login.
    pub last_login_at: Option<DateTime<Utc>>,
    /// Tombstone set at account deletion; the document is retained.
    #[serde(default)]
    pub deleted: bool,
    /// When the tombstone was set.
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Field-level merge payload for profile writes.
///
/// Absent fields are left untouched in the stored document. Constructors
/// cover the shapes the account workflow writes; nothing else ever writes
/// to the profile store.
#[derive(Debug, Clone, Default)]
pub struct ProfilePatch {
    pub username: Option<String>,
    pub photo_url: Option<String>,
    pub email: Option<Email>,
    pub created_at: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub deleted: Option<bool>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl ProfilePatch {
    /// Full record written once, right after the identity is created.
    #[must_use]
    pub fn registration(identity: &Identity) -> Self {
        Self {
            username: identity.display_name.clone(),
            photo_url: identity.photo_url.clone(),
            email: Some(identity.email.clone()),
            created_at: Some(identity.created_at),
            last_login_at: Some(identity.last_login_at),
            deleted: Some(false),
            ..Self::default()
        }
    }

    /// Login timestamp bump.
    #[must_use]
    pub fn last_login(at: DateTime<Utc>) -> Self {
        Self {
            last_login_at: Some(at),
            ..Self::default()
        }
    }

    /// Display field update; a `None` photo URL leaves the stored one alone.
    #[must_use]
    pub fn display(username: &str, photo_url: Option<&str>) -> Self {
        Self {
            username: Some(username.to_owned()),
            photo_url: photo_url.map(ToOwned::to_owned),
            ..Self::default()
        }
    }

    /// Tombstone written just before the identity is deleted.
    #[must_use]
    pub fn tombstone(at: DateTime<Utc>) -> Self {
        Self {
            deleted: Some(true),
            deleted_at: Some(at),
            ..Self::default()
        }
    }

    /// Merge this patch into an existing record.
    pub fn apply_to(&self, record: &mut ProfileRecord) {
        if let Some(username) = &self.username {
            record.username = Some(username.clone());
        }
        if let Some(photo_url) = &self.photo_url {
            record.photo_url = Some(photo_url.clone());
        }
        if let Some(email) = &self.email {
            record.email = Some(email.clone());
        }
        if let Some(created_at) = self.created_at {
            record.created_at = Some(created_at);
        }
        if let Some(last_login_at) = self.last_login_at {
            record.last_login_at = Some(last_login_at);
        }
        if let Some(deleted) = self.deleted {
            record.deleted = deleted;
        }
        if let Some(deleted_at) = self.deleted_at {
            record.deleted_at = Some(deleted_at);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use studyhall_core::IdentityId;

    #[test]
    fn test_apply_merges_only_present_fields() {
        let mut record = ProfileRecord {
            username: Some("alice".to_string()),
            photo_url: Some("https://img.example/a.png".to_string()),
            ..ProfileRecord::default()
        };

        ProfilePatch::display("alicia", None).apply_to(&mut record);

        assert_eq!(record.username.as_deref(), Some("alicia"));
        // Absent photo URL in the patch leaves the stored value alone.
        assert_eq!(
            record.photo_url.as_deref(),
            Some("https://img.example/a.png")
        );
    }

    #[test]
    fn test_tombstone_sets_both_fields() {
        let now = Utc::now();
        let mut record = ProfileRecord::default();

        ProfilePatch::tombstone(now).apply_to(&mut record);

        assert!(record.deleted);
        assert_eq!(record.deleted_at, Some(now));
        assert_eq!(record.username, None);
    }

    #[test]
    fn test_registration_copies_identity_fields() {
        let identity = Identity {
            id: IdentityId::new("u1"),
            email: Email::parse("a@x.com").unwrap(),
            display_name: Some("alice".to_string()),
            photo_url: None,
            created_at: Utc::now(),
            last_login_at: Utc::now(),
        };

        let patch = ProfilePatch::registration(&identity);
        assert_eq!(patch.username.as_deref(), Some("alice"));
        assert_eq!(patch.email.as_ref().map(Email::as_str), Some("a@x.com"));
        assert_eq!(patch.deleted, Some(false));
        assert_eq!(patch.deleted_at, None);
    }

    #[test]
    fn test_last_login_touches_nothing_else() {
        let now = Utc::now();
        let mut record = ProfileRecord {
            username: Some("alice".to_string()),
            deleted: false,
            ..ProfileRecord::default()
        };

        ProfilePatch::last_login(now).apply_to(&mut record);

        assert_eq!(record.last_login_at, Some(now));
        assert_eq!(record.username.as_deref(), Some("alice"));
        assert!(!record.deleted);
    }
}
