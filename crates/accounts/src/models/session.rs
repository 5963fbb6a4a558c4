//! Session-related types.
//!
//! Types persisted in the local session cache between launches.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use studyhall_core::{Email, IdentityId, SessionToken};

use crate::models::identity::Identity;

/// Cache-stored user snapshot.
///
/// Minimal data persisted locally so a returning shell can render
/// the signed-in state before any network round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedUser {
    /// Provider-assigned identity ID.
    pub id: IdentityId,
    /// Account email.
    pub email: Email,
    /// Display name at the time the session was saved.
    pub display_name: Option<String>,
    /// Avatar URL at the time the session was saved.
    pub photo_url: Option<String>,
}

impl From<&Identity> for CachedUser {
    fn from(identity: &Identity) -> Self {
        Self {
            id: identity.id.clone(),
            email: identity.email.clone(),
            display_name: identity.display_name.clone(),
            photo_url: identity.photo_url.clone(),
        }
    }
}

/// A locally cached session.
///
/// Derived state: everything here can be reconstructed by signing in again.
#[derive(Debug, Clone)]
pub struct Session {
    /// Opaque token minted by the credential store when the session was saved.
    pub token: SessionToken,
    /// Snapshot of the identity for instant rendering.
    pub user: CachedUser,
    /// Absolute deadline after which the cache entry counts as stale.
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Whether the entry is past its deadline at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Cache keys for session data.
pub mod keys {
    /// Key for the opaque session token.
    pub const TOKEN: &str = "studyhall.auth.token";

    /// Key for the serialized [`CachedUser`](super::CachedUser) snapshot.
    pub const USER: &str = "studyhall.auth.user";

    /// Key for the RFC 3339 expiry deadline. Written last so a torn write
    /// is observed as an incomplete (absent) entry.
    pub const EXPIRES_AT: &str = "studyhall.auth.expires_at";

    /// All keys that make up one cache entry.
    pub const ALL: [&str; 3] = [TOKEN, USER, EXPIRES_AT];
}
