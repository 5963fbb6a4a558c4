//! Wire types for the Identity Toolkit, Secure Token, and Firestore REST APIs.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Identity Toolkit
// ─────────────────────────────────────────────────────────────────────────────

/// Response to `accounts:signUp` and `accounts:signInWithPassword`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub local_id: String,
    pub email: String,
    pub id_token: String,
    pub refresh_token: String,
    /// Token lifetime in seconds, as a decimal string.
    pub expires_in: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Response to `accounts:update`.
///
/// Token fields are only present when the update rotates the session,
/// which password changes do.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResponse {
    pub local_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<String>,
}

/// Response to `accounts:lookup`.
#[derive(Debug, Deserialize)]
pub struct LookupResponse {
    #[serde(default)]
    pub users: Vec<RemoteAccount>,
}

/// A single account as reported by `accounts:lookup`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteAccount {
    pub local_id: String,
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
    /// Milliseconds since the epoch, as a decimal string.
    #[serde(default)]
    pub created_at: Option<String>,
    /// Milliseconds since the epoch, as a decimal string.
    #[serde(default)]
    pub last_login_at: Option<String>,
}

/// Response to the Secure Token `token` endpoint. Snake-case on the wire.
#[derive(Debug, Deserialize)]
pub struct RefreshResponse {
    pub id_token: String,
    pub refresh_token: String,
    /// Token lifetime in seconds, as a decimal string.
    pub expires_in: String,
}

/// Error envelope shared by all Identity Toolkit endpoints.
#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorDetail,
}

/// The inner error object. `message` carries a stable upper-snake code,
/// sometimes followed by `" : "` and free-form detail.
#[derive(Debug, Deserialize)]
pub struct ApiErrorDetail {
    pub message: String,
}

/// Parse a millisecond-epoch string into a UTC timestamp.
pub fn parse_epoch_millis(raw: &str) -> Option<DateTime<Utc>> {
    raw.parse::<i64>()
        .ok()
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
}

// ─────────────────────────────────────────────────────────────────────────────
// Firestore
// ─────────────────────────────────────────────────────────────────────────────

/// A Firestore document: a flat map of typed field values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FirestoreDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub fields: BTreeMap<String, FirestoreValue>,
}

/// A Firestore typed value, restricted to the kinds profile fields use.
///
/// Exactly one kind is populated per value on the wire. Kinds this client
/// never writes are ignored on read.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirestoreValue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub string_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boolean_value: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_value: Option<String>,
}

impl FirestoreValue {
    pub fn string(value: impl Into<String>) -> Self {
        Self {
            string_value: Some(value.into()),
            ..Self::default()
        }
    }

    pub fn boolean(value: bool) -> Self {
        Self {
            boolean_value: Some(value),
            ..Self::default()
        }
    }

    pub fn timestamp(value: DateTime<Utc>) -> Self {
        Self {
            timestamp_value: Some(value.to_rfc3339_opts(SecondsFormat::Micros, true)),
            ..Self::default()
        }
    }
}
