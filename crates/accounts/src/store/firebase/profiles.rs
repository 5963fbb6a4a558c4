//! Firestore profile document client.
//!
//! Profile documents live in the `profiles` collection, keyed by identity
//! ID. Writes are field-masked PATCHes so concurrent writers never clobber
//! fields they did not touch. Requests are authorized with the ID token of
//! the active session, fetched from the auth client per request.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, instrument};

use studyhall_core::{Email, IdentityId, SessionToken};

use crate::config::FirebaseConfig;
use crate::models::{ProfilePatch, ProfileRecord};
use crate::store::{CredentialStore, ProfileStore, ProfileStoreError};

use super::FirebaseAuthClient;
use super::types::{FirestoreDocument, FirestoreValue};

/// Collection holding one profile document per identity.
const COLLECTION: &str = "profiles";

// =============================================================================
// FirestoreProfiles
// =============================================================================

/// Client for profile documents in the Firestore REST API.
#[derive(Clone)]
pub struct FirestoreProfiles {
    inner: Arc<FirestoreProfilesInner>,
}

struct FirestoreProfilesInner {
    http: reqwest::Client,
    api_key: SecretString,
    documents_root: String,
    auth: FirebaseAuthClient,
}

impl FirestoreProfiles {
    /// Create a new client backed by `auth` for request authorization.
    #[must_use]
    pub fn new(config: &FirebaseConfig, auth: FirebaseAuthClient) -> Self {
        let documents_root = format!(
            "{}/projects/{}/databases/(default)/documents",
            config.firestore_endpoint.trim_end_matches('/'),
            config.project_id
        );
        Self {
            inner: Arc::new(FirestoreProfilesInner {
                http: reqwest::Client::new(),
                api_key: config.api_key.clone(),
                documents_root,
                auth,
            }),
        }
    }

    fn document_url(&self, id: &IdentityId) -> String {
        format!("{}/{COLLECTION}/{}", self.inner.documents_root, id.as_str())
    }

    async fn bearer(&self) -> Result<SessionToken, ProfileStoreError> {
        self.inner
            .auth
            .session_token()
            .await
            .map_err(|err| ProfileStoreError::Session(err.to_string()))
    }
}

async fn rejection(response: reqwest::Response) -> ProfileStoreError {
    let status = response.status().as_u16();
    let message = response
        .text()
        .await
        .unwrap_or_default()
        .chars()
        .take(200)
        .collect();
    ProfileStoreError::Rejected { status, message }
}

#[async_trait]
impl ProfileStore for FirestoreProfiles {
    #[instrument(skip(self, patch), fields(id = %id))]
    async fn write(&self, id: &IdentityId, patch: ProfilePatch) -> Result<(), ProfileStoreError> {
        let (document, paths) = encode_patch(&patch);
        if paths.is_empty() {
            return Ok(());
        }

        let token = self.bearer().await?;
        let mut query: Vec<(&str, String)> =
            vec![("key", self.inner.api_key.expose_secret().to_owned())];
        for path in &paths {
            query.push(("updateMask.fieldPaths", (*path).to_owned()));
        }

        let response = self
            .inner
            .http
            .patch(self.document_url(id))
            .bearer_auth(token.reveal())
            .query(&query)
            .json(&document)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(rejection(response).await);
        }
        debug!(fields = ?paths, "profile written");
        Ok(())
    }

    #[instrument(skip(self), fields(id = %id))]
    async fn read(&self, id: &IdentityId) -> Result<Option<ProfileRecord>, ProfileStoreError> {
        let token = self.bearer().await?;
        let response = self
            .inner
            .http
            .get(self.document_url(id))
            .bearer_auth(token.reveal())
            .query(&[("key", self.inner.api_key.expose_secret())])
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(rejection(response).await);
        }

        let body = response.text().await?;
        let document: FirestoreDocument =
            serde_json::from_str(&body).map_err(|err| ProfileStoreError::Malformed(err.to_string()))?;
        Ok(Some(decode_record(&document)?))
    }
}

// =============================================================================
// Document encoding
// =============================================================================

/// Turn a patch into a partial document plus its update-mask field paths.
fn encode_patch(patch: &ProfilePatch) -> (FirestoreDocument, Vec<&'static str>) {
    let mut document = FirestoreDocument::default();
    let mut paths = Vec::new();

    if let Some(username) = &patch.username {
        document
            .fields
            .insert("username".to_owned(), FirestoreValue::string(username));
        paths.push("username");
    }
    if let Some(photo_url) = &patch.photo_url {
        document
            .fields
            .insert("photoUrl".to_owned(), FirestoreValue::string(photo_url));
        paths.push("photoUrl");
    }
    if let Some(email) = &patch.email {
        document
            .fields
            .insert("email".to_owned(), FirestoreValue::string(email.as_str()));
        paths.push("email");
    }
    if let Some(created_at) = patch.created_at {
        document
            .fields
            .insert("createdAt".to_owned(), FirestoreValue::timestamp(created_at));
        paths.push("createdAt");
    }
    if let Some(last_login_at) = patch.last_login_at {
        document.fields.insert(
            "lastLoginAt".to_owned(),
            FirestoreValue::timestamp(last_login_at),
        );
        paths.push("lastLoginAt");
    }
    if let Some(deleted) = patch.deleted {
        document
            .fields
            .insert("deleted".to_owned(), FirestoreValue::boolean(deleted));
        paths.push("deleted");
    }
    if let Some(deleted_at) = patch.deleted_at {
        document
            .fields
            .insert("deletedAt".to_owned(), FirestoreValue::timestamp(deleted_at));
        paths.push("deletedAt");
    }

    (document, paths)
}

fn decode_record(document: &FirestoreDocument) -> Result<ProfileRecord, ProfileStoreError> {
    let fields = &document.fields;
    Ok(ProfileRecord {
        username: decode_string(fields, "username"),
        photo_url: decode_string(fields, "photoUrl"),
        // Addresses that no longer parse are dropped rather than failing the read.
        email: decode_string(fields, "email").and_then(|raw| Email::parse(&raw).ok()),
        created_at: decode_timestamp(fields, "createdAt")?,
        last_login_at: decode_timestamp(fields, "lastLoginAt")?,
        deleted: decode_bool(fields, "deleted").unwrap_or(false),
        deleted_at: decode_timestamp(fields, "deletedAt")?,
    })
}

fn decode_string(fields: &BTreeMap<String, FirestoreValue>, key: &str) -> Option<String> {
    fields.get(key).and_then(|value| value.string_value.clone())
}

fn decode_bool(fields: &BTreeMap<String, FirestoreValue>, key: &str) -> Option<bool> {
    fields.get(key).and_then(|value| value.boolean_value)
}

fn decode_timestamp(
    fields: &BTreeMap<String, FirestoreValue>,
    key: &str,
) -> Result<Option<DateTime<Utc>>, ProfileStoreError> {
    let Some(raw) = fields.get(key).and_then(|value| value.timestamp_value.as_deref()) else {
        return Ok(None);
    };
    DateTime::parse_from_rfc3339(raw)
        .map(|parsed| Some(parsed.with_timezone(&Utc)))
        .map_err(|err| ProfileStoreError::Malformed(format!("bad {key} timestamp: {err}")))
}
