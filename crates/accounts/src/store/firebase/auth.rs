//! Identity Toolkit client implementation.
//!
//! Holds at most one signed-in session. The ID token and refresh token
//! live behind a mutex that is never held across an await point; requests
//! copy the tokens out, perform IO, then re-lock to store rotations.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tokio::sync::watch;
use tracing::{debug, instrument, warn};

use studyhall_core::{Email, IdentityId, SessionToken};

use crate::config::FirebaseConfig;
use crate::error::AuthError;
use crate::models::Identity;
use crate::store::CredentialStore;

use super::error::{OpContext, api_error};
use super::types::{
    LookupResponse, RefreshResponse, RemoteAccount, SessionResponse, UpdateResponse,
    parse_epoch_millis,
};

/// Refresh the ID token when it has less than this long to live.
const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;

/// Fallback token lifetime when the API omits or mangles `expiresIn`.
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

struct ActiveSession {
    identity: Identity,
    id_token: SecretString,
    refresh_token: SecretString,
    token_deadline: DateTime<Utc>,
}

// =============================================================================
// FirebaseAuthClient
// =============================================================================

/// Client for the Identity Toolkit and Secure Token REST APIs.
///
/// Cheap to clone; clones share the session and the identity signal.
#[derive(Clone)]
pub struct FirebaseAuthClient {
    inner: Arc<FirebaseAuthClientInner>,
}

struct FirebaseAuthClientInner {
    http: reqwest::Client,
    api_key: SecretString,
    identity_endpoint: String,
    token_endpoint: String,
    session: Mutex<Option<ActiveSession>>,
    signal: watch::Sender<Option<Identity>>,
}

impl FirebaseAuthClient {
    /// Create a new client with no active session.
    #[must_use]
    pub fn new(config: &FirebaseConfig) -> Self {
        let (signal, _) = watch::channel(None);
        Self {
            inner: Arc::new(FirebaseAuthClientInner {
                http: reqwest::Client::new(),
                api_key: config.api_key.clone(),
                identity_endpoint: config.identity_endpoint.trim_end_matches('/').to_owned(),
                token_endpoint: config.token_endpoint.trim_end_matches('/').to_owned(),
                session: Mutex::new(None),
                signal,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<ActiveSession>> {
        self.inner
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn accounts_url(&self, op: &str) -> String {
        format!("{}/accounts:{op}", self.inner.identity_endpoint)
    }

    /// POST to an Identity Toolkit operation, mapping non-success responses.
    async fn post_identity(
        &self,
        op: &str,
        body: serde_json::Value,
        ctx: OpContext,
    ) -> Result<reqwest::Response, AuthError> {
        let response = self
            .inner
            .http
            .post(self.accounts_url(op))
            .query(&[("key", self.inner.api_key.expose_secret())])
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response, ctx).await);
        }
        Ok(response)
    }

    /// ID token for the active session, refreshed when close to expiry.
    async fn current_token(&self) -> Result<SecretString, AuthError> {
        let (id_token, refresh_token, deadline) = {
            let guard = self.lock();
            let Some(session) = guard.as_ref() else {
                return Err(AuthError::Unauthenticated);
            };
            (
                session.id_token.clone(),
                session.refresh_token.clone(),
                session.token_deadline,
            )
        };

        if deadline - Utc::now() > Duration::seconds(TOKEN_REFRESH_MARGIN_SECS) {
            return Ok(id_token);
        }

        debug!("refreshing session token");
        let response = self
            .inner
            .http
            .post(format!("{}/token", self.inner.token_endpoint))
            .query(&[("key", self.inner.api_key.expose_secret())])
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token.expose_secret()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response, OpContext::Account).await);
        }
        let payload: RefreshResponse = response.json().await?;

        let fresh = SecretString::from(payload.id_token);
        let mut guard = self.lock();
        if let Some(session) = guard.as_mut() {
            session.id_token = fresh.clone();
            session.refresh_token = SecretString::from(payload.refresh_token);
            session.token_deadline = token_deadline(&payload.expires_in);
        }
        Ok(fresh)
    }

    /// Sign up or sign in, then hydrate the identity and open the session.
    async fn establish_session(
        &self,
        op: &str,
        email: &Email,
        password: &str,
        ctx: OpContext,
    ) -> Result<Identity, AuthError> {
        let response = self
            .post_identity(
                op,
                json!({
                    "email": email.as_str(),
                    "password": password,
                    "returnSecureToken": true,
                }),
                ctx,
            )
            .await?;
        let payload: SessionResponse = response.json().await?;

        // The sign-in payload lacks account timestamps; a lookup fills them
        // in. If the lookup fails the session still opens with what we have.
        let identity = match self.lookup_identity(&payload.id_token, email).await {
            Ok(identity) => identity,
            Err(err) => {
                warn!(error = %err, "account lookup failed, using the session payload");
                let now = Utc::now();
                Identity {
                    id: IdentityId::new(payload.local_id.clone()),
                    email: Email::parse(&payload.email).unwrap_or_else(|_| email.clone()),
                    display_name: payload.display_name.clone(),
                    photo_url: None,
                    created_at: now,
                    last_login_at: now,
                }
            }
        };

        {
            let mut guard = self.lock();
            *guard = Some(ActiveSession {
                identity: identity.clone(),
                id_token: SecretString::from(payload.id_token),
                refresh_token: SecretString::from(payload.refresh_token),
                token_deadline: token_deadline(&payload.expires_in),
            });
        }
        self.inner.signal.send_replace(Some(identity.clone()));
        Ok(identity)
    }

    /// Install rotated tokens from a confirmed re-authentication.
    ///
    /// The tokens are only adopted when the confirming account is the one
    /// this session was opened for. The same email can come back with a
    /// different `localId` if the account was deleted and re-registered
    /// out of band; adopting those tokens would silently switch accounts.
    fn install_reauth_tokens(&self, payload: &SessionResponse) -> Result<(), AuthError> {
        let mut guard = self.lock();
        match guard.as_mut() {
            Some(session) if session.identity.id.as_str() == payload.local_id => {
                session.id_token = SecretString::from(payload.id_token.clone());
                session.refresh_token = SecretString::from(payload.refresh_token.clone());
                session.token_deadline = token_deadline(&payload.expires_in);
                Ok(())
            }
            _ => Err(AuthError::Unauthenticated),
        }
    }

    async fn lookup_identity(
        &self,
        id_token: &str,
        fallback_email: &Email,
    ) -> Result<Identity, AuthError> {
        let response = self
            .post_identity("lookup", json!({ "idToken": id_token }), OpContext::Account)
            .await?;
        let payload: LookupResponse = response.json().await?;

        let Some(account) = payload.users.into_iter().next() else {
            return Err(AuthError::Unknown(
                "account lookup returned no users".to_owned(),
            ));
        };
        Ok(identity_from_account(account, fallback_email))
    }
}

fn identity_from_account(account: RemoteAccount, fallback_email: &Email) -> Identity {
    let now = Utc::now();
    Identity {
        id: IdentityId::new(account.local_id),
        email: Email::parse(&account.email).unwrap_or_else(|_| fallback_email.clone()),
        display_name: account.display_name,
        photo_url: account.photo_url,
        created_at: account
            .created_at
            .as_deref()
            .and_then(parse_epoch_millis)
            .unwrap_or(now),
        last_login_at: account
            .last_login_at
            .as_deref()
            .and_then(parse_epoch_millis)
            .unwrap_or(now),
    }
}

fn token_deadline(expires_in: &str) -> DateTime<Utc> {
    let seconds = expires_in
        .parse::<i64>()
        .unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);
    Utc::now() + Duration::seconds(seconds)
}

// =============================================================================
// CredentialStore
// =============================================================================

#[async_trait]
impl CredentialStore for FirebaseAuthClient {
    #[instrument(skip(self, password))]
    async fn create_identity(
        &self,
        email: &Email,
        password: &str,
    ) -> Result<Identity, AuthError> {
        let identity = self
            .establish_session("signUp", email, password, OpContext::SignUp)
            .await?;
        debug!(id = %identity.id, "identity created");
        Ok(identity)
    }

    #[instrument(skip(self, password))]
    async fn verify_identity(
        &self,
        email: &Email,
        password: &str,
    ) -> Result<Identity, AuthError> {
        let identity = self
            .establish_session("signInWithPassword", email, password, OpContext::SignIn)
            .await?;
        debug!(id = %identity.id, "identity verified");
        Ok(identity)
    }

    async fn end_session(&self) -> Result<(), AuthError> {
        *self.lock() = None;
        self.inner.signal.send_replace(None);
        debug!("session ended");
        Ok(())
    }

    fn identity_signal(&self) -> watch::Receiver<Option<Identity>> {
        self.inner.signal.subscribe()
    }

    #[instrument(skip(self))]
    async fn update_display_fields(
        &self,
        display_name: &str,
        photo_url: Option<&str>,
    ) -> Result<Identity, AuthError> {
        let id_token = self.current_token().await?;

        let mut body = json!({
            "idToken": id_token.expose_secret(),
            "displayName": display_name,
            "returnSecureToken": false,
        });
        if let Some(url) = photo_url {
            body["photoUrl"] = json!(url);
        }

        let response = self
            .post_identity("update", body, OpContext::Account)
            .await?;
        let payload: UpdateResponse = response.json().await?;

        let identity = {
            let mut guard = self.lock();
            let Some(session) = guard.as_mut() else {
                return Err(AuthError::Unauthenticated);
            };
            session.identity.display_name = payload
                .display_name
                .or_else(|| Some(display_name.to_owned()));
            if let Some(url) = payload.photo_url.or_else(|| photo_url.map(ToOwned::to_owned)) {
                session.identity.photo_url = Some(url);
            }
            session.identity.clone()
        };

        self.inner.signal.send_replace(Some(identity.clone()));
        Ok(identity)
    }

    #[instrument(skip_all)]
    async fn change_credential(&self, new_password: &str) -> Result<(), AuthError> {
        let id_token = self.current_token().await?;

        let response = self
            .post_identity(
                "update",
                json!({
                    "idToken": id_token.expose_secret(),
                    "password": new_password,
                    "returnSecureToken": true,
                }),
                OpContext::Account,
            )
            .await?;
        let payload: UpdateResponse = response.json().await?;

        // A password change rotates the session tokens.
        if let (Some(id_token), Some(refresh_token)) = (payload.id_token, payload.refresh_token) {
            let mut guard = self.lock();
            if let Some(session) = guard.as_mut() {
                session.id_token = SecretString::from(id_token);
                session.refresh_token = SecretString::from(refresh_token);
                session.token_deadline = token_deadline(
                    payload.expires_in.as_deref().unwrap_or(""),
                );
            }
        }
        debug!("credential changed");
        Ok(())
    }

    #[instrument(skip_all)]
    async fn reauthenticate(&self, password: &str) -> Result<(), AuthError> {
        let email = {
            let guard = self.lock();
            let Some(session) = guard.as_ref() else {
                return Err(AuthError::Unauthenticated);
            };
            session.identity.email.clone()
        };

        let response = self
            .post_identity(
                "signInWithPassword",
                json!({
                    "email": email.as_str(),
                    "password": password,
                    "returnSecureToken": true,
                }),
                OpContext::Reauth,
            )
            .await?;
        let payload: SessionResponse = response.json().await?;

        // The confirmed password proves recency; keep the fresher tokens.
        self.install_reauth_tokens(&payload)
    }

    #[instrument(skip(self))]
    async fn send_reset_email(&self, email: &Email) -> Result<(), AuthError> {
        self.post_identity(
            "sendOobCode",
            json!({
                "requestType": "PASSWORD_RESET",
                "email": email.as_str(),
            }),
            OpContext::Reset,
        )
        .await?;
        debug!("password reset email requested");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_identity(&self) -> Result<(), AuthError> {
        let id_token = self.current_token().await?;
        self.post_identity(
            "delete",
            json!({ "idToken": id_token.expose_secret() }),
            OpContext::Account,
        )
        .await?;

        *self.lock() = None;
        self.inner.signal.send_replace(None);
        debug!("identity deleted");
        Ok(())
    }

    async fn session_token(&self) -> Result<SessionToken, AuthError> {
        let token = self.current_token().await?;
        Ok(SessionToken::new(token.expose_secret().to_owned()))
    }
}
