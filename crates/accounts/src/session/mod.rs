//! Local session cache.
//!
//! Persists a small snapshot of the active session (token, user snapshot,
//! expiry deadline) on a per-key-atomic key-value surface so application
//! shells can restore the signed-in state across launches without a
//! network round trip.
//!
//! The cache is derived state. Losing it means signing in again; it is
//! never consulted to decide whether an account operation is allowed.

pub mod kv;

pub use kv::{FileKv, KvError, KvStore, MemoryKv};

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tracing::{debug, warn};

use studyhall_core::SessionToken;

use crate::error::AuthError;
use crate::models::Identity;
use crate::models::session::{CachedUser, Session, keys};
use crate::store::CredentialStore;

/// Errors that can occur while saving a session.
///
/// Loading and clearing never error: an unreadable entry degrades to
/// "no session" and clearing is best-effort per key.
#[derive(Debug, Error)]
pub enum SessionCacheError {
    /// The credential store could not mint a token for the entry.
    #[error("could not mint a session token: {0}")]
    Token(#[from] AuthError),

    /// The user snapshot could not be serialized.
    #[error("could not serialize session snapshot: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The key-value surface rejected a write.
    #[error("could not persist session: {0}")]
    Persist(#[from] KvError),
}

/// Session cache over a [`KvStore`].
///
/// Cheaply cloneable; clones share the same backing store.
#[derive(Clone)]
pub struct SessionCache {
    inner: Arc<SessionCacheInner>,
}

struct SessionCacheInner {
    kv: Arc<dyn KvStore>,
    credentials: Arc<dyn CredentialStore>,
    ttl: Duration,
}

impl SessionCache {
    /// Default entry lifetime in minutes.
    pub const DEFAULT_TTL_MINUTES: i64 = 60;

    /// Create a cache over `kv`, minting tokens from `credentials`.
    ///
    /// A zero or negative TTL produces entries that are already stale on
    /// the next load; useful for shells that want single-launch sessions.
    #[must_use]
    pub fn new(
        kv: Arc<dyn KvStore>,
        credentials: Arc<dyn CredentialStore>,
        ttl_minutes: i64,
    ) -> Self {
        Self {
            inner: Arc::new(SessionCacheInner {
                kv,
                credentials,
                ttl: Duration::minutes(ttl_minutes),
            }),
        }
    }

    /// Persist a session for `identity`.
    ///
    /// Mints a fresh token from the credential store, then writes the user
    /// snapshot, the token, and finally the expiry deadline. The deadline
    /// goes last: the surface only guarantees per-key atomicity, and
    /// [`load`](Self::load) refuses entries with any key missing, so a torn
    /// write reads back as signed out rather than as partial state.
    ///
    /// # Errors
    ///
    /// Returns an error when the token cannot be minted, the snapshot
    /// cannot be serialized, or a key cannot be written.
    pub async fn save(&self, identity: &Identity) -> Result<Session, SessionCacheError> {
        let token = self.inner.credentials.session_token().await?;
        let user = CachedUser::from(identity);
        let expires_at = Utc::now() + self.inner.ttl;

        let snapshot = serde_json::to_string(&user)?;
        self.inner.kv.set(keys::USER, &snapshot)?;
        self.inner.kv.set(keys::TOKEN, token.reveal())?;
        self.inner
            .kv
            .set(keys::EXPIRES_AT, &expires_at.to_rfc3339())?;

        debug!(user = %user.id, "session cached");
        Ok(Session {
            token,
            user,
            expires_at,
        })
    }

    /// Load the cached session, if one is present and fresh.
    ///
    /// An entry that is incomplete, unreadable, or past its deadline is
    /// removed and reported as `None`. Absence is a normal signed-out
    /// state, not an error.
    #[must_use]
    pub fn load(&self) -> Option<Session> {
        let token = self.read(keys::TOKEN);
        let snapshot = self.read(keys::USER);
        let expires_at = self.read(keys::EXPIRES_AT);

        let (Some(token), Some(snapshot), Some(expires_at)) = (token, snapshot, expires_at)
        else {
            // Fresh install, prior clear, or a torn write.
            self.clear();
            return None;
        };

        let Some(session) = decode_entry(token, &snapshot, &expires_at) else {
            warn!("session cache entry unreadable, clearing");
            self.clear();
            return None;
        };

        if session.is_expired(Utc::now()) {
            debug!("cached session expired, clearing");
            self.clear();
            return None;
        }

        Some(session)
    }

    /// Remove every session key.
    ///
    /// Each key is removed independently and failures are only logged, so
    /// one stuck key never leaves the others behind.
    pub fn clear(&self) {
        for key in keys::ALL {
            if let Err(e) = self.inner.kv.remove(key) {
                warn!(key, error = %e, "failed to remove session key");
            }
        }
    }

    fn read(&self, key: &str) -> Option<String> {
        match self.inner.kv.get(key) {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "failed to read session key");
                None
            }
        }
    }
}

fn decode_entry(token: String, snapshot: &str, expires_at: &str) -> Option<Session> {
    let user: CachedUser = serde_json::from_str(snapshot).ok()?;
    let expires_at = DateTime::parse_from_rfc3339(expires_at)
        .ok()?
        .with_timezone(&Utc);

    Some(Session {
        token: SessionToken::new(token),
        user,
        expires_at,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryCredentialStore;
    use studyhall_core::Email;

    async fn signed_in_store() -> (Arc<MemoryCredentialStore>, Identity) {
        let store = Arc::new(MemoryCredentialStore::new());
        let identity = store
            .create_identity(&Email::parse("a@x.com").unwrap(), "secret1")
            .await
            .unwrap();
        (store, identity)
    }

    fn cache_over(
        store: &Arc<MemoryCredentialStore>,
        ttl_minutes: i64,
    ) -> (SessionCache, Arc<MemoryKv>) {
        let kv = Arc::new(MemoryKv::new());
        let cache = SessionCache::new(kv.clone(), store.clone(), ttl_minutes);
        (cache, kv)
    }

    #[tokio::test]
    async fn test_save_then_load_roundtrip() {
        let (store, identity) = signed_in_store().await;
        let (cache, _kv) = cache_over(&store, 60);

        let saved = cache.save(&identity).await.unwrap();
        let loaded = cache.load().unwrap();

        assert_eq!(loaded.user, saved.user);
        assert_eq!(loaded.token.reveal(), saved.token.reveal());
        assert_eq!(loaded.expires_at, saved.expires_at);
    }

    #[tokio::test]
    async fn test_zero_ttl_entry_expires_immediately() {
        let (store, identity) = signed_in_store().await;
        let (cache, kv) = cache_over(&store, 0);

        cache.save(&identity).await.unwrap();

        assert!(cache.load().is_none());
        for key in keys::ALL {
            assert!(kv.get(key).unwrap().is_none(), "key {key} not cleared");
        }
    }

    #[tokio::test]
    async fn test_incomplete_entry_reads_as_signed_out() {
        let (store, identity) = signed_in_store().await;
        let (cache, kv) = cache_over(&store, 60);

        cache.save(&identity).await.unwrap();
        kv.remove(keys::EXPIRES_AT).unwrap();

        assert!(cache.load().is_none());
        // The surviving keys were also cleared.
        assert!(kv.get(keys::TOKEN).unwrap().is_none());
        assert!(kv.get(keys::USER).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_reads_as_signed_out() {
        let (store, identity) = signed_in_store().await;
        let (cache, kv) = cache_over(&store, 60);

        cache.save(&identity).await.unwrap();
        kv.set(keys::USER, "{not json").unwrap();

        assert!(cache.load().is_none());
        assert!(kv.get(keys::TOKEN).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_clear_on_empty_cache_is_safe() {
        let (store, _identity) = signed_in_store().await;
        let (cache, _kv) = cache_over(&store, 60);

        cache.clear();
        cache.clear();
        assert!(cache.load().is_none());
    }

    #[tokio::test]
    async fn test_save_mints_a_fresh_token_per_save() {
        let (store, identity) = signed_in_store().await;
        let (cache, _kv) = cache_over(&store, 60);

        let first = cache.save(&identity).await.unwrap();
        let second = cache.save(&identity).await.unwrap();

        assert_ne!(first.token.reveal(), second.token.reveal());
    }
}
