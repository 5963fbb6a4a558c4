//! Firebase-backed store implementations.
//!
//! # Architecture
//!
//! - [`FirebaseAuthClient`] speaks the Identity Toolkit REST API for
//!   credential operations and the Secure Token endpoint for refresh.
//!   One signed-in session at a time, held behind the client.
//! - [`FirestoreProfiles`] writes profile documents through the Firestore
//!   REST API, authorized with the ID token of the active session.
//!
//! Both clients are cheap to clone and share one `reqwest` connection pool
//! per instance.
//!
//! # Example
//!
//! ```rust,ignore
//! use studyhall_accounts::config::AccountsConfig;
//! use studyhall_accounts::store::{FirebaseAuthClient, FirestoreProfiles};
//!
//! let config = AccountsConfig::from_env()?;
//! let auth = FirebaseAuthClient::new(&config.firebase);
//! let profiles = FirestoreProfiles::new(&config.firebase, auth.clone());
//! ```

mod auth;
mod error;
mod profiles;
mod types;

pub use auth::FirebaseAuthClient;
pub use profiles::FirestoreProfiles;
