//! Studyhall Accounts - account lifecycle and session management.
//!
//! This crate owns everything between "who is this user" and the managed
//! identity provider: registration, login, the local session cache,
//! profile display data, password management, and account deletion.
//!
//! # Architecture
//!
//! - [`manager::AccountManager`] is the single entry point the
//!   application shells call.
//! - [`store`] defines the [`CredentialStore`](store::CredentialStore)
//!   and [`ProfileStore`](store::ProfileStore) contracts, with Firebase
//!   production clients and in-process implementations for tests.
//! - [`session`] persists a small session snapshot across launches.
//!
//! # Example
//!
//! ```rust,ignore
//! use studyhall_accounts::config::AccountsConfig;
//! use studyhall_accounts::manager::AccountManager;
//!
//! let config = AccountsConfig::from_env()?;
//! let accounts = AccountManager::from_config(&config);
//!
//! let user = accounts.login("a@x.com", "hunter22").await?;
//! println!("hello {}", user.display_name.unwrap_or_default());
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod manager;
pub mod models;
pub mod session;
pub mod store;

pub use config::{AccountsConfig, ConfigError};
pub use error::AuthError;
pub use manager::{AccountManager, ProfileUpdate};
pub use models::{CachedUser, Identity, ProfilePatch, ProfileRecord, Session};
pub use session::SessionCache;
