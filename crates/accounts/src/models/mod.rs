//! Domain models for the accounts subsystem.

pub mod identity;
pub mod profile;
pub mod session;

pub use identity::Identity;
pub use profile::{ProfilePatch, ProfileRecord};
pub use session::{CachedUser, Session};
