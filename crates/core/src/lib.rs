//! Studyhall Core - Shared types library.
//!
//! This crate provides common types used across all Studyhall components:
//! - `accounts` - Account lifecycle and session management
//! - application shells (web, desktop) that embed the accounts subsystem
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no network clients. This
//! keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, emails, and session tokens

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
