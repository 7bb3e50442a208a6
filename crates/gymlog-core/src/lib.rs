//! Core library for gymlog.
//!
//! Provides the pieces a gymlog client is built from:
//!
//! - `storage`: string key-value persistence (file, OS keychain, memory)
//! - `auth`: the credential store and the session manager
//! - `api`: REST client for the gym API with error normalization
//! - `models`: users, exercises and workout history
//! - `config`: on-disk client configuration

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod storage;

#[cfg(test)]
mod test_support;

pub use api::{ApiClient, ApiError, SharedToken};
pub use auth::{CredentialStore, SessionError, SessionManager, SessionState};
pub use config::{Config, StorageBackend};
pub use models::{Exercise, HistoryDay, HistoryEntry, ProfileUpdate, SignUp, User};
pub use storage::{FileStore, KeyValueStore, KeyringStore, MemoryStore, StorageError};
