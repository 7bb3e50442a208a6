//! Durable string key-value storage.
//!
//! The session layer only needs three operations on string keys and values,
//! expressed by the `KeyValueStore` trait. Backends:
//! - `FileStore`: a single JSON document in the data directory
//! - `KeyringStore`: one OS keychain entry per key
//! - `MemoryStore`: process-local map

pub mod error;
pub mod file;
pub mod keychain;
pub mod memory;

use async_trait::async_trait;

pub use error::StorageError;
pub use file::FileStore;
pub use keychain::KeyringStore;
pub use memory::MemoryStore;

/// String-keyed, string-valued asynchronous storage.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Write `value` under `key`, replacing any previous value.
    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Read the value under `key`, or `None` if it was never set.
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Remove `key`. Removing a missing key succeeds.
    async fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}
