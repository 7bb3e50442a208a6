use async_trait::async_trait;
use keyring::Entry;
use tracing::debug;

use super::{KeyValueStore, StorageError};

/// Default keychain service name
pub const DEFAULT_SERVICE: &str = "gymlog";

/// Stores each key as its own OS keychain entry under one service name.
///
/// Backed by the macOS/iOS keychain, the Windows credential manager, or the
/// Linux kernel keyutils session keyring. Keychain calls block, so each one
/// runs on tokio's blocking pool.
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    /// Run `op` against the entry for `key` off the async runtime threads
    async fn with_entry<T, F>(&self, key: &str, op: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(Entry) -> Result<T, StorageError> + Send + 'static,
    {
        let service = self.service.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || op(Entry::new(&service, &key)?))
            .await
            .map_err(|e| StorageError::Backend(format!("Keychain task failed: {}", e)))?
    }
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new(DEFAULT_SERVICE)
    }
}

#[async_trait]
impl KeyValueStore for KeyringStore {
    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let value = value.to_string();
        self.with_entry(key, move |entry| Ok(entry.set_password(&value)?))
            .await?;
        debug!(key, service = %self.service, "Stored keychain entry");
        Ok(())
    }

    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.with_entry(key, |entry| match entry.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        })
        .await
    }

    async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.with_entry(key, |entry| match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        })
        .await
    }
}
