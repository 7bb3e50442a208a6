use std::sync::Arc;

use tracing::warn;

use crate::models::User;
use crate::storage::{KeyValueStore, StorageError};

/// Key holding the JSON-encoded `User`
pub const USER_KEY: &str = "@gymlog:user";

/// Key holding the raw session token
pub const TOKEN_KEY: &str = "@gymlog:token";

/// The persisted half of a session: one user record and one token.
///
/// `save` writes both keys and `clear` removes both. If the backing store
/// fails between the two writes the record is left partial; readers treat a
/// partial record as no session.
#[derive(Clone)]
pub struct CredentialStore {
    store: Arc<dyn KeyValueStore>,
}

impl CredentialStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Persist the user and token together
    pub async fn save(&self, user: &User, token: &str) -> Result<(), StorageError> {
        self.save_user(user).await?;
        self.store.set_item(TOKEN_KEY, token).await
    }

    /// Replace only the user record, leaving the token in place
    pub async fn save_user(&self, user: &User) -> Result<(), StorageError> {
        let encoded = serde_json::to_string(user)?;
        self.store.set_item(USER_KEY, &encoded).await
    }

    /// Stored user, or `None` when unset or unreadable
    pub async fn get_user(&self) -> Result<Option<User>, StorageError> {
        let Some(encoded) = self.store.get_item(USER_KEY).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&encoded) {
            Ok(user) => Ok(Some(user)),
            Err(e) => {
                warn!(error = %e, "Stored user record is unreadable, ignoring it");
                Ok(None)
            }
        }
    }

    pub async fn get_token(&self) -> Result<Option<String>, StorageError> {
        self.store.get_item(TOKEN_KEY).await
    }

    /// Remove both keys. Both removals are attempted; the first failure is returned.
    pub async fn clear(&self) -> Result<(), StorageError> {
        let user = self.store.remove_item(USER_KEY).await;
        let token = self.store.remove_item(TOKEN_KEY).await;
        user.and(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::test_support::FlakyStore;

    fn sample_user() -> User {
        User {
            id: "1".to_string(),
            name: "A".to_string(),
            email: "a@b.com".to_string(),
            avatar: Some("a.png".to_string()),
        }
    }

    #[tokio::test]
    async fn test_save_then_get() {
        let credentials = CredentialStore::new(Arc::new(MemoryStore::new()));

        credentials.save(&sample_user(), "tok1").await.unwrap();

        assert_eq!(credentials.get_user().await.unwrap(), Some(sample_user()));
        assert_eq!(credentials.get_token().await.unwrap().as_deref(), Some("tok1"));
    }

    #[tokio::test]
    async fn test_save_replaces_previous_session() {
        let credentials = CredentialStore::new(Arc::new(MemoryStore::new()));
        credentials.save(&sample_user(), "tok1").await.unwrap();

        let other = User {
            id: "2".to_string(),
            ..sample_user()
        };
        credentials.save(&other, "tok2").await.unwrap();

        assert_eq!(credentials.get_user().await.unwrap(), Some(other));
        assert_eq!(credentials.get_token().await.unwrap().as_deref(), Some("tok2"));
    }

    #[tokio::test]
    async fn test_clear_removes_both_and_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let credentials = CredentialStore::new(store.clone());
        credentials.save(&sample_user(), "tok1").await.unwrap();

        credentials.clear().await.unwrap();
        assert_eq!(credentials.get_user().await.unwrap(), None);
        assert_eq!(credentials.get_token().await.unwrap(), None);
        assert!(store.is_empty().await);

        credentials.clear().await.unwrap();
    }

    #[tokio::test]
    async fn test_unreadable_user_is_absent() {
        let store = Arc::new(MemoryStore::new());
        store.set_item(USER_KEY, "{\"name\":").await.unwrap();
        let credentials = CredentialStore::new(store);

        assert_eq!(credentials.get_user().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_save_user_keeps_token() {
        let credentials = CredentialStore::new(Arc::new(MemoryStore::new()));
        credentials.save(&sample_user(), "tok1").await.unwrap();

        credentials
            .save_user(&sample_user().with_name("B"))
            .await
            .unwrap();

        assert_eq!(credentials.get_user().await.unwrap().unwrap().name, "B");
        assert_eq!(credentials.get_token().await.unwrap().as_deref(), Some("tok1"));
    }

    #[tokio::test]
    async fn test_storage_failures_propagate() {
        let store = Arc::new(FlakyStore::default());
        let credentials = CredentialStore::new(store.clone());

        store.fail_set(true);
        assert!(credentials.save(&sample_user(), "tok1").await.is_err());

        store.fail_get(true);
        assert!(credentials.get_token().await.is_err());

        store.fail_remove(true);
        assert!(credentials.clear().await.is_err());
    }
}
