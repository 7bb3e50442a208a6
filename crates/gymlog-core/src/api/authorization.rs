use std::sync::Arc;

use tokio::sync::watch;

/// Bearer token slot the `ApiClient` reads at send time.
///
/// Clones share the same slot. The session manager is the only writer in
/// normal use; anything else holding a clone sees the same token.
#[derive(Clone)]
pub struct SharedToken {
    inner: Arc<watch::Sender<Option<String>>>,
}

impl SharedToken {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { inner: Arc::new(tx) }
    }

    /// Replace the current token. `None` removes authorization.
    pub fn set(&self, token: Option<String>) {
        self.inner.send_replace(token);
    }

    pub fn get(&self) -> Option<String> {
        self.inner.borrow().clone()
    }

    pub fn is_set(&self) -> bool {
        self.inner.borrow().is_some()
    }
}

impl Default for SharedToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SharedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print the token itself
        f.debug_struct("SharedToken")
            .field("is_set", &self.is_set())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_slot() {
        let token = SharedToken::new();
        let other = token.clone();

        token.set(Some("tok1".to_string()));
        assert_eq!(other.get().as_deref(), Some("tok1"));

        other.set(None);
        assert!(!token.is_set());
    }

    #[test]
    fn test_debug_hides_token() {
        let token = SharedToken::new();
        token.set(Some("super-secret".to_string()));
        let printed = format!("{:?}", token);
        assert!(!printed.contains("super-secret"));
    }
}
