//! Session lifecycle: restore at launch, sign-in, sign-out, profile edits.
//!
//! `SessionManager` owns the in-memory session and keeps three things in
//! agreement: the published `SessionState`, the persisted record in the
//! `CredentialStore`, and the bearer token the `ApiClient` sends. The client
//! carries a token exactly when the state is `Authenticated`.
//!
//! Operations run one at a time behind a single async mutex, and the first
//! operation on a fresh manager restores the persisted session before doing
//! anything else.

use tokio::sync::{watch, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::api::{ApiClient, ApiError};
use crate::models::{ProfileUpdate, SignUp, User};
use crate::storage::StorageError;

use super::{CredentialStore, SessionError};

/// Largest avatar upload accepted, in bytes (3 MiB)
pub const MAX_AVATAR_BYTES: usize = 3 * 1024 * 1024;

#[derive(Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Persisted session not read yet
    Unknown,
    Anonymous,
    Authenticated { user: User, token: String },
}

impl SessionState {
    pub fn user(&self) -> Option<&User> {
        match self {
            SessionState::Authenticated { user, .. } => Some(user),
            _ => None,
        }
    }

    pub fn token(&self) -> Option<&str> {
        match self {
            SessionState::Authenticated { token, .. } => Some(token),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated { .. })
    }
}

impl std::fmt::Debug for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Unknown => write!(f, "Unknown"),
            SessionState::Anonymous => write!(f, "Anonymous"),
            SessionState::Authenticated { user, .. } => f
                .debug_struct("Authenticated")
                .field("user", user)
                .field("token", &"<redacted>")
                .finish(),
        }
    }
}

pub struct SessionManager {
    api: ApiClient,
    credentials: CredentialStore,
    state: watch::Sender<SessionState>,
    op_lock: Mutex<()>,
}

impl SessionManager {
    pub fn new(api: ApiClient, credentials: CredentialStore) -> Self {
        api.set_authorization(None);
        let (state, _rx) = watch::channel(SessionState::Unknown);
        Self {
            api,
            credentials,
            state,
            op_lock: Mutex::new(()),
        }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn current_user(&self) -> Option<User> {
        self.state.borrow().user().cloned()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    /// True until the persisted session has been read
    pub fn is_loading(&self) -> bool {
        matches!(*self.state.borrow(), SessionState::Unknown)
    }

    /// Receive every state change from now on
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Full URL of the signed-in user's avatar, if they have one
    pub fn avatar_url(&self) -> Option<String> {
        self.current_user()
            .and_then(|u| u.avatar)
            .map(|avatar| self.api.avatar_url(&avatar))
    }

    // ===== State transitions =====

    fn commit_authenticated(&self, user: User, token: String) {
        self.api.set_authorization(Some(token.clone()));
        self.state.send_replace(SessionState::Authenticated { user, token });
    }

    fn commit_anonymous(&self) {
        self.api.set_authorization(None);
        self.state.send_replace(SessionState::Anonymous);
    }

    /// Take the operation lock, restoring the persisted session first if
    /// nothing has done so yet.
    async fn begin(&self) -> MutexGuard<'_, ()> {
        let guard = self.op_lock.lock().await;
        if let Err(e) = self.rehydrate_locked().await {
            debug!(error = %e, "Continuing without a restored session");
        }
        guard
    }

    // ===== Rehydration =====

    /// Restore the persisted session. Runs once per manager; later calls
    /// return the current state without touching storage.
    ///
    /// On a storage failure the state still settles on `Anonymous` and the
    /// error is returned.
    pub async fn rehydrate(&self) -> Result<SessionState, SessionError> {
        let _guard = self.op_lock.lock().await;
        self.rehydrate_locked().await
    }

    async fn rehydrate_locked(&self) -> Result<SessionState, SessionError> {
        if !self.is_loading() {
            return Ok(self.state());
        }

        match self.load_persisted().await {
            Ok(Some((user, token))) => {
                info!(user_id = %user.id, "Restored session");
                self.commit_authenticated(user, token);
            }
            Ok(None) => {
                debug!("No stored session");
                self.commit_anonymous();
            }
            Err(e) => {
                warn!(error = %e, "Failed to read stored session");
                self.commit_anonymous();
                return Err(e.into());
            }
        }
        Ok(self.state())
    }

    async fn load_persisted(&self) -> Result<Option<(User, String)>, StorageError> {
        let user = self.credentials.get_user().await?;
        let token = self.credentials.get_token().await?;

        match (user, token) {
            (Some(user), Some(token)) => Ok(Some((user, token))),
            (None, None) => Ok(None),
            (user, token) => {
                warn!(
                    has_user = user.is_some(),
                    has_token = token.is_some(),
                    "Discarding partial stored session"
                );
                if let Err(e) = self.credentials.clear().await {
                    warn!(error = %e, "Failed to purge partial stored session");
                }
                Ok(None)
            }
        }
    }

    // ===== Sign-in / sign-up / sign-out =====

    /// Exchange credentials for a session, persist it and start sending its token.
    ///
    /// On any failure the previous state is kept and nothing new is persisted.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<User, SessionError> {
        let _guard = self.begin().await;
        self.sign_in_locked(email, password).await
    }

    async fn sign_in_locked(&self, email: &str, password: &str) -> Result<User, SessionError> {
        let response = self.api.create_session(email, password).await?;

        let (user, token) = match (response.user, response.token) {
            (Some(user), Some(token)) if !token.is_empty() => (user, token),
            (user, token) => {
                warn!(
                    has_user = user.is_some(),
                    has_token = token.is_some(),
                    "Session response is incomplete"
                );
                return Err(ApiError::MalformedResponse(
                    "session response must contain both user and token".to_string(),
                )
                .into());
            }
        };

        if let Err(e) = self.credentials.save(&user, &token).await {
            self.restore_persisted().await;
            return Err(e.into());
        }

        info!(user_id = %user.id, "Signed in");
        self.commit_authenticated(user.clone(), token);
        Ok(user)
    }

    /// Put storage back in line with the in-memory state after a failed save
    async fn restore_persisted(&self) {
        let result = match self.state() {
            SessionState::Authenticated { user, token } => self.credentials.save(&user, &token).await,
            _ => self.credentials.clear().await,
        };
        if let Err(e) = result {
            warn!(error = %e, "Failed to restore stored session after a failed save");
        }
    }

    /// Create an account, then sign in with the same credentials
    pub async fn sign_up(&self, sign_up: &SignUp) -> Result<User, SessionError> {
        let _guard = self.begin().await;
        self.api.create_user(sign_up).await?;
        info!("Account created");
        self.sign_in_locked(&sign_up.email, &sign_up.password).await
    }

    /// End the session.
    ///
    /// The in-memory state and the client's token are dropped before storage
    /// is cleared, so a storage failure is returned with the manager already
    /// `Anonymous`.
    pub async fn sign_out(&self) -> Result<(), SessionError> {
        let _guard = self.begin().await;
        self.commit_anonymous();
        info!("Signed out");
        self.credentials.clear().await?;
        Ok(())
    }

    // ===== Profile =====

    /// Replace the signed-in user's record. The token is unchanged.
    ///
    /// The new record is persisted first and only then published, so a
    /// storage failure leaves the previous user in place.
    pub async fn update_profile(&self, updated: User) -> Result<User, SessionError> {
        let _guard = self.begin().await;
        self.update_profile_locked(updated).await
    }

    async fn update_profile_locked(&self, updated: User) -> Result<User, SessionError> {
        let (current, token) = match self.state() {
            SessionState::Authenticated { user, token } => (user, token),
            _ => return Err(SessionError::NotAuthenticated),
        };
        if current.id != updated.id {
            return Err(SessionError::IdentityMismatch {
                expected: current.id,
                found: updated.id,
            });
        }

        self.credentials.save_user(&updated).await?;
        debug!(user_id = %updated.id, "Profile updated");
        self.state.send_replace(SessionState::Authenticated {
            user: updated.clone(),
            token,
        });
        Ok(updated)
    }

    /// Send a profile change to the server, then apply the new name locally
    pub async fn save_profile(&self, update: &ProfileUpdate) -> Result<User, SessionError> {
        let _guard = self.begin().await;
        let current = self.current_user().ok_or(SessionError::NotAuthenticated)?;
        self.api.update_profile(update).await?;
        self.update_profile_locked(current.with_name(update.name.clone()))
            .await
    }

    /// Upload a new avatar image and record the stored file name on the user
    pub async fn update_avatar(&self, file_name: &str, bytes: Vec<u8>) -> Result<User, SessionError> {
        if bytes.len() > MAX_AVATAR_BYTES {
            return Err(SessionError::AvatarTooLarge {
                size: bytes.len(),
                limit: MAX_AVATAR_BYTES,
            });
        }

        let _guard = self.begin().await;
        let current = self.current_user().ok_or(SessionError::NotAuthenticated)?;
        let avatar = self.api.upload_avatar(file_name, bytes).await?;
        self.update_profile_locked(current.with_avatar(avatar)).await
    }
}
