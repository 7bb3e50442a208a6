use thiserror::Error;

use crate::api::ApiError;
use crate::storage::StorageError;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Failed to access stored session: {0}")]
    Storage(#[from] StorageError),

    #[error("Not signed in")]
    NotAuthenticated,

    #[error("Profile update is for user {found}, but user {expected} is signed in")]
    IdentityMismatch { expected: String, found: String },

    #[error("Avatar is {size} bytes, larger than the {limit} byte limit")]
    AvatarTooLarge { size: usize, limit: usize },
}

impl SessionError {
    pub fn is_malformed_response(&self) -> bool {
        matches!(self, SessionError::Api(ApiError::MalformedResponse(_)))
    }

    /// Text suitable for showing to the user
    pub fn user_message(&self) -> String {
        match self {
            SessionError::Api(e) => e.user_message(),
            SessionError::AvatarTooLarge { limit, .. } => {
                format!("Choose an image of at most {} MB.", limit / (1024 * 1024))
            }
            other => other.to_string(),
        }
    }
}
