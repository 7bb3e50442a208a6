use serde::{Deserialize, Serialize};

use super::string_or_number;

/// An account as returned by the API and persisted between launches.
///
/// `id` never changes for the lifetime of an account; the remaining fields
/// are editable through profile updates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl User {
    /// Name to show in greetings, falling back to the email address
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.email
        } else {
            &self.name
        }
    }

    /// Copy of this user with a new name; identity is kept
    pub fn with_name(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }

    /// Copy of this user with a new avatar file name; identity is kept
    pub fn with_avatar(&self, avatar: impl Into<String>) -> Self {
        Self {
            avatar: Some(avatar.into()),
            ..self.clone()
        }
    }
}

/// Body for `POST /users`
#[derive(Debug, Clone, Serialize)]
pub struct SignUp {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Body for `PUT /users`
///
/// Password fields are only sent when the user is changing the password.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfileUpdate {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl ProfileUpdate {
    pub fn rename(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}
