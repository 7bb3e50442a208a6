//! Data models for the gym API.
//!
//! - `User`: the signed-in account, persisted by the credential store
//! - `Exercise`: catalog entries grouped by muscle group
//! - `HistoryEntry`, `HistoryDay`: logged workouts grouped by day
//! - `SignUp`, `ProfileUpdate`: request bodies for account endpoints

pub mod exercise;
pub mod user;

pub use exercise::{Exercise, HistoryDay, HistoryEntry};
pub use user::{ProfileUpdate, SignUp, User};

use serde::{Deserialize, Deserializer};

/// Accept an identifier sent either as a JSON string or a JSON number.
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Number(n) => n.to_string(),
    })
}
