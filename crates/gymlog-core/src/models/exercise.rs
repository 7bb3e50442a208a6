use serde::{Deserialize, Serialize};

use super::string_or_number;

/// A catalog exercise from `/exercises`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exercise {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub series: u32,
    #[serde(default)]
    pub repetitions: u32,
    #[serde(default)]
    pub group: String,
    /// Demo animation file name, resolved with `ApiClient::demo_url`
    #[serde(default)]
    pub demo: String,
    /// Thumbnail file name, resolved with `ApiClient::thumb_url`
    #[serde(default)]
    pub thumb: String,
}

impl Exercise {
    /// e.g. "3 series x 12 repetitions"
    pub fn prescription(&self) -> String {
        format!("{} series x {} repetitions", self.series, self.repetitions)
    }
}

/// One logged exercise in the workout history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub group: String,
    /// Time of day the exercise was logged, as formatted by the server
    #[serde(default)]
    pub hour: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// History entries sharing a calendar day; `title` is the server's day label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryDay {
    pub title: String,
    #[serde(default)]
    pub data: Vec<HistoryEntry>,
}
