//! API client for the gym REST API.
//!
//! This module provides the `ApiClient` struct for signing in, managing the
//! account profile and reading/writing exercises and workout history.

use std::path::Path;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::{Client, ClientBuilder, Method, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

use crate::config::Config;
use crate::models::{Exercise, HistoryDay, ProfileUpdate, SignUp, User};

use super::{ApiError, SharedToken};

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds when none is configured
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Multipart field the avatar endpoint reads the upload from
const AVATAR_FIELD: &str = "avatar";

/// Reply from `POST /sessions`.
///
/// Both fields are optional here so the session manager can tell a missing
/// field apart from a transport failure.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionResponse {
    pub user: Option<User>,
    pub token: Option<String>,
}

#[derive(Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

/// Reply from `PATCH /users/avatar`; only the stored file name is used
#[derive(Deserialize)]
struct AvatarResponse {
    avatar: Option<String>,
}

#[derive(Serialize)]
struct LogExercise<'a> {
    exercise_id: &'a str,
}

/// API client for the gym backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling,
/// and clones share the same authorization slot.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: SharedToken,
}

impl ApiClient {
    /// Create a client for `base_url` with the default timeout
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        Self::with_timeout(base_url, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        Self::with_timeout(
            &config.api_url,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        Self::from_builder(base_url, Client::builder().timeout(timeout))
    }

    /// Create a client from a caller-tuned `ClientBuilder`
    pub fn from_builder(base_url: &str, builder: ClientBuilder) -> Result<Self, ApiError> {
        let client = builder.build().map_err(ApiError::Client)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: SharedToken::new(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn authorization(&self) -> &SharedToken {
        &self.token
    }

    /// Set or clear the bearer token for requests sent from now on.
    /// Requests already sent keep the header they were built with.
    pub fn set_authorization(&self, token: Option<String>) {
        self.token.set(token);
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn build(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.client.request(method, self.url(path));
        match self.token.get() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Send the request, turning any non-2xx reply into an `ApiError`
    async fn execute(builder: RequestBuilder) -> Result<Response, ApiError> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let body = response.text().await.unwrap_or_default();
            debug!(%status, "Request rejected");
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn decode<T: DeserializeOwned>(response: Response, path: &str) -> Result<T, ApiError> {
        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| ApiError::MalformedResponse(format!("{}: {}", path, e)))
    }

    /// Perform a request and decode its JSON reply
    pub async fn request<T, B>(&self, method: Method, path: &str, body: Option<&B>) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        debug!(%method, path, "API request");
        let mut builder = self.build(method, path);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        let response = Self::execute(builder).await?;
        Self::decode(response, path).await
    }

    /// Perform a request whose reply body is ignored
    pub async fn send<B>(&self, method: Method, path: &str, body: Option<&B>) -> Result<(), ApiError>
    where
        B: Serialize + ?Sized,
    {
        debug!(%method, path, "API request");
        let mut builder = self.build(method, path);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        Self::execute(builder).await?;
        Ok(())
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.request::<T, ()>(Method::GET, path, None).await
    }

    // ===== Account =====

    /// Exchange credentials for a user and a session token
    pub async fn create_session(&self, email: &str, password: &str) -> Result<SessionResponse, ApiError> {
        let body = Credentials { email, password };
        self.request(Method::POST, "/sessions", Some(&body)).await
    }

    /// Register a new account
    pub async fn create_user(&self, sign_up: &SignUp) -> Result<(), ApiError> {
        self.send(Method::POST, "/users", Some(sign_up)).await
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<(), ApiError> {
        self.send(Method::PUT, "/users", Some(update)).await
    }

    /// Upload a new avatar image and return the file name the server stored it under
    pub async fn upload_avatar(&self, file_name: &str, bytes: Vec<u8>) -> Result<String, ApiError> {
        let part = Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(image_mime(file_name))
            .map_err(ApiError::Client)?;
        let form = Form::new().part(AVATAR_FIELD, part);

        debug!(file_name, "Uploading avatar");
        let builder = self.build(Method::PATCH, "/users/avatar").multipart(form);
        let response = Self::execute(builder).await?;
        let reply: AvatarResponse = Self::decode(response, "/users/avatar").await?;
        reply
            .avatar
            .filter(|avatar| !avatar.is_empty())
            .ok_or_else(|| ApiError::MalformedResponse("avatar response has no avatar".to_string()))
    }

    // ===== Exercises =====

    /// Muscle groups the catalog is organized by
    pub async fn fetch_groups(&self) -> Result<Vec<String>, ApiError> {
        self.get("/groups").await
    }

    pub async fn fetch_exercises_by_group(&self, group: &str) -> Result<Vec<Exercise>, ApiError> {
        self.get(&format!("/exercises/bygroup/{}", group)).await
    }

    pub async fn fetch_exercise(&self, id: &str) -> Result<Exercise, ApiError> {
        self.get(&format!("/exercises/{}", id)).await
    }

    // ===== History =====

    /// Record that the signed-in user completed an exercise
    pub async fn log_exercise(&self, exercise_id: &str) -> Result<(), ApiError> {
        let body = LogExercise { exercise_id };
        self.send(Method::POST, "/history", Some(&body)).await
    }

    /// Workout history grouped by day, most recent first
    pub async fn fetch_history(&self) -> Result<Vec<HistoryDay>, ApiError> {
        self.get("/history").await
    }

    // ===== Static assets =====

    pub fn avatar_url(&self, avatar: &str) -> String {
        self.url(&format!("/avatar/{}", avatar))
    }

    pub fn thumb_url(&self, thumb: &str) -> String {
        self.url(&format!("/exercise/thumb/{}", thumb))
    }

    pub fn demo_url(&self, demo: &str) -> String {
        self.url(&format!("/exercise/demo/{}", demo))
    }
}

/// Content type for an uploaded image, from its extension
fn image_mime(file_name: &str) -> &'static str {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match extension.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("heic") => "image/heic",
        _ => "application/octet-stream",
    }
}
