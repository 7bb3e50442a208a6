use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    /// No response reached us: connect failure, timeout, dropped body
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The server rejected the request with a `{ "message": ... }` payload
    #[error("{message}")]
    Api { status: StatusCode, message: String },

    #[error("Unexpected response (status {status}): {body}")]
    Unknown { status: StatusCode, body: String },

    /// Success status, but the body is not what the endpoint promises
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// The request could not be set up; nothing was sent
    #[error("HTTP client setup failed: {0}")]
    Client(#[source] reqwest::Error),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Message shown when the server gave no usable explanation
const GENERIC_MESSAGE: &str = "Something went wrong. Please try again later.";

#[derive(Deserialize)]
struct ErrorPayload {
    message: String,
}

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            return body.to_string();
        }
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
    }

    /// Classify a non-2xx response
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        match serde_json::from_str::<ErrorPayload>(body) {
            Ok(payload) => ApiError::Api {
                status,
                message: payload.message,
            },
            Err(_) => ApiError::Unknown {
                status,
                body: Self::truncate_body(body),
            },
        }
    }

    /// Text suitable for showing to the user: the server's own message for
    /// application errors, a generic sentence for everything else.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Api { message, .. } => message.clone(),
            _ => GENERIC_MESSAGE.to_string(),
        }
    }
}
