//! REST client for the gym API.
//!
//! `ApiClient` issues requests against a configured base URL and attaches
//! `Authorization: Bearer <token>` whenever its `SharedToken` holds one.
//! Non-2xx responses are normalized into `ApiError`.

pub mod authorization;
pub mod client;
pub mod error;

pub use authorization::SharedToken;
pub use client::{ApiClient, SessionResponse};
pub use error::ApiError;
