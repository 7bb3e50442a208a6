//! Authentication module for managing the signed-in session.
//!
//! This module provides:
//! - `CredentialStore`: persists the user record and session token
//! - `SessionManager`: sign-in, sign-out, profile updates and restoring the
//!   session at launch
//!
//! Tokens carry no client-side expiry; a session ends only on sign-out.

pub mod credentials;
pub mod error;
pub mod session;

pub use credentials::CredentialStore;
pub use error::SessionError;
pub use session::{SessionManager, SessionState, MAX_AVATAR_BYTES};
