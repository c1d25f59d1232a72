//! Authentication module for the application credential and user sessions.
//!
//! This module provides:
//! - `AppCredential`: the application's client-credentials identity
//! - `UserSession`: one user's OAuth session and the API calls made with it
//! - `TokenSet`: the persisted access/refresh/expiry triple
//! - `CredentialStore`: client secret storage in the OS keychain
//!
//! A session is Fresh until its expiry passes, and Expired after that until
//! `renew` succeeds. It is Revoked for good once `invalidate` consumes it or
//! `renew` reports the refresh token dead.

pub mod app;
pub mod credentials;
pub mod session;
pub mod tokens;

pub use app::AppCredential;
pub use credentials::CredentialStore;
pub use session::{ApplyOutcome, UserSession};
pub use tokens::{TokenSet, TokenValidity};
