//! Persistence of linked users, keyed by email address.
//!
//! A [`UserRecord`] holds a user's token triple next to whatever profile
//! fields `/me` returned. A record without tokens is a pending link: the user
//! asked to link but has not come back from the authorization page yet.
//!
//! - `JsonFileStore`: one JSON document file, used by the CLI and server
//! - `MemoryStore`: process-local, for tests and throwaway servers

pub mod file;
pub mod memory;

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::auth::TokenSet;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

/// Keys the record owns itself; profile data never overwrites them.
const RESERVED_KEYS: [&str; 4] = ["email", "access_token", "refresh_token", "expires_at"];

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("User already exists: {0}")]
    Duplicate(String),

    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store data is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Absolute expiry of `access_token`, unix seconds.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "chrono::serde::ts_seconds_option"
    )]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub profile: Map<String, Value>,
}

/// Change applied by [`UserStore::update_user`].
#[derive(Debug, Clone)]
pub enum RecordUpdate {
    /// Replace the token triple after a renew.
    Tokens(TokenSet),
    /// Store a freshly exchanged triple and merge the user's profile.
    Link { tokens: TokenSet, profile: Value },
    /// Forget the tokens; the record goes back to pending.
    Unlink,
}

/// Emails are compared case-insensitively and without surrounding whitespace.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl UserRecord {
    /// A record for a user who has started, but not finished, linking.
    pub fn pending(email: &str) -> Self {
        Self {
            email: normalize_email(email),
            ..Default::default()
        }
    }

    /// The stored token triple, if all three parts are present.
    pub fn tokens(&self) -> Option<TokenSet> {
        match (&self.access_token, &self.refresh_token, self.expires_at) {
            (Some(access), Some(refresh), Some(expires_at)) => {
                Some(TokenSet::new(access.clone(), refresh.clone(), expires_at))
            }
            _ => None,
        }
    }

    pub fn is_linked(&self) -> bool {
        self.tokens().is_some()
    }

    fn set_tokens(&mut self, tokens: TokenSet) {
        self.access_token = Some(tokens.access_token);
        self.refresh_token = Some(tokens.refresh_token);
        self.expires_at = Some(tokens.expires_at);
    }

    fn merge_profile(&mut self, profile: Value) {
        if let Value::Object(fields) = profile {
            for (key, value) in fields {
                if !RESERVED_KEYS.contains(&key.as_str()) {
                    self.profile.insert(key, value);
                }
            }
        }
    }

    pub fn apply(&mut self, update: RecordUpdate) {
        match update {
            RecordUpdate::Tokens(tokens) => self.set_tokens(tokens),
            RecordUpdate::Link { tokens, profile } => {
                self.set_tokens(tokens);
                self.merge_profile(profile);
            }
            RecordUpdate::Unlink => {
                self.access_token = None;
                self.refresh_token = None;
                self.expires_at = None;
            }
        }
    }
}

/// Document store holding one [`UserRecord`] per email.
pub trait UserStore: Send + Sync + 'static {
    fn find_user(
        &self,
        email: &str,
    ) -> impl Future<Output = Result<Option<UserRecord>, StoreError>> + Send;

    /// Insert a new record. Fails with [`StoreError::Duplicate`] if the email is taken.
    fn insert_user(&self, record: UserRecord) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Apply `update` to the record for `email`. Returns `false` when no record matched.
    fn update_user(
        &self,
        email: &str,
        update: RecordUpdate,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;
}
