use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::ApiError;

/// Renew this long before the platform would start rejecting the token.
const TOKEN_REFRESH_BUFFER_SECS: i64 = 60;

/// Whether a held access token can still be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenValidity {
    Fresh,
    Expired,
}

/// A matched access/refresh pair and the absolute instant the access token expires.
///
/// `expires_at` is persisted as unix seconds. It is always absolute, never a
/// remaining lifetime.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub expires_at: DateTime<Utc>,
}

/// Body of a successful `authorization_code` or `refresh_token` grant.
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
}

impl TokenSet {
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            expires_at,
        }
    }

    /// Build from a token endpoint response received at `received_at`.
    pub(crate) fn from_grant_response(body: Value, received_at: DateTime<Utc>) -> Result<Self, ApiError> {
        let response: TokenResponse = serde_json::from_value(body)
            .map_err(|e| ApiError::Auth(format!("Incomplete token response: {}", e)))?;
        if response.expires_in < 0 {
            return Err(ApiError::Auth(format!(
                "Token response has negative expires_in ({})",
                response.expires_in
            )));
        }
        Ok(Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            expires_at: received_at + Duration::seconds(response.expires_in),
        })
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Check if the token will expire soon and should be renewed
    pub fn needs_refresh(&self) -> bool {
        Utc::now() + Duration::seconds(TOKEN_REFRESH_BUFFER_SECS) >= self.expires_at
    }

    pub fn time_until_expiry(&self) -> Duration {
        self.expires_at - Utc::now()
    }

    pub fn validity(&self) -> TokenValidity {
        if self.is_expired() {
            TokenValidity::Expired
        } else {
            TokenValidity::Fresh
        }
    }
}

impl fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSet")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
