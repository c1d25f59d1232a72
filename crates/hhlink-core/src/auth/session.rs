use std::fmt;

use chrono::Utc;
use serde_json::Value;
use tracing::{info, warn};

use crate::api::ApiError;

use super::app::AppCredential;
use super::tokens::{TokenSet, TokenValidity};

/// Result of submitting an application to a vacancy.
#[derive(Debug, Clone, PartialEq)]
pub enum ApplyOutcome {
    Accepted,
    /// The platform refused the application (already applied, vacancy archived,
    /// resume not eligible, ...). Carries the platform's error body.
    Rejected(Value),
}

impl ApplyOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, ApplyOutcome::Accepted)
    }

    /// Turn a rejection into [`ApiError::PolicyRejection`].
    pub fn into_result(self) -> Result<(), ApiError> {
        match self {
            ApplyOutcome::Accepted => Ok(()),
            ApplyOutcome::Rejected(reason) => Err(ApiError::PolicyRejection(reason)),
        }
    }
}

/// One end user's OAuth session.
///
/// Expiry is never checked before a call; compare [`UserSession::validity`]
/// and call [`UserSession::renew`] before using a restored session.
pub struct UserSession<'a> {
    app: &'a AppCredential,
    tokens: TokenSet,
}

impl<'a> UserSession<'a> {
    /// Exchange a one-time authorization code for a token pair.
    pub async fn from_authorization_code(
        app: &'a AppCredential,
        code: &str,
    ) -> Result<Self, ApiError> {
        let body = app
            .api()
            .exchange_token(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("client_id", app.client_id()),
                ("client_secret", app.client_secret()),
            ])
            .await?;

        let tokens = TokenSet::from_grant_response(body, Utc::now())?;
        info!(expires_at = %tokens.expires_at, "Authorization code exchanged");
        Ok(Self { app, tokens })
    }

    /// Rehydrate a previously persisted session. No network call, no expiry check.
    pub fn from_persisted_state(app: &'a AppCredential, persisted: TokenSet) -> Self {
        Self {
            app,
            tokens: persisted,
        }
    }

    /// Trade the refresh token for a new pair.
    ///
    /// On failure the session is left exactly as it was. An [`ApiError::Auth`]
    /// here means the refresh token is dead and the user has to authorize again.
    pub async fn renew(&mut self) -> Result<(), ApiError> {
        let body = self
            .app
            .api()
            .exchange_token(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", self.tokens.refresh_token.as_str()),
            ])
            .await?;

        let renewed = TokenSet::from_grant_response(body, Utc::now())?;
        info!(expires_at = %renewed.expires_at, "Session renewed");
        self.tokens = renewed;
        Ok(())
    }

    /// Revoke the access token server-side. The session is consumed either way.
    pub async fn invalidate(self) -> Result<(), ApiError> {
        self.app
            .api()
            .revoke_token(&self.tokens.access_token)
            .await
            .inspect_err(|e| warn!(error = %e, "Token revocation failed"))?;
        info!("Session invalidated");
        Ok(())
    }

    // ===== Data Fetching Methods =====

    /// The authenticated user's profile (`/me`).
    pub async fn fetch_profile(&self) -> Result<Value, ApiError> {
        let api = self.app.api();
        api.get_json("/me", self.access_token(), &api.site_params())
            .await
    }

    pub async fn fetch_resumes(&self) -> Result<Value, ApiError> {
        let api = self.app.api();
        api.get_json("/resumes/mine", self.access_token(), &api.site_params())
            .await
    }

    /// Vacancies similar to a resume. `filter` is passed through as query parameters.
    pub async fn search_similar_vacancies(
        &self,
        resume_id: &str,
        filter: &[(String, String)],
    ) -> Result<Value, ApiError> {
        let path = format!("/resumes/{}/similar_vacancies", resume_id);
        self.app
            .api()
            .get_json(&path, self.access_token(), filter)
            .await
    }

    pub async fn fetch_negotiations(&self, filter: &[(String, String)]) -> Result<Value, ApiError> {
        self.app
            .api()
            .get_json("/negotiations", self.access_token(), filter)
            .await
    }

    pub async fn fetch_negotiation_messages(
        &self,
        negotiation_id: &str,
        text_only: bool,
    ) -> Result<Value, ApiError> {
        let api = self.app.api();
        let [locale, host] = api.site_params();
        let text_only = if text_only { "true" } else { "false" };
        let query = [locale, host, ("with_text_only", text_only)];

        let path = format!("/negotiations/{}/messages", negotiation_id);
        api.get_json(&path, self.access_token(), &query).await
    }

    /// Apply to a vacancy with one of the user's resumes.
    ///
    /// A business refusal comes back as [`ApplyOutcome::Rejected`]. Token
    /// problems stay [`ApiError::Auth`] so callers know a renew may help.
    pub async fn apply_to_vacancy(
        &self,
        resume_id: &str,
        vacancy_id: &str,
        message: &str,
    ) -> Result<ApplyOutcome, ApiError> {
        let api = self.app.api();
        let form = [
            ("resume_id", resume_id),
            ("vacancy_id", vacancy_id),
            ("message", message),
        ];

        match api
            .post_form("/negotiations", self.access_token(), &api.site_params(), &form)
            .await
        {
            Ok(_) => {
                info!(vacancy_id, "Application accepted");
                Ok(ApplyOutcome::Accepted)
            }
            Err(ApiError::PolicyRejection(reason)) => {
                warn!(vacancy_id, reason = %reason, "Application rejected");
                Ok(ApplyOutcome::Rejected(reason))
            }
            Err(e) => Err(e),
        }
    }

    pub fn tokens(&self) -> &TokenSet {
        &self.tokens
    }

    pub fn access_token(&self) -> &str {
        &self.tokens.access_token
    }

    pub fn validity(&self) -> TokenValidity {
        self.tokens.validity()
    }

    pub fn is_expired(&self) -> bool {
        self.tokens.is_expired()
    }

    /// The triple to hand back to a store.
    pub fn to_persisted(&self) -> TokenSet {
        self.tokens.clone()
    }
}

impl fmt::Debug for UserSession<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserSession")
            .field("client_id", &self.app.client_id())
            .field("tokens", &self.tokens)
            .finish()
    }
}
