//! Browser-facing routes for linking an account.
//!
//! - `POST /checkmail` takes an email, records a pending link and redirects
//!   to the hh.ru authorization page with the email as `state`
//! - `GET /oauth` receives the redirect, checks `state` against the pending
//!   record and only then exchanges the code
//! - `GET /health` for liveness probes

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::api::ApiError;
use crate::auth::AppCredential;
use crate::link::{link_with_code, LinkError};
use crate::store::{normalize_email, StoreError, UserRecord, UserStore};

/// Error response body.
#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

/// Error type for the callback routes, rendered as JSON.
#[derive(Debug)]
pub struct WebError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl WebError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    fn unknown_state() -> Self {
        Self::bad_request("Unknown or already linked state")
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            code: self.code,
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<StoreError> for WebError {
    fn from(err: StoreError) -> Self {
        error!(error = %err, "User store error");
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_ERROR",
            "User store error",
        )
    }
}

impl From<LinkError> for WebError {
    fn from(err: LinkError) -> Self {
        match err {
            LinkError::Api(ApiError::Auth(reason)) => {
                warn!(reason = %reason, "Authorization code rejected");
                Self::new(
                    StatusCode::UNAUTHORIZED,
                    "UNAUTHORIZED",
                    "Authorization code was rejected; please start again",
                )
            }
            LinkError::Api(e) => {
                error!(error = %e, "Platform call failed during linking");
                Self::new(StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", "hh.ru is unavailable")
            }
            LinkError::Store(e) => e.into(),
            LinkError::EmailMismatch { expected, actual } => {
                warn!(expected = %expected, actual = %actual, "Callback for a different account");
                Self::bad_request("The hh.ru account you signed in with is registered to a different email")
            }
            LinkError::NotLinked(_) | LinkError::ReauthorizationRequired(_) => {
                Self::unknown_state()
            }
        }
    }
}

/// Shared state for the callback routes.
pub struct WebState<S> {
    app: Arc<AppCredential>,
    store: Arc<S>,
}

impl<S> Clone for WebState<S> {
    fn clone(&self) -> Self {
        Self {
            app: Arc::clone(&self.app),
            store: Arc::clone(&self.store),
        }
    }
}

/// Create the account-linking router.
pub fn callback_routes<S: UserStore>(app: Arc<AppCredential>, store: Arc<S>) -> Router {
    Router::new()
        .route("/checkmail", post(check_email::<S>))
        .route("/oauth", get(oauth_callback::<S>))
        .route("/health", get(health))
        .with_state(WebState { app, store })
}

#[derive(Deserialize)]
struct EmailForm {
    email: String,
}

async fn check_email<S: UserStore>(
    State(state): State<WebState<S>>,
    Form(form): Form<EmailForm>,
) -> Result<Response, WebError> {
    let email = normalize_email(&form.email);
    if email.is_empty() || !email.contains('@') {
        return Err(WebError::bad_request("A valid email address is required"));
    }

    match state.store.find_user(&email).await? {
        Some(record) if record.is_linked() => {
            return Ok((StatusCode::OK, "This account is already linked").into_response());
        }
        Some(_) => {}
        None => match state.store.insert_user(UserRecord::pending(&email)).await {
            // Lost a race with another request for the same email
            Ok(()) | Err(StoreError::Duplicate(_)) => {}
            Err(e) => return Err(e.into()),
        },
    }

    info!(email = %email, "Redirecting to authorization page");
    let url = state.app.build_authorization_url(Some(&email));
    Ok(Redirect::to(&url).into_response())
}

#[derive(Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

async fn oauth_callback<S: UserStore>(
    State(state): State<WebState<S>>,
    Query(params): Query<CallbackParams>,
) -> Result<Response, WebError> {
    if let Some(error) = params.error {
        warn!(error = %error, "Authorization denied by user or platform");
        return Err(WebError::bad_request(format!("Authorization failed: {}", error)));
    }

    let code = params
        .code
        .filter(|code| !code.is_empty())
        .ok_or_else(|| WebError::bad_request("Missing authorization code"))?;
    let email = params
        .state
        .map(|s| normalize_email(&s))
        .filter(|s| !s.is_empty())
        .ok_or_else(WebError::unknown_state)?;

    // Only a pending record may be completed; anything else never reaches the token endpoint.
    match state.store.find_user(&email).await? {
        Some(record) if !record.is_linked() => {}
        _ => {
            warn!(email = %email, "Callback with unknown state");
            return Err(WebError::unknown_state());
        }
    }

    link_with_code(&state.app, state.store.as_ref(), &email, &code).await?;
    Ok((StatusCode::OK, "Account linked. You can close this page.").into_response())
}

async fn health() -> &'static str {
    "ok"
}
