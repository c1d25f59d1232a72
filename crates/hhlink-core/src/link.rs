//! Resolve-or-create workflow tying sessions to the user store.
//!
//! Every entry point follows the same path: restore the stored session for
//! an email (or link a new one from an authorization code), make sure it is
//! fresh, persisting any renewal, then run the requested operation.

use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::api::ApiError;
use crate::auth::{AppCredential, UserSession};
use crate::store::{normalize_email, RecordUpdate, StoreError, UserRecord, UserStore};

#[derive(Error, Debug)]
pub enum LinkError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("No linked account for {0}; authorization required")]
    NotLinked(String),

    #[error("Session for {0} can no longer be renewed; authorization required")]
    ReauthorizationRequired(String),

    #[error("Authorized hh.ru account is registered to {actual}, not {expected}")]
    EmailMismatch { expected: String, actual: String },
}

impl LinkError {
    /// True when the only way forward is a new authorization code.
    pub fn needs_authorization(&self) -> bool {
        matches!(
            self,
            LinkError::NotLinked(_) | LinkError::ReauthorizationRequired(_)
        )
    }
}

/// Restore the stored session for `email`, renewing it first if it is about to expire.
pub async fn restore_session<'a, S: UserStore>(
    app: &'a AppCredential,
    store: &S,
    email: &str,
) -> Result<UserSession<'a>, LinkError> {
    let tokens = store
        .find_user(email)
        .await?
        .and_then(|record| record.tokens())
        .ok_or_else(|| LinkError::NotLinked(normalize_email(email)))?;

    let mut session = UserSession::from_persisted_state(app, tokens);
    ensure_fresh(&mut session, store, email).await?;
    Ok(session)
}

/// How many times a renewed triple is offered to the store before giving up.
const PERSIST_ATTEMPTS: u32 = 3;
const PERSIST_RETRY_DELAY: Duration = Duration::from_millis(200);

/// What [`ensure_fresh`] did to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Renewal {
    /// The access token was still fresh; nothing was sent.
    NotNeeded,
    /// Renewed and written back to the store.
    Persisted,
    /// Renewed, but the store never took the new triple. The session works
    /// for this run; the stored refresh token is already retired.
    Unsaved,
}

/// Renew `session` if needed and persist the new triple.
///
/// A rejected refresh token unlinks the stored record so the next run asks
/// for authorization instead of retrying a dead token. A store failure after
/// a successful renew does not fail the call: the session is returned renewed
/// and the outcome is [`Renewal::Unsaved`].
pub async fn ensure_fresh<S: UserStore>(
    session: &mut UserSession<'_>,
    store: &S,
    email: &str,
) -> Result<Renewal, LinkError> {
    if !session.tokens().needs_refresh() {
        return Ok(Renewal::NotNeeded);
    }

    info!(email, "Stored token expired, renewing");
    match session.renew().await {
        Ok(()) => Ok(persist_renewal(session, store, email).await),
        Err(ApiError::Auth(reason)) => {
            warn!(email, reason = %reason, "Refresh token rejected, unlinking");
            store.update_user(email, RecordUpdate::Unlink).await?;
            Err(LinkError::ReauthorizationRequired(normalize_email(email)))
        }
        Err(e) => Err(e.into()),
    }
}

// The platform retires the old refresh token on every renew, so the new
// triple is the only usable one and is worth a few attempts.
async fn persist_renewal<S: UserStore>(
    session: &UserSession<'_>,
    store: &S,
    email: &str,
) -> Renewal {
    for attempt in 1..=PERSIST_ATTEMPTS {
        match store
            .update_user(email, RecordUpdate::Tokens(session.to_persisted()))
            .await
        {
            Ok(true) => return Renewal::Persisted,
            Ok(false) => {
                warn!(email, "No stored record for renewed tokens; they will not be saved");
                return Renewal::Unsaved;
            }
            Err(e) => {
                warn!(email, attempt, error = %e, "Failed to persist renewed tokens");
                if attempt < PERSIST_ATTEMPTS {
                    sleep(PERSIST_RETRY_DELAY).await;
                }
            }
        }
    }
    error!(
        email,
        "Renewed tokens could not be stored; the account will need authorization on the next run"
    );
    Renewal::Unsaved
}

/// Exchange `code`, fetch the user's profile and store both under `email`.
pub async fn link_with_code<'a, S: UserStore>(
    app: &'a AppCredential,
    store: &S,
    email: &str,
    code: &str,
) -> Result<UserSession<'a>, LinkError> {
    let session = UserSession::from_authorization_code(app, code).await?;
    let profile = session.fetch_profile().await?;

    // The code may belong to any hh.ru account; only the one registered to
    // `email` may be stored under it.
    if let Some(profile_email) = profile.get("email").and_then(Value::as_str) {
        let actual = normalize_email(profile_email);
        if actual != normalize_email(email) {
            warn!(email, profile_email, "Authorized account belongs to another email, discarding");
            if let Err(e) = session.invalidate().await {
                warn!(error = %e, "Could not revoke the discarded session");
            }
            return Err(LinkError::EmailMismatch {
                expected: normalize_email(email),
                actual,
            });
        }
    }

    let update = RecordUpdate::Link {
        tokens: session.to_persisted(),
        profile,
    };
    if !store.update_user(email, update.clone()).await? {
        let mut record = UserRecord::pending(email);
        record.apply(update);
        store.insert_user(record).await?;
    }

    info!(email, "Account linked");
    Ok(session)
}

/// Revoke the session server-side and forget its tokens locally.
///
/// The stored tokens are dropped even if revocation fails.
pub async fn unlink<S: UserStore>(
    session: UserSession<'_>,
    store: &S,
    email: &str,
) -> Result<(), LinkError> {
    let revoked = session.invalidate().await;
    store.update_user(email, RecordUpdate::Unlink).await?;
    revoked.map_err(Into::into)
}
