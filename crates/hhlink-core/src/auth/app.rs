use std::fmt;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};
use url::Url;

use crate::api::{ApiClient, ApiError};
use crate::config::AppConfig;

/// Path of the browser-facing authorization page on the OAuth host.
const AUTHORIZE_PATH: &str = "/oauth/authorize";

#[derive(Deserialize)]
struct AppTokenResponse {
    access_token: String,
}

/// The registered application's own credential.
///
/// Holds exactly one application token for its whole life. The token is
/// either supplied up front or obtained once with a `client_credentials`
/// grant during [`AppCredential::initialize`]. It is never renewed.
pub struct AppCredential {
    client_id: String,
    client_secret: String,
    user_agent: String,
    host: String,
    locale: String,
    oauth_base_url: Url,
    app_token: String,
    api: ApiClient,
}

impl AppCredential {
    /// Build the credential, exchanging client id and secret for an application
    /// token unless `existing_token` is given.
    pub async fn initialize(
        config: AppConfig,
        existing_token: Option<String>,
    ) -> Result<Self, ApiError> {
        let api = ApiClient::new(&config)?;

        let app_token = match existing_token {
            Some(token) => {
                debug!("Using supplied application token");
                token
            }
            None => Self::request_app_token(&api, &config).await?,
        };

        Ok(Self {
            client_id: config.client_id,
            client_secret: config.client_secret,
            user_agent: config.user_agent,
            host: config.host,
            locale: config.locale,
            oauth_base_url: config.oauth_base_url,
            app_token,
            api,
        })
    }

    async fn request_app_token(api: &ApiClient, config: &AppConfig) -> Result<String, ApiError> {
        let body = api
            .exchange_token(&[
                ("grant_type", "client_credentials"),
                ("client_id", config.client_id.as_str()),
                ("client_secret", config.client_secret.as_str()),
            ])
            .await?;

        let response: AppTokenResponse = serde_json::from_value(body)
            .map_err(|e| ApiError::Auth(format!("No access_token in token response: {}", e)))?;

        info!("Obtained application token");
        Ok(response.access_token)
    }

    /// Fetch the application's own profile using the application token.
    pub async fn fetch_app_info(&self) -> Result<Value, ApiError> {
        self.api
            .get_json("/me", &self.app_token, &self.api.site_params())
            .await
    }

    /// URL the end user opens to grant access. `state` is echoed back on the
    /// redirect so the callback can be matched to the request that started it.
    pub fn build_authorization_url(&self, state: Option<&str>) -> String {
        let mut url = self.oauth_base_url.clone();
        url.set_path(AUTHORIZE_PATH);
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.client_id);
        if let Some(state) = state {
            url.query_pairs_mut().append_pair("state", state);
        }
        url.into()
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub(crate) fn client_secret(&self) -> &str {
        &self.client_secret
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    pub fn app_token(&self) -> &str {
        &self.app_token
    }

    pub(crate) fn api(&self) -> &ApiClient {
        &self.api
    }
}

impl fmt::Debug for AppCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppCredential")
            .field("client_id", &self.client_id)
            .field("user_agent", &self.user_agent)
            .field("host", &self.host)
            .field("locale", &self.locale)
            .finish_non_exhaustive()
    }
}
