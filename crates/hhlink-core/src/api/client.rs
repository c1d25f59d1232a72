//! HTTP transport for the hh.ru REST API.
//!
//! `ApiClient` owns the connection pool and the identification every request
//! carries (`HH-User-Agent`, locale, host). It knows nothing about token
//! lifecycles; callers pass the bearer token for each request.

use std::time::Duration;

use reqwest::{header, Client, Method, RequestBuilder, Response};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::config::AppConfig;

use super::ApiError;

/// Identification header required by hh.ru on every API call.
pub const USER_AGENT_HEADER: &str = "HH-User-Agent";

/// Token exchange and revocation endpoint.
const TOKEN_PATH: &str = "/token";

/// API client for hh.ru.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
    user_agent: String,
    locale: String,
    host: String,
}

impl ApiClient {
    /// Build a client with the configured per-request timeout.
    pub fn new(config: &AppConfig) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(config.user_agent.as_str())
            .build()?;

        Ok(Self {
            client,
            base_url: config.api_base_url.clone(),
            user_agent: config.user_agent.clone(),
            locale: config.locale.clone(),
            host: config.host.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.as_str().trim_end_matches('/'), path)
    }

    /// The `locale` and `host` query pair the platform uses to pick site and language.
    pub fn site_params(&self) -> [(&'static str, &str); 2] {
        [("locale", self.locale.as_str()), ("host", self.host.as_str())]
    }

    fn authorized(&self, method: Method, path: &str, token: &str) -> RequestBuilder {
        self.client
            .request(method, self.url(path))
            .bearer_auth(token)
            .header(USER_AGENT_HEADER, &self.user_agent)
    }

    /// POST a form-encoded grant to the token endpoint and return the decoded body.
    pub async fn exchange_token(&self, form: &[(&str, &str)]) -> Result<Value, ApiError> {
        let grant_type = form
            .iter()
            .find(|(key, _)| *key == "grant_type")
            .map(|(_, value)| *value)
            .unwrap_or("unknown");
        debug!(grant_type, "Sending token exchange");

        let response = self
            .client
            .post(self.url(TOKEN_PATH))
            .header(USER_AGENT_HEADER, &self.user_agent)
            .header(header::ACCEPT, "application/json")
            .form(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            warn!(grant_type, status = %status, "Token exchange rejected");
            return Err(ApiError::from_token_status(status, &body));
        }

        serde_json::from_str(&body)
            .map_err(|e| ApiError::Auth(format!("Malformed token response: {}", e)))
    }

    /// Revoke an access token server-side.
    pub async fn revoke_token(&self, access_token: &str) -> Result<(), ApiError> {
        let response = self
            .authorized(Method::DELETE, TOKEN_PATH, access_token)
            .send()
            .await?;
        Self::check_response(response).await?;
        Ok(())
    }

    /// Authenticated GET returning the decoded body as-is.
    pub async fn get_json<Q>(&self, path: &str, token: &str, query: &Q) -> Result<Value, ApiError>
    where
        Q: Serialize + ?Sized,
    {
        debug!(path, "GET");
        let response = self
            .authorized(Method::GET, path, token)
            .query(query)
            .send()
            .await?;
        let response = Self::check_response(response).await?;
        Self::read_json(response).await
    }

    /// Authenticated form POST. Returns the successful response for the caller to inspect.
    pub async fn post_form<Q, F>(
        &self,
        path: &str,
        token: &str,
        query: &Q,
        form: &F,
    ) -> Result<Response, ApiError>
    where
        Q: Serialize + ?Sized,
        F: Serialize + ?Sized,
    {
        debug!(path, "POST");
        let response = self
            .authorized(Method::POST, path, token)
            .query(query)
            .form(form)
            .send()
            .await?;
        Self::check_response(response).await
    }

    /// Check if response is successful, returning a classified error with body if not.
    async fn check_response(response: Response) -> Result<Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await?;
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn read_json(response: Response) -> Result<Value, ApiError> {
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse JSON: {}", e)))
    }
}
