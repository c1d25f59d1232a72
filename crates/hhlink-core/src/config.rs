//! Application configuration management.
//!
//! The registered application's identity (client id and secret, the
//! `HH-User-Agent` string, host and locale) plus endpoint and store
//! locations. Configuration is read from `~/.config/hhlink/config.json`
//! and then overlaid with `HH_*` environment variables. A missing client
//! secret is looked up in the OS keychain.

use std::fmt;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::auth::CredentialStore;

/// Application name used for config/data directory paths
const APP_NAME: &str = "hhlink";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Default user store file name in the data directory
const STORE_FILE: &str = "users.json";

const DEFAULT_API_BASE_URL: &str = "https://api.hh.ru";
const DEFAULT_OAUTH_BASE_URL: &str = "https://hh.ru";

/// Per-request timeout applied to every call made by the API client.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub client_id: String,
    /// Never written back to the config file; keep it in the environment or the keychain.
    #[serde(skip_serializing)]
    pub client_secret: String,
    /// Sent as `HH-User-Agent`, e.g. `hhlink/0.1 (me@example.com)`.
    pub user_agent: String,
    pub host: String,
    pub locale: String,
    pub api_base_url: Url,
    pub oauth_base_url: Url,
    pub request_timeout_secs: u64,
    /// Pre-issued application token. Skips the client-credentials exchange.
    /// Read from the file if present but never written back.
    #[serde(skip_serializing)]
    pub app_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_path: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            user_agent: format!("{}/{}", APP_NAME, env!("CARGO_PKG_VERSION")),
            host: "hh.ru".to_string(),
            locale: "RU".to_string(),
            api_base_url: Url::parse(DEFAULT_API_BASE_URL).expect("valid default URL"),
            oauth_base_url: Url::parse(DEFAULT_OAUTH_BASE_URL).expect("valid default URL"),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            app_token: None,
            store_path: None,
        }
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |present: bool| if present { "<redacted>" } else { "<unset>" };
        f.debug_struct("AppConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &redact(!self.client_secret.is_empty()))
            .field("user_agent", &self.user_agent)
            .field("host", &self.host)
            .field("locale", &self.locale)
            .field("api_base_url", &self.api_base_url.as_str())
            .field("oauth_base_url", &self.oauth_base_url.as_str())
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("app_token", &redact(self.app_token.is_some()))
            .field("store_path", &self.store_path)
            .finish()
    }
}

impl AppConfig {
    /// Load the config file (if any), overlay the environment, then fall back
    /// to the keychain for the client secret.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents).context("Failed to parse config file")?
        } else {
            Self::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;

        if config.client_secret.is_empty() && !config.client_id.is_empty() {
            match CredentialStore::get_client_secret(&config.client_id) {
                Ok(Some(secret)) => config.client_secret = secret,
                Ok(None) => debug!("No client secret in keychain"),
                Err(e) => debug!(error = %e, "Keychain unavailable"),
            }
        }

        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Apply `HH_*` overrides from `lookup` (normally the process environment).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("HH_CLIENT_ID") {
            self.client_id = v;
        }
        if let Some(v) = lookup("HH_CLIENT_SECRET") {
            self.client_secret = v;
        }
        if let Some(v) = lookup("HH_USER_AGENT") {
            self.user_agent = v;
        }
        if let Some(v) = lookup("HH_HOST") {
            self.host = v;
        }
        if let Some(v) = lookup("HH_LOCALE") {
            self.locale = v;
        }
        if let Some(v) = lookup("HH_APP_TOKEN") {
            self.app_token = Some(v);
        }
        if let Some(v) = lookup("HH_STORE_PATH") {
            self.store_path = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("HH_API_BASE_URL") {
            self.api_base_url = Url::parse(&v).context("Invalid HH_API_BASE_URL")?;
        }
        if let Some(v) = lookup("HH_OAUTH_BASE_URL") {
            self.oauth_base_url = Url::parse(&v).context("Invalid HH_OAUTH_BASE_URL")?;
        }
        if let Some(v) = lookup("HH_REQUEST_TIMEOUT_SECS") {
            self.request_timeout_secs = v
                .parse()
                .context("HH_REQUEST_TIMEOUT_SECS must be a whole number of seconds")?;
        }
        Ok(())
    }

    /// Check that everything needed to talk to the token endpoint is present.
    pub fn validate(&self) -> Result<()> {
        if self.client_id.is_empty() {
            bail!("client_id is not configured (set HH_CLIENT_ID)");
        }
        if self.client_secret.is_empty() {
            bail!("client_secret is not configured (set HH_CLIENT_SECRET or run `hhlink secret set`)");
        }
        if self.user_agent.is_empty() {
            bail!("user_agent must not be empty");
        }
        if self.request_timeout_secs == 0 {
            bail!("request_timeout_secs must be greater than zero");
        }
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Location of the JSON user store.
    pub fn store_path(&self) -> Result<PathBuf> {
        if let Some(ref path) = self.store_path {
            return Ok(path.clone());
        }
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME).join(STORE_FILE))
    }
}
