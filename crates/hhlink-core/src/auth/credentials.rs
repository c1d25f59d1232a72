use anyhow::{Context, Result};
use keyring::Entry;

const SERVICE_NAME: &str = "hhlink";

/// Client secrets kept in the OS keychain, one entry per client id.
pub struct CredentialStore;

impl CredentialStore {
    fn entry(client_id: &str) -> Result<Entry> {
        Entry::new(SERVICE_NAME, client_id)
            .with_context(|| format!("Failed to open keychain entry for {}", client_id))
    }

    pub fn store_client_secret(client_id: &str, secret: &str) -> Result<()> {
        Self::entry(client_id)?
            .set_password(secret)
            .context("Failed to store client secret in keychain")
    }

    /// The stored secret, or `None` when the keychain has no entry for `client_id`.
    pub fn get_client_secret(client_id: &str) -> Result<Option<String>> {
        match Self::entry(client_id)?.get_password() {
            Ok(secret) => Ok(Some(secret)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to read client secret from keychain"),
        }
    }

    /// Remove the stored secret. Removing a secret that is not there is not an error.
    pub fn delete_client_secret(client_id: &str) -> Result<()> {
        match Self::entry(client_id)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete client secret from keychain"),
        }
    }

    pub fn has_client_secret(client_id: &str) -> bool {
        matches!(Self::get_client_secret(client_id), Ok(Some(_)))
    }
}
