use anyhow::{Context, Result};
use keyring::Entry;

use super::session::CredentialPair;
use super::store::TokenStore;

const SERVICE_NAME: &str = "pneumocare";

/// Keychain account holding the serialized token pair
const TOKEN_ACCOUNT: &str = "authTokens";

/// Stores the token pair in the OS keychain as one JSON secret.
/// A single `set_password` call replaces the whole record.
pub struct KeyringTokenStore {
    service: String,
    account: String,
}

impl KeyringTokenStore {
    pub fn new() -> Self {
        Self::with_names(SERVICE_NAME, TOKEN_ACCOUNT)
    }

    pub fn with_names(service: &str, account: &str) -> Self {
        Self {
            service: service.to_string(),
            account: account.to_string(),
        }
    }

    fn entry(&self) -> Result<Entry> {
        Entry::new(&self.service, &self.account).context("Failed to create keyring entry")
    }
}

impl Default for KeyringTokenStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenStore for KeyringTokenStore {
    fn load(&self) -> Result<Option<CredentialPair>> {
        let secret = match self.entry()?.get_password() {
            Ok(secret) => secret,
            Err(keyring::Error::NoEntry) => return Ok(None),
            Err(e) => return Err(e).context("Failed to retrieve tokens from keychain"),
        };
        let pair = serde_json::from_str(&secret).context("Failed to parse tokens from keychain")?;
        Ok(Some(pair))
    }

    fn save(&self, pair: &CredentialPair) -> Result<()> {
        let secret = serde_json::to_string(pair)?;
        self.entry()?
            .set_password(&secret)
            .context("Failed to store tokens in keychain")?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete tokens from keychain"),
        }
    }
}
