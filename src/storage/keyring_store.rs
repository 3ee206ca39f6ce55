use keyring::Entry;

use super::{non_empty, TokenStore, TOKEN_KEY};
use crate::error::Result;

/// Token storage backed by the user's keyring.
///
/// Our token lives in a single entry: the configured service, with
/// [`TOKEN_KEY`] as the account name.
#[derive(Debug, Clone)]
pub struct KeyringTokenStore {
    service: String,
}

impl KeyringTokenStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    fn entry(&self) -> Result<Entry> {
        Ok(Entry::new(&self.service, TOKEN_KEY)?)
    }

    /// Persist a new token, replacing whatever was there.
    /// The client itself never writes; this is for whoever logs the user in.
    pub fn store(&self, token: &str) -> Result<()> {
        self.entry()?.set_password(token)?;
        Ok(())
    }

    /// Remove the stored token. Clearing an already empty store is fine.
    pub fn clear(&self) -> Result<()> {
        match self.entry()?.delete_password() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

impl TokenStore for KeyringTokenStore {
    fn token(&self) -> Result<Option<String>> {
        // Not having an entry yet is the ordinary "logged out" state.
        match self.entry()?.get_password() {
            Ok(token) => Ok(non_empty(token)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}
