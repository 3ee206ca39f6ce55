use parking_lot::RwLock;

use super::{non_empty, TokenStore};
use crate::error::Result;

/// Token storage that only lives as long as the process.
///
/// Handy for embedding the client somewhere that manages its own session,
/// and for tests.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: RwLock<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(Some(token.into())),
        }
    }

    pub fn set(&self, token: impl Into<String>) {
        *self.token.write() = Some(token.into());
    }

    pub fn clear(&self) {
        *self.token.write() = None;
    }
}

impl TokenStore for MemoryTokenStore {
    fn token(&self) -> Result<Option<String>> {
        Ok(self.token.read().clone().and_then(non_empty))
    }
}
