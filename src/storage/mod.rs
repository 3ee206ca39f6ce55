//! Where authenticated requests get their bearer token from.

mod keyring_store;
mod memory;

pub use keyring_store::KeyringTokenStore;
pub use memory::MemoryTokenStore;

use crate::error::Result;

/// The key our token is stored under.
pub const TOKEN_KEY: &str = "token";

/// Read-only access to the current bearer token.
///
/// The client asks on every authenticated request and never caches the
/// answer, so a token replaced in storage is picked up by the next call.
pub trait TokenStore: Send + Sync {
    /// Returns the stored token, or `None` if there isn't one.
    fn token(&self) -> Result<Option<String>>;
}

impl<T: TokenStore + ?Sized> TokenStore for std::sync::Arc<T> {
    fn token(&self) -> Result<Option<String>> {
        (**self).token()
    }
}

/// Empty strings count as no token at all.
fn non_empty(token: String) -> Option<String> {
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}
