//! A small client for talking to a single HTTP API.
//!
//! [`ApiClient`] is bound to one base URL and offers a handful of calls:
//! an anonymous GET, and authenticated GET, POST, PUT and DELETE requests
//! (POST and PUT also come in multipart flavours). Authenticated calls read a
//! bearer token from a [`TokenStore`] each time, so whatever is currently
//! stored is what gets sent.
//!
//! ```no_run
//! use bearerctl::{ApiClient, KeyringTokenStore, RequestError};
//! use serde_json::json;
//!
//! # async fn run() -> bearerctl::Result<()> {
//! let client = ApiClient::with_reqwest(KeyringTokenStore::new("bearerctl"))
//!     .with_base_url("https://api.example.com");
//!
//! let products = client
//!     .get("/products", Some(&json!({ "category": "tea" })), None)
//!     .await?;
//!
//! let log = |err: &RequestError| eprintln!("order failed: {err}");
//! let order = client.post("/orders", &json!({ "sku": 42 }), Some(&log)).await?;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod storage;
pub mod transport;

pub use api::{ApiClient, ErrorObserver, MultipartForm};
pub use config::ClientConfig;
pub use error::{RequestError, Result};
pub use storage::{KeyringTokenStore, MemoryTokenStore, TokenStore};
pub use transport::{ReqwestTransport, Transport};
