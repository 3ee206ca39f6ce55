use reqwest::StatusCode;
use thiserror::Error;

/// Result alias used throughout the client.
pub type Result<T> = std::result::Result<T, RequestError>;

/// Every way a request can fail.
///
/// The first group are preconditions checked before anything touches the
/// network. They are always returned directly and never shown to an error
/// observer. Everything else comes out of the transport.
#[derive(Error, Debug)]
pub enum RequestError {
    /// A request was made before the client was given a base URL.
    #[error("client has not been initialized with a base URL")]
    NotInitialized,

    /// The token store has no token for an authenticated request.
    #[error("authorization token missing")]
    MissingToken,

    /// The stored token can't be sent as an HTTP header.
    #[error("stored authorization token is not a valid header value")]
    InvalidToken,

    /// The keyring backing the token store failed.
    #[error("unable to read token storage: {0}")]
    TokenStore(#[from] keyring::Error),

    /// The base URL and endpoint did not form a usable URL.
    #[error("invalid request URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Network failure, timeout, or a request that reqwest refused to build.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-2xx status.
    #[error("server responded with {status}")]
    Status { status: StatusCode, body: String },

    /// A multipart file part carried an unparseable MIME type.
    #[error("invalid MIME type in multipart form: {0}")]
    InvalidMime(String),

    /// A body couldn't be turned into JSON, or a response body didn't match
    /// the type it was requested as.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RequestError {
    /// Whether this failure came out of the transport (and so is shown to an
    /// error observer) rather than a precondition.
    pub fn is_transport(&self) -> bool {
        !matches!(
            self,
            Self::NotInitialized | Self::MissingToken | Self::InvalidToken | Self::TokenStore(_)
        )
    }

    /// The HTTP status, if the server got far enough to send one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Http(err) => err.status(),
            _ => None,
        }
    }
}
