use reqwest::{header::HeaderMap, Method};
use serde_json::Value;
use std::time::Duration;

use super::MultipartForm;

/// Everything a transport needs to perform one call.
///
/// Built fresh by [`ApiClient`](super::ApiClient) for each request and handed
/// over by value. Nothing here outlives the call.
#[derive(Debug, Clone)]
pub struct OutgoingRequest {
    pub method: Method,
    /// The base URL the client was initialized with, exactly as given.
    pub base_url: String,
    /// Path relative to `base_url`.
    pub endpoint: String,
    /// Query parameters, serialized as a URL-encoded query string.
    pub query: Option<Value>,
    pub headers: HeaderMap,
    /// `None` leaves the transport's default in place.
    pub timeout: Option<Duration>,
    pub body: RequestBody,
}

impl OutgoingRequest {
    pub(crate) fn new(method: Method, base_url: String, endpoint: &str) -> Self {
        Self {
            method,
            base_url,
            endpoint: endpoint.to_string(),
            query: None,
            headers: HeaderMap::new(),
            timeout: None,
            body: RequestBody::Empty,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(Value),
    Multipart(MultipartForm),
}
