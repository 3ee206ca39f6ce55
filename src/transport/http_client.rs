use async_trait::async_trait;
use reqwest::header::{self, HeaderMap};
use serde_json::Value;
use tracing::debug;
use url::Url;

use super::Transport;
use crate::{
    api::{OutgoingRequest, RequestBody},
    error::{RequestError, Result},
};

/// Sends requests with `reqwest`.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use an already configured client, e.g. one with a proxy or custom TLS roots.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

/// Joins a base URL and an endpoint with exactly one `/` between them.
pub fn join_url(base_url: &str, endpoint: &str) -> String {
    if endpoint.is_empty() {
        return base_url.to_string();
    }
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        endpoint.trim_start_matches('/')
    )
}

/// Whatever the server sent, as JSON if it parses and as a string otherwise.
fn decode_body(text: String) -> Value {
    if text.is_empty() {
        return Value::Null;
    }
    serde_json::from_str(&text).unwrap_or(Value::String(text))
}

/// `reqwest` sets its own multipart content type, boundary included.
/// A bare one of ours would otherwise go out alongside it.
fn strip_bare_multipart_type(headers: &mut HeaderMap) {
    let is_bare = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.trim().eq_ignore_ascii_case("multipart/form-data"));
    if is_bare {
        headers.remove(header::CONTENT_TYPE);
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: OutgoingRequest) -> Result<Value> {
        let OutgoingRequest {
            method,
            base_url,
            endpoint,
            query,
            mut headers,
            timeout,
            body,
        } = request;

        let url = Url::parse(&join_url(&base_url, &endpoint))?;

        let mut builder = self.client.request(method, url);
        if let Some(query) = &query {
            builder = builder.query(query);
        }
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        builder = match body {
            RequestBody::Empty => builder.headers(headers),
            RequestBody::Json(json) => builder.headers(headers).json(&json),
            RequestBody::Multipart(form) => {
                strip_bare_multipart_type(&mut headers);
                builder.headers(headers).multipart(form.into_reqwest()?)
            }
        };

        let response = builder.send().await?;
        let status = response.status();
        debug!(%status, "received response");

        // We only consider 2xx a success. Anything else is handed back
        // with whatever body the server gave us.
        let text = response.text().await?;
        if !status.is_success() {
            return Err(RequestError::Status { status, body: text });
        }

        Ok(decode_body(text))
    }
}
