//! The layer that actually puts requests on the wire.

mod http_client;

pub use http_client::{join_url, ReqwestTransport};

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::{api::OutgoingRequest, error::Result};

/// Performs a single HTTP request and hands back its decoded body.
///
/// Status codes, headers and the rest of the response stay in here. A non-2xx
/// status is an error.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: OutgoingRequest) -> Result<Value>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send(&self, request: OutgoingRequest) -> Result<Value> {
        (**self).send(request).await
    }
}
