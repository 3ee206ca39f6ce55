use parking_lot::RwLock;
use reqwest::{
    header::{self, HeaderValue},
    Method,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{MultipartForm, OutgoingRequest, RequestBody};
use crate::{
    config::{ClientConfig, AUTHENTICATED_TIMEOUT},
    error::{RequestError, Result},
    storage::TokenStore,
    transport::{ReqwestTransport, Transport},
};

/// Called with a transport failure before it is returned to the caller.
///
/// It only gets to look. Whatever it does, the call still fails with the
/// same error afterwards.
pub type ErrorObserver<'a> = dyn Fn(&RequestError) + Send + Sync + 'a;

/// Issues requests against a single base URL.
///
/// Authenticated calls read the bearer token from the token store every time,
/// send it as `Authorization: Bearer <token>`, and time out after ten seconds.
/// Only the response body is handed back.
pub struct ApiClient {
    /// Set by [`ApiClient::initialize`]; requests fail until then.
    config: RwLock<Option<ClientConfig>>,
    tokens: Arc<dyn TokenStore>,
    transport: Arc<dyn Transport>,
}

/// Whether a request carries the stored token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Auth {
    None,
    Bearer,
}

impl ApiClient {
    /// Creates an uninitialized client around the given token store and transport.
    pub fn new(tokens: impl TokenStore + 'static, transport: impl Transport + 'static) -> Self {
        Self {
            config: RwLock::new(None),
            tokens: Arc::new(tokens),
            transport: Arc::new(transport),
        }
    }

    /// Creates an uninitialized client that talks HTTP through `reqwest`.
    pub fn with_reqwest(tokens: impl TokenStore + 'static) -> Self {
        Self::new(tokens, ReqwestTransport::new())
    }

    /// Initializes the client on construction.
    pub fn with_base_url(self, base_url: impl Into<String>) -> Self {
        self.initialize(base_url);
        self
    }

    /// Binds the client to `base_url`, replacing any earlier one.
    ///
    /// The URL isn't validated here. A malformed one fails each request instead.
    pub fn initialize(&self, base_url: impl Into<String>) {
        let config = ClientConfig::new(base_url);
        debug!(base_url = %config.base_url, "initializing API client");
        *self.config.write() = Some(config);
    }

    /// The current configuration, if the client has been initialized.
    pub fn config(&self) -> Option<ClientConfig> {
        self.config.read().clone()
    }

    /// GET without credentials, passing `query` along as query parameters.
    pub async fn get(
        &self,
        endpoint: &str,
        query: Option<&Value>,
        on_error: Option<&ErrorObserver<'_>>,
    ) -> Result<Value> {
        self.get_as(endpoint, query, on_error).await
    }

    /// Like [`ApiClient::get`], decoding the body as `T`.
    pub async fn get_as<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: Option<&Value>,
        on_error: Option<&ErrorObserver<'_>>,
    ) -> Result<T> {
        let mut request = self.prepare(Method::GET, endpoint, Auth::None)?;
        request.query = query.cloned();
        self.dispatch(request, on_error).await
    }

    /// Authenticated GET.
    pub async fn get_with_token(
        &self,
        endpoint: &str,
        on_error: Option<&ErrorObserver<'_>>,
    ) -> Result<Value> {
        self.get_with_token_as(endpoint, on_error).await
    }

    pub async fn get_with_token_as<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        on_error: Option<&ErrorObserver<'_>>,
    ) -> Result<T> {
        let request = self.prepare(Method::GET, endpoint, Auth::Bearer)?;
        self.dispatch(request, on_error).await
    }

    /// Authenticated POST with a JSON body.
    pub async fn post<B: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        data: &B,
        on_error: Option<&ErrorObserver<'_>>,
    ) -> Result<Value> {
        self.post_as(endpoint, data, on_error).await
    }

    pub async fn post_as<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        data: &B,
        on_error: Option<&ErrorObserver<'_>>,
    ) -> Result<T> {
        let mut request = self.prepare(Method::POST, endpoint, Auth::Bearer)?;
        request.body = RequestBody::Json(observe(serde_json::to_value(data), on_error)?);
        self.dispatch(request, on_error).await
    }

    /// Authenticated POST carrying a multipart form.
    pub async fn post_with_file(
        &self,
        endpoint: &str,
        form: MultipartForm,
        on_error: Option<&ErrorObserver<'_>>,
    ) -> Result<Value> {
        self.post_with_file_as(endpoint, form, on_error).await
    }

    pub async fn post_with_file_as<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        form: MultipartForm,
        on_error: Option<&ErrorObserver<'_>>,
    ) -> Result<T> {
        let mut request = self.prepare(Method::POST, endpoint, Auth::Bearer)?;
        request.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("multipart/form-data"),
        );
        request.body = RequestBody::Multipart(form);
        self.dispatch(request, on_error).await
    }

    /// Authenticated PUT with a JSON body.
    pub async fn put<B: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &B,
        on_error: Option<&ErrorObserver<'_>>,
    ) -> Result<Value> {
        self.put_as(endpoint, body, on_error).await
    }

    pub async fn put_as<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &B,
        on_error: Option<&ErrorObserver<'_>>,
    ) -> Result<T> {
        let mut request = self.prepare(Method::PUT, endpoint, Auth::Bearer)?;
        request.body = RequestBody::Json(observe(serde_json::to_value(body), on_error)?);
        self.dispatch(request, on_error).await
    }

    /// Authenticated PUT carrying a multipart form.
    ///
    /// Unlike [`ApiClient::post_with_file`], no content type is set here and the
    /// transport picks one for the form.
    pub async fn put_with_file(
        &self,
        endpoint: &str,
        form: MultipartForm,
        on_error: Option<&ErrorObserver<'_>>,
    ) -> Result<Value> {
        self.put_with_file_as(endpoint, form, on_error).await
    }

    pub async fn put_with_file_as<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        form: MultipartForm,
        on_error: Option<&ErrorObserver<'_>>,
    ) -> Result<T> {
        let mut request = self.prepare(Method::PUT, endpoint, Auth::Bearer)?;
        request.body = RequestBody::Multipart(form);
        self.dispatch(request, on_error).await
    }

    /// Authenticated DELETE.
    pub async fn delete(
        &self,
        endpoint: &str,
        on_error: Option<&ErrorObserver<'_>>,
    ) -> Result<Value> {
        self.delete_as(endpoint, on_error).await
    }

    pub async fn delete_as<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        on_error: Option<&ErrorObserver<'_>>,
    ) -> Result<T> {
        let request = self.prepare(Method::DELETE, endpoint, Auth::Bearer)?;
        self.dispatch(request, on_error).await
    }

    /// Checks preconditions and builds the request skeleton.
    ///
    /// Failures here happen before any network activity and are never shown
    /// to an error observer.
    fn prepare(&self, method: Method, endpoint: &str, auth: Auth) -> Result<OutgoingRequest> {
        let base_url = match self.config.read().as_ref() {
            Some(config) => config.base_url.clone(),
            None => return Err(RequestError::NotInitialized),
        };

        let mut request = OutgoingRequest::new(method, base_url, endpoint);
        if auth == Auth::Bearer {
            let Some(token) = self.tokens.token()? else {
                warn!(method = %request.method, endpoint, "no authorization token stored");
                return Err(RequestError::MissingToken);
            };

            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| RequestError::InvalidToken)?;
            value.set_sensitive(true);
            request.headers.insert(header::AUTHORIZATION, value);
            request.timeout = Some(AUTHENTICATED_TIMEOUT);
        }

        Ok(request)
    }

    /// Hands the request to the transport and unwraps the body.
    async fn dispatch<T: DeserializeOwned>(
        &self,
        request: OutgoingRequest,
        on_error: Option<&ErrorObserver<'_>>,
    ) -> Result<T> {
        debug!(
            method = %request.method,
            endpoint = %request.endpoint,
            authenticated = request.headers.contains_key(header::AUTHORIZATION),
            "sending request"
        );

        let body = observe(self.transport.send(request).await, on_error)?;
        observe(serde_json::from_value(body), on_error)
    }
}

/// Shows a failed result to the observer, then passes it through untouched.
fn observe<T, E: Into<RequestError>>(
    result: std::result::Result<T, E>,
    on_error: Option<&ErrorObserver<'_>>,
) -> Result<T> {
    let result = result.map_err(Into::into);
    if let (Err(err), Some(observer)) = (&result, on_error) {
        observer(err);
    }
    result
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("config", &*self.config.read())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryTokenStore;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use reqwest::StatusCode;
    use serde::Deserialize;
    use serde_json::json;
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    /// Records every request and answers with a canned result.
    #[derive(Default)]
    struct RecordingTransport {
        requests: Mutex<Vec<OutgoingRequest>>,
        fail_with: Option<StatusCode>,
        respond_with: Value,
    }

    impl RecordingTransport {
        fn responding(body: Value) -> Arc<Self> {
            Arc::new(Self {
                respond_with: body,
                ..Self::default()
            })
        }

        fn failing(status: StatusCode) -> Arc<Self> {
            Arc::new(Self {
                fail_with: Some(status),
                ..Self::default()
            })
        }

        fn requests(&self) -> Vec<OutgoingRequest> {
            self.requests.lock().clone()
        }

        fn last(&self) -> OutgoingRequest {
            self.requests
                .lock()
                .last()
                .cloned()
                .expect("a request should have been sent")
        }
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn send(&self, request: OutgoingRequest) -> Result<Value> {
            self.requests.lock().push(request);
            match self.fail_with {
                Some(status) => Err(RequestError::Status {
                    status,
                    body: String::new(),
                }),
                None => Ok(self.respond_with.clone()),
            }
        }
    }

    fn client(token: Option<&str>, transport: &Arc<RecordingTransport>) -> ApiClient {
        let tokens = match token {
            Some(token) => MemoryTokenStore::with_token(token),
            None => MemoryTokenStore::new(),
        };
        ApiClient::new(tokens, Arc::clone(transport)).with_base_url("https://api.example.com")
    }

    fn upload() -> MultipartForm {
        MultipartForm::new().file_bytes("file", b"hello".to_vec(), "hello.txt", Some("text/plain"))
    }

    /// Runs every authenticated operation once, collecting their results.
    async fn every_authenticated_call(client: &ApiClient) -> Vec<Result<Value>> {
        vec![
            client.get_with_token("/items", None).await,
            client.post("/items", &json!({"name": "a"}), None).await,
            client.post_with_file("/items", upload(), None).await,
            client.put("/items/1", &json!({"name": "b"}), None).await,
            client.put_with_file("/items/1", upload(), None).await,
            client.delete("/items/1", None).await,
        ]
    }

    #[tokio::test]
    async fn requests_fail_before_initialization() {
        let transport = RecordingTransport::responding(json!({}));
        let client = ApiClient::new(MemoryTokenStore::with_token("abc123"), Arc::clone(&transport));

        assert!(client.config().is_none());
        assert!(matches!(
            client.get("/products", None, None).await,
            Err(RequestError::NotInitialized)
        ));
        for result in every_authenticated_call(&client).await {
            assert!(matches!(result, Err(RequestError::NotInitialized)));
        }
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn requests_use_initialized_base_url() {
        let transport = RecordingTransport::responding(json!({}));
        let client = client(Some("abc123"), &transport);

        client.get("/products", None, None).await.unwrap();
        for result in every_authenticated_call(&client).await {
            result.unwrap();
        }

        let requests = transport.requests();
        assert_eq!(requests.len(), 7);
        assert!(requests
            .iter()
            .all(|request| request.base_url == "https://api.example.com"));
    }

    #[tokio::test]
    async fn reinitializing_replaces_base_url() {
        let transport = RecordingTransport::responding(json!({}));
        let client = client(None, &transport);

        client.initialize("https://staging.example.com");
        client.get("/health", None, None).await.unwrap();

        assert_eq!(transport.last().base_url, "https://staging.example.com");
        assert_eq!(
            client.config(),
            Some(ClientConfig::new("https://staging.example.com"))
        );
    }

    #[tokio::test]
    async fn missing_token_fails_without_network_or_observer() {
        let transport = RecordingTransport::responding(json!({}));
        let client = client(None, &transport);
        let observed = AtomicUsize::new(0);
        let observer = |_: &RequestError| {
            observed.fetch_add(1, Ordering::SeqCst);
        };

        for result in every_authenticated_call(&client).await {
            assert!(matches!(result, Err(RequestError::MissingToken)));
        }
        assert!(matches!(
            client.get_with_token("/items", Some(&observer)).await,
            Err(RequestError::MissingToken)
        ));

        assert!(transport.requests().is_empty());
        assert_eq!(observed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn token_is_reread_on_every_call() {
        let transport = RecordingTransport::responding(json!({}));
        let tokens = Arc::new(MemoryTokenStore::with_token("first"));
        let client = ApiClient::new(Arc::clone(&tokens), Arc::clone(&transport))
            .with_base_url("https://api.example.com");

        client.get_with_token("/me", None).await.unwrap();
        assert_eq!(transport.last().headers[header::AUTHORIZATION], "Bearer first");

        tokens.set("second");
        client.get_with_token("/me", None).await.unwrap();
        assert_eq!(transport.last().headers[header::AUTHORIZATION], "Bearer second");

        tokens.clear();
        assert!(matches!(
            client.get_with_token("/me", None).await,
            Err(RequestError::MissingToken)
        ));
    }

    #[tokio::test]
    async fn authenticated_calls_carry_bearer_and_timeout() {
        let transport = RecordingTransport::responding(json!({}));
        let client = client(Some("abc123"), &transport);

        for result in every_authenticated_call(&client).await {
            result.unwrap();
        }

        let requests = transport.requests();
        assert_eq!(requests.len(), 6);
        for request in requests {
            assert_eq!(request.headers[header::AUTHORIZATION], "Bearer abc123");
            assert!(request.headers[header::AUTHORIZATION].is_sensitive());
            assert_eq!(request.timeout, Some(Duration::from_millis(10_000)));
        }
    }

    #[tokio::test]
    async fn methods_and_bodies_match_operation() {
        let transport = RecordingTransport::responding(json!({}));
        let client = client(Some("abc123"), &transport);

        every_authenticated_call(&client).await;

        let requests = transport.requests();
        let methods: Vec<Method> = requests.iter().map(|r| r.method.clone()).collect();
        assert_eq!(
            methods,
            [
                Method::GET,
                Method::POST,
                Method::POST,
                Method::PUT,
                Method::PUT,
                Method::DELETE
            ]
        );
        assert!(matches!(requests[0].body, RequestBody::Empty));
        assert!(matches!(&requests[1].body, RequestBody::Json(v) if *v == json!({"name": "a"})));
        assert!(matches!(&requests[2].body, RequestBody::Multipart(form) if *form == upload()));
        assert!(matches!(&requests[3].body, RequestBody::Json(v) if *v == json!({"name": "b"})));
        assert!(matches!(&requests[4].body, RequestBody::Multipart(form) if *form == upload()));
        assert!(matches!(requests[5].body, RequestBody::Empty));
        assert_eq!(requests[5].endpoint, "/items/1");
    }

    #[tokio::test]
    async fn only_post_with_file_sets_multipart_content_type() {
        let transport = RecordingTransport::responding(json!({}));
        let client = client(Some("abc123"), &transport);

        client.post_with_file("/uploads", upload(), None).await.unwrap();
        assert_eq!(
            transport.last().headers[header::CONTENT_TYPE],
            "multipart/form-data"
        );

        client.put_with_file("/uploads/1", upload(), None).await.unwrap();
        assert!(!transport.last().headers.contains_key(header::CONTENT_TYPE));
    }

    #[tokio::test]
    async fn observer_sees_transport_failure_once() {
        let transport = RecordingTransport::failing(StatusCode::INTERNAL_SERVER_ERROR);
        let client = client(Some("abc123"), &transport);
        let seen = Mutex::new(Vec::new());
        let observer = |err: &RequestError| seen.lock().push(err.status());

        let result = client.post("/items", &json!({}), Some(&observer)).await;

        assert_eq!(
            result.unwrap_err().status(),
            Some(StatusCode::INTERNAL_SERVER_ERROR)
        );
        assert_eq!(*seen.lock(), [Some(StatusCode::INTERNAL_SERVER_ERROR)]);
    }

    #[tokio::test]
    async fn failure_without_observer_still_fails() {
        let transport = RecordingTransport::failing(StatusCode::NOT_FOUND);
        let client = client(None, &transport);

        let err = client.get("/missing", None, None).await.unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
    }

    #[tokio::test]
    async fn resolves_with_response_body() {
        let transport = RecordingTransport::responding(json!({"id": 1}));
        let client = client(Some("abc123"), &transport);

        assert_eq!(client.get_with_token("/items/1", None).await.unwrap(), json!({"id": 1}));
        assert_eq!(client.get("/items/1", None, None).await.unwrap(), json!({"id": 1}));
    }

    #[tokio::test]
    async fn typed_variants_decode_body() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Item {
            id: u32,
        }

        let transport = RecordingTransport::responding(json!({"id": 1}));
        let client = client(Some("abc123"), &transport);

        let item: Item = client.delete_as("/items/1", None).await.unwrap();
        assert_eq!(item, Item { id: 1 });
    }

    #[tokio::test]
    async fn observer_sees_decode_failure() {
        #[derive(Debug, Deserialize)]
        #[allow(dead_code)]
        struct Item {
            id: u32,
        }

        let transport = RecordingTransport::responding(json!("not an item"));
        let client = client(Some("abc123"), &transport);
        let observed = AtomicUsize::new(0);
        let observer = |_: &RequestError| {
            observed.fetch_add(1, Ordering::SeqCst);
        };

        let result: Result<Item> = client.get_with_token_as("/items/1", Some(&observer)).await;
        assert!(matches!(result, Err(RequestError::Json(_))));
        assert_eq!(observed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unserializable_body_is_observed_and_not_sent() {
        use std::collections::BTreeMap;

        // JSON object keys must be strings.
        let body = BTreeMap::from([((1, 2), "pair")]);
        let transport = RecordingTransport::responding(json!({}));
        let client = client(Some("abc123"), &transport);
        let observed = AtomicUsize::new(0);
        let observer = |_: &RequestError| {
            observed.fetch_add(1, Ordering::SeqCst);
        };

        let posted = client.post("/items", &body, Some(&observer)).await;
        let replaced = client.put("/items/1", &body, Some(&observer)).await;

        assert!(matches!(posted, Err(RequestError::Json(_))));
        assert!(matches!(replaced, Err(RequestError::Json(_))));
        assert_eq!(observed.load(Ordering::SeqCst), 2);
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn plain_get_passes_query_without_credentials() {
        let transport = RecordingTransport::responding(json!([]));
        let client = client(Some("abc123"), &transport);

        client
            .get("/products", Some(&json!({"category": "x"})), None)
            .await
            .unwrap();

        let request = transport.last();
        assert_eq!(request.method, Method::GET);
        assert_eq!(request.endpoint, "/products");
        assert_eq!(request.query, Some(json!({"category": "x"})));
        assert!(!request.headers.contains_key(header::AUTHORIZATION));
        assert_eq!(request.timeout, None);
    }

    #[tokio::test]
    async fn unusable_token_is_rejected_before_sending() {
        let transport = RecordingTransport::responding(json!({}));
        let client = client(Some("bad\ntoken"), &transport);

        assert!(matches!(
            client.delete("/items/1", None).await,
            Err(RequestError::InvalidToken)
        ));
        assert!(transport.requests().is_empty());
    }
}
