// Test HTTP Client
//
// Issues synthetic requests through the application's dispatch pipeline
// without opening sockets. Every request passes the full chain: routing,
// middleware, dependency resolution, and exception handling.

use std::collections::HashMap;
use std::sync::Arc;
use trellis_core::{Application, HttpMethod, HttpRequest, HttpResponse};

/// Test HTTP client for making requests to an application
pub struct TestClient {
    app: Arc<Application>,
}

impl TestClient {
    /// Create a new test client
    pub fn new(app: Arc<Application>) -> Self {
        Self { app }
    }

    /// Create a test client owning the application
    pub fn from_app(app: Application) -> Self {
        Self::new(Arc::new(app))
    }

    pub fn app(&self) -> &Arc<Application> {
        &self.app
    }

    /// Make a GET request
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request(HttpMethod::GET, path, None).await
    }

    /// Make a POST request
    pub async fn post(&self, path: &str, body: Vec<u8>) -> TestResponse {
        self.request(HttpMethod::POST, path, Some(body)).await
    }

    /// Make a PUT request
    pub async fn put(&self, path: &str, body: Vec<u8>) -> TestResponse {
        self.request(HttpMethod::PUT, path, Some(body)).await
    }

    /// Make a DELETE request
    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request(HttpMethod::DELETE, path, None).await
    }

    /// Make a PATCH request
    pub async fn patch(&self, path: &str, body: Vec<u8>) -> TestResponse {
        self.request(HttpMethod::PATCH, path, Some(body)).await
    }

    /// Make a request with an explicit method
    pub async fn request(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> TestResponse {
        self.build(method, path).body(body.unwrap_or_default()).send().await
    }

    /// Start building a request with headers, query, or a JSON body
    pub fn build(&self, method: HttpMethod, path: &str) -> TestRequestBuilder<'_> {
        TestRequestBuilder {
            client: self,
            method,
            path: path.to_string(),
            headers: HashMap::new(),
            body: Vec::new(),
        }
    }
}

/// Builder for test requests
pub struct TestRequestBuilder<'a> {
    client: &'a TestClient,
    method: HttpMethod,
    path: String,
    headers: HashMap<String, String>,
    body: Vec<u8>,
}

impl TestRequestBuilder<'_> {
    /// Add a header
    pub fn header(mut self, key: &str, value: &str) -> Self {
        self.headers.insert(key.to_string(), value.to_string());
        self
    }

    /// Set the body
    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    /// Set a JSON body and content type
    pub fn json<T: serde::Serialize>(mut self, data: &T) -> Self {
        self.body = serde_json::to_vec(data).expect("failed to serialize JSON body");
        self.headers
            .insert("Content-Type".to_string(), "application/json".to_string());
        self
    }

    /// Dispatch the request through the application
    pub async fn send(self) -> TestResponse {
        let mut req = HttpRequest::new(self.method.as_str().to_string(), self.path);
        req.headers = self.headers;
        req.body = self.body;
        TestResponse {
            inner: self.client.app.handle(req).await,
        }
    }
}

/// A response captured by the test client
#[derive(Debug)]
pub struct TestResponse {
    inner: HttpResponse,
}

impl TestResponse {
    pub fn status(&self) -> u16 {
        self.inner.status
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.inner.status)
    }

    /// Get a header by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&String> {
        self.inner.header(name)
    }

    pub fn body(&self) -> &[u8] {
        &self.inner.body
    }

    pub fn body_string(&self) -> String {
        self.inner.body_string()
    }

    /// Deserialize the body as JSON
    pub fn body_json<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.inner.body)
    }

    pub fn into_inner(self) -> HttpResponse {
        self.inner
    }
}
