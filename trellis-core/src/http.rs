// HTTP request and response types

use crate::dependency::DependencyValues;
use crate::extensions::Extensions;
use crate::pattern::PathParams;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// HTTP request wrapper
#[derive(Debug, Clone, Default)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
    pub path_params: PathParams,
    pub query_params: HashMap<String, String>,
    /// Opaque state attached by collaborators (sessions, auth, app state).
    pub extensions: Extensions,
    /// Values supplied by the dependency resolver before the handler runs.
    pub dependencies: DependencyValues,
}

impl HttpRequest {
    pub fn new(method: String, path: String) -> Self {
        Self {
            method,
            path,
            ..Default::default()
        }
    }

    /// Parse the request body as JSON
    pub fn json<T: for<'de> Deserialize<'de>>(&self) -> Result<T, crate::Error> {
        serde_json::from_slice(&self.body).map_err(|e| crate::Error::Deserialization(e.to_string()))
    }

    /// Get a path parameter by name
    pub fn param(&self, name: &str) -> Option<&crate::ParamValue> {
        self.path_params.get(name)
    }

    /// Get a query parameter by name
    pub fn query(&self, name: &str) -> Option<&String> {
        self.query_params.get(name)
    }

    /// Get a header by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&String> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }

    /// Get a resolved dependency value by parameter name
    pub fn dependency<T: Send + Sync + 'static>(&self, name: &str) -> Option<std::sync::Arc<T>> {
        self.dependencies.get::<T>(name)
    }
}

/// Split a request target into its path and parsed query parameters.
pub fn split_target(target: &str) -> (&str, HashMap<String, String>) {
    match target.split_once('?') {
        Some((path, query)) => (path, parse_query_string(query)),
        None => (target, HashMap::new()),
    }
}

/// Parse a query string into a map of decoded parameters
pub fn parse_query_string(query: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    for pair in query.split('&').filter(|s| !s.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = urlencoding::decode(key)
            .map(|c| c.into_owned())
            .unwrap_or_else(|_| key.to_string());
        let value = urlencoding::decode(value)
            .map(|c| c.into_owned())
            .unwrap_or_else(|_| value.to_string());
        params.insert(key, value);
    }
    params
}

/// HTTP response wrapper
#[derive(Debug, Default)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: Vec::new(),
        }
    }

    pub fn ok() -> Self {
        Self::new(200)
    }

    pub fn created() -> Self {
        Self::new(201)
    }

    pub fn no_content() -> Self {
        Self::new(204)
    }

    pub fn bad_request() -> Self {
        Self::new(400)
    }

    pub fn not_found() -> Self {
        Self::new(404)
    }

    pub fn internal_server_error() -> Self {
        Self::new(500)
    }

    /// 200 response with a JSON body
    pub fn json<T: Serialize>(value: &T) -> Result<Self, crate::Error> {
        Self::ok().with_json(value)
    }

    /// 200 response with a plain-text body
    pub fn text(body: impl Into<String>) -> Self {
        Self::ok()
            .with_header("Content-Type".to_string(), "text/plain; charset=utf-8".to_string())
            .with_body(body.into().into_bytes())
    }

    /// 200 response with an HTML body
    pub fn html(body: impl Into<String>) -> Self {
        Self::ok()
            .with_header("Content-Type".to_string(), "text/html; charset=utf-8".to_string())
            .with_body(body.into().into_bytes())
    }

    /// 302 redirect
    pub fn redirect(location: impl Into<String>) -> Self {
        Self::new(302).with_header("Location".to_string(), location.into())
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    pub fn with_json<T: Serialize>(mut self, value: &T) -> Result<Self, crate::Error> {
        self.body =
            serde_json::to_vec(value).map_err(|e| crate::Error::Serialization(e.to_string()))?;
        self.headers
            .insert("Content-Type".to_string(), "application/json".to_string());
        Ok(self)
    }

    pub fn with_header(mut self, key: String, value: String) -> Self {
        self.headers.insert(key, value);
        self
    }

    /// Get a header by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&String> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }

    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// JSON response helper
#[derive(Debug)]
pub struct Json<T: Serialize>(pub T);

impl<T: Serialize> Json<T> {
    pub fn into_response(self) -> Result<HttpResponse, crate::Error> {
        HttpResponse::ok().with_json(&self.0)
    }
}
