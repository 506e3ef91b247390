// Test assertions for HTTP responses

use crate::TestResponse;
use trellis_core::HttpStatus;

/// Assert that a response has a specific status code
pub fn assert_status(response: &TestResponse, expected: u16) {
    let actual = response.status();
    assert_eq!(
        actual, expected,
        "Expected status {}, got {}",
        expected, actual
    );
}

/// Assert that a response has a specific HTTP status
pub fn assert_http_status(response: &TestResponse, expected: HttpStatus) {
    assert_status(response, expected.code());
}

/// Assert that a response body contains JSON matching expected value
pub fn assert_json<T>(response: &TestResponse, expected: &T)
where
    T: serde::Serialize + serde::de::DeserializeOwned + PartialEq + std::fmt::Debug,
{
    let actual: T = response
        .body_json()
        .expect("Failed to deserialize response body");
    assert_eq!(actual, *expected, "JSON bodies do not match");
}

/// Assert that a response has a specific header
pub fn assert_header(response: &TestResponse, key: &str, expected: &str) {
    let actual = response.header(key).map(|s| s.as_str());
    assert_eq!(
        actual,
        Some(expected),
        "Expected header '{}' to be '{}', got {:?}",
        key,
        expected,
        actual
    );
}

/// Assert that a response body contains a string
pub fn assert_body_contains(response: &TestResponse, expected: &str) {
    let body = response.body_string();
    assert!(
        body.contains(expected),
        "Expected body to contain '{}', but it didn't. Body: {}",
        expected,
        body
    );
}

/// Assert that a response is successful (2xx status)
pub fn assert_success(response: &TestResponse) {
    let status = response.status();
    assert!(
        (200..300).contains(&status),
        "Expected successful status (2xx), got {}",
        status
    );
}

/// Assert that a response is a client error (4xx status)
pub fn assert_client_error(response: &TestResponse) {
    let status = response.status();
    assert!(
        (400..500).contains(&status),
        "Expected client error status (4xx), got {}",
        status
    );
}

/// Assert that a response is a server error (5xx status)
pub fn assert_server_error(response: &TestResponse) {
    let status = response.status();
    assert!(
        (500..600).contains(&status),
        "Expected server error status (5xx), got {}",
        status
    );
}

/// Assert that a response has JSON content type
pub fn assert_json_content_type(response: &TestResponse) {
    let content_type = response.header("Content-Type").map(|s| s.as_str());
    assert!(
        matches!(content_type, Some(ct) if ct.starts_with("application/json")),
        "Expected JSON content type, got {:?}",
        content_type
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TestClient;
    use trellis_core::{Application, HttpResponse, Route};

    async fn response_for(status: u16) -> TestResponse {
        let mut app = Application::new();
        app.add_route(
            Route::get("/r", move |_req| async move {
                HttpResponse::new(status).with_json(&serde_json::json!({"status": status}))
            })
            .unwrap(),
        );
        TestClient::from_app(app).get("/r").await
    }

    #[tokio::test]
    async fn status_assertions() {
        let resp = response_for(201).await;
        assert_status(&resp, 201);
        assert_http_status(&resp, HttpStatus::Created);
        assert_success(&resp);
        assert_json_content_type(&resp);
    }

    #[tokio::test]
    async fn error_class_assertions() {
        assert_client_error(&response_for(422).await);
        assert_server_error(&response_for(503).await);
    }

    #[tokio::test]
    async fn body_assertions() {
        let resp = response_for(200).await;
        assert_body_contains(&resp, "200");
        assert_json(&resp, &serde_json::json!({"status": 200}));
    }
}
