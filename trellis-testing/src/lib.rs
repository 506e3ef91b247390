//! Testing utilities for Trellis applications
//!
//! The [`TestClient`] dispatches synthetic requests through an
//! application's full pipeline (routing, middleware, dependency
//! resolution, exception handling) without sockets, and the assertion
//! helpers make response checks readable.
//!
//! ```
//! use trellis_core::{Application, HttpResponse, Route};
//! use trellis_testing::{assert_status, TestClient};
//!
//! # tokio_test::block_on(async {
//! let mut app = Application::new();
//! app.add_route(Route::get("/ping", |_req| async { Ok(HttpResponse::text("pong")) }).unwrap());
//!
//! let client = TestClient::from_app(app);
//! let resp = client.get("/ping").await;
//! assert_status(&resp, 200);
//! # });
//! ```

pub mod assertions;
pub mod test_client;

pub use assertions::{
    assert_body_contains, assert_client_error, assert_header, assert_http_status, assert_json,
    assert_json_content_type, assert_server_error, assert_status, assert_success,
};
pub use test_client::{TestClient, TestRequestBuilder, TestResponse};
