//! Integration tests for common Trellis workflows.
//!
//! These exercise the full dispatch pipeline through the test client:
//! routing, groups, middleware composition, dependency resolution, URL
//! reversal, and exception handling.

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use trellis::prelude::*;
use trellis_testing::{TestClient, assert_header, assert_status};

fn text_route(path: &str, methods: &[HttpMethod], marker: &'static str) -> Route {
    Route::new(path, methods, move |_req| async move {
        Ok(HttpResponse::text(marker))
    })
    .unwrap()
}

// =============================================================================
// Routing
// =============================================================================

#[tokio::test]
async fn static_route_does_not_shadow_dynamic_sibling() {
    let mut app = Application::new();
    app.add_route(text_route("/users", &[HttpMethod::GET], "list"));
    app.add_route(
        Route::get("/users/{id}", |req| async move {
            Ok(HttpResponse::text(format!(
                "user {}",
                req.param("id").unwrap()
            )))
        })
        .unwrap(),
    );

    let client = TestClient::from_app(app);
    // "/users" has no extra segment, so the dynamic route matches.
    let resp = client.get("/users/123").await;
    assert_eq!(resp.body_string(), "user 123");
    let resp = client.get("/users").await;
    assert_eq!(resp.body_string(), "list");
}

#[tokio::test]
async fn registration_order_wins_over_specificity() {
    let mut app = Application::new();
    app.add_route(
        Route::get("/users/{id}", |req| async move {
            Ok(HttpResponse::text(format!(
                "captured {}",
                req.param("id").unwrap()
            )))
        })
        .unwrap(),
    );
    app.add_route(text_route("/users/new", &[HttpMethod::GET], "literal"));

    let client = TestClient::from_app(app);
    // First-match-wins: the generic pattern captures "new".
    let resp = client.get("/users/new").await;
    assert_eq!(resp.body_string(), "captured new");
}

#[tokio::test]
async fn method_mismatch_is_405_not_404() {
    let mut app = Application::new();
    app.add_route(text_route("/items", &[HttpMethod::GET], "items"));

    let client = TestClient::from_app(app);
    let resp = client.post("/items", Vec::new()).await;
    assert_status(&resp, 405);
    assert_header(&resp, "Allow", "GET");

    let resp = client.get("/absent").await;
    assert_status(&resp, 404);
}

#[tokio::test]
async fn trailing_slash_forms_resolve_to_the_same_route() {
    let mut app = Application::new();
    app.add_route(text_route("/api/test/", &[HttpMethod::GET], "same"));

    let client = TestClient::from_app(app);
    assert_eq!(client.get("/api/test").await.body_string(), "same");
    assert_eq!(client.get("/api/test/").await.body_string(), "same");
}

#[tokio::test]
async fn typed_parameter_mismatch_is_not_found() {
    let mut app = Application::new();
    app.add_route(text_route("/items/{id:int}", &[HttpMethod::GET], "item"));

    let client = TestClient::from_app(app);
    assert_status(&client.get("/items/42").await, 200);
    assert_status(&client.get("/items/forty-two").await, 404);
}

#[tokio::test]
async fn greedy_path_parameter_round_trips() {
    let mut app = Application::new();
    app.add_route(
        Route::get("/prefix/{rest:path}", |req| async move {
            Ok(HttpResponse::text(
                req.param("rest").unwrap().to_string(),
            ))
        })
        .unwrap(),
    );

    let client = TestClient::from_app(app);
    let resp = client.get("/prefix/a/b/c").await;
    assert_eq!(resp.body_string(), "a/b/c");
}

// =============================================================================
// Groups
// =============================================================================

#[tokio::test]
async fn nested_groups_compose_prefixes_and_params() {
    let comments = Route::get("/{post_id}/comments", |req| async move {
        Ok(HttpResponse::text(format!(
            "comments for {}",
            req.param("post_id").unwrap()
        )))
    })
    .unwrap();

    let inner = RouteGroup::new("/posts").unwrap().route(comments);
    let outer = RouteGroup::new("/api").unwrap().group(inner);

    let mut app = Application::new();
    app.add_group(outer);

    let client = TestClient::from_app(app);
    let resp = client.get("/api/posts/456/comments").await;
    assert_eq!(resp.body_string(), "comments for 456");
}

#[tokio::test]
async fn group_prefix_trailing_slash_is_equivalent() {
    let mut app = Application::new();
    app.add_group(
        RouteGroup::new("/api/")
            .unwrap()
            .route(text_route("/users", &[HttpMethod::GET], "users")),
    );

    let client = TestClient::from_app(app);
    assert_status(&client.get("/api/users").await, 200);
}

struct RecordingMiddleware(&'static str, Arc<std::sync::Mutex<Vec<&'static str>>>);

#[async_trait]
impl Middleware for RecordingMiddleware {
    async fn handle(
        &self,
        req: HttpRequest,
        next: Next,
    ) -> Result<HttpResponse, trellis::Error> {
        self.1.lock().unwrap().push(self.0);
        next(req).await
    }
}

#[tokio::test]
async fn middleware_runs_global_then_group_then_route() {
    let order = Arc::new(std::sync::Mutex::new(Vec::new()));

    let mut app = Application::new();
    app.use_middleware(RecordingMiddleware("global", order.clone()));
    app.add_group(
        RouteGroup::new("/api")
            .unwrap()
            .middleware(RecordingMiddleware("group", order.clone()))
            .route(
                text_route("/leaf", &[HttpMethod::GET], "leaf")
                    .middleware(RecordingMiddleware("route", order.clone())),
            ),
    );

    let client = TestClient::from_app(app);
    assert_status(&client.get("/api/leaf").await, 200);
    assert_eq!(*order.lock().unwrap(), vec!["global", "group", "route"]);
}

struct Gatekeeper;

#[async_trait]
impl Middleware for Gatekeeper {
    async fn handle(
        &self,
        _req: HttpRequest,
        _next: Next,
    ) -> Result<HttpResponse, trellis::Error> {
        Ok(HttpResponse::new(403).with_body(b"forbidden".to_vec()))
    }
}

#[tokio::test]
async fn short_circuit_prevents_all_downstream_work() {
    let handler_calls = Arc::new(AtomicUsize::new(0));
    let inner_calls = Arc::new(std::sync::Mutex::new(Vec::new()));

    let mut app = Application::new();
    app.use_middleware(Gatekeeper);
    app.use_middleware(RecordingMiddleware("inner", inner_calls.clone()));

    let calls = handler_calls.clone();
    app.add_route(
        Route::get("/protected", move |_req| {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(HttpResponse::ok())
            }
        })
        .unwrap(),
    );

    let client = TestClient::from_app(app);
    let resp = client.get("/protected").await;
    assert_status(&resp, 403);
    assert_eq!(handler_calls.load(Ordering::SeqCst), 0);
    assert!(inner_calls.lock().unwrap().is_empty());
}

// =============================================================================
// Dependency resolution
// =============================================================================

#[tokio::test]
async fn sibling_dependencies_share_one_cached_invocation() {
    let calls = Arc::new(AtomicUsize::new(0));
    let shared = {
        let calls = calls.clone();
        Arc::new(Provider::new("pool", move |_cx| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok("pool".to_string()) }
        }))
    };
    let users = Arc::new(
        Provider::new("users", |cx: ProviderContext| {
            let pool = cx.dependency::<String>("pool").unwrap();
            async move { Ok(format!("users@{}", pool)) }
        })
        .with_dependency("pool", shared.clone()),
    );
    let posts = Arc::new(
        Provider::new("posts", |cx: ProviderContext| {
            let pool = cx.dependency::<String>("pool").unwrap();
            async move { Ok(format!("posts@{}", pool)) }
        })
        .with_dependency("pool", shared),
    );

    let mut app = Application::new();
    app.add_route(
        Route::get("/report", |req| async move {
            let users = req.dependency::<String>("users").unwrap();
            let posts = req.dependency::<String>("posts").unwrap();
            Ok(HttpResponse::text(format!("{} {}", users, posts)))
        })
        .unwrap()
        .dependency("users", users)
        .dependency("posts", posts),
    );

    let client = TestClient::from_app(app);
    let resp = client.get("/report").await;
    assert_eq!(resp.body_string(), "users@pool posts@pool");
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // A second request gets a fresh cache.
    client.get("/report").await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn disabled_cache_invokes_per_reference() {
    let calls = Arc::new(AtomicUsize::new(0));
    let uncached = {
        let calls = calls.clone();
        Arc::new(
            Provider::new("stamp", move |_cx| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move { Ok(n) }
            })
            .no_cache(),
        )
    };

    let mut app = Application::new();
    app.add_route(
        Route::get("/stamps", |req| async move {
            let first = req.dependency::<usize>("first").unwrap();
            let second = req.dependency::<usize>("second").unwrap();
            Ok(HttpResponse::text(format!("{}{}", first, second)))
        })
        .unwrap()
        .dependency("first", uncached.clone())
        .dependency("second", uncached),
    );

    let client = TestClient::from_app(app);
    client.get("/stamps").await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn circular_dependency_fails_with_named_cycle() {
    let a = Arc::new(Provider::new("a", |_cx| async { Ok(()) }));
    let b = Arc::new(Provider::new("b", |_cx| async { Ok(()) }));
    a.depends_on("b", b.clone());
    b.depends_on("a", a.clone());

    let mut app = Application::new();
    app.add_route(
        Route::get("/cyclic", |_req| async { Ok(HttpResponse::ok()) })
            .unwrap()
            .dependency("a", a),
    );

    let client = TestClient::from_app(app);
    let resp = client.get("/cyclic").await;
    assert_status(&resp, 500);
    let body = resp.body_string();
    assert!(body.contains("Circular dependency"));
    assert!(body.contains("a -> b -> a"));
}

// =============================================================================
// URL reversal
// =============================================================================

#[tokio::test]
async fn reversal_requires_the_exact_parameter_set() {
    let mut app = Application::new();
    app.add_route(
        text_route("/shop/{category}/{id:int}", &[HttpMethod::GET], "product")
            .name("shop.products"),
    );

    match app.url_path_for("shop.products", &[]) {
        Err(trellis::Error::ParameterMismatch { missing, extra }) => {
            assert_eq!(missing, vec!["category".to_string(), "id".to_string()]);
            assert!(extra.is_empty());
        }
        other => panic!("expected ParameterMismatch, got {:?}", other.map(|_| ())),
    }

    let url = app
        .url_path_for("shop.products", &[("category", "books"), ("id", "3")])
        .unwrap();
    assert_eq!(url, "/shop/books/3");
}

#[tokio::test]
async fn reversal_composes_through_nested_groups() {
    let route = text_route("/{post_id}/comments", &[HttpMethod::GET], "c").name("post.comments");
    let mut app = Application::new();
    app.add_group(
        RouteGroup::new("/api")
            .unwrap()
            .group(RouteGroup::new("/posts").unwrap().route(route)),
    );

    let url = app
        .url_path_for("post.comments", &[("post_id", "9")])
        .unwrap();
    assert_eq!(url, "/api/posts/9/comments");
}

// =============================================================================
// Exception handling and enumeration
// =============================================================================

#[tokio::test]
async fn registered_exception_handler_overrides_default_body() {
    let mut app = Application::new();
    app.add_exception_handler(404, |req, _err| async move {
        HttpResponse::new(404).with_body(format!("no page at {}", req.path).into_bytes())
    });

    let client = TestClient::from_app(app);
    let resp = client.get("/ghost").await;
    assert_status(&resp, 404);
    assert_eq!(resp.body_string(), "no page at /ghost");
}

#[tokio::test]
async fn route_enumeration_feeds_the_openapi_builder() {
    let mut app = Application::new();
    app.add_route(
        text_route("/users/{id:int}", &[HttpMethod::GET], "user")
            .name("user.detail")
            .summary("Fetch one user"),
    );
    app.add_group(
        RouteGroup::new("/api")
            .unwrap()
            .route(text_route("/posts", &[HttpMethod::POST], "posts").name("post.create")),
    );

    let routes = app.get_all_routes();
    assert_eq!(routes.len(), 2);
    assert_eq!(routes[0].path, "/users/{id:int}");
    assert_eq!(routes[1].path, "/api/posts");

    let spec = trellis_openapi::OpenApiBuilder::new("Demo", "1.0")
        .routes(&routes)
        .build();
    assert!(spec.paths.contains_key("/users/{id}"));
    assert!(spec.paths.contains_key("/api/posts"));
    let op = spec.paths["/users/{id}"].get.as_ref().unwrap();
    assert_eq!(op.summary.as_deref(), Some("Fetch one user"));
}
