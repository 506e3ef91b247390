// Application object and HTTP gateway adapter
//
// The application owns the root router, the global middleware list, the
// exception-handler registry, lifecycle hooks, and typed app state. It is
// built explicitly at startup; there is no process-wide default instance.
// Once serving begins the routing tree is shared read-only.

use crate::dependency::{resolve_dependencies, DependencyCache};
use crate::extensions::Extensions;
use crate::http::split_target;
use crate::middleware::{BoxFuture, HandlerFn, Middleware, MiddlewareChain};
use crate::route_group::RouteGroup;
use crate::routing::{Endpoint, Route, RouteInfo, Router};
use crate::traits::RequestHandler;
use crate::{Error, HttpRequest, HttpResponse};
use http_body_util::{BodyExt, Full};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, body::Incoming as IncomingBody};
use hyper_util::rt::TokioIo;
use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

/// Handler invoked when a chain link raises, keyed by response status.
pub type ExceptionHandlerFn =
    Arc<dyn Fn(HttpRequest, Arc<Error>) -> BoxFuture<'static, HttpResponse> + Send + Sync>;

/// Async hook run at application startup or shutdown.
pub type LifecycleHook = Arc<dyn Fn() -> BoxFuture<'static, Result<(), Error>> + Send + Sync>;

/// Registry of exception handlers consulted after the chain raises.
///
/// The registry guarantees every error becomes a response: an unmatched
/// status falls back to the default JSON error body.
#[derive(Clone, Default)]
pub struct ExceptionHandlers {
    by_status: HashMap<u16, ExceptionHandlerFn>,
}

impl ExceptionHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<F, Fut>(&mut self, status: u16, f: F)
    where
        F: Fn(HttpRequest, Arc<Error>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HttpResponse> + Send + 'static,
    {
        let handler: ExceptionHandlerFn = Arc::new(move |req, err| Box::pin(f(req, err)));
        self.by_status.insert(status, handler);
    }

    pub fn contains(&self, status: u16) -> bool {
        self.by_status.contains_key(&status)
    }

    /// Convert an error into a response, through a registered handler or
    /// the default JSON body.
    pub async fn render(&self, request: HttpRequest, err: Error) -> HttpResponse {
        let status = err.status_code();
        let err = Arc::new(err);
        if let Some(handler) = self.by_status.get(&status) {
            return handler(request, err).await;
        }
        default_error_response(&err)
    }
}

fn default_error_response(err: &Error) -> HttpResponse {
    let status = err.status_code();
    let body = serde_json::json!({
        "error": err.to_string(),
        "status": status,
    });
    let mut response = HttpResponse::new(status)
        .with_json(&body)
        .unwrap_or_else(|_| HttpResponse::internal_server_error());
    // A 405 must report the allowed method set.
    if let Error::MethodNotAllowed { allowed, .. } = err {
        let allow = allowed
            .iter()
            .map(|m| m.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        response = response.with_header("Allow".to_string(), allow);
    }
    response
}

/// The main application struct
pub struct Application {
    router: Router,
    middleware: Vec<Arc<dyn Middleware>>,
    exception_handlers: ExceptionHandlers,
    state: Extensions,
    startup_hooks: Vec<LifecycleHook>,
    shutdown_hooks: Vec<LifecycleHook>,
}

impl Application {
    pub fn new() -> Self {
        Self {
            router: Router::new(),
            middleware: Vec::new(),
            exception_handlers: ExceptionHandlers::new(),
            state: Extensions::new(),
            startup_hooks: Vec::new(),
            shutdown_hooks: Vec::new(),
        }
    }

    /// Add a route to the root router
    pub fn add_route(&mut self, route: Route) {
        self.router.add_route(route);
    }

    /// Add a group to the root router
    pub fn add_group(&mut self, group: RouteGroup) {
        self.router.add_group(group);
    }

    pub fn add_endpoint(&mut self, endpoint: impl Into<Endpoint>) {
        self.router.add_endpoint(endpoint);
    }

    /// Register application-level middleware, outermost in every chain
    pub fn use_middleware<M: Middleware + 'static>(&mut self, middleware: M) {
        self.middleware.push(Arc::new(middleware));
    }

    /// Register an exception handler for a response status
    pub fn add_exception_handler<F, Fut>(&mut self, status: u16, f: F)
    where
        F: Fn(HttpRequest, Arc<Error>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HttpResponse> + Send + 'static,
    {
        self.exception_handlers.insert(status, f);
    }

    /// Typed application state, attached to every request's extensions
    pub fn state(&self) -> &Extensions {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut Extensions {
        &mut self.state
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Reverse a route name to a URL path
    pub fn url_path_for(&self, name: &str, values: &[(&str, &str)]) -> Result<String, Error> {
        self.router.url_path_for(name, values)
    }

    /// Enumerate all registered routes in registration order.
    ///
    /// Stable read API for documentation builders and URL tooling.
    pub fn get_all_routes(&self) -> Vec<RouteInfo> {
        self.router.all_routes()
    }

    pub fn on_startup<F, Fut>(&mut self, f: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), Error>> + Send + 'static,
    {
        self.startup_hooks.push(Arc::new(move || Box::pin(f())));
    }

    pub fn on_shutdown<F, Fut>(&mut self, f: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), Error>> + Send + 'static,
    {
        self.shutdown_hooks.push(Arc::new(move || Box::pin(f())));
    }

    /// Run startup hooks in registration order; the first failure aborts.
    pub async fn run_startup(&self) -> Result<(), Error> {
        for hook in &self.startup_hooks {
            hook().await?;
        }
        Ok(())
    }

    /// Run shutdown hooks in registration order; failures are logged.
    pub async fn run_shutdown(&self) {
        for hook in &self.shutdown_hooks {
            if let Err(e) = hook().await {
                warn!(error = %e, "Shutdown hook failed");
            }
        }
    }

    /// Dispatch one request through routing, middleware, and dependency
    /// resolution.
    ///
    /// Every outcome is a response: routing misses and chain errors are
    /// converted by the exception-handler registry, so the caller never
    /// observes a raised error.
    pub async fn handle(&self, mut req: HttpRequest) -> HttpResponse {
        req.extensions.extend(&self.state);

        let target = std::mem::take(&mut req.path);
        let (path, query) = split_target(&target);
        req.path = path.to_string();
        req.query_params.extend(query);

        let matched = match self.router.resolve(&req.path, &req.method) {
            Ok(m) => m,
            Err(e) => return self.exception_handlers.render(req, e).await,
        };

        req.path_params = matched.params.clone();
        let exception_req = req.clone();

        let chain = MiddlewareChain::compose(
            &self.middleware,
            &matched.group_middleware,
            &matched.route_middleware,
        );

        // Dependencies resolve inside the terminal link so a middleware
        // short-circuit skips provider work entirely.
        let dependencies = matched.dependencies.clone();
        let inner = matched.handler.clone();
        let terminal: HandlerFn = Arc::new(move |mut req: HttpRequest| {
            let dependencies = dependencies.clone();
            let inner = inner.clone();
            Box::pin(async move {
                if !dependencies.is_empty() {
                    let snapshot = Arc::new(req.clone());
                    let mut cache = DependencyCache::new();
                    let values = resolve_dependencies(&dependencies, snapshot, &mut cache).await?;
                    req.dependencies = values;
                }
                inner(req).await
            })
        });

        match chain.apply(req, terminal).await {
            Ok(response) => response,
            Err(e) => self.exception_handlers.render(exception_req, e).await,
        }
    }

    /// Start the HTTP server on the specified port
    pub async fn listen(self: Arc<Self>, port: u16) -> Result<(), Error> {
        self.run_startup().await?;

        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let listener = TcpListener::bind(addr).await?;

        info!("Server listening on http://{}", addr);

        loop {
            let (stream, _) = listener.accept().await?;
            let io = TokioIo::new(stream);
            let app = self.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req: Request<IncomingBody>| {
                    let app = app.clone();
                    async move { gateway_request(req, app).await }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    error!("Error serving connection: {:?}", err);
                }
            });
        }
    }
}

impl Default for Application {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl RequestHandler for Application {
    async fn handle(&self, request: HttpRequest) -> Result<HttpResponse, Error> {
        Ok(Application::handle(self, request).await)
    }
}

/// Convert one hyper request, dispatch it, and convert the response back
async fn gateway_request(
    req: Request<IncomingBody>,
    app: Arc<Application>,
) -> Result<Response<Full<bytes::Bytes>>, hyper::Error> {
    let method = req.method().to_string();
    let target = req
        .uri()
        .path_and_query()
        .map(|pq| pq.to_string())
        .unwrap_or_else(|| req.uri().path().to_string());

    let mut request = HttpRequest::new(method, target);

    for (name, value) in req.headers() {
        if let Ok(value_str) = value.to_str() {
            request
                .headers
                .insert(name.to_string(), value_str.to_string());
        }
    }

    let body_bytes = req.collect().await?.to_bytes();
    request.body = body_bytes.to_vec();

    let response = app.handle(request).await;

    let mut builder = Response::builder().status(response.status);
    for (key, value) in response.headers {
        builder = builder.header(key, value);
    }
    let body = Full::new(bytes::Bytes::from(response.body));
    Ok(builder
        .body(body)
        .unwrap_or_else(|_| Response::new(Full::new(bytes::Bytes::new()))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dependency::Provider;
    use crate::middleware::Next;
    use crate::HttpMethod;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn text_route(path: &str, methods: &[HttpMethod], marker: &'static str) -> Route {
        Route::new(path, methods, move |_req| async move {
            Ok(HttpResponse::text(marker))
        })
        .unwrap()
    }

    fn get(path: &str) -> HttpRequest {
        HttpRequest::new("GET".into(), path.into())
    }

    #[tokio::test]
    async fn not_found_becomes_404_response() {
        let app = Application::new();
        let resp = app.handle(get("/missing")).await;
        assert_eq!(resp.status, 404);
        let body: serde_json::Value = serde_json::from_slice(&resp.body).unwrap();
        assert_eq!(body["status"], 404);
    }

    #[tokio::test]
    async fn method_not_allowed_reports_allow_header() {
        let mut app = Application::new();
        app.add_route(text_route("/items", &[HttpMethod::GET], "items"));
        let resp = app
            .handle(HttpRequest::new("POST".into(), "/items".into()))
            .await;
        assert_eq!(resp.status, 405);
        assert_eq!(resp.header("Allow").map(String::as_str), Some("GET"));
    }

    #[tokio::test]
    async fn custom_exception_handler_rewrites_404() {
        let mut app = Application::new();
        app.add_exception_handler(404, |_req, _err| async {
            HttpResponse::text("nothing here")
        });
        let resp = app.handle(get("/missing")).await;
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body_string(), "nothing here");
    }

    #[tokio::test]
    async fn handler_error_is_converted_not_raised() {
        let mut app = Application::new();
        app.add_route(
            Route::get("/boom", |_req| async {
                Err::<HttpResponse, _>(Error::Internal("kaput".into()))
            })
            .unwrap(),
        );
        let resp = app.handle(get("/boom")).await;
        assert_eq!(resp.status, 500);
        assert!(resp.body_string().contains("kaput"));
    }

    #[tokio::test]
    async fn path_params_reach_the_handler() {
        let mut app = Application::new();
        app.add_route(
            Route::get("/users/{id:int}", |req| async move {
                let id = req.param("id").and_then(|v| v.as_int()).unwrap_or(0);
                Ok(HttpResponse::text(format!("user {}", id)))
            })
            .unwrap(),
        );
        let resp = app.handle(get("/users/37")).await;
        assert_eq!(resp.body_string(), "user 37");
    }

    #[tokio::test]
    async fn query_params_are_parsed_from_the_target() {
        let mut app = Application::new();
        app.add_route(
            Route::get("/search", |req| async move {
                Ok(HttpResponse::text(
                    req.query("q").cloned().unwrap_or_default(),
                ))
            })
            .unwrap(),
        );
        let resp = app.handle(get("/search?q=trellis")).await;
        assert_eq!(resp.body_string(), "trellis");
    }

    #[tokio::test]
    async fn dependencies_are_injected_before_the_handler() {
        let mut app = Application::new();
        let provider = Arc::new(Provider::new("greeting", |_cx| async {
            Ok("hello".to_string())
        }));
        app.add_route(
            Route::get("/greet", |req| async move {
                let greeting = req.dependency::<String>("greeting").unwrap();
                Ok(HttpResponse::text((*greeting).clone()))
            })
            .unwrap()
            .dependency("greeting", provider),
        );
        let resp = app.handle(get("/greet")).await;
        assert_eq!(resp.body_string(), "hello");
    }

    #[tokio::test]
    async fn dependency_failure_is_a_500() {
        let mut app = Application::new();
        let provider = Arc::new(Provider::new("db", |_cx| async {
            Err::<(), _>(Error::Internal("no pool".into()))
        }));
        app.add_route(
            Route::get("/db", |_req| async { Ok(HttpResponse::ok()) })
                .unwrap()
                .dependency("db", provider),
        );
        let resp = app.handle(get("/db")).await;
        assert_eq!(resp.status, 500);
        assert!(resp.body_string().contains("db"));
    }

    struct Tag(&'static str, Arc<std::sync::Mutex<Vec<&'static str>>>);

    #[async_trait]
    impl Middleware for Tag {
        async fn handle(&self, req: HttpRequest, next: Next) -> Result<HttpResponse, Error> {
            self.1.lock().unwrap().push(self.0);
            next(req).await
        }
    }

    #[tokio::test]
    async fn middleware_scopes_compose_global_group_route() {
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut app = Application::new();
        app.use_middleware(Tag("global", order.clone()));
        let group = RouteGroup::new("/api")
            .unwrap()
            .middleware(Tag("group", order.clone()))
            .route(
                text_route("/leaf", &[HttpMethod::GET], "leaf")
                    .middleware(Tag("route", order.clone())),
            );
        app.add_group(group);

        let resp = app.handle(get("/api/leaf")).await;
        assert_eq!(resp.status, 200);
        assert_eq!(*order.lock().unwrap(), vec!["global", "group", "route"]);
    }

    struct Block;

    #[async_trait]
    impl Middleware for Block {
        async fn handle(&self, _req: HttpRequest, _next: Next) -> Result<HttpResponse, Error> {
            Ok(HttpResponse::new(401).with_body(b"denied".to_vec()))
        }
    }

    #[tokio::test]
    async fn short_circuit_skips_handler_and_providers() {
        let handler_calls = Arc::new(AtomicUsize::new(0));
        let provider_calls = Arc::new(AtomicUsize::new(0));

        let provider = {
            let calls = provider_calls.clone();
            Arc::new(Provider::new("x", move |_cx| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            }))
        };

        let mut app = Application::new();
        app.use_middleware(Block);
        let calls = handler_calls.clone();
        app.add_route(
            Route::get("/guarded", move |_req| {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(HttpResponse::ok())
                }
            })
            .unwrap()
            .dependency("x", provider),
        );

        let resp = app.handle(get("/guarded")).await;
        assert_eq!(resp.status, 401);
        assert_eq!(handler_calls.load(Ordering::SeqCst), 0);
        assert_eq!(provider_calls.load(Ordering::SeqCst), 0);
    }

    #[derive(Clone)]
    struct AppConfig {
        banner: &'static str,
    }

    #[tokio::test]
    async fn app_state_is_visible_on_requests() {
        let mut app = Application::new();
        app.state_mut().insert(AppConfig { banner: "trellis" });
        app.add_route(
            Route::get("/banner", |req| async move {
                let config = req.extensions.get::<AppConfig>().unwrap();
                Ok(HttpResponse::text(config.banner))
            })
            .unwrap(),
        );
        let resp = app.handle(get("/banner")).await;
        assert_eq!(resp.body_string(), "trellis");
    }

    #[tokio::test]
    async fn application_mounts_as_sub_app() {
        let mut inner = Application::new();
        inner.add_route(text_route("/status", &[HttpMethod::GET], "inner ok"));

        let mut outer = Application::new();
        outer.add_group(RouteGroup::mount("/nested", Arc::new(inner)).unwrap());

        let resp = outer.handle(get("/nested/status")).await;
        assert_eq!(resp.body_string(), "inner ok");
    }

    #[tokio::test]
    async fn startup_hooks_run_in_order_and_abort_on_failure() {
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut app = Application::new();
        let o = order.clone();
        app.on_startup(move || {
            let o = o.clone();
            async move {
                o.lock().unwrap().push(1);
                Ok(())
            }
        });
        let o = order.clone();
        app.on_startup(move || {
            let o = o.clone();
            async move {
                o.lock().unwrap().push(2);
                Err(Error::Internal("init failed".into()))
            }
        });
        let o = order.clone();
        app.on_startup(move || {
            let o = o.clone();
            async move {
                o.lock().unwrap().push(3);
                Ok(())
            }
        });

        assert!(app.run_startup().await.is_err());
        assert_eq!(*order.lock().unwrap(), vec![1, 2]);
    }
}
