// Middleware system for request/response processing

use crate::{Error, HttpRequest, HttpResponse};
use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, trace};

/// A boxed future used across the framework's async seams
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Type alias for the next handler in the middleware chain
pub type Next = Box<dyn FnOnce(HttpRequest) -> BoxFuture<'static, Result<HttpResponse, Error>> + Send>;

/// Type alias for handler functions
pub type HandlerFn = Arc<
    dyn Fn(HttpRequest) -> BoxFuture<'static, Result<HttpResponse, Error>> + Send + Sync,
>;

/// Wrap an async closure as a [`HandlerFn`]
pub fn handler_fn<F, Fut>(f: F) -> HandlerFn
where
    F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<HttpResponse, Error>> + Send + 'static,
{
    Arc::new(move |req| Box::pin(f(req)))
}

/// Middleware trait with call-next semantics.
///
/// A middleware either invokes `next` to continue the chain or returns its
/// own response without calling it, short-circuiting everything downstream.
/// Errors are not caught here; they propagate to the application's
/// exception boundary.
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(&self, req: HttpRequest, next: Next) -> Result<HttpResponse, Error>;
}

/// Middleware chain executor.
///
/// Composed per dispatch from the three scopes, global outermost:
/// `global[0](global[1](...group[0](...route[0](handler))))`.
#[derive(Clone, Default)]
pub struct MiddlewareChain {
    middlewares: Arc<Vec<Arc<dyn Middleware>>>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self {
            middlewares: Arc::new(Vec::new()),
        }
    }

    /// Add a middleware to the end of the chain
    pub fn use_middleware<M: Middleware + 'static>(&mut self, middleware: M) {
        let mut mws = (*self.middlewares).clone();
        mws.push(Arc::new(middleware));
        self.middlewares = Arc::new(mws);
    }

    /// Compose a chain from the three middleware scopes.
    pub fn compose(
        global: &[Arc<dyn Middleware>],
        group: &[Arc<dyn Middleware>],
        route: &[Arc<dyn Middleware>],
    ) -> Self {
        let mut mws = Vec::with_capacity(global.len() + group.len() + route.len());
        mws.extend(global.iter().cloned());
        mws.extend(group.iter().cloned());
        mws.extend(route.iter().cloned());
        Self {
            middlewares: Arc::new(mws),
        }
    }

    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    /// Execute the middleware chain around a terminal handler
    pub async fn apply(&self, req: HttpRequest, handler: HandlerFn) -> Result<HttpResponse, Error> {
        debug!(
            middleware_count = self.middlewares.len(),
            path = %req.path,
            method = %req.method,
            "Executing middleware chain"
        );
        self.execute_from(0, req, handler).await
    }

    fn execute_from(
        &self,
        index: usize,
        req: HttpRequest,
        handler: HandlerFn,
    ) -> BoxFuture<'static, Result<HttpResponse, Error>> {
        if index >= self.middlewares.len() {
            trace!("Middleware chain complete, calling handler");
            handler(req)
        } else {
            let middleware = self.middlewares[index].clone();
            let chain = self.clone();
            let handler_clone = handler.clone();

            trace!(middleware_index = index, "Executing middleware");
            Box::pin(async move {
                middleware
                    .handle(
                        req,
                        Box::new(move |req| chain.execute_from(index + 1, req, handler_clone)),
                    )
                    .await
            })
        }
    }
}

// ========== Built-in Middleware ==========

/// Request logging middleware
pub struct RequestLogger;

#[async_trait]
impl Middleware for RequestLogger {
    async fn handle(&self, req: HttpRequest, next: Next) -> Result<HttpResponse, Error> {
        let start = std::time::Instant::now();
        let method = req.method.clone();
        let path = req.path.clone();

        let result = next(req).await;

        let elapsed = start.elapsed();
        match &result {
            Ok(response) => {
                debug!(%method, %path, status = response.status, ?elapsed, "Request completed");
            }
            Err(e) => {
                debug!(%method, %path, error = %e, ?elapsed, "Request failed");
            }
        }
        result
    }
}

/// CORS (Cross-Origin Resource Sharing) middleware
pub struct CorsMiddleware {
    pub allow_origin: String,
    pub allow_methods: String,
    pub allow_headers: String,
}

impl CorsMiddleware {
    pub fn new() -> Self {
        Self {
            allow_origin: "*".to_string(),
            allow_methods: "GET, POST, PUT, DELETE, OPTIONS, PATCH".to_string(),
            allow_headers: "Content-Type, Authorization, Accept".to_string(),
        }
    }

    pub fn allow_origin(mut self, origin: &str) -> Self {
        self.allow_origin = origin.to_string();
        self
    }

    fn cors_headers(&self) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        headers.insert(
            "Access-Control-Allow-Origin".to_string(),
            self.allow_origin.clone(),
        );
        headers.insert(
            "Access-Control-Allow-Methods".to_string(),
            self.allow_methods.clone(),
        );
        headers.insert(
            "Access-Control-Allow-Headers".to_string(),
            self.allow_headers.clone(),
        );
        headers
    }
}

impl Default for CorsMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Middleware for CorsMiddleware {
    async fn handle(&self, req: HttpRequest, next: Next) -> Result<HttpResponse, Error> {
        // Preflight requests short-circuit without reaching the handler
        if req.method == "OPTIONS" {
            let mut response = HttpResponse::no_content();
            response.headers.extend(self.cors_headers());
            return Ok(response);
        }

        let mut response = next(req).await?;
        response.headers.extend(self.cors_headers());
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn ok_handler(marker: &'static str) -> HandlerFn {
        handler_fn(move |_req| async move { Ok(HttpResponse::text(marker)) })
    }

    struct Tag(&'static str, Arc<std::sync::Mutex<Vec<&'static str>>>);

    #[async_trait]
    impl Middleware for Tag {
        async fn handle(&self, req: HttpRequest, next: Next) -> Result<HttpResponse, Error> {
            self.1.lock().unwrap().push(self.0);
            next(req).await
        }
    }

    struct ShortCircuit;

    #[async_trait]
    impl Middleware for ShortCircuit {
        async fn handle(&self, _req: HttpRequest, _next: Next) -> Result<HttpResponse, Error> {
            Ok(HttpResponse::new(403).with_body(b"blocked".to_vec()))
        }
    }

    #[tokio::test]
    async fn empty_chain_calls_handler() {
        let chain = MiddlewareChain::new();
        let req = HttpRequest::new("GET".into(), "/".into());
        let resp = chain.apply(req, ok_handler("hello")).await.unwrap();
        assert_eq!(resp.body, b"hello".to_vec());
    }

    #[tokio::test]
    async fn composition_order_is_global_group_route() {
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let global: Vec<Arc<dyn Middleware>> = vec![Arc::new(Tag("global", order.clone()))];
        let group: Vec<Arc<dyn Middleware>> = vec![Arc::new(Tag("group", order.clone()))];
        let route: Vec<Arc<dyn Middleware>> = vec![Arc::new(Tag("route", order.clone()))];
        let chain = MiddlewareChain::compose(&global, &group, &route);
        let req = HttpRequest::new("GET".into(), "/".into());
        chain.apply(req, ok_handler("x")).await.unwrap();
        assert_eq!(*order.lock().unwrap(), vec!["global", "group", "route"]);
    }

    #[tokio::test]
    async fn short_circuit_skips_inner_links_and_handler() {
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let handler_calls = Arc::new(AtomicUsize::new(0));

        let mut chain = MiddlewareChain::new();
        chain.use_middleware(Tag("outer", order.clone()));
        chain.use_middleware(ShortCircuit);
        chain.use_middleware(Tag("inner", order.clone()));

        let calls = handler_calls.clone();
        let handler = handler_fn(move |_req| {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(HttpResponse::ok())
            }
        });

        let req = HttpRequest::new("GET".into(), "/".into());
        let resp = chain.apply(req, handler).await.unwrap();
        assert_eq!(resp.status, 403);
        assert_eq!(*order.lock().unwrap(), vec!["outer"]);
        assert_eq!(handler_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn errors_propagate_unmodified() {
        struct Noop;
        #[async_trait]
        impl Middleware for Noop {
            async fn handle(&self, req: HttpRequest, next: Next) -> Result<HttpResponse, Error> {
                next(req).await
            }
        }
        let mut chain = MiddlewareChain::new();
        chain.use_middleware(Noop);
        let handler =
            handler_fn(|_req| async { Err::<HttpResponse, _>(Error::Internal("boom".into())) });
        let req = HttpRequest::new("GET".into(), "/".into());
        let err = chain.apply(req, handler).await.unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
    }

    #[tokio::test]
    async fn cors_preflight_short_circuits() {
        let mut chain = MiddlewareChain::new();
        chain.use_middleware(CorsMiddleware::new().allow_origin("https://app.example"));
        let req = HttpRequest::new("OPTIONS".into(), "/api".into());
        let resp = chain.apply(req, ok_handler("unreached")).await.unwrap();
        assert_eq!(resp.status, 204);
        assert_eq!(
            resp.header("Access-Control-Allow-Origin").map(String::as_str),
            Some("https://app.example")
        );
    }
}
