// Trellis - an async web-application framework for Rust
//
// This library provides typed path routing, nested route groups,
// middleware chains with call-next semantics, and request-scoped
// dependency injection.

// Re-export core functionality
pub use trellis_core::*;

// Re-export optional crates
#[cfg(feature = "openapi")]
pub use trellis_openapi;

#[cfg(feature = "testing")]
pub use trellis_testing;

// Prelude for common imports
pub mod prelude {
    pub use crate::{
        Application, Dependency, Error, Extensions, HttpMethod, HttpRequest, HttpResponse,
        HttpStatus, Json, LogConfig, Middleware, MiddlewareChain, Next, ParamValue, PathParams,
        PathPattern, Provider, ProviderContext, RequestHandler, Route, RouteGroup, RouteInfo,
        Router, handler_fn,
    };
}
