// Core library for the Trellis HTTP framework
// This module contains the routing, dependency-resolution, and middleware
// composition engine plus the application object and gateway adapter.

pub mod application;
pub mod dependency;
pub mod error;
pub mod extensions;
pub mod http;
pub mod logging;
pub mod middleware;
pub mod pattern;
pub mod route_group;
pub mod routing;
pub mod status;
pub mod traits;
pub mod websocket;

// Re-export commonly used types
pub use application::{Application, ExceptionHandlerFn, ExceptionHandlers, LifecycleHook};
pub use dependency::{
    Dependency, DependencyCache, DependencyScope, DependencyValue, DependencyValues, Provider,
    ProviderContext, resolve_dependencies,
};
pub use error::Error;
pub use extensions::Extensions;
pub use http::{HttpRequest, HttpResponse, Json, parse_query_string, split_target};
pub use logging::{LogConfig, LogFormat};
pub use middleware::{
    BoxFuture, CorsMiddleware, HandlerFn, Middleware, MiddlewareChain, Next, RequestLogger,
    handler_fn,
};
pub use pattern::{
    Converter, ConverterRegistry, ParamDescriptor, ParamValue, PathParams, PathPattern,
    PatternKind, normalize_path,
};
pub use route_group::{GroupTarget, RouteGroup};
pub use routing::{Endpoint, Route, RouteInfo, RouteMatch, Router};
pub use status::HttpStatus;
pub use traits::{HttpMethod, RequestHandler};
pub use websocket::{WsChannel, WsChannelRegistry, WsConnection, WsMessage, handle_socket};
