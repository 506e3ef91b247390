// Error types for the Trellis framework

use crate::{HttpMethod, HttpStatus};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(String),

    /// Malformed path template, raised at registration time.
    #[error("Invalid route pattern '{template}': {reason}")]
    PatternCompile { template: String, reason: String },

    /// No registered path matched the request path.
    #[error("Route not found: {0}")]
    RouteNotFound(String),

    /// A path matched but its method set excluded the requested method.
    #[error("Method not allowed: {method} {path}")]
    MethodNotAllowed {
        method: String,
        path: String,
        allowed: Vec<HttpMethod>,
    },

    /// URL reversal was asked of a route that owns a different name.
    #[error("Route name '{requested}' does not match route '{actual}'")]
    RouteNameMismatch { requested: String, actual: String },

    /// URL reversal found no route with the requested name in any scope.
    #[error("No route named '{0}'")]
    UnknownRouteName(String),

    /// URL reversal parameter set did not exactly match the pattern's.
    #[error("Parameter mismatch: missing {missing:?}, extra {extra:?}")]
    ParameterMismatch {
        missing: Vec<String>,
        extra: Vec<String>,
    },

    /// URL reversal value rejected by the parameter's type converter.
    #[error("Value '{value}' is not valid for path parameter '{name}'")]
    ReversalValueInvalid { name: String, value: String },

    /// A dependency provider depends on itself, directly or transitively.
    #[error("Circular dependency detected: {}", cycle.join(" -> "))]
    CircularDependency { cycle: Vec<String> },

    /// A provider failed; the original cause is preserved for diagnostics.
    #[error("Failed to resolve dependency '{provider}': {source}")]
    DependencyResolution {
        provider: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unprocessable Entity: {0}")]
    UnprocessableEntity(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Service Unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Error::RouteNotFound(_) => HttpStatus::NotFound.code(),
            Error::MethodNotAllowed { .. } => HttpStatus::MethodNotAllowed.code(),
            Error::BadRequest(_) | Error::Deserialization(_) => HttpStatus::BadRequest.code(),
            Error::Unauthorized(_) => HttpStatus::Unauthorized.code(),
            Error::Forbidden(_) => HttpStatus::Forbidden.code(),
            Error::Conflict(_) => HttpStatus::Conflict.code(),
            Error::UnprocessableEntity(_) => HttpStatus::UnprocessableEntity.code(),
            Error::ServiceUnavailable(_) => HttpStatus::ServiceUnavailable.code(),
            // Reversal and registration failures are programming errors and
            // surface as server-side faults when they reach the gateway.
            Error::PatternCompile { .. }
            | Error::RouteNameMismatch { .. }
            | Error::UnknownRouteName(_)
            | Error::ParameterMismatch { .. }
            | Error::ReversalValueInvalid { .. }
            | Error::CircularDependency { .. }
            | Error::DependencyResolution { .. }
            | Error::Provider(_)
            | Error::Http(_)
            | Error::Serialization(_)
            | Error::Internal(_)
            | Error::Io(_) => HttpStatus::InternalServerError.code(),
        }
    }

    /// Whether this error belongs to the dependency-resolution taxonomy.
    ///
    /// Taxonomy errors propagate unwrapped through the resolver; anything
    /// else is wrapped into [`Error::DependencyResolution`].
    pub fn is_dependency_error(&self) -> bool {
        matches!(
            self,
            Error::CircularDependency { .. } | Error::DependencyResolution { .. }
        )
    }
}
