// Routing system for HTTP requests
//
// A router holds an ordered list of endpoints; insertion order is matching
// priority. The first structural path match wins regardless of method, so
// a generic pattern registered before a more specific literal one shadows
// it. That ordering is part of the routing contract.

use crate::dependency::Dependency;
use crate::middleware::{HandlerFn, Middleware};
use crate::pattern::{
    format_template, normalize_path, ConverterRegistry, ParamDescriptor, PathParams, PathPattern,
};
use crate::route_group::RouteGroup;
use crate::{Error, HttpMethod, HttpRequest};
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

/// A single (pattern, methods, handler) binding.
#[derive(Clone)]
pub struct Route {
    pattern: PathPattern,
    methods: Vec<HttpMethod>,
    handler: HandlerFn,
    name: Option<String>,
    summary: Option<String>,
    middleware: Vec<Arc<dyn Middleware>>,
    dependencies: Vec<Dependency>,
}

impl Route {
    /// Register a route for the given methods.
    ///
    /// Pattern compilation errors are registration-time failures and are
    /// meant to abort startup.
    pub fn new<F, Fut>(path: &str, methods: &[HttpMethod], f: F) -> Result<Self, Error>
    where
        F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<crate::HttpResponse, Error>> + Send + 'static,
    {
        Self::with_converters(&ConverterRegistry::builtin(), path, methods, f)
    }

    /// Register a route compiled against an explicit converter registry.
    pub fn with_converters<F, Fut>(
        registry: &ConverterRegistry,
        path: &str,
        methods: &[HttpMethod],
        f: F,
    ) -> Result<Self, Error>
    where
        F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<crate::HttpResponse, Error>> + Send + 'static,
    {
        if methods.is_empty() {
            return Err(Error::Internal(format!(
                "route '{}' must allow at least one HTTP method",
                path
            )));
        }
        let pattern = PathPattern::compile_with(path, registry)?;
        Ok(Self {
            pattern,
            methods: methods.to_vec(),
            handler: crate::middleware::handler_fn(f),
            name: None,
            summary: None,
            middleware: Vec::new(),
            dependencies: Vec::new(),
        })
    }

    pub fn get<F, Fut>(path: &str, f: F) -> Result<Self, Error>
    where
        F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<crate::HttpResponse, Error>> + Send + 'static,
    {
        Self::new(path, &[HttpMethod::GET], f)
    }

    pub fn post<F, Fut>(path: &str, f: F) -> Result<Self, Error>
    where
        F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<crate::HttpResponse, Error>> + Send + 'static,
    {
        Self::new(path, &[HttpMethod::POST], f)
    }

    pub fn put<F, Fut>(path: &str, f: F) -> Result<Self, Error>
    where
        F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<crate::HttpResponse, Error>> + Send + 'static,
    {
        Self::new(path, &[HttpMethod::PUT], f)
    }

    pub fn delete<F, Fut>(path: &str, f: F) -> Result<Self, Error>
    where
        F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<crate::HttpResponse, Error>> + Send + 'static,
    {
        Self::new(path, &[HttpMethod::DELETE], f)
    }

    pub fn patch<F, Fut>(path: &str, f: F) -> Result<Self, Error>
    where
        F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<crate::HttpResponse, Error>> + Send + 'static,
    {
        Self::new(path, &[HttpMethod::PATCH], f)
    }

    /// Name this route for reverse URL lookup.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// One-line summary surfaced through route enumeration.
    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    /// Attach route-scoped middleware (innermost in the chain).
    pub fn middleware<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    /// Declare a dependency resolved before the handler runs.
    pub fn dependency(
        mut self,
        param: impl Into<String>,
        provider: impl Into<Arc<crate::dependency::Provider>>,
    ) -> Self {
        self.dependencies.push(Dependency::new(param, provider));
        self
    }

    pub fn pattern(&self) -> &PathPattern {
        &self.pattern
    }

    pub fn methods(&self) -> &[HttpMethod] {
        &self.methods
    }

    pub fn route_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn route_summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    pub fn allows(&self, method: &str) -> bool {
        HttpMethod::from_str(method)
            .map(|m| self.methods.contains(&m))
            .unwrap_or(false)
    }

    pub fn match_path(&self, path: &str) -> Option<PathParams> {
        self.pattern.match_path(path)
    }

    /// Reverse this route's URL; the name must be this route's own.
    pub fn url_path_for(&self, name: &str, values: &[(&str, &str)]) -> Result<String, Error> {
        if self.name.as_deref() != Some(name) {
            return Err(Error::RouteNameMismatch {
                requested: name.to_string(),
                actual: self.name.clone().unwrap_or_default(),
            });
        }
        self.pattern.format_path(values)
    }

    pub(crate) fn handler(&self) -> HandlerFn {
        self.handler.clone()
    }

    pub(crate) fn middleware_list(&self) -> &[Arc<dyn Middleware>] {
        &self.middleware
    }

    pub(crate) fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("path", &self.pattern.template())
            .field("methods", &self.methods)
            .field("name", &self.name)
            .finish()
    }
}

/// The routable entries a router can hold.
///
/// One explicit variant per shape; each supports matching, reverse URL
/// lookup, and dispatch through the owning router.
#[derive(Clone)]
pub enum Endpoint {
    Route(Route),
    Group(RouteGroup),
    Router(Router),
}

impl From<Route> for Endpoint {
    fn from(route: Route) -> Self {
        Endpoint::Route(route)
    }
}

impl From<RouteGroup> for Endpoint {
    fn from(group: RouteGroup) -> Self {
        Endpoint::Group(group)
    }
}

impl From<Router> for Endpoint {
    fn from(router: Router) -> Self {
        Endpoint::Router(router)
    }
}

/// The outcome of a successful route resolution.
pub struct RouteMatch {
    pub handler: HandlerFn,
    pub params: PathParams,
    /// Group middleware accumulated on the way down, outermost first.
    pub group_middleware: Vec<Arc<dyn Middleware>>,
    pub route_middleware: Vec<Arc<dyn Middleware>>,
    pub dependencies: Vec<Dependency>,
    /// The matched template, for diagnostics.
    pub template: String,
}

impl std::fmt::Debug for RouteMatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteMatch")
            .field("params", &self.params)
            .field("group_middleware", &self.group_middleware.len())
            .field("route_middleware", &self.route_middleware.len())
            .field("dependencies", &self.dependencies)
            .field("template", &self.template)
            .finish_non_exhaustive()
    }
}

/// Route metadata exposed for documentation and tooling.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteInfo {
    pub path: String,
    pub methods: Vec<HttpMethod>,
    pub name: Option<String>,
    pub summary: Option<String>,
}

/// Router for managing routes and resolving requests
#[derive(Clone, Default)]
pub struct Router {
    entries: Vec<Endpoint>,
}

impl Router {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Add a route to the router
    pub fn add_route(&mut self, route: Route) {
        self.entries.push(Endpoint::Route(route));
    }

    /// Add a group to the router
    pub fn add_group(&mut self, group: RouteGroup) {
        self.entries.push(Endpoint::Group(group));
    }

    /// Nest another router at the same prefix
    pub fn add_router(&mut self, router: Router) {
        self.entries.push(Endpoint::Router(router));
    }

    pub fn add_endpoint(&mut self, endpoint: impl Into<Endpoint>) {
        self.entries.push(endpoint.into());
    }

    pub fn entries(&self) -> &[Endpoint] {
        &self.entries
    }

    /// Resolve a request path and method to a route.
    ///
    /// First structural path match wins. A path match whose method set
    /// excludes the request method does not stop the search; only when no
    /// entry accepts the path for any method is `MethodNotAllowed`
    /// reported, carrying the union of allowed methods.
    pub fn resolve(&self, path: &str, method: &str) -> Result<RouteMatch, Error> {
        let path = normalize_path(path);
        let mut allowed: Vec<HttpMethod> = Vec::new();
        match self.resolve_inner(path, method, &mut allowed) {
            Some(m) => {
                debug!(%method, %path, template = %m.template, "Route resolved");
                Ok(m)
            }
            None if !allowed.is_empty() => {
                allowed.sort();
                allowed.dedup();
                Err(Error::MethodNotAllowed {
                    method: method.to_string(),
                    path: path.to_string(),
                    allowed,
                })
            }
            None => Err(Error::RouteNotFound(format!("{} {}", method, path))),
        }
    }

    pub(crate) fn resolve_inner(
        &self,
        path: &str,
        method: &str,
        allowed: &mut Vec<HttpMethod>,
    ) -> Option<RouteMatch> {
        for entry in &self.entries {
            match entry {
                Endpoint::Route(route) => {
                    if let Some(params) = route.match_path(path) {
                        if route.allows(method) {
                            return Some(RouteMatch {
                                handler: route.handler(),
                                params,
                                group_middleware: Vec::new(),
                                route_middleware: route.middleware_list().to_vec(),
                                dependencies: route.dependencies().to_vec(),
                                template: route.pattern.template().to_string(),
                            });
                        }
                        allowed.extend_from_slice(route.methods());
                    }
                }
                Endpoint::Group(group) => {
                    if let Some(hit) = group.resolve_prefixed(path, method, allowed) {
                        return Some(hit);
                    }
                }
                Endpoint::Router(inner) => {
                    if let Some(hit) = inner.resolve_inner(path, method, allowed) {
                        return Some(hit);
                    }
                }
            }
        }
        None
    }

    /// Reverse a route name to a URL path.
    ///
    /// The lookup falls through nested scopes structurally, in
    /// registration order, until the name is found or every scope is
    /// exhausted. Duplicate names shadow: the first registered wins.
    pub fn url_path_for(&self, name: &str, values: &[(&str, &str)]) -> Result<String, Error> {
        match self.find_template(name) {
            Some((template, descriptors)) => {
                let path = format_template(&template, &descriptors, values)?;
                Ok(if path.is_empty() { "/".to_string() } else { path })
            }
            None => Err(Error::UnknownRouteName(name.to_string())),
        }
    }

    pub(crate) fn find_template(&self, name: &str) -> Option<(String, Vec<ParamDescriptor>)> {
        for entry in &self.entries {
            match entry {
                Endpoint::Route(route) => {
                    if route.name.as_deref() == Some(name) {
                        return Some((
                            route.pattern.template().to_string(),
                            route.pattern.descriptors().to_vec(),
                        ));
                    }
                }
                Endpoint::Group(group) => {
                    if let Some(found) = group.find_template(name) {
                        return Some(found);
                    }
                }
                Endpoint::Router(inner) => {
                    if let Some(found) = inner.find_template(name) {
                        return Some(found);
                    }
                }
            }
        }
        None
    }

    /// Enumerate all routes in registration order with composed paths.
    ///
    /// This is the stable read API consumed by documentation builders and
    /// URL-listing tooling.
    pub fn all_routes(&self) -> Vec<RouteInfo> {
        let mut out = Vec::new();
        self.collect_routes("", &mut out);
        out
    }

    pub(crate) fn collect_routes(&self, prefix: &str, out: &mut Vec<RouteInfo>) {
        for entry in &self.entries {
            match entry {
                Endpoint::Route(route) => {
                    out.push(RouteInfo {
                        path: compose_path(prefix, route.pattern.template()),
                        methods: route.methods().to_vec(),
                        name: route.name.clone(),
                        summary: route.summary.clone(),
                    });
                }
                Endpoint::Group(group) => group.collect_routes(prefix, out),
                Endpoint::Router(inner) => inner.collect_routes(prefix, out),
            }
        }
    }
}

/// Concatenate a group prefix and a template, both already normalized.
pub(crate) fn compose_path(prefix: &str, template: &str) -> String {
    if prefix.is_empty() {
        if template.is_empty() {
            "/".to_string()
        } else {
            template.to_string()
        }
    } else if template == "/" || template.is_empty() {
        prefix.to_string()
    } else {
        format!("{}{}", prefix, template)
    }
}
