// Route groups: prefixed, middleware-wrapped aggregations of routes.
//
// A group either wraps an inner router of child endpoints or mounts an
// opaque sub-application. From the owning router's point of view a group
// is just another endpoint: it matches by prefix, reverses URLs, and
// dispatches.

use crate::middleware::{HandlerFn, Middleware};
use crate::pattern::{ParamDescriptor, PathParams, PathPattern};
use crate::routing::{compose_path, Route, RouteInfo, RouteMatch, Router};
use crate::traits::RequestHandler;
use crate::{Error, HttpMethod, HttpRequest};
use std::sync::Arc;
use tracing::debug;

/// What a group dispatches into after its prefix is stripped.
#[derive(Clone)]
pub enum GroupTarget {
    /// Child routes and sub-groups wrapped in an internal router.
    Router(Router),
    /// An opaque mounted sub-application.
    App(Arc<dyn RequestHandler>),
}

/// A named, path-prefixed aggregation of routes, itself routable.
#[derive(Clone)]
pub struct RouteGroup {
    pattern: PathPattern,
    name: Option<String>,
    middleware: Vec<Arc<dyn Middleware>>,
    target: GroupTarget,
}

impl RouteGroup {
    /// Create a routed group with the given path prefix.
    ///
    /// The prefix must be empty or start with `/`; a trailing `/` is
    /// stripped, so `/api/` and `/api` are equivalent prefixes.
    pub fn new(prefix: &str) -> Result<Self, Error> {
        Ok(Self {
            pattern: Self::compile_prefix(prefix)?,
            name: None,
            middleware: Vec::new(),
            target: GroupTarget::Router(Router::new()),
        })
    }

    /// Create a routed group pre-populated with routes.
    pub fn with_routes(prefix: &str, routes: Vec<Route>) -> Result<Self, Error> {
        let mut group = Self::new(prefix)?;
        if let GroupTarget::Router(router) = &mut group.target {
            for route in routes {
                router.add_route(route);
            }
        }
        Ok(group)
    }

    /// Mount an opaque sub-application under the given prefix.
    ///
    /// The sub-application receives requests with the prefix stripped
    /// from the path, and matches every method.
    pub fn mount(prefix: &str, app: Arc<dyn RequestHandler>) -> Result<Self, Error> {
        Ok(Self {
            pattern: Self::compile_prefix(prefix)?,
            name: None,
            middleware: Vec::new(),
            target: GroupTarget::App(app),
        })
    }

    fn compile_prefix(prefix: &str) -> Result<PathPattern, Error> {
        if !prefix.is_empty() && !prefix.starts_with('/') {
            return Err(Error::PatternCompile {
                template: prefix.to_string(),
                reason: "group prefix must be empty or start with '/'".to_string(),
            });
        }
        PathPattern::compile(prefix.trim_end_matches('/'))
    }

    /// Name this group for reverse URL lookup.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Attach group-scoped middleware, wrapped outside route middleware.
    pub fn middleware<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    /// Add a child route. Ignored for mounted sub-applications.
    pub fn route(mut self, route: Route) -> Self {
        match &mut self.target {
            GroupTarget::Router(router) => router.add_route(route),
            GroupTarget::App(_) => {
                debug!(prefix = %self.pattern.template(), "Ignoring route added to a mounted group")
            }
        }
        self
    }

    /// Add a nested child group. Ignored for mounted sub-applications.
    pub fn group(mut self, group: RouteGroup) -> Self {
        match &mut self.target {
            GroupTarget::Router(router) => router.add_group(group),
            GroupTarget::App(_) => {
                debug!(prefix = %self.pattern.template(), "Ignoring group added to a mounted group")
            }
        }
        self
    }

    /// The normalized prefix.
    pub fn prefix(&self) -> &str {
        self.pattern.template()
    }

    pub fn group_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The inner router, when this group is not a mounted sub-application.
    pub fn router(&self) -> Option<&Router> {
        match &self.target {
            GroupTarget::Router(router) => Some(router),
            GroupTarget::App(_) => None,
        }
    }

    pub fn target(&self) -> &GroupTarget {
        &self.target
    }

    /// Match this group's prefix, returning captures and the remainder.
    pub fn match_prefix(&self, path: &str) -> Option<(PathParams, String)> {
        self.pattern.match_prefix(path)
    }

    /// Reverse this group's own URL; the name must be this group's own.
    pub fn url_path_for(&self, name: &str, values: &[(&str, &str)]) -> Result<String, Error> {
        if self.name.as_deref() != Some(name) {
            return Err(Error::RouteNameMismatch {
                requested: name.to_string(),
                actual: self.name.clone().unwrap_or_default(),
            });
        }
        let path = self.pattern.format_path(values)?;
        Ok(if path.is_empty() { "/".to_string() } else { path })
    }

    pub(crate) fn resolve_prefixed(
        &self,
        path: &str,
        method: &str,
        allowed: &mut Vec<HttpMethod>,
    ) -> Option<RouteMatch> {
        let (prefix_params, rest) = self.match_prefix(path)?;
        match &self.target {
            GroupTarget::Router(inner) => {
                let mut hit = inner.resolve_inner(&rest, method, allowed)?;
                let mut params = prefix_params;
                params.merge(hit.params);
                hit.params = params;
                let mut middleware = self.middleware.clone();
                middleware.extend(hit.group_middleware);
                hit.group_middleware = middleware;
                hit.template = compose_path(self.pattern.template(), &hit.template);
                Some(hit)
            }
            GroupTarget::App(app) => {
                let app = app.clone();
                let rest_path = rest.clone();
                let handler: HandlerFn = Arc::new(move |mut req: HttpRequest| {
                    let app = app.clone();
                    let rest = rest_path.clone();
                    Box::pin(async move {
                        req.path = rest;
                        app.handle(req).await
                    })
                });
                Some(RouteMatch {
                    handler,
                    params: prefix_params,
                    group_middleware: self.middleware.clone(),
                    route_middleware: Vec::new(),
                    dependencies: Vec::new(),
                    template: self.pattern.template().to_string(),
                })
            }
        }
    }

    pub(crate) fn find_template(&self, name: &str) -> Option<(String, Vec<ParamDescriptor>)> {
        if self.name.as_deref() == Some(name) {
            return Some((
                self.pattern.template().to_string(),
                self.pattern.descriptors().to_vec(),
            ));
        }
        match &self.target {
            GroupTarget::Router(inner) => {
                let (template, descriptors) = inner.find_template(name)?;
                let composed = compose_path(self.pattern.template(), &template);
                let mut all = self.pattern.descriptors().to_vec();
                all.extend(descriptors);
                Some((composed, all))
            }
            GroupTarget::App(_) => None,
        }
    }

    pub(crate) fn collect_routes(&self, prefix: &str, out: &mut Vec<RouteInfo>) {
        let full = format!("{}{}", prefix, self.pattern.template());
        match &self.target {
            GroupTarget::Router(inner) => inner.collect_routes(&full, out),
            GroupTarget::App(_) => out.push(RouteInfo {
                path: if full.is_empty() { "/".to_string() } else { full },
                methods: Vec::new(),
                name: self.name.clone(),
                summary: None,
            }),
        }
    }
}

impl std::fmt::Debug for RouteGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteGroup")
            .field("prefix", &self.pattern.template())
            .field("name", &self.name)
            .field(
                "target",
                &match &self.target {
                    GroupTarget::Router(_) => "router",
                    GroupTarget::App(_) => "app",
                },
            )
            .finish()
    }
}
