// Request-scoped dependency resolution.
//
// Providers are declared once at registration time, each carrying its own
// declared dependency list, so the resolution graph is known before any
// request is dispatched. Resolution walks that graph recursively with an
// explicit in-progress stack for cycle detection and a per-request cache.
//
// A cycle such as `db -> users -> db` fails with
// `Error::CircularDependency { cycle: ["db", "users", "db"] }`.

use crate::error::Error;
use crate::http::HttpRequest;
use crate::middleware::BoxFuture;
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, RwLock};
use tracing::trace;

/// A type-erased resolved dependency value.
pub type DependencyValue = Arc<dyn Any + Send + Sync>;

type ProviderFn =
    Arc<dyn Fn(ProviderContext) -> BoxFuture<'static, Result<DependencyValue, Error>> + Send + Sync>;

/// Lifetime over which a resolved value is cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyScope {
    /// Cached for the duration of one request.
    Request,
}

/// A named dependency provider.
///
/// The provider's callable receives a [`ProviderContext`] giving it the
/// request view and its own resolved dependencies. Declared dependencies
/// live behind a lock so graphs (including deliberate cycles in tests)
/// can be wired after construction.
pub struct Provider {
    name: String,
    func: ProviderFn,
    dependencies: RwLock<Vec<Dependency>>,
    use_cache: bool,
    scope: DependencyScope,
}

impl Provider {
    pub fn new<T, F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(ProviderContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, Error>> + Send + 'static,
        T: Send + Sync + 'static,
    {
        let func: ProviderFn = Arc::new(move |cx| {
            let fut = f(cx);
            Box::pin(async move { fut.await.map(|v| Arc::new(v) as DependencyValue) })
        });
        Self {
            name: name.into(),
            func,
            dependencies: RwLock::new(Vec::new()),
            use_cache: true,
            scope: DependencyScope::Request,
        }
    }

    /// Disable request-scoped caching; the provider runs once per reference.
    pub fn no_cache(mut self) -> Self {
        self.use_cache = false;
        self
    }

    /// Declare a dependency of this provider (builder form).
    pub fn with_dependency(
        self,
        param: impl Into<String>,
        provider: impl Into<Arc<Provider>>,
    ) -> Self {
        self.depends_on(param, provider);
        self
    }

    /// Declare a dependency of this provider.
    ///
    /// Takes `&self` so mutually-referencing graphs can be wired after the
    /// providers are shared.
    pub fn depends_on(&self, param: impl Into<String>, provider: impl Into<Arc<Provider>>) {
        self.dependencies.write().unwrap().push(Dependency {
            param: param.into(),
            provider: provider.into(),
        });
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn uses_cache(&self) -> bool {
        self.use_cache
    }

    pub fn scope(&self) -> DependencyScope {
        self.scope
    }
}

impl std::fmt::Debug for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provider")
            .field("name", &self.name)
            .field("use_cache", &self.use_cache)
            .field("scope", &self.scope)
            .finish()
    }
}

/// Binds a handler (or provider) parameter name to a provider.
#[derive(Clone, Debug)]
pub struct Dependency {
    pub param: String,
    pub provider: Arc<Provider>,
}

impl Dependency {
    pub fn new(param: impl Into<String>, provider: impl Into<Arc<Provider>>) -> Self {
        Self {
            param: param.into(),
            provider: provider.into(),
        }
    }
}

/// Context handed to a provider callable during resolution.
pub struct ProviderContext {
    request: Arc<HttpRequest>,
    values: DependencyValues,
}

impl ProviderContext {
    /// The request being dispatched.
    pub fn request(&self) -> &HttpRequest {
        &self.request
    }

    /// One of this provider's own resolved dependencies, by parameter name.
    pub fn dependency<T: Send + Sync + 'static>(&self, name: &str) -> Option<Arc<T>> {
        self.values.get::<T>(name)
    }

    pub fn values(&self) -> &DependencyValues {
        &self.values
    }
}

/// Resolved values keyed by parameter name.
#[derive(Clone, Default)]
pub struct DependencyValues {
    map: HashMap<String, DependencyValue>,
}

impl DependencyValues {
    pub fn insert(&mut self, param: impl Into<String>, value: DependencyValue) {
        self.map.insert(param.into(), value);
    }

    pub fn get<T: Send + Sync + 'static>(&self, param: &str) -> Option<Arc<T>> {
        self.map
            .get(param)
            .and_then(|v| v.clone().downcast::<T>().ok())
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl std::fmt::Debug for DependencyValues {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyValues")
            .field("params", &self.map.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Per-request cache of resolved provider values, keyed by provider name.
///
/// Owned by one request's task; dropped with the request.
#[derive(Default)]
pub struct DependencyCache {
    map: HashMap<String, DependencyValue>,
}

impl DependencyCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, provider: &str) -> Option<DependencyValue> {
        self.map.get(provider).cloned()
    }

    pub fn insert(&mut self, provider: impl Into<String>, value: DependencyValue) {
        self.map.insert(provider.into(), value);
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }
}

/// Resolve a handler's declared dependencies for one request.
pub async fn resolve_dependencies(
    dependencies: &[Dependency],
    request: Arc<HttpRequest>,
    cache: &mut DependencyCache,
) -> Result<DependencyValues, Error> {
    let mut values = DependencyValues::default();
    let mut stack = Vec::new();
    for dep in dependencies {
        let value = resolve_provider(dep.provider.clone(), request.clone(), cache, &mut stack).await?;
        values.insert(dep.param.clone(), value);
    }
    Ok(values)
}

fn resolve_provider<'a>(
    provider: Arc<Provider>,
    request: Arc<HttpRequest>,
    cache: &'a mut DependencyCache,
    stack: &'a mut Vec<String>,
) -> BoxFuture<'a, Result<DependencyValue, Error>> {
    Box::pin(async move {
        let name = provider.name().to_string();

        if provider.use_cache {
            if let Some(value) = cache.get(&name) {
                trace!(provider = %name, "Dependency served from request cache");
                return Ok(value);
            }
        }

        // Cycle detection over the provider call graph: the same provider
        // appearing twice in the in-progress stack is a cycle.
        if let Some(pos) = stack.iter().position(|n| n == &name) {
            let mut cycle: Vec<String> = stack[pos..].to_vec();
            cycle.push(name);
            return Err(Error::CircularDependency { cycle });
        }
        stack.push(name.clone());

        let declared = provider.dependencies.read().unwrap().clone();
        let mut own = DependencyValues::default();
        for dep in &declared {
            let value =
                resolve_provider(dep.provider.clone(), request.clone(), cache, stack).await?;
            own.insert(dep.param.clone(), value);
        }

        trace!(provider = %name, dependencies = declared.len(), "Invoking dependency provider");
        let context = ProviderContext {
            request,
            values: own,
        };
        let result = (provider.func)(context).await;
        stack.pop();

        match result {
            Ok(value) => {
                if provider.use_cache {
                    cache.insert(name, value.clone());
                }
                Ok(value)
            }
            Err(e) if e.is_dependency_error() => Err(e),
            Err(e) => Err(Error::DependencyResolution {
                provider: name,
                source: Box::new(e),
            }),
        }
    })
}
