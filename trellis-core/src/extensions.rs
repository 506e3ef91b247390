// Typed extension map for opaque request/response/application state.
//
// Session stores, auth backends, and similar collaborators attach their
// state here; the core passes it through unmodified.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

/// Type-keyed container for opaque attached values.
#[derive(Clone, Default)]
pub struct Extensions {
    map: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl Extensions {
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    /// Insert a typed value, replacing any existing value of the same type.
    pub fn insert<T: Send + Sync + 'static>(&mut self, value: T) {
        self.map
            .insert(TypeId::of::<T>(), Arc::new(value) as Arc<dyn Any + Send + Sync>);
    }

    /// Insert an Arc-wrapped value directly.
    pub fn insert_arc<T: Send + Sync + 'static>(&mut self, value: Arc<T>) {
        self.map
            .insert(TypeId::of::<T>(), value as Arc<dyn Any + Send + Sync>);
    }

    /// Get a reference to a typed value, if present.
    pub fn get<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.map
            .get(&TypeId::of::<T>())
            .and_then(|any| any.downcast_ref::<T>())
    }

    /// Get a cloned Arc to a typed value, if present.
    pub fn get_arc<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.map
            .get(&TypeId::of::<T>())
            .and_then(|any| any.clone().downcast::<T>().ok())
    }

    /// Remove a typed value, returning whether it was present.
    pub fn remove<T: Send + Sync + 'static>(&mut self) -> bool {
        self.map.remove(&TypeId::of::<T>()).is_some()
    }

    pub fn contains<T: Send + Sync + 'static>(&self) -> bool {
        self.map.contains_key(&TypeId::of::<T>())
    }

    /// Copy all entries from `other`, replacing on type collision.
    pub fn extend(&mut self, other: &Extensions) {
        for (k, v) in &other.map {
            self.map.insert(*k, v.clone());
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl std::fmt::Debug for Extensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Extensions")
            .field("len", &self.map.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct SessionState(String);

    #[test]
    fn insert_and_get() {
        let mut ext = Extensions::new();
        ext.insert(SessionState("abc".into()));
        ext.insert(7u32);

        assert_eq!(ext.get::<SessionState>(), Some(&SessionState("abc".into())));
        assert_eq!(ext.get::<u32>(), Some(&7));
        assert_eq!(ext.get::<String>(), None);
        assert_eq!(ext.len(), 2);
    }

    #[test]
    fn replace_and_remove() {
        let mut ext = Extensions::new();
        ext.insert(1i64);
        ext.insert(2i64);
        assert_eq!(ext.get::<i64>(), Some(&2));
        assert!(ext.remove::<i64>());
        assert!(!ext.remove::<i64>());
        assert!(ext.is_empty());
    }

    #[test]
    fn arc_passthrough() {
        let mut ext = Extensions::new();
        let value = Arc::new(SessionState("shared".into()));
        ext.insert_arc(value.clone());
        let got = ext.get_arc::<SessionState>().unwrap();
        assert!(Arc::ptr_eq(&value, &got));
    }
}
