//! Binding caches shared by the serializer and deserializer providers.
//!
//! Bindings are built in two phases. Phase 1 runs while the cache entry for
//! the key is locked and must not look up other bindings. Phase 2 (`resolve`)
//! runs after the binding is visible in the cache, so recursive types find
//! themselves instead of recursing forever. A binding whose resolve fails is
//! evicted again. Bindings still being resolved are never evicted, so a full
//! cache cannot make a recursive type rebuild itself endlessly.
//!
//! Bindings refer to each other through [`BindingRef`]s holding weak
//! pointers, which keeps cyclic type graphs from leaking.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::fmt;
use std::sync::{Arc, RwLock, Weak};
use tracing::{debug, trace};

use crate::config::MapperConfig;
use crate::introspect::{Introspector, TypeInfoSpec};
use crate::types::{TypeDescriptor, TypeFactory};
use crate::Result;

/// What a cached binding was built for, beyond its type.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum BindingContext {
    #[default]
    Plain,
    /// A container whose contents carry the given type markers.
    ContentTyped(TypeInfoSpec),
    /// A root value wrapped in its class-level type marker.
    TypedRoot,
}

/// Cache key of a binding.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BindingKey {
    pub ty: TypeDescriptor,
    pub context: BindingContext,
}

impl BindingKey {
    #[must_use]
    pub fn plain(ty: &TypeDescriptor) -> Self {
        BindingKey {
            ty: ty.clone(),
            context: BindingContext::Plain,
        }
    }

    #[must_use]
    pub fn content_typed(ty: &TypeDescriptor, spec: TypeInfoSpec) -> Self {
        BindingKey {
            ty: ty.clone(),
            context: BindingContext::ContentTyped(spec),
        }
    }

    #[must_use]
    pub fn typed_root(ty: &TypeDescriptor) -> Self {
        BindingKey {
            ty: ty.clone(),
            context: BindingContext::TypedRoot,
        }
    }
}

/// State shared by both providers of a mapper.
#[derive(Clone)]
pub struct BindingEnv {
    pub config: Arc<MapperConfig>,
    pub types: Arc<TypeFactory>,
    pub introspector: Arc<Introspector>,
}

impl BindingEnv {
    #[must_use]
    pub fn new(config: MapperConfig, types: Arc<TypeFactory>) -> Self {
        let config = Arc::new(config);
        let introspector = Arc::new(Introspector::new(config.clone(), types.clone()));
        BindingEnv {
            config,
            types,
            introspector,
        }
    }
}

/// A concurrent, bounded map from [`BindingKey`] to binding.
pub struct BindingCache<B: ?Sized> {
    map: DashMap<BindingKey, Arc<B>>,
    /// Keys inserted whose resolve phase has not finished, with a nesting count.
    resolving: DashMap<BindingKey, usize>,
    capacity: usize,
}

impl<B: ?Sized> BindingCache<B> {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        BindingCache {
            map: DashMap::new(),
            resolving: DashMap::new(),
            capacity,
        }
    }

    pub fn get(&self, key: &BindingKey) -> Option<Arc<B>> {
        self.map.get(key).map(|found| found.value().clone())
    }

    /// Returns the cached binding or builds, inserts and resolves a new one.
    ///
    /// `build` runs under the entry lock and must not touch this cache.
    pub fn get_or_build(
        &self,
        key: &BindingKey,
        build: impl FnOnce() -> Result<Arc<B>>,
        resolve: impl FnOnce(&Arc<B>) -> Result<()>,
    ) -> Result<Arc<B>> {
        if let Some(found) = self.get(key) {
            trace!(ty = %key.ty, "binding cache hit");
            return Ok(found);
        }
        self.make_room();
        let built = match self.map.entry(key.clone()) {
            Entry::Occupied(existing) => return Ok(existing.get().clone()),
            Entry::Vacant(vacant) => {
                let built = build()?;
                vacant.insert(built.clone());
                built
            }
        };
        debug!(ty = %key.ty, context = ?key.context, "constructed binding");
        *self.resolving.entry(key.clone()).or_insert(0) += 1;
        let resolved = resolve(&built);
        self.finish_resolving(key);
        if let Err(err) = resolved {
            self.map.remove(key);
            debug!(ty = %key.ty, error = %err, "binding failed to resolve, evicted");
            return Err(err);
        }
        Ok(built)
    }

    /// Drops every binding except those still resolving once the cache is full.
    fn make_room(&self) {
        if self.map.len() < self.capacity {
            return;
        }
        debug!(
            size = self.map.len(),
            resolving = self.resolving.len(),
            "binding cache full, clearing"
        );
        self.map.retain(|key, _| self.resolving.contains_key(key));
    }

    fn finish_resolving(&self, key: &BindingKey) {
        if let Entry::Occupied(mut nesting) = self.resolving.entry(key.clone()) {
            if *nesting.get() <= 1 {
                nesting.remove();
            } else {
                *nesting.get_mut() -= 1;
            }
        }
    }

    pub fn clear(&self) {
        self.map.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Late-bound reference from one binding to another.
///
/// A reference is either fixed (a binding supplied by a directive) or looked
/// up through the provider on first use and remembered weakly afterwards.
pub struct BindingRef<B: ?Sized> {
    key: BindingKey,
    fixed: Option<Arc<B>>,
    cached: RwLock<Option<Weak<B>>>,
}

impl<B: ?Sized> BindingRef<B> {
    #[must_use]
    pub fn lazy(key: BindingKey) -> Self {
        BindingRef {
            key,
            fixed: None,
            cached: RwLock::new(None),
        }
    }

    #[must_use]
    pub fn fixed(key: BindingKey, binding: Arc<B>) -> Self {
        BindingRef {
            key,
            fixed: Some(binding),
            cached: RwLock::new(None),
        }
    }

    #[must_use]
    pub fn key(&self) -> &BindingKey {
        &self.key
    }

    /// Returns the binding, fetching it with `fetch` when not held.
    pub fn get_with(&self, fetch: impl FnOnce(&BindingKey) -> Result<Arc<B>>) -> Result<Arc<B>> {
        if let Some(fixed) = &self.fixed {
            return Ok(fixed.clone());
        }
        if let Ok(guard) = self.cached.read() {
            if let Some(live) = guard.as_ref().and_then(Weak::upgrade) {
                return Ok(live);
            }
        }
        let fetched = fetch(&self.key)?;
        if let Ok(mut guard) = self.cached.write() {
            *guard = Some(Arc::downgrade(&fetched));
        }
        Ok(fetched)
    }
}

impl<B: ?Sized> fmt::Debug for BindingRef<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingRef")
            .field("key", &self.key)
            .field("fixed", &self.fixed.is_some())
            .finish()
    }
}
