//! Serialization bindings: object graph to token stream.
//!
//! Every bound type gets one [`Serializer`], built by the
//! [`SerializerFactory`] and cached by the [`SerializerProvider`]. Bindings
//! write tokens for a `&dyn Any` whose concrete type is the binding's
//! handled type.
//!
//! ```rust
//! use databind::{ObjectMapper, Token};
//!
//! let mapper = ObjectMapper::new();
//! let tokens = mapper.to_tokens(&vec![1u8, 2]).unwrap();
//! assert_eq!(
//!     tokens,
//!     vec![Token::StartArray, Token::Int(1), Token::Int(2), Token::EndArray]
//! );
//! ```

mod bean;
mod builder;
mod factory;
mod std_ser;

pub use bean::{AbstractSerializer, AsValueSerializer, BeanPropertyWriter, BeanSerializer};
pub use factory::SerializerFactory;
pub use std_ser::{
    EnumSerializer, MapSerializer, ScalarSerializer, SeqSerializer, TreeSerializer,
    TypedRootSerializer, WrapperSerializer,
};

use std::any::Any;
use std::sync::Arc;

use crate::config::MapperConfig;
use crate::polymorphic::{Shape, TypeResolver, TypeSerializer};
use crate::provider::{BindingCache, BindingEnv, BindingKey, BindingRef};
use crate::types::TypeDescriptor;
use crate::{Error, Result, TokenWriter};

/// Writes values of one type as tokens.
pub trait Serializer: Send + Sync {
    fn serialize(
        &self,
        value: &dyn Any,
        w: &mut dyn TokenWriter,
        ctx: &mut SerializationContext<'_>,
    ) -> Result<()>;

    /// Writes the value surrounded by type markers.
    ///
    /// The default treats the value as a scalar.
    fn serialize_with_type(
        &self,
        value: &dyn Any,
        w: &mut dyn TokenWriter,
        ctx: &mut SerializationContext<'_>,
        type_ser: &TypeSerializer,
    ) -> Result<()> {
        type_ser.write_prefix(value, Shape::Scalar, w)?;
        self.serialize(value, w, ctx)?;
        type_ser.write_suffix(Shape::Scalar, w)
    }

    /// The type this binding was built for; custom bindings may leave it out.
    fn handled_type(&self) -> Option<&TypeDescriptor> {
        None
    }

    /// Whether the value renders as a null token.
    fn is_null(&self, _value: &dyn Any) -> bool {
        false
    }

    /// Whether the value counts as empty for `Inclusion::NonEmpty`.
    fn is_empty(&self, _value: &dyn Any, _ctx: &SerializationContext<'_>) -> bool {
        false
    }

    /// Second construction phase, run once the binding is cached.
    fn resolve(&self, _provider: &SerializerProvider) -> Result<()> {
        Ok(())
    }
}

/// Per-call state of one serialization.
pub struct SerializationContext<'a> {
    provider: &'a SerializerProvider,
    view: Option<&'a str>,
    depth: usize,
}

impl<'a> SerializationContext<'a> {
    #[must_use]
    pub fn new(provider: &'a SerializerProvider, view: Option<&'a str>) -> Self {
        SerializationContext {
            provider,
            view,
            depth: 0,
        }
    }

    #[must_use]
    pub fn provider(&self) -> &'a SerializerProvider {
        self.provider
    }

    #[must_use]
    pub fn config(&self) -> &'a MapperConfig {
        &self.provider.env.config
    }

    /// The active view, if any.
    #[must_use]
    pub fn view(&self) -> Option<&'a str> {
        self.view
    }

    /// Enters one level of nesting.
    /// A context at the same depth with no active view.
    #[must_use]
    pub fn without_view(&self) -> SerializationContext<'a> {
        SerializationContext {
            provider: self.provider,
            view: None,
            depth: self.depth,
        }
    }

    /// Current nesting level.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn enter(&mut self) -> Result<()> {
        let limit = self.config().max_depth();
        if self.depth >= limit {
            return Err(Error::depth_exceeded(limit));
        }
        self.depth += 1;
        Ok(())
    }

    pub fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// Runs `f` one level deeper; the depth is restored even when `f` fails.
    pub fn nested<R>(&mut self, f: impl FnOnce(&mut Self) -> Result<R>) -> Result<R> {
        self.enter()?;
        let result = f(self);
        self.leave();
        result
    }

    /// Serializes a value of the given declared type.
    pub fn serialize_value(
        &mut self,
        value: &dyn Any,
        ty: &TypeDescriptor,
        w: &mut dyn TokenWriter,
    ) -> Result<()> {
        let serializer = self.provider.find_value_serializer(ty)?;
        serializer.serialize(value, w, self)
    }
}

impl BindingRef<dyn Serializer> {
    /// Returns the referenced serializer, looking it up through `provider` when needed.
    pub fn serializer(&self, provider: &SerializerProvider) -> Result<Arc<dyn Serializer>> {
        self.get_with(|key| provider.find_serializer(key))
    }
}

/// Finds and caches serializers.
pub struct SerializerProvider {
    env: BindingEnv,
    factory: SerializerFactory,
    cache: BindingCache<dyn Serializer>,
}

impl SerializerProvider {
    #[must_use]
    pub fn new(env: BindingEnv) -> Self {
        let capacity = env.config.max_cached_bindings();
        SerializerProvider {
            env,
            factory: SerializerFactory::new(),
            cache: BindingCache::new(capacity),
        }
    }

    #[must_use]
    pub fn env(&self) -> &BindingEnv {
        &self.env
    }

    #[must_use]
    pub fn config(&self) -> &MapperConfig {
        &self.env.config
    }

    #[must_use]
    pub fn type_resolver(&self) -> TypeResolver<'_> {
        TypeResolver::new(&self.env.introspector)
    }

    /// Serializer for values of the declared type `ty`.
    pub fn find_value_serializer(&self, ty: &TypeDescriptor) -> Result<Arc<dyn Serializer>> {
        self.find_serializer(&BindingKey::plain(ty))
    }

    /// Serializer for a root value, wrapped in class-level type markers when
    /// the type declares them.
    pub fn find_typed_root_serializer(&self, ty: &TypeDescriptor) -> Result<Arc<dyn Serializer>> {
        self.find_serializer(&BindingKey::typed_root(ty))
    }

    /// Serializer for an arbitrary key, including contextual ones.
    pub fn find_serializer(&self, key: &BindingKey) -> Result<Arc<dyn Serializer>> {
        self.cache.get_or_build(
            key,
            || self.factory.create(&self.env, key),
            |serializer| serializer.resolve(self),
        )
    }

    /// Type markers for a value of declared type `ty`.
    #[must_use]
    pub fn find_type_serializer(&self, ty: &TypeDescriptor) -> Option<TypeSerializer> {
        self.type_resolver().type_serializer(ty, None)
    }

    pub fn flush(&self) {
        tracing::debug!(size = self.cache.len(), "flushing serializer cache");
        self.cache.clear();
    }

    #[must_use]
    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }
}
