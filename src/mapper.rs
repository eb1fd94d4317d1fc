//! The [`ObjectMapper`] façade.
//!
//! A mapper owns one [`MapperConfig`], the shared [`TypeFactory`] and both
//! binding providers. It is cheap to clone and can be shared across threads;
//! bindings built by one call are reused by every later call.
//!
//! ```rust
//! use databind::{Bean, ClassBuilder, ObjectMapper, Token, Visibility};
//!
//! #[derive(Debug, Default, PartialEq)]
//! struct Point {
//!     x: i32,
//!     y: i32,
//! }
//!
//! impl Bean for Point {
//!     fn describe(class: ClassBuilder<Self>) -> ClassBuilder<Self> {
//!         class
//!             .field("x", Visibility::Public, (), |p| &p.x, |p| &mut p.x)
//!             .field("y", Visibility::Public, (), |p| &p.y, |p| &mut p.y)
//!             .default_creator(Visibility::Public, Point::default)
//!     }
//! }
//! databind::bind_bean!(Point);
//!
//! let mapper = ObjectMapper::new();
//! let tokens = mapper.to_tokens(&Point { x: 1, y: 2 }).unwrap();
//! assert_eq!(tokens[1], Token::FieldName("x".to_string()));
//!
//! let back: Point = mapper.from_tokens(tokens).unwrap();
//! assert_eq!(back, Point { x: 1, y: 2 });
//! ```

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::config::{Feature, MapperConfig};
use crate::de::{DeserializationContext, DeserializerProvider};
use crate::introspect::{DirectiveSource, MixIn, VisibilityPolicy};
use crate::provider::BindingEnv;
use crate::ser::{SerializationContext, SerializerProvider};
use crate::types::{take, AnyValue, Bind, TypeDescriptor, TypeFactory};
use crate::{
    BufferReader, Error, Result, Token, TokenBuffer, TokenReader, TokenWriter, TreeReader,
    TreeWriter, Value,
};

/// Entry point for converting between values and token streams.
#[derive(Clone)]
pub struct ObjectMapper {
    env: BindingEnv,
    serializers: Arc<SerializerProvider>,
    deserializers: Arc<DeserializerProvider>,
}

impl Default for ObjectMapper {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ObjectMapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectMapper")
            .field("serializers", &self.serializers.cached_count())
            .field("deserializers", &self.deserializers.cached_count())
            .finish()
    }
}

impl ObjectMapper {
    #[must_use]
    pub fn new() -> Self {
        Self::from_config(MapperConfig::default())
    }

    #[must_use]
    pub fn from_config(config: MapperConfig) -> Self {
        Self::build(config, Arc::new(TypeFactory::new()))
    }

    fn build(config: MapperConfig, types: Arc<TypeFactory>) -> Self {
        let env = BindingEnv::new(config, types);
        ObjectMapper {
            serializers: Arc::new(SerializerProvider::new(env.clone())),
            deserializers: Arc::new(DeserializerProvider::new(env.clone())),
            env,
        }
    }

    /// A mapper with a different configuration and fresh binding caches.
    ///
    /// Type descriptors are shared with this mapper.
    #[must_use]
    pub fn with_config(&self, config: MapperConfig) -> Self {
        Self::build(config, self.env.types.clone())
    }

    #[must_use]
    pub fn with_feature(&self, feature: Feature, enabled: bool) -> Self {
        self.with_config(self.config().clone().with_feature(feature, enabled))
    }

    /// Adds a directive source consulted after the current ones.
    #[must_use]
    pub fn with_additional_directive_source(&self, source: Arc<dyn DirectiveSource>) -> Self {
        self.with_config(self.config().clone().with_additional_directives(source))
    }

    #[must_use]
    pub fn with_visibility_policy(&self, policy: VisibilityPolicy) -> Self {
        self.with_config(self.config().clone().with_visibility(policy))
    }

    #[must_use]
    pub fn with_mix_in<T: Bind>(&self, mix_in: MixIn) -> Self {
        self.with_config(self.config().clone().with_mix_in::<T>(mix_in))
    }

    /// A writer that only emits properties visible in `view`.
    #[must_use]
    pub fn with_view(&self, view: &str) -> ObjectWriter<'_> {
        ObjectWriter {
            mapper: self,
            view: Some(view.to_string()),
        }
    }

    /// A reader that skips properties outside `view`.
    #[must_use]
    pub fn reader_with_view(&self, view: &str) -> ObjectReader<'_> {
        ObjectReader {
            mapper: self,
            view: Some(view.to_string()),
        }
    }

    #[must_use]
    pub fn config(&self) -> &MapperConfig {
        &self.env.config
    }

    #[must_use]
    pub fn type_factory(&self) -> &TypeFactory {
        &self.env.types
    }

    /// Resolves the descriptor of `T`.
    #[must_use]
    pub fn construct_type<T: Bind>(&self) -> TypeDescriptor {
        self.env.types.construct::<T>()
    }

    #[must_use]
    pub fn serializer_provider(&self) -> &SerializerProvider {
        &self.serializers
    }

    #[must_use]
    pub fn deserializer_provider(&self) -> &DeserializerProvider {
        &self.deserializers
    }

    /// Drops every cached binding and class description.
    pub fn flush_cache(&self) {
        debug!("flushing mapper caches");
        self.serializers.flush();
        self.deserializers.flush();
        self.env.introspector.flush();
    }

    /// Name of the wrapper field used by root wrapping.
    fn root_name(&self, ty: &TypeDescriptor) -> String {
        let annotations = self.env.introspector.class_annotations(ty);
        self.config()
            .directives()
            .find_type_name(&annotations)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| ty.name().to_string())
    }

    /// Writes `value` as tokens.
    ///
    /// # Errors
    ///
    /// Fails when a binding cannot be built for `T` or a nested value cannot
    /// be written.
    pub fn write_tokens<T: Bind>(&self, value: &T, w: &mut dyn TokenWriter) -> Result<()> {
        let ty = self.construct_type::<T>();
        self.write_erased(value, &ty, w, None)
    }

    /// Writes an erased value whose concrete type is described by `ty`.
    pub fn write_tokens_as(
        &self,
        value: &dyn Any,
        ty: &TypeDescriptor,
        w: &mut dyn TokenWriter,
    ) -> Result<()> {
        self.write_erased(value, ty, w, None)
    }

    fn write_erased(
        &self,
        value: &dyn Any,
        ty: &TypeDescriptor,
        w: &mut dyn TokenWriter,
        view: Option<&str>,
    ) -> Result<()> {
        let serializer = self.serializers.find_typed_root_serializer(ty)?;
        let mut ctx = SerializationContext::new(&self.serializers, view);
        if self.config().settings().wrap_root_value {
            w.start_object()?;
            w.field_name(&self.root_name(ty))?;
            serializer.serialize(value, w, &mut ctx)?;
            w.end_object()
        } else {
            serializer.serialize(value, w, &mut ctx)
        }
    }

    /// Collects the tokens of `value`.
    pub fn to_tokens<T: Bind>(&self, value: &T) -> Result<Vec<Token>> {
        let mut buffer = TokenBuffer::new();
        self.write_tokens(value, &mut buffer)?;
        Ok(buffer.into_tokens())
    }

    /// Converts `value` into a [`Value`] tree.
    pub fn to_value<T: Bind>(&self, value: &T) -> Result<Value> {
        let mut writer = TreeWriter::new();
        self.write_tokens(value, &mut writer)?;
        writer.into_value()
    }

    /// Reads a `T` from the next value of `reader`.
    ///
    /// # Errors
    ///
    /// Fails on an empty stream, when a binding cannot be built for `T`, or
    /// when the tokens do not match the bound type.
    pub fn read_tokens<T: Bind>(&self, reader: &mut dyn TokenReader) -> Result<T> {
        let ty = self.construct_type::<T>();
        take::<T>(self.read_erased(reader, &ty, None)?)
    }

    /// Reads a value of the type described by `ty`.
    pub fn read_tokens_as(
        &self,
        reader: &mut dyn TokenReader,
        ty: &TypeDescriptor,
    ) -> Result<AnyValue> {
        self.read_erased(reader, ty, None)
    }

    fn read_erased(
        &self,
        reader: &mut dyn TokenReader,
        ty: &TypeDescriptor,
        view: Option<&str>,
    ) -> Result<AnyValue> {
        let deserializer = self.deserializers.find_typed_root_deserializer(ty)?;
        let mut ctx = DeserializationContext::new(reader, &self.deserializers, view);
        if !ctx.next_token()? {
            return Err(Error::codec("no content to map: empty token stream"));
        }
        if !self.config().settings().unwrap_root_value {
            return deserializer.deserialize(&mut ctx);
        }

        let expected = self.root_name(ty);
        ctx.expect(&Token::StartObject)?;
        ctx.advance()?;
        match ctx.current()? {
            Token::FieldName(name) if *name == expected => {}
            Token::FieldName(name) => {
                return Err(Error::custom(format!(
                    "root name \"{}\" does not match expected \"{}\" for type {}",
                    name,
                    expected,
                    ty.name()
                )))
            }
            other => return Err(Error::type_mismatch("root wrapper field", other.describe())),
        }
        ctx.advance()?;
        let value = deserializer.deserialize(&mut ctx)?;
        ctx.advance()?;
        ctx.expect(&Token::EndObject)?;
        Ok(value)
    }

    /// Reads a `T` from a token vector.
    pub fn from_tokens<T: Bind>(&self, tokens: Vec<Token>) -> Result<T> {
        self.read_tokens(&mut BufferReader::new(tokens))
    }

    /// Reads a `T` from a [`Value`] tree.
    pub fn from_value<T: Bind>(&self, value: Value) -> Result<T> {
        self.read_tokens(&mut TreeReader::new(value))
    }
}

/// A mapper bound to an active view for writing.
#[derive(Debug, Clone)]
pub struct ObjectWriter<'m> {
    mapper: &'m ObjectMapper,
    view: Option<String>,
}

impl ObjectWriter<'_> {
    pub fn write_tokens<T: Bind>(&self, value: &T, w: &mut dyn TokenWriter) -> Result<()> {
        let ty = self.mapper.construct_type::<T>();
        self.mapper.write_erased(value, &ty, w, self.view.as_deref())
    }

    pub fn to_tokens<T: Bind>(&self, value: &T) -> Result<Vec<Token>> {
        let mut buffer = TokenBuffer::new();
        self.write_tokens(value, &mut buffer)?;
        Ok(buffer.into_tokens())
    }

    pub fn to_value<T: Bind>(&self, value: &T) -> Result<Value> {
        let mut writer = TreeWriter::new();
        self.write_tokens(value, &mut writer)?;
        writer.into_value()
    }
}

/// A mapper bound to an active view for reading.
#[derive(Debug, Clone)]
pub struct ObjectReader<'m> {
    mapper: &'m ObjectMapper,
    view: Option<String>,
}

impl ObjectReader<'_> {
    pub fn read_tokens<T: Bind>(&self, reader: &mut dyn TokenReader) -> Result<T> {
        let ty = self.mapper.construct_type::<T>();
        take::<T>(self.mapper.read_erased(reader, &ty, self.view.as_deref())?)
    }

    pub fn from_tokens<T: Bind>(&self, tokens: Vec<Token>) -> Result<T> {
        self.read_tokens(&mut BufferReader::new(tokens))
    }

    pub fn from_value<T: Bind>(&self, value: Value) -> Result<T> {
        self.read_tokens(&mut TreeReader::new(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Deserializer, MappingErrorKind};
    use std::collections::BTreeMap;

    #[test]
    fn test_scalar_round_trip() {
        let mapper = ObjectMapper::new();
        let tokens = mapper.to_tokens(&42i64).unwrap();
        assert_eq!(tokens, vec![Token::Int(42)]);
        assert_eq!(mapper.from_tokens::<i64>(tokens).unwrap(), 42);
    }

    #[test]
    fn test_empty_stream_is_codec_error() {
        let mapper = ObjectMapper::new();
        let err = mapper.from_tokens::<String>(Vec::new()).unwrap_err();
        assert!(matches!(err, Error::Codec(_)));
    }

    #[test]
    fn test_map_to_value() {
        let mapper = ObjectMapper::new();
        let mut scores = BTreeMap::new();
        scores.insert("a".to_string(), 1u32);
        scores.insert("b".to_string(), 2u32);
        let value = mapper.to_value(&scores).unwrap();
        assert_eq!(value.get("b").and_then(Value::as_i64), Some(2));
        let back: BTreeMap<String, u32> = mapper.from_value(value).unwrap();
        assert_eq!(back, scores);
    }

    #[test]
    fn test_root_wrapping_uses_short_name() {
        let mapper = ObjectMapper::new()
            .with_feature(Feature::WrapRootValue, true)
            .with_feature(Feature::UnwrapRootValue, true);
        let tokens = mapper.to_tokens(&vec![true]).unwrap();
        assert_eq!(tokens[1], Token::FieldName("Vec".to_string()));
        assert_eq!(mapper.from_tokens::<Vec<bool>>(tokens).unwrap(), vec![true]);
    }

    #[test]
    fn test_nested_restores_depth_on_error() {
        let mapper = ObjectMapper::from_config(MapperConfig::new().with_max_depth(2));
        let mut ctx = SerializationContext::new(mapper.serializer_provider(), None);
        let failed: Result<()> = ctx.nested(|ctx| ctx.nested(|_| Err(Error::custom("boom"))));
        assert!(failed.is_err());
        assert_eq!(ctx.depth(), 0);

        let too_deep: Result<()> = ctx.nested(|ctx| ctx.nested(|ctx| ctx.nested(|_| Ok(()))));
        let err = too_deep.unwrap_err();
        assert_eq!(err.kind(), Some(&MappingErrorKind::DepthExceeded { limit: 2 }));
        assert_eq!(ctx.depth(), 0);
    }

    #[test]
    fn test_reader_depth_restored_after_bad_element() {
        let mapper = ObjectMapper::new();
        let mut reader = BufferReader::new(vec![
            Token::StartArray,
            Token::String("x".to_string()),
            Token::EndArray,
        ]);
        let ty = mapper.type_factory().construct::<Vec<i32>>();
        let deserializer = mapper.deserializer_provider().find_value_deserializer(&ty).unwrap();
        let mut ctx = DeserializationContext::new(&mut reader, mapper.deserializer_provider(), None);
        assert!(ctx.next_token().unwrap());
        assert!(deserializer.deserialize(&mut ctx).is_err());
        assert_eq!(ctx.depth(), 0);
    }

    #[test]
    fn test_flush_keeps_mapper_usable() {
        let mapper = ObjectMapper::new();
        mapper.to_tokens(&vec![1u8]).unwrap();
        assert!(mapper.serializer_provider().cached_count() > 0);
        mapper.flush_cache();
        assert_eq!(mapper.serializer_provider().cached_count(), 0);
        assert_eq!(mapper.to_tokens(&vec![1u8]).unwrap().len(), 3);
    }
}
