//! Deserialization bindings: token stream to object graph.
//!
//! A [`Deserializer`] is called with the first token of its value already
//! current in the [`DeserializationContext`] and returns with the value's last
//! token current. Containers therefore advance past their own start token and
//! stop on their end token.
//!
//! ```rust
//! use databind::{BufferReader, ObjectMapper, Token};
//!
//! let mapper = ObjectMapper::new();
//! let mut reader = BufferReader::new(vec![
//!     Token::StartArray,
//!     Token::Int(3),
//!     Token::String("4".to_string()),
//!     Token::EndArray,
//! ]);
//! let numbers: Vec<i32> = mapper.read_tokens(&mut reader).unwrap();
//! assert_eq!(numbers, vec![3, 4]);
//! ```

mod bean;
mod builder;
mod factory;
mod std_de;

pub use bean::{BeanDeserializer, OverrideDeserializer, SettableProperty};
pub use factory::DeserializerFactory;
pub use std_de::{
    AbstractDeserializer, EnumDeserializer, MapDeserializer, ScalarDeserializer,
    SeqDeserializer, TreeDeserializer, TypedRootDeserializer, WrapperDeserializer,
};

use std::collections::VecDeque;
use std::sync::Arc;

use crate::config::MapperConfig;
use crate::introspect::LinkFn;
use crate::polymorphic::{TypeDeserializer, TypeResolver};
use crate::provider::{BindingCache, BindingEnv, BindingKey, BindingRef};
use crate::types::{AnyValue, TypeDescriptor};
use crate::{Error, Result, Token, TokenReader, TokenWriter, TreeWriter, Value};

/// Reads values of one type from tokens.
pub trait Deserializer: Send + Sync {
    fn deserialize(&self, ctx: &mut DeserializationContext<'_>) -> Result<AnyValue>;

    /// Reads a value surrounded by type markers.
    fn deserialize_with_type(
        &self,
        ctx: &mut DeserializationContext<'_>,
        type_de: &TypeDeserializer,
    ) -> Result<AnyValue> {
        type_de.deserialize_typed(ctx)
    }

    fn handled_type(&self) -> Option<&TypeDescriptor> {
        None
    }

    /// Linker registered under `name` on the bean type this binding produces,
    /// looking through containers and wrappers.
    fn find_back_reference(
        &self,
        _name: &str,
        _provider: &DeserializerProvider,
    ) -> Result<Option<LinkFn>> {
        Ok(None)
    }

    /// Second construction phase, run once the binding is cached.
    fn resolve(&self, _provider: &DeserializerProvider) -> Result<()> {
        Ok(())
    }
}

/// Per-call state of one deserialization: the token cursor plus settings.
pub struct DeserializationContext<'a> {
    reader: &'a mut dyn TokenReader,
    /// Tokens replayed ahead of the reader.
    pending: VecDeque<Token>,
    current: Option<Token>,
    provider: &'a DeserializerProvider,
    view: Option<&'a str>,
    depth: usize,
}

impl<'a> DeserializationContext<'a> {
    pub fn new(
        reader: &'a mut dyn TokenReader,
        provider: &'a DeserializerProvider,
        view: Option<&'a str>,
    ) -> Self {
        DeserializationContext {
            reader,
            pending: VecDeque::new(),
            current: None,
            provider,
            view,
            depth: 0,
        }
    }

    #[must_use]
    pub fn provider(&self) -> &'a DeserializerProvider {
        self.provider
    }

    #[must_use]
    pub fn config(&self) -> &'a MapperConfig {
        self.provider.config()
    }

    #[must_use]
    pub fn view(&self) -> Option<&'a str> {
        self.view
    }

    /// Moves to the next token, returning `false` at the end of the stream.
    pub fn next_token(&mut self) -> Result<bool> {
        self.current = match self.pending.pop_front() {
            Some(token) => Some(token),
            None => self.reader.next_token()?,
        };
        Ok(self.current.is_some())
    }

    /// Moves to the next token, which must exist.
    pub fn advance(&mut self) -> Result<()> {
        if self.next_token()? {
            Ok(())
        } else {
            Err(Error::codec("unexpected end of token stream"))
        }
    }

    pub fn current(&self) -> Result<&Token> {
        self.current
            .as_ref()
            .ok_or_else(|| Error::codec("no current token"))
    }

    pub fn expect(&self, expected: &Token) -> Result<()> {
        let found = self.current()?;
        if found == expected {
            Ok(())
        } else {
            Err(Error::type_mismatch(expected.describe(), found.describe()))
        }
    }

    /// Puts tokens back in front of the remaining stream.
    pub fn push_back(&mut self, tokens: Vec<Token>) {
        for token in tokens.into_iter().rev() {
            self.pending.push_front(token);
        }
    }

    /// Skips the current value, leaving its last token current.
    pub fn skip_children(&mut self) -> Result<()> {
        if !matches!(self.current()?, Token::StartObject | Token::StartArray) {
            return Ok(());
        }
        let mut open = 1usize;
        while open > 0 {
            self.advance()?;
            match self.current()? {
                Token::StartObject | Token::StartArray => open += 1,
                Token::EndObject | Token::EndArray => open -= 1,
                _ => {}
            }
        }
        Ok(())
    }

    /// Copies the tokens of the current value, leaving its last token current.
    pub fn capture_value(&mut self) -> Result<Vec<Token>> {
        let first = self.current()?.clone();
        let mut captured = vec![first.clone()];
        if !matches!(first, Token::StartObject | Token::StartArray) {
            return Ok(captured);
        }
        let mut open = 1usize;
        while open > 0 {
            self.advance()?;
            let token = self.current()?.clone();
            match token {
                Token::StartObject | Token::StartArray => open += 1,
                Token::EndObject | Token::EndArray => open -= 1,
                _ => {}
            }
            captured.push(token);
        }
        Ok(captured)
    }

    /// Reads the current value as a [`Value`] tree.
    pub fn read_tree(&mut self) -> Result<Value> {
        let mut writer = TreeWriter::new();
        for token in self.capture_value()? {
            writer.write_token(token)?;
        }
        writer.into_value()
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
}

/// Reads a value with an optional type deserializer.
pub(crate) fn read_content(
    deserializer: &Arc<dyn Deserializer>,
    type_de: Option<&TypeDeserializer>,
    ctx: &mut DeserializationContext<'_>,
) -> Result<AnyValue> {
    match type_de {
        Some(type_de) => deserializer.deserialize_with_type(ctx, type_de),
        None => deserializer.deserialize(ctx),
    }
}

impl BindingRef<dyn Deserializer> {
    /// Returns the referenced deserializer, looking it up through `provider` when needed.
    pub fn deserializer(&self, provider: &DeserializerProvider) -> Result<Arc<dyn Deserializer>> {
        self.get_with(|key| provider.find_deserializer(key))
    }
}

/// Finds and caches deserializers.
pub struct DeserializerProvider {
    env: BindingEnv,
    factory: DeserializerFactory,
    cache: BindingCache<dyn Deserializer>,
}

impl DeserializerProvider {
    #[must_use]
    pub fn new(env: BindingEnv) -> Self {
        let capacity = env.config.max_cached_bindings();
        DeserializerProvider {
            env,
            factory: DeserializerFactory::new(),
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

    pub fn find_value_deserializer(&self, ty: &TypeDescriptor) -> Result<Arc<dyn Deserializer>> {
        self.find_deserializer(&BindingKey::plain(ty))
    }

    /// Deserializer for a root value, reading class-level type markers when the
    /// type declares them.
    pub fn find_typed_root_deserializer(
        &self,
        ty: &TypeDescriptor,
    ) -> Result<Arc<dyn Deserializer>> {
        self.find_deserializer(&BindingKey::typed_root(ty))
    }

    pub fn find_deserializer(&self, key: &BindingKey) -> Result<Arc<dyn Deserializer>> {
        self.cache.get_or_build(
            key,
            || self.factory.create(&self.env, key),
            |deserializer| deserializer.resolve(self),
        )
    }

    #[must_use]
    pub fn find_type_deserializer(&self, ty: &TypeDescriptor) -> Option<TypeDeserializer> {
        self.type_resolver().type_deserializer(ty, None)
    }

    pub fn flush(&self) {
        tracing::debug!(size = self.cache.len(), "flushing deserializer cache");
        self.cache.clear();
    }

    #[must_use]
    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }
}
