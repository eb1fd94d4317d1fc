//! Deserializers for scalars, wrappers, containers, enums and the value tree.

use chrono::{DateTime, TimeZone, Utc};
use num_bigint::BigInt;

use super::{read_content, DeserializationContext, Deserializer, DeserializerProvider};
use crate::introspect::LinkFn;
use crate::polymorphic::TypeDeserializer;
use crate::provider::BindingRef;
use crate::types::keys::KeyCodec;
use crate::types::{AnyValue, EnumOps, MapOps, ScalarKind, SeqOps, TypeDescriptor, WrapOps};
use crate::{Error, PathSegment, Result, Token};

/// Value for a null token where the type has no null: its neutral value.
pub(crate) fn null_value(ty: &TypeDescriptor) -> Result<AnyValue> {
    ty.default_value()
        .ok_or_else(|| Error::type_mismatch(ty.name(), "null"))
}

fn integer(token: &Token, expected: &str) -> Result<i128> {
    let mismatch = || Error::type_mismatch(expected, token.describe());
    match token {
        Token::Int(i) => Ok(i128::from(*i)),
        Token::BigInt(n) => i128::try_from(n).map_err(|_| mismatch()),
        Token::Float(f) if f.fract() == 0.0 && f.is_finite() => Ok(*f as i128),
        Token::String(s) => {
            let trimmed = s.trim();
            trimmed
                .parse::<i128>()
                .or_else(|_| match trimmed.parse::<f64>() {
                    Ok(f) if f.fract() == 0.0 && f.is_finite() => Ok(f as i128),
                    _ => Err(mismatch()),
                })
        }
        _ => Err(mismatch()),
    }
}

fn float(token: &Token) -> Result<f64> {
    match token {
        Token::Float(f) => Ok(*f),
        Token::Int(i) => Ok(*i as f64),
        Token::BigInt(n) => n
            .to_string()
            .parse::<f64>()
            .map_err(|_| Error::type_mismatch("float", "big integer")),
        Token::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| Error::type_mismatch("float", "non-numeric string")),
        other => Err(Error::type_mismatch("float", other.describe())),
    }
}

macro_rules! narrow_int {
    ($token:expr, $ty:ty) => {{
        let wide = integer($token, stringify!($ty))?;
        let narrowed = <$ty>::try_from(wide).map_err(|_| {
            Error::custom(format!("{} is out of range for {}", wide, stringify!($ty)))
        })?;
        Box::new(narrowed) as AnyValue
    }};
}

/// Reads a single scalar token, with lenient coercion from strings.
pub struct ScalarDeserializer {
    ty: TypeDescriptor,
    kind: ScalarKind,
}

impl ScalarDeserializer {
    #[must_use]
    pub fn new(ty: TypeDescriptor, kind: ScalarKind) -> Self {
        ScalarDeserializer { ty, kind }
    }

    fn convert(&self, token: &Token) -> Result<AnyValue> {
        Ok(match self.kind {
            ScalarKind::Bool => match token {
                Token::Bool(b) => Box::new(*b),
                Token::String(s) if s == "true" => Box::new(true),
                Token::String(s) if s == "false" => Box::new(false),
                other => return Err(Error::type_mismatch("boolean", other.describe())),
            },
            ScalarKind::I8 => narrow_int!(token, i8),
            ScalarKind::I16 => narrow_int!(token, i16),
            ScalarKind::I32 => narrow_int!(token, i32),
            ScalarKind::I64 => narrow_int!(token, i64),
            ScalarKind::U8 => narrow_int!(token, u8),
            ScalarKind::U16 => narrow_int!(token, u16),
            ScalarKind::U32 => narrow_int!(token, u32),
            ScalarKind::U64 => narrow_int!(token, u64),
            ScalarKind::F32 => Box::new(float(token)? as f32),
            ScalarKind::F64 => Box::new(float(token)?),
            ScalarKind::Char => match token {
                Token::String(s) if s.chars().count() == 1 => match s.chars().next() {
                    Some(c) => Box::new(c),
                    None => return Err(Error::type_mismatch("char", "empty string")),
                },
                other => return Err(Error::type_mismatch("single-character string", other.describe())),
            },
            ScalarKind::String => match token {
                Token::String(s) => Box::new(s.clone()),
                Token::Int(i) => Box::new(i.to_string()),
                Token::BigInt(n) => Box::new(n.to_string()),
                Token::Float(f) => Box::new(f.to_string()),
                Token::Bool(b) => Box::new(b.to_string()),
                other => return Err(Error::type_mismatch("string", other.describe())),
            },
            ScalarKind::BigInt => match token {
                Token::BigInt(n) => Box::new(n.clone()),
                Token::Int(i) => Box::new(BigInt::from(*i)),
                Token::String(s) => Box::new(
                    s.trim()
                        .parse::<BigInt>()
                        .map_err(|_| Error::type_mismatch("integer", "non-numeric string"))?,
                ),
                other => return Err(Error::type_mismatch("integer", other.describe())),
            },
            ScalarKind::DateTime => Box::new(date_time(token)?),
        })
    }
}

/// Accepts epoch milliseconds (as a number or numeric string) or RFC 3339.
fn date_time(token: &Token) -> Result<DateTime<Utc>> {
    let from_millis = |millis: i64| {
        Utc.timestamp_millis_opt(millis)
            .single()
            .ok_or_else(|| Error::custom(format!("timestamp {} is out of range", millis)))
    };
    match token {
        Token::Int(millis) => from_millis(*millis),
        Token::String(s) => match s.parse::<i64>() {
            Ok(millis) => from_millis(millis),
            Err(_) => DateTime::parse_from_rfc3339(s)
                .map(|date| date.with_timezone(&Utc))
                .map_err(|e| Error::custom(format!("invalid date \"{}\": {}", s, e))),
        },
        other => Err(Error::type_mismatch("date", other.describe())),
    }
}

impl Deserializer for ScalarDeserializer {
    fn deserialize(&self, ctx: &mut DeserializationContext<'_>) -> Result<AnyValue> {
        let token = ctx.current()?;
        if *token == Token::Null {
            if ctx.config().settings().fail_on_null_for_primitives {
                return Err(Error::type_mismatch(self.ty.name(), "null"));
            }
            return null_value(&self.ty);
        }
        self.convert(token)
    }

    fn handled_type(&self) -> Option<&TypeDescriptor> {
        Some(&self.ty)
    }
}

/// `Option<T>` and `Box<T>`.
pub struct WrapperDeserializer {
    ty: TypeDescriptor,
    ops: WrapOps,
    inner: BindingRef<dyn Deserializer>,
    optional: bool,
}

impl WrapperDeserializer {
    #[must_use]
    pub fn new(
        ty: TypeDescriptor,
        ops: WrapOps,
        inner: BindingRef<dyn Deserializer>,
        optional: bool,
    ) -> Self {
        WrapperDeserializer {
            ty,
            ops,
            inner,
            optional,
        }
    }
}

impl Deserializer for WrapperDeserializer {
    fn deserialize(&self, ctx: &mut DeserializationContext<'_>) -> Result<AnyValue> {
        if self.optional && *ctx.current()? == Token::Null {
            return null_value(&self.ty);
        }
        let inner = self.inner.deserializer(ctx.provider())?;
        (self.ops.wrap)(inner.deserialize(ctx)?)
    }

    fn deserialize_with_type(
        &self,
        ctx: &mut DeserializationContext<'_>,
        type_de: &TypeDeserializer,
    ) -> Result<AnyValue> {
        if self.optional && *ctx.current()? == Token::Null {
            return null_value(&self.ty);
        }
        let inner = self.inner.deserializer(ctx.provider())?;
        (self.ops.wrap)(inner.deserialize_with_type(ctx, type_de)?)
    }

    fn handled_type(&self) -> Option<&TypeDescriptor> {
        Some(&self.ty)
    }

    fn find_back_reference(
        &self,
        name: &str,
        provider: &DeserializerProvider,
    ) -> Result<Option<LinkFn>> {
        self.inner.deserializer(provider)?.find_back_reference(name, provider)
    }

    fn resolve(&self, provider: &DeserializerProvider) -> Result<()> {
        self.inner.deserializer(provider).map(|_| ())
    }
}

/// Sequences and sets.
pub struct SeqDeserializer {
    ty: TypeDescriptor,
    ops: SeqOps,
    element: BindingRef<dyn Deserializer>,
    element_type: Option<TypeDeserializer>,
}

impl SeqDeserializer {
    #[must_use]
    pub fn new(
        ty: TypeDescriptor,
        ops: SeqOps,
        element: BindingRef<dyn Deserializer>,
        element_type: Option<TypeDeserializer>,
    ) -> Self {
        SeqDeserializer {
            ty,
            ops,
            element,
            element_type,
        }
    }
}

impl Deserializer for SeqDeserializer {
    fn deserialize(&self, ctx: &mut DeserializationContext<'_>) -> Result<AnyValue> {
        let element = self.element.deserializer(ctx.provider())?;
        match ctx.current()? {
            Token::StartArray => {}
            Token::Null => return null_value(&self.ty),
            _ if ctx.config().settings().accept_single_value_as_array => {
                let single = read_content(&element, self.element_type.as_ref(), ctx)
                    .map_err(|e| e.with_path(PathSegment::Index(0)))?;
                return (self.ops.build)(vec![single]);
            }
            other => return Err(Error::type_mismatch("array", other.describe())),
        }
        let items = ctx.nested(|ctx| {
            let mut items = Vec::new();
            loop {
                ctx.advance()?;
                if *ctx.current()? == Token::EndArray {
                    break;
                }
                let index = items.len();
                let item = read_content(&element, self.element_type.as_ref(), ctx)
                    .map_err(|e| e.with_path(PathSegment::Index(index)))?;
                items.push(item);
            }
            Ok(items)
        })?;
        (self.ops.build)(items)
    }

    fn handled_type(&self) -> Option<&TypeDescriptor> {
        Some(&self.ty)
    }

    fn find_back_reference(
        &self,
        name: &str,
        provider: &DeserializerProvider,
    ) -> Result<Option<LinkFn>> {
        self.element.deserializer(provider)?.find_back_reference(name, provider)
    }

    fn resolve(&self, provider: &DeserializerProvider) -> Result<()> {
        self.element.deserializer(provider).map(|_| ())
    }
}

/// Maps read from objects; field names are converted into keys.
pub struct MapDeserializer {
    ty: TypeDescriptor,
    ops: MapOps,
    keys: KeyCodec,
    value: BindingRef<dyn Deserializer>,
    value_type: Option<TypeDeserializer>,
}

impl MapDeserializer {
    pub(crate) fn new(
        ty: TypeDescriptor,
        ops: MapOps,
        keys: KeyCodec,
        value: BindingRef<dyn Deserializer>,
        value_type: Option<TypeDeserializer>,
    ) -> Self {
        MapDeserializer {
            ty,
            ops,
            keys,
            value,
            value_type,
        }
    }
}

impl Deserializer for MapDeserializer {
    fn deserialize(&self, ctx: &mut DeserializationContext<'_>) -> Result<AnyValue> {
        match ctx.current()? {
            Token::StartObject => {}
            Token::Null => return null_value(&self.ty),
            other => return Err(Error::type_mismatch("object", other.describe())),
        }
        let value = self.value.deserializer(ctx.provider())?;
        let entries = ctx.nested(|ctx| {
            let mut entries = Vec::new();
            loop {
                ctx.advance()?;
                let name = match ctx.current()? {
                    Token::EndObject => break,
                    Token::FieldName(name) => name.clone(),
                    other => return Err(Error::type_mismatch("field name", other.describe())),
                };
                let key = self
                    .keys
                    .decode(&name)
                    .map_err(|e| e.with_path(PathSegment::Key(name.clone())))?;
                ctx.advance()?;
                let entry = read_content(&value, self.value_type.as_ref(), ctx)
                    .map_err(|e| e.with_path(PathSegment::Key(name)))?;
                entries.push((key, entry));
            }
            Ok(entries)
        })?;
        (self.ops.build)(entries)
    }

    fn handled_type(&self) -> Option<&TypeDescriptor> {
        Some(&self.ty)
    }

    fn find_back_reference(
        &self,
        name: &str,
        provider: &DeserializerProvider,
    ) -> Result<Option<LinkFn>> {
        self.value.deserializer(provider)?.find_back_reference(name, provider)
    }

    fn resolve(&self, provider: &DeserializerProvider) -> Result<()> {
        self.value.deserializer(provider).map(|_| ())
    }
}

/// Unit enums, read from a variant name or an index.
pub struct EnumDeserializer {
    ty: TypeDescriptor,
    ops: EnumOps,
}

impl EnumDeserializer {
    #[must_use]
    pub fn new(ty: TypeDescriptor, ops: EnumOps) -> Self {
        EnumDeserializer { ty, ops }
    }

    fn unknown(&self, found: &str) -> Error {
        Error::custom(format!(
            "unknown variant \"{}\" of {}, expected one of: {}",
            found,
            self.ty.name(),
            (self.ops.variants)().join(", ")
        ))
    }
}

impl Deserializer for EnumDeserializer {
    fn deserialize(&self, ctx: &mut DeserializationContext<'_>) -> Result<AnyValue> {
        match ctx.current()? {
            Token::String(name) => (self.ops.from_name)(name).ok_or_else(|| self.unknown(name)),
            Token::Int(index) => usize::try_from(*index)
                .ok()
                .and_then(|i| (self.ops.variants)().get(i).copied())
                .and_then(|name| (self.ops.from_name)(name))
                .ok_or_else(|| self.unknown(&index.to_string())),
            other => Err(Error::type_mismatch("enum variant name", other.describe())),
        }
    }

    fn handled_type(&self) -> Option<&TypeDescriptor> {
        Some(&self.ty)
    }
}

/// The [`Value`](crate::Value) tree.
pub struct TreeDeserializer {
    ty: TypeDescriptor,
}

impl TreeDeserializer {
    #[must_use]
    pub fn new(ty: TypeDescriptor) -> Self {
        TreeDeserializer { ty }
    }
}

impl Deserializer for TreeDeserializer {
    fn deserialize(&self, ctx: &mut DeserializationContext<'_>) -> Result<AnyValue> {
        Ok(Box::new(ctx.read_tree()?))
    }

    fn handled_type(&self) -> Option<&TypeDescriptor> {
        Some(&self.ty)
    }
}

/// Abstract bases: only readable through type markers.
pub struct AbstractDeserializer {
    ty: TypeDescriptor,
}

impl AbstractDeserializer {
    #[must_use]
    pub fn new(ty: TypeDescriptor) -> Self {
        AbstractDeserializer { ty }
    }
}

impl Deserializer for AbstractDeserializer {
    fn deserialize(&self, _ctx: &mut DeserializationContext<'_>) -> Result<AnyValue> {
        Err(Error::configuration(
            self.ty.name(),
            "abstract type has no type information configured; cannot pick a subtype",
        ))
    }

    fn handled_type(&self) -> Option<&TypeDescriptor> {
        Some(&self.ty)
    }
}

/// Root binding: reads class-level type markers when the type declares them.
pub struct TypedRootDeserializer {
    ty: TypeDescriptor,
    inner: BindingRef<dyn Deserializer>,
    type_de: Option<TypeDeserializer>,
}

impl TypedRootDeserializer {
    #[must_use]
    pub fn new(
        ty: TypeDescriptor,
        inner: BindingRef<dyn Deserializer>,
        type_de: Option<TypeDeserializer>,
    ) -> Self {
        TypedRootDeserializer { ty, inner, type_de }
    }
}

impl Deserializer for TypedRootDeserializer {
    fn deserialize(&self, ctx: &mut DeserializationContext<'_>) -> Result<AnyValue> {
        let inner = self.inner.deserializer(ctx.provider())?;
        read_content(&inner, self.type_de.as_ref(), ctx)
    }

    fn handled_type(&self) -> Option<&TypeDescriptor> {
        Some(&self.ty)
    }

    fn resolve(&self, provider: &DeserializerProvider) -> Result<()> {
        self.inner.deserializer(provider).map(|_| ())
    }
}
