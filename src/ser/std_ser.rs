//! Serializers for scalars, wrappers, containers, enums and the value tree.

use num_bigint::BigInt;
use std::any::Any;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::{SerializationContext, Serializer};
use crate::polymorphic::{Shape, TypeSerializer};
use crate::provider::BindingRef;
use crate::types::keys::KeyCodec;
use crate::types::{downcast, EnumOps, MapOps, ScalarKind, SeqOps, TypeDescriptor, WrapOps};
use crate::{Error, PathSegment, Result, Token, TokenReader, TokenWriter, TreeReader, Value};

/// Writes a single scalar token.
pub struct ScalarSerializer {
    ty: TypeDescriptor,
    kind: ScalarKind,
}

impl ScalarSerializer {
    #[must_use]
    pub fn new(ty: TypeDescriptor, kind: ScalarKind) -> Self {
        ScalarSerializer { ty, kind }
    }

    fn token(&self, value: &dyn Any, timestamps: bool) -> Result<Token> {
        Ok(match self.kind {
            ScalarKind::Bool => Token::Bool(*downcast::<bool>(value)?),
            ScalarKind::I8 => Token::Int(i64::from(*downcast::<i8>(value)?)),
            ScalarKind::I16 => Token::Int(i64::from(*downcast::<i16>(value)?)),
            ScalarKind::I32 => Token::Int(i64::from(*downcast::<i32>(value)?)),
            ScalarKind::I64 => Token::Int(*downcast::<i64>(value)?),
            ScalarKind::U8 => Token::Int(i64::from(*downcast::<u8>(value)?)),
            ScalarKind::U16 => Token::Int(i64::from(*downcast::<u16>(value)?)),
            ScalarKind::U32 => Token::Int(i64::from(*downcast::<u32>(value)?)),
            ScalarKind::U64 => {
                let v = *downcast::<u64>(value)?;
                match i64::try_from(v) {
                    Ok(small) => Token::Int(small),
                    Err(_) => Token::BigInt(BigInt::from(v)),
                }
            }
            ScalarKind::F32 => Token::Float(f64::from(*downcast::<f32>(value)?)),
            ScalarKind::F64 => Token::Float(*downcast::<f64>(value)?),
            ScalarKind::Char => Token::String(downcast::<char>(value)?.to_string()),
            ScalarKind::String => Token::String(downcast::<String>(value)?.clone()),
            ScalarKind::BigInt => Token::BigInt(downcast::<BigInt>(value)?.clone()),
            ScalarKind::DateTime => {
                let date = downcast::<DateTime<Utc>>(value)?;
                if timestamps {
                    Token::Int(date.timestamp_millis())
                } else {
                    Token::String(date.to_rfc3339())
                }
            }
        })
    }
}

impl Serializer for ScalarSerializer {
    fn serialize(
        &self,
        value: &dyn Any,
        w: &mut dyn TokenWriter,
        ctx: &mut SerializationContext<'_>,
    ) -> Result<()> {
        let timestamps = ctx.config().settings().write_dates_as_timestamps;
        w.write_token(self.token(value, timestamps)?)
    }

    fn handled_type(&self) -> Option<&TypeDescriptor> {
        Some(&self.ty)
    }

    fn is_empty(&self, value: &dyn Any, _ctx: &SerializationContext<'_>) -> bool {
        self.kind == ScalarKind::String && value.downcast_ref::<String>().is_some_and(String::is_empty)
    }
}

/// `Option<T>` and `Box<T>`: transparent around the content's serializer.
pub struct WrapperSerializer {
    ty: TypeDescriptor,
    ops: WrapOps,
    inner: BindingRef<dyn Serializer>,
}

impl WrapperSerializer {
    #[must_use]
    pub fn new(ty: TypeDescriptor, ops: WrapOps, inner: BindingRef<dyn Serializer>) -> Self {
        WrapperSerializer { ty, ops, inner }
    }
}

impl Serializer for WrapperSerializer {
    fn serialize(
        &self,
        value: &dyn Any,
        w: &mut dyn TokenWriter,
        ctx: &mut SerializationContext<'_>,
    ) -> Result<()> {
        match (self.ops.get)(value) {
            Some(content) => self.inner.serializer(ctx.provider())?.serialize(content, w, ctx),
            None => w.write_null(),
        }
    }

    fn serialize_with_type(
        &self,
        value: &dyn Any,
        w: &mut dyn TokenWriter,
        ctx: &mut SerializationContext<'_>,
        type_ser: &TypeSerializer,
    ) -> Result<()> {
        match (self.ops.get)(value) {
            Some(content) => self
                .inner
                .serializer(ctx.provider())?
                .serialize_with_type(content, w, ctx, type_ser),
            None => w.write_null(),
        }
    }

    fn handled_type(&self) -> Option<&TypeDescriptor> {
        Some(&self.ty)
    }

    fn is_null(&self, value: &dyn Any) -> bool {
        (self.ops.get)(value).is_none()
    }

    fn is_empty(&self, value: &dyn Any, ctx: &SerializationContext<'_>) -> bool {
        match (self.ops.get)(value) {
            None => true,
            Some(content) => self
                .inner
                .serializer(ctx.provider())
                .is_ok_and(|inner| inner.is_empty(content, ctx)),
        }
    }

    fn resolve(&self, provider: &super::SerializerProvider) -> Result<()> {
        self.inner.serializer(provider).map(|_| ())
    }
}

/// Writes an element binding with or without type markers.
fn write_content(
    serializer: &Arc<dyn Serializer>,
    type_ser: Option<&TypeSerializer>,
    value: &dyn Any,
    w: &mut dyn TokenWriter,
    ctx: &mut SerializationContext<'_>,
) -> Result<()> {
    match type_ser {
        Some(type_ser) => serializer.serialize_with_type(value, w, ctx, type_ser),
        None => serializer.serialize(value, w, ctx),
    }
}

/// Sequences and sets.
pub struct SeqSerializer {
    ty: TypeDescriptor,
    ops: SeqOps,
    element: BindingRef<dyn Serializer>,
    element_type: Option<TypeSerializer>,
}

impl SeqSerializer {
    #[must_use]
    pub fn new(
        ty: TypeDescriptor,
        ops: SeqOps,
        element: BindingRef<dyn Serializer>,
        element_type: Option<TypeSerializer>,
    ) -> Self {
        SeqSerializer {
            ty,
            ops,
            element,
            element_type,
        }
    }

    fn write_elements(
        &self,
        value: &dyn Any,
        w: &mut dyn TokenWriter,
        ctx: &mut SerializationContext<'_>,
    ) -> Result<()> {
        let element = self.element.serializer(ctx.provider())?;
        for (index, item) in (self.ops.iter)(value).enumerate() {
            write_content(&element, self.element_type.as_ref(), item, w, ctx)
                .map_err(|e| e.with_path(PathSegment::Index(index)))?;
        }
        Ok(())
    }
}

impl Serializer for SeqSerializer {
    fn serialize(
        &self,
        value: &dyn Any,
        w: &mut dyn TokenWriter,
        ctx: &mut SerializationContext<'_>,
    ) -> Result<()> {
        ctx.nested(|ctx| {
            w.start_array()?;
            self.write_elements(value, w, ctx)?;
            w.end_array()
        })
    }

    fn serialize_with_type(
        &self,
        value: &dyn Any,
        w: &mut dyn TokenWriter,
        ctx: &mut SerializationContext<'_>,
        type_ser: &TypeSerializer,
    ) -> Result<()> {
        ctx.nested(|ctx| {
            type_ser.write_prefix(value, Shape::Array, w)?;
            self.write_elements(value, w, ctx)?;
            type_ser.write_suffix(Shape::Array, w)
        })
    }

    fn handled_type(&self) -> Option<&TypeDescriptor> {
        Some(&self.ty)
    }

    fn is_empty(&self, value: &dyn Any, _ctx: &SerializationContext<'_>) -> bool {
        (self.ops.len)(value) == 0
    }

    fn resolve(&self, provider: &super::SerializerProvider) -> Result<()> {
        self.element.serializer(provider).map(|_| ())
    }
}

/// Maps, written as objects keyed by the rendered map key.
pub struct MapSerializer {
    ty: TypeDescriptor,
    ops: MapOps,
    keys: KeyCodec,
    value: BindingRef<dyn Serializer>,
    value_type: Option<TypeSerializer>,
}

impl MapSerializer {
    pub(crate) fn new(
        ty: TypeDescriptor,
        ops: MapOps,
        keys: KeyCodec,
        value: BindingRef<dyn Serializer>,
        value_type: Option<TypeSerializer>,
    ) -> Self {
        MapSerializer {
            ty,
            ops,
            keys,
            value,
            value_type,
        }
    }

    fn write_entries(
        &self,
        map: &dyn Any,
        w: &mut dyn TokenWriter,
        ctx: &mut SerializationContext<'_>,
    ) -> Result<()> {
        let serializer = self.value.serializer(ctx.provider())?;
        let write_nulls = ctx.config().settings().write_null_map_values;
        for (key, value) in (self.ops.iter)(map) {
            let key = self.keys.encode(key)?;
            if !write_nulls && serializer.is_null(value) {
                continue;
            }
            w.field_name(&key)?;
            write_content(&serializer, self.value_type.as_ref(), value, w, ctx)
                .map_err(|e| e.with_path(PathSegment::Key(key)))?;
        }
        Ok(())
    }
}

impl Serializer for MapSerializer {
    fn serialize(
        &self,
        value: &dyn Any,
        w: &mut dyn TokenWriter,
        ctx: &mut SerializationContext<'_>,
    ) -> Result<()> {
        ctx.nested(|ctx| {
            w.start_object()?;
            self.write_entries(value, w, ctx)?;
            w.end_object()
        })
    }

    fn serialize_with_type(
        &self,
        value: &dyn Any,
        w: &mut dyn TokenWriter,
        ctx: &mut SerializationContext<'_>,
        type_ser: &TypeSerializer,
    ) -> Result<()> {
        ctx.nested(|ctx| {
            type_ser.write_prefix(value, Shape::Object, w)?;
            self.write_entries(value, w, ctx)?;
            type_ser.write_suffix(Shape::Object, w)
        })
    }

    fn handled_type(&self) -> Option<&TypeDescriptor> {
        Some(&self.ty)
    }

    fn is_empty(&self, value: &dyn Any, _ctx: &SerializationContext<'_>) -> bool {
        (self.ops.len)(value) == 0
    }

    fn resolve(&self, provider: &super::SerializerProvider) -> Result<()> {
        self.value.serializer(provider).map(|_| ())
    }
}

/// Unit enums, written as the variant name.
pub struct EnumSerializer {
    ty: TypeDescriptor,
    ops: EnumOps,
}

impl EnumSerializer {
    #[must_use]
    pub fn new(ty: TypeDescriptor, ops: EnumOps) -> Self {
        EnumSerializer { ty, ops }
    }
}

impl Serializer for EnumSerializer {
    fn serialize(
        &self,
        value: &dyn Any,
        w: &mut dyn TokenWriter,
        _ctx: &mut SerializationContext<'_>,
    ) -> Result<()> {
        let name = (self.ops.name_of)(value)
            .ok_or_else(|| Error::type_mismatch(self.ty.name(), "foreign value"))?;
        w.write_string(name)
    }

    fn handled_type(&self) -> Option<&TypeDescriptor> {
        Some(&self.ty)
    }
}

/// Replays a [`Value`] into a writer.
pub(crate) fn write_tree(value: Value, w: &mut dyn TokenWriter) -> Result<()> {
    let mut reader = TreeReader::new(value);
    while let Some(token) = reader.next_token()? {
        w.write_token(token)?;
    }
    Ok(())
}

/// The [`Value`] tree, written as-is.
pub struct TreeSerializer {
    ty: TypeDescriptor,
}

impl TreeSerializer {
    #[must_use]
    pub fn new(ty: TypeDescriptor) -> Self {
        TreeSerializer { ty }
    }
}

impl Serializer for TreeSerializer {
    fn serialize(
        &self,
        value: &dyn Any,
        w: &mut dyn TokenWriter,
        _ctx: &mut SerializationContext<'_>,
    ) -> Result<()> {
        write_tree(downcast::<Value>(value)?.clone(), w)
    }

    fn handled_type(&self) -> Option<&TypeDescriptor> {
        Some(&self.ty)
    }

    fn is_null(&self, value: &dyn Any) -> bool {
        value.downcast_ref::<Value>().is_some_and(Value::is_null)
    }

    fn is_empty(&self, value: &dyn Any, _ctx: &SerializationContext<'_>) -> bool {
        match value.downcast_ref::<Value>() {
            Some(Value::Null) => true,
            Some(Value::Array(items)) => items.is_empty(),
            Some(Value::Object(map)) => map.is_empty(),
            Some(Value::String(s)) => s.is_empty(),
            _ => false,
        }
    }
}

/// Root binding: adds class-level type markers when the type declares them.
pub struct TypedRootSerializer {
    ty: TypeDescriptor,
    inner: BindingRef<dyn Serializer>,
    type_ser: Option<TypeSerializer>,
}

impl TypedRootSerializer {
    #[must_use]
    pub fn new(
        ty: TypeDescriptor,
        inner: BindingRef<dyn Serializer>,
        type_ser: Option<TypeSerializer>,
    ) -> Self {
        TypedRootSerializer {
            ty,
            inner,
            type_ser,
        }
    }
}

impl Serializer for TypedRootSerializer {
    fn serialize(
        &self,
        value: &dyn Any,
        w: &mut dyn TokenWriter,
        ctx: &mut SerializationContext<'_>,
    ) -> Result<()> {
        let inner = self.inner.serializer(ctx.provider())?;
        write_content(&inner, self.type_ser.as_ref(), value, w, ctx)
    }

    fn handled_type(&self) -> Option<&TypeDescriptor> {
        Some(&self.ty)
    }

    fn resolve(&self, provider: &super::SerializerProvider) -> Result<()> {
        self.inner.serializer(provider).map(|_| ())
    }
}
