//! Serializers for beans and abstract bases.

use std::any::Any;
use std::sync::{Arc, OnceLock};

use tracing::debug;

use super::std_ser::write_tree;
use super::{SerializationContext, Serializer, SerializerProvider};
use crate::introspect::{AnyGetFn, DefaultFn, Inclusion, NarrowFn, ReadFn};
use crate::polymorphic::{Shape, TypeIdResolver, TypeSerializer};
use crate::provider::BindingRef;
use crate::types::TypeDescriptor;
use crate::{Error, Result, Token, TokenBuffer, TokenWriter};

/// Writes one property of a bean.
pub struct BeanPropertyWriter {
    pub(crate) name: String,
    pub(crate) read: ReadFn,
    pub(crate) ty: TypeDescriptor,
    pub(crate) serializer: BindingRef<dyn Serializer>,
    pub(crate) type_ser: Option<TypeSerializer>,
    pub(crate) inclusion: Inclusion,
    pub(crate) views: Option<Vec<String>>,
    /// Source of the reference value for `Inclusion::NonDefault`.
    pub(crate) default_instance: Option<DefaultFn>,
    pub(crate) default_tokens: OnceLock<Option<Vec<Token>>>,
}

impl BeanPropertyWriter {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn declared_type(&self) -> &TypeDescriptor {
        &self.ty
    }

    fn in_view(&self, ctx: &SerializationContext<'_>) -> bool {
        let Some(active) = ctx.view() else {
            return true;
        };
        match &self.views {
            None => ctx.config().settings().default_view_inclusion,
            Some(tags) => tags.iter().any(|tag| ctx.config().view_includes(active, tag)),
        }
    }

    fn render(
        &self,
        serializer: &Arc<dyn Serializer>,
        value: &dyn Any,
        w: &mut dyn TokenWriter,
        ctx: &mut SerializationContext<'_>,
    ) -> Result<()> {
        match &self.type_ser {
            Some(type_ser) => serializer.serialize_with_type(value, w, ctx, type_ser),
            None => serializer.serialize(value, w, ctx),
        }
    }

    /// Tokens of the reference value: the property of a default instance, else
    /// the type's neutral value. Rendered once, outside any view.
    fn default_tokens(
        &self,
        serializer: &Arc<dyn Serializer>,
        provider: &SerializerProvider,
    ) -> Option<Vec<Token>> {
        if let Some(tokens) = self.default_tokens.get() {
            return tokens.clone();
        }
        let mut ctx = SerializationContext::new(provider, None);
        let ctx = &mut ctx;
        let mut buffer = TokenBuffer::new();
        let rendered = match &self.default_instance {
            Some(create) => {
                let instance = create();
                (self.read)(instance.as_ref())
                    .and_then(|accessed| self.render(serializer, accessed.as_any(), &mut buffer, ctx))
            }
            None => match self.ty.default_value() {
                Some(neutral) => self.render(serializer, neutral.as_ref(), &mut buffer, ctx),
                None => Err(Error::custom("no default value")),
            },
        };
        let tokens = match rendered {
            Ok(()) => Some(buffer.into_tokens()),
            Err(err) => {
                debug!(property = %self.name, error = %err, "no reference value for non-default check");
                None
            }
        };
        self.default_tokens.get_or_init(|| tokens).clone()
    }

    fn is_default(
        &self,
        serializer: &Arc<dyn Serializer>,
        value: &dyn Any,
        ctx: &mut SerializationContext<'_>,
    ) -> Result<bool> {
        let Some(reference) = self.default_tokens(serializer, ctx.provider()) else {
            return Ok(serializer.is_null(value) || serializer.is_empty(value, ctx));
        };
        let mut buffer = TokenBuffer::new();
        self.render(serializer, value, &mut buffer, &mut ctx.without_view())?;
        Ok(buffer.tokens() == reference.as_slice())
    }

    /// Writes the field name and value, unless filtered out.
    pub fn write(
        &self,
        bean: &dyn Any,
        w: &mut dyn TokenWriter,
        ctx: &mut SerializationContext<'_>,
    ) -> Result<()> {
        if !self.in_view(ctx) {
            return Ok(());
        }
        let accessed = (self.read)(bean).map_err(|e| e.at_field(&self.name))?;
        let value = accessed.as_any();
        let serializer = self.serializer.serializer(ctx.provider())?;
        let skip = match self.inclusion {
            Inclusion::Always => false,
            Inclusion::NonNull => serializer.is_null(value),
            Inclusion::NonEmpty => serializer.is_null(value) || serializer.is_empty(value, ctx),
            Inclusion::NonDefault => self
                .is_default(&serializer, value, ctx)
                .map_err(|e| e.at_field(&self.name))?,
        };
        if skip {
            return Ok(());
        }
        w.field_name(&self.name)?;
        self.render(&serializer, value, w, ctx)
            .map_err(|e| e.at_field(&self.name))
    }
}

/// Writes a bean as an object of its properties.
pub struct BeanSerializer {
    pub(crate) ty: TypeDescriptor,
    pub(crate) properties: Vec<BeanPropertyWriter>,
    pub(crate) any_getter: Option<AnyGetFn>,
}

impl BeanSerializer {
    #[must_use]
    pub fn properties(&self) -> &[BeanPropertyWriter] {
        &self.properties
    }

    fn write_fields(
        &self,
        value: &dyn Any,
        w: &mut dyn TokenWriter,
        ctx: &mut SerializationContext<'_>,
    ) -> Result<()> {
        for property in &self.properties {
            property.write(value, w, ctx)?;
        }
        if let Some(any_getter) = &self.any_getter {
            for (name, extra) in any_getter(value)? {
                w.field_name(&name)?;
                write_tree(extra, w)?;
            }
        }
        Ok(())
    }
}

impl Serializer for BeanSerializer {
    fn serialize(
        &self,
        value: &dyn Any,
        w: &mut dyn TokenWriter,
        ctx: &mut SerializationContext<'_>,
    ) -> Result<()> {
        ctx.nested(|ctx| {
            w.start_object()?;
            self.write_fields(value, w, ctx)?;
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
            self.write_fields(value, w, ctx)?;
            type_ser.write_suffix(Shape::Object, w)
        })
    }

    fn handled_type(&self) -> Option<&TypeDescriptor> {
        Some(&self.ty)
    }

    fn resolve(&self, provider: &SerializerProvider) -> Result<()> {
        for property in &self.properties {
            property
                .serializer
                .serializer(provider)
                .map_err(|e| e.at_field(&property.name))?;
        }
        Ok(())
    }
}

/// Writes a bean as the result of its `Value` accessor.
pub struct AsValueSerializer {
    pub(crate) ty: TypeDescriptor,
    pub(crate) read: ReadFn,
    pub(crate) inner: BindingRef<dyn Serializer>,
}

impl Serializer for AsValueSerializer {
    fn serialize(
        &self,
        value: &dyn Any,
        w: &mut dyn TokenWriter,
        ctx: &mut SerializationContext<'_>,
    ) -> Result<()> {
        let accessed = (self.read)(value)?;
        self.inner
            .serializer(ctx.provider())?
            .serialize(accessed.as_any(), w, ctx)
    }

    fn handled_type(&self) -> Option<&TypeDescriptor> {
        Some(&self.ty)
    }

    fn resolve(&self, provider: &SerializerProvider) -> Result<()> {
        self.inner.serializer(provider).map(|_| ())
    }
}

/// Narrows an abstract base to its concrete subtype and delegates.
pub struct AbstractSerializer {
    pub(crate) ty: TypeDescriptor,
    pub(crate) narrow: NarrowFn,
    pub(crate) subtypes: Arc<TypeIdResolver>,
}

impl AbstractSerializer {
    fn concrete<'v>(
        &self,
        value: &'v dyn Any,
        ctx: &SerializationContext<'_>,
    ) -> Result<(&'v dyn Any, Arc<dyn Serializer>)> {
        let concrete = (self.narrow)(value)?;
        let subtype = self.subtypes.subtype_of(concrete).ok_or_else(|| {
            Error::configuration(self.ty.name(), "value is not of a registered subtype")
        })?;
        let serializer = ctx.provider().find_value_serializer(&subtype.ty)?;
        Ok((concrete, serializer))
    }
}

impl Serializer for AbstractSerializer {
    fn serialize(
        &self,
        value: &dyn Any,
        w: &mut dyn TokenWriter,
        ctx: &mut SerializationContext<'_>,
    ) -> Result<()> {
        let (concrete, serializer) = self.concrete(value, ctx)?;
        serializer.serialize(concrete, w, ctx)
    }

    fn serialize_with_type(
        &self,
        value: &dyn Any,
        w: &mut dyn TokenWriter,
        ctx: &mut SerializationContext<'_>,
        type_ser: &TypeSerializer,
    ) -> Result<()> {
        let (concrete, serializer) = self.concrete(value, ctx)?;
        serializer.serialize_with_type(concrete, w, ctx, type_ser)
    }

    fn handled_type(&self) -> Option<&TypeDescriptor> {
        Some(&self.ty)
    }
}
