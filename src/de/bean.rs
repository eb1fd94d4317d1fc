//! Deserializers for beans.

use indexmap::IndexMap;
use std::any::Any;
use std::sync::OnceLock;

use super::std_de::null_value;
use super::{read_content, DeserializationContext, Deserializer, DeserializerProvider};
use crate::introspect::{AnySetFn, CreateFn, CreatorArgs, DefaultFn, LinkFn, WrapFn, WriteFn};
use crate::polymorphic::TypeDeserializer;
use crate::provider::BindingRef;
use crate::types::{AnyValue, TypeDescriptor, WrapOps};
use crate::{Error, MappingErrorKind, Result, Token, Value};

/// One deserializable property of a bean.
pub struct SettableProperty {
    pub(crate) name: String,
    /// `None` for properties only reachable through a creator parameter.
    pub(crate) write: Option<WriteFn>,
    pub(crate) ty: TypeDescriptor,
    pub(crate) deserializer: BindingRef<dyn Deserializer>,
    pub(crate) type_de: Option<TypeDeserializer>,
    pub(crate) views: Option<Vec<String>>,
    /// Name of the managed reference this property owns.
    pub(crate) managed: Option<String>,
    pub(crate) back_link: OnceLock<LinkFn>,
    pub(crate) creator_index: Option<usize>,
}

impl SettableProperty {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn declared_type(&self) -> &TypeDescriptor {
        &self.ty
    }

    fn in_view(&self, ctx: &DeserializationContext<'_>) -> bool {
        let Some(active) = ctx.view() else {
            return true;
        };
        match &self.views {
            None => ctx.config().settings().default_view_inclusion,
            Some(tags) => tags.iter().any(|tag| ctx.config().view_includes(active, tag)),
        }
    }

    fn read(&self, ctx: &mut DeserializationContext<'_>) -> Result<AnyValue> {
        let deserializer = self
            .deserializer
            .deserializer(ctx.provider())
            .map_err(|e| e.at_field(&self.name))?;
        read_content(&deserializer, self.type_de.as_ref(), ctx).map_err(|e| e.at_field(&self.name))
    }

    /// Links the beans inside `value` back to `owner`, then stores `value`.
    fn set(&self, owner: &mut AnyValue, mut value: AnyValue) -> Result<()> {
        if let Some(reference) = &self.managed {
            let link = self.back_link.get().ok_or_else(|| {
                Error::configuration(
                    self.ty.name(),
                    format!("managed reference \"{}\" was never resolved", reference),
                )
            })?;
            let parent: &dyn Any = owner.as_ref();
            self.ty
                .for_each_bean_mut(value.as_mut(), &mut |child| link(child, parent))
                .map_err(|e| e.at_field(&self.name))?;
        }
        match &self.write {
            Some(write) => write(owner.as_mut(), value).map_err(|e| e.at_field(&self.name)),
            None => Ok(()),
        }
    }

    fn resolve(&self, provider: &DeserializerProvider) -> Result<()> {
        let deserializer = self
            .deserializer
            .deserializer(provider)
            .map_err(|e| e.at_field(&self.name))?;
        if let Some(reference) = &self.managed {
            if self.back_link.get().is_none() {
                let link = deserializer
                    .find_back_reference(reference, provider)?
                    .ok_or_else(|| {
                        Error::configuration(
                            self.ty.name(),
                            format!(
                                "no back reference \"{}\" found for managed property \"{}\"",
                                reference, self.name
                            ),
                        )
                    })?;
                let _ = self.back_link.set(link);
            }
        }
        Ok(())
    }
}

/// A parameter of the property-based creator.
pub(crate) struct CreatorParam {
    pub(crate) name: String,
    pub(crate) ty: TypeDescriptor,
}

/// Single-argument creator fed with a whole value.
pub(crate) struct Delegate {
    pub(crate) create: CreateFn,
    pub(crate) value: BindingRef<dyn Deserializer>,
}

/// Scalar delegates, keyed by the token they accept.
#[derive(Default)]
pub(crate) struct ScalarCreators {
    pub(crate) string: Option<CreateFn>,
    pub(crate) int: Option<CreateFn>,
    pub(crate) long: Option<CreateFn>,
}

/// Reads an object into a bean through its creators and mutators.
pub struct BeanDeserializer {
    pub(crate) ty: TypeDescriptor,
    pub(crate) class_name: String,
    pub(crate) properties: IndexMap<String, SettableProperty>,
    pub(crate) default_creator: Option<DefaultFn>,
    pub(crate) property_creator: Option<(CreateFn, Vec<CreatorParam>)>,
    pub(crate) delegating: Option<Delegate>,
    pub(crate) scalars: ScalarCreators,
    pub(crate) any_setter: Option<AnySetFn>,
    pub(crate) linkers: Vec<(String, LinkFn)>,
    pub(crate) ignorable: Vec<String>,
    pub(crate) ignore_unknown: bool,
}

/// What the object loop does with one field.
enum Field<'p> {
    Property(&'p SettableProperty),
    Extra(Value),
    Skipped,
}

impl BeanDeserializer {
    #[must_use]
    pub fn properties(&self) -> impl Iterator<Item = &SettableProperty> {
        self.properties.values()
    }

    fn known_names(&self) -> Vec<String> {
        self.properties.keys().cloned().collect()
    }

    /// Classifies the field whose value is current, consuming the value unless
    /// it belongs to a property.
    fn classify(&self, name: &str, ctx: &mut DeserializationContext<'_>) -> Result<Field<'_>> {
        if let Some(property) = self.properties.get(name) {
            if property.in_view(ctx) {
                return Ok(Field::Property(property));
            }
            ctx.skip_children()?;
            return Ok(Field::Skipped);
        }
        if self.ignorable.iter().any(|ignored| ignored == name) {
            ctx.skip_children()?;
            return Ok(Field::Skipped);
        }
        if self.any_setter.is_some() {
            return Ok(Field::Extra(ctx.read_tree()?));
        }
        if self.ignore_unknown {
            ctx.skip_children()?;
            return Ok(Field::Skipped);
        }

        let config = ctx.config();
        let handlers = config.problem_handlers();
        if !handlers.is_empty() {
            let value = ctx.read_tree()?;
            for handler in handlers {
                if handler.handle_unknown_property(&self.class_name, name, &value)? {
                    return Ok(Field::Skipped);
                }
            }
        } else if !config.settings().fail_on_unknown_properties {
            ctx.skip_children()?;
        }
        if config.settings().fail_on_unknown_properties {
            return Err(Error::mapping(MappingErrorKind::UnknownProperty {
                name: name.to_string(),
                type_name: self.class_name.clone(),
                known: self.known_names(),
            }));
        }
        Ok(Field::Skipped)
    }

    fn apply_extras(&self, bean: &mut AnyValue, extras: Vec<(String, Value)>) -> Result<()> {
        if let Some(any_setter) = &self.any_setter {
            for (name, value) in extras {
                any_setter(bean.as_mut(), name.clone(), value).map_err(|e| e.at_field(&name))?;
            }
        }
        Ok(())
    }

    fn field_name(ctx: &DeserializationContext<'_>) -> Result<Option<String>> {
        match ctx.current()? {
            Token::EndObject => Ok(None),
            Token::FieldName(name) => Ok(Some(name.clone())),
            other => Err(Error::type_mismatch("field name", other.describe())),
        }
    }

    /// Default creator first, then properties assigned as they arrive.
    fn read_with_default(
        &self,
        create: &DefaultFn,
        ctx: &mut DeserializationContext<'_>,
    ) -> Result<AnyValue> {
        let mut bean = create();
        loop {
            ctx.advance()?;
            let Some(name) = Self::field_name(ctx)? else {
                break;
            };
            ctx.advance()?;
            match self.classify(&name, ctx)? {
                Field::Property(property) if property.write.is_some() => {
                    let value = property.read(ctx)?;
                    property.set(&mut bean, value)?;
                }
                Field::Property(_) => ctx.skip_children()?,
                Field::Extra(value) => self.apply_extras(&mut bean, vec![(name, value)])?,
                Field::Skipped => {}
            }
        }
        Ok(bean)
    }

    /// Creator parameters collected first; other properties are held until
    /// the instance exists.
    fn read_with_creator(
        &self,
        create: &CreateFn,
        params: &[CreatorParam],
        ctx: &mut DeserializationContext<'_>,
    ) -> Result<AnyValue> {
        let mut args: Vec<Option<AnyValue>> = params.iter().map(|_| None).collect();
        let mut pending: Vec<(&SettableProperty, AnyValue)> = Vec::new();
        let mut extras = Vec::new();
        loop {
            ctx.advance()?;
            let Some(name) = Self::field_name(ctx)? else {
                break;
            };
            ctx.advance()?;
            match self.classify(&name, ctx)? {
                Field::Property(property) => match property.creator_index {
                    Some(index) if index < args.len() => args[index] = Some(property.read(ctx)?),
                    _ if property.write.is_some() => pending.push((property, property.read(ctx)?)),
                    _ => ctx.skip_children()?,
                },
                Field::Extra(value) => extras.push((name, value)),
                Field::Skipped => {}
            }
        }

        let strict = ctx.config().settings().fail_on_missing_creator_properties;
        for (slot, param) in args.iter_mut().zip(params) {
            if slot.is_some() {
                continue;
            }
            let missing = || {
                Error::mapping(MappingErrorKind::MissingProperty {
                    name: param.name.clone(),
                    type_name: self.class_name.clone(),
                })
            };
            if strict {
                return Err(missing());
            }
            *slot = Some(param.ty.default_value().ok_or_else(missing)?);
        }

        let mut bean = create(CreatorArgs::new(args))?;
        for (property, value) in pending {
            property.set(&mut bean, value)?;
        }
        self.apply_extras(&mut bean, extras)?;
        Ok(bean)
    }

    fn read_object(&self, ctx: &mut DeserializationContext<'_>) -> Result<AnyValue> {
        ctx.nested(|ctx| match (&self.property_creator, &self.default_creator) {
            (Some((create, params)), _) => self.read_with_creator(create, params, ctx),
            (None, Some(create)) => self.read_with_default(create, ctx),
            (None, None) => Err(Error::configuration(
                &self.class_name,
                "no creator available to instantiate from an object",
            )),
        })
    }

    fn read_scalar(&self, create: &CreateFn, value: AnyValue) -> Result<AnyValue> {
        create(CreatorArgs::new(vec![Some(value)]))
    }
}

impl Deserializer for BeanDeserializer {
    fn deserialize(&self, ctx: &mut DeserializationContext<'_>) -> Result<AnyValue> {
        if let Some(delegate) = &self.delegating {
            let inner = delegate.value.deserializer(ctx.provider())?;
            let value = inner.deserialize(ctx)?;
            return self.read_scalar(&delegate.create, value);
        }
        match ctx.current()?.clone() {
            Token::StartObject => self.read_object(ctx),
            Token::String(s) => match &self.scalars.string {
                Some(create) => self.read_scalar(create, Box::new(s)),
                None => Err(Error::type_mismatch(&self.class_name, "string")),
            },
            Token::Int(i) => {
                if let (Some(create), Ok(narrow)) = (&self.scalars.int, i32::try_from(i)) {
                    return self.read_scalar(create, Box::new(narrow));
                }
                match &self.scalars.long {
                    Some(create) => self.read_scalar(create, Box::new(i)),
                    None => Err(Error::type_mismatch(&self.class_name, "integer")),
                }
            }
            other => Err(Error::type_mismatch(
                &format!("object for {}", self.class_name),
                other.describe(),
            )),
        }
    }

    fn handled_type(&self) -> Option<&TypeDescriptor> {
        Some(&self.ty)
    }

    fn find_back_reference(
        &self,
        name: &str,
        _provider: &DeserializerProvider,
    ) -> Result<Option<LinkFn>> {
        Ok(self
            .linkers
            .iter()
            .find(|(reference, _)| reference == name)
            .map(|(_, link)| link.clone()))
    }

    fn resolve(&self, provider: &DeserializerProvider) -> Result<()> {
        for property in self.properties.values() {
            property.resolve(provider)?;
        }
        if let Some(delegate) = &self.delegating {
            delegate.value.deserializer(provider)?;
        }
        Ok(())
    }
}

/// Reads a property declared as an abstract base through a fixed subtype.
pub struct OverrideDeserializer {
    pub(crate) ty: TypeDescriptor,
    pub(crate) target: BindingRef<dyn Deserializer>,
    pub(crate) upcast: WrapFn,
    /// `Option`/`Box` layers around the base, outermost first.
    pub(crate) layers: Vec<WrapOps>,
}

impl Deserializer for OverrideDeserializer {
    fn deserialize(&self, ctx: &mut DeserializationContext<'_>) -> Result<AnyValue> {
        if *ctx.current()? == Token::Null && !self.layers.is_empty() {
            if let Ok(none) = null_value(&self.ty) {
                return Ok(none);
            }
        }
        let target = self.target.deserializer(ctx.provider())?;
        let mut value = (self.upcast)(target.deserialize(ctx)?)?;
        for layer in self.layers.iter().rev() {
            value = (layer.wrap)(value)?;
        }
        Ok(value)
    }

    fn handled_type(&self) -> Option<&TypeDescriptor> {
        Some(&self.ty)
    }

    fn find_back_reference(
        &self,
        name: &str,
        provider: &DeserializerProvider,
    ) -> Result<Option<LinkFn>> {
        self.target.deserializer(provider)?.find_back_reference(name, provider)
    }

    fn resolve(&self, provider: &DeserializerProvider) -> Result<()> {
        self.target.deserializer(provider).map(|_| ())
    }
}
