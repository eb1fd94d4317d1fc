//! Assembles bean serializers from a [`BeanDescription`](crate::introspect::BeanDescription).

use std::sync::{Arc, OnceLock};
use tracing::debug;

use super::bean::{AsValueSerializer, BeanPropertyWriter, BeanSerializer};
use super::Serializer;
use crate::introspect::{
    describe_bean, AnyGetFn, Annotations, DefaultFn, DirectiveSource, Inclusion, PropertyDefinition,
    ReferenceKind,
};
use crate::polymorphic::TypeResolver;
use crate::provider::{BindingEnv, BindingKey, BindingRef};
use crate::types::TypeDescriptor;
use crate::{Error, Result};

/// Binding for a value of declared type `ty` carrying the given annotations.
///
/// A directive-supplied serializer wins. Type markers configured on a container
/// property are pushed down to the container's contents.
pub(crate) fn property_binding(
    directives: &dyn DirectiveSource,
    ty: &TypeDescriptor,
    annotations: &Annotations,
) -> BindingRef<dyn Serializer> {
    let key = match directives.find_type_info(annotations) {
        Some(spec) if ty.unwrapped().is_container() => BindingKey::content_typed(ty, spec),
        _ => BindingKey::plain(ty),
    };
    match directives.find_serializer(annotations) {
        Some(custom) => BindingRef::fixed(key, custom),
        None => BindingRef::lazy(key),
    }
}

fn property_writer(
    env: &BindingEnv,
    resolver: &TypeResolver<'_>,
    property: &PropertyDefinition,
    class_inclusion: Inclusion,
    default_instance: Option<DefaultFn>,
) -> Result<Option<BeanPropertyWriter>> {
    let directives = env.config.directives();
    let Some(accessor) = property.accessor() else {
        return Ok(None);
    };
    let annotations = property.annotations();
    if let Some(ReferenceKind::Back(_)) = directives.find_reference(&annotations) {
        return Ok(None);
    }
    let (Some(read), Some(ty)) = (accessor.access.reader(), accessor.ty.as_ref()) else {
        return Ok(None);
    };
    // A property pinned to one subtype is written without markers.
    let type_ser = match directives.find_type_override(&annotations) {
        Some(_) => None,
        None => resolver.type_serializer(ty, directives.find_type_info(&annotations).as_ref()),
    };
    Ok(Some(BeanPropertyWriter {
        name: property.name.clone(),
        read: read.clone(),
        ty: ty.clone(),
        serializer: property_binding(directives, ty, &annotations),
        type_ser,
        inclusion: directives
            .find_inclusion(&annotations)
            .unwrap_or(class_inclusion),
        views: directives.find_views(&annotations),
        default_instance,
        default_tokens: OnceLock::new(),
    }))
}

/// Builds the serializer of a bean type. Never consults the binding cache.
pub(crate) fn build_bean_serializer(
    env: &BindingEnv,
    ty: &TypeDescriptor,
) -> Result<Arc<dyn Serializer>> {
    let description = describe_bean(&env.introspector, ty)?;
    let directives = env.config.directives();

    if let Some(member) = &description.as_value {
        let (Some(read), Some(value_ty)) = (member.access.reader(), member.ty.as_ref()) else {
            return Err(Error::configuration(
                &description.class.name,
                format!("value accessor \"{}\" is not readable", member.raw_name),
            ));
        };
        debug!(class = %description.class.name, member = %member.raw_name, "serializing through value accessor");
        return Ok(Arc::new(AsValueSerializer {
            ty: ty.clone(),
            read: read.clone(),
            inner: property_binding(directives, value_ty, &member.annotations),
        }));
    }

    let class_inclusion = directives
        .find_inclusion(&description.class.annotations)
        .unwrap_or_else(|| env.config.default_inclusion());
    let default_instance = description.creators.default.as_ref().map(|c| c.create.clone());
    let resolver = TypeResolver::new(&env.introspector);

    let mut builder = BeanSerializerBuilder::new(ty, &description.class.name);
    for property in &description.properties {
        if let Some(writer) = property_writer(
            env,
            &resolver,
            property,
            class_inclusion,
            default_instance.clone(),
        )? {
            builder.add_property(writer);
        }
    }
    if let Some(any_getter) = &description.any_getter {
        builder.set_any_getter(any_getter.clone());
    }
    builder.build(env.config.settings().fail_on_empty_beans)
}

/// Mutable collector for one bean serializer, discarded by [`build`](Self::build).
pub(crate) struct BeanSerializerBuilder {
    ty: TypeDescriptor,
    class_name: String,
    properties: Vec<BeanPropertyWriter>,
    any_getter: Option<AnyGetFn>,
}

impl BeanSerializerBuilder {
    #[must_use]
    pub fn new(ty: &TypeDescriptor, class_name: &str) -> Self {
        BeanSerializerBuilder {
            ty: ty.clone(),
            class_name: class_name.to_string(),
            properties: Vec::new(),
            any_getter: None,
        }
    }

    pub fn add_property(&mut self, writer: BeanPropertyWriter) {
        self.properties.push(writer);
    }

    pub fn set_any_getter(&mut self, any_getter: AnyGetFn) {
        self.any_getter = Some(any_getter);
    }

    /// Freezes the collected writers. An empty bean is an error when `fail_on_empty`.
    pub fn build(self, fail_on_empty: bool) -> Result<Arc<dyn Serializer>> {
        if self.properties.is_empty() && self.any_getter.is_none() && fail_on_empty {
            return Err(Error::configuration(
                &self.class_name,
                "no serializable properties found",
            ));
        }
        debug!(
            class = %self.class_name,
            properties = self.properties.len(),
            "built bean serializer"
        );
        Ok(Arc::new(BeanSerializer {
            ty: self.ty,
            properties: self.properties,
            any_getter: self.any_getter,
        }))
    }
}
