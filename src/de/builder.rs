//! Assembles bean deserializers from a [`BeanDescription`](crate::introspect::BeanDescription).

use indexmap::IndexMap;
use std::sync::{Arc, OnceLock};
use tracing::debug;

use super::bean::{
    BeanDeserializer, CreatorParam, Delegate, OverrideDeserializer, ScalarCreators,
    SettableProperty,
};
use super::Deserializer;
use crate::introspect::{
    describe_bean, Annotations, AnySetFn, CreateFn, DefaultFn, DirectiveSource, LinkFn,
    PropertyDefinition, ReferenceKind,
};
use crate::polymorphic::{TypeDeserializer, TypeResolver};
use crate::provider::{BindingEnv, BindingKey, BindingRef};
use crate::types::{TypeDescriptor, TypeKind};
use crate::{Error, Result};

/// Binding for a value of declared type `ty` carrying the given annotations.
pub(crate) fn property_binding(
    directives: &dyn DirectiveSource,
    ty: &TypeDescriptor,
    annotations: &Annotations,
) -> BindingRef<dyn Deserializer> {
    let key = match directives.find_type_info(annotations) {
        Some(spec) if ty.unwrapped().is_container() => BindingKey::content_typed(ty, spec),
        _ => BindingKey::plain(ty),
    };
    match directives.find_deserializer(annotations) {
        Some(custom) => BindingRef::fixed(key, custom),
        None => BindingRef::lazy(key),
    }
}

/// Binds an abstract-typed property straight to the subtype named by a
/// `TypeOverride` directive. Returns `None` when the declared type is concrete.
fn override_binding(
    resolver: &TypeResolver<'_>,
    declared: &TypeDescriptor,
    target: &TypeDescriptor,
) -> Result<Option<BindingRef<dyn Deserializer>>> {
    let base = declared.unwrapped();
    if !base.is_abstract() {
        debug!(declared = %declared, "type override on a concrete property ignored");
        return Ok(None);
    }
    let subtypes = resolver.subtypes(base);
    let subtype = subtypes
        .subtypes()
        .iter()
        .find(|s| s.ty == *target)
        .ok_or_else(|| {
            Error::configuration(
                base.name(),
                format!("{} is not a registered subtype", target.name()),
            )
        })?;

    let mut layers = Vec::new();
    let mut layer = declared;
    while matches!(layer.kind(), TypeKind::Optional | TypeKind::Indirect) {
        let (Some(ops), Some(inner)) = (layer.wrap_ops(), layer.content_type()) else {
            break;
        };
        layers.push(*ops);
        layer = inner;
    }

    let deserializer = OverrideDeserializer {
        ty: declared.clone(),
        target: BindingRef::lazy(BindingKey::plain(target)),
        upcast: subtype.wrap.clone(),
        layers,
    };
    Ok(Some(BindingRef::fixed(
        BindingKey::plain(declared),
        Arc::new(deserializer),
    )))
}

fn settable_property(
    env: &BindingEnv,
    resolver: &TypeResolver<'_>,
    property: &PropertyDefinition,
) -> Result<Option<SettableProperty>> {
    let directives = env.config.directives();
    let write = property.mutator().and_then(|m| m.access.writer().cloned());
    if write.is_none() && property.creator_param.is_none() {
        return Ok(None);
    }
    let Some(ty) = property.write_type() else {
        return Ok(None);
    };
    let annotations = property.annotations();
    let managed = match directives.find_reference(&annotations) {
        Some(ReferenceKind::Back(_)) => return Ok(None),
        Some(ReferenceKind::Managed(name)) => Some(name),
        None => None,
    };

    let type_override = directives
        .find_type_override(&annotations)
        .map(|type_ref| type_ref(env.introspector.types()));
    let overridden = match &type_override {
        Some(target) => override_binding(resolver, ty, target)?,
        None => None,
    };
    let (deserializer, type_de): (_, Option<TypeDeserializer>) = match overridden {
        Some(binding) => (binding, None),
        None => {
            let explicit = directives.find_type_info(&annotations);
            (
                property_binding(directives, ty, &annotations),
                resolver.type_deserializer(ty, explicit.as_ref()),
            )
        }
    };

    Ok(Some(SettableProperty {
        name: property.name.clone(),
        write,
        ty: ty.clone(),
        deserializer,
        type_de,
        views: directives.find_views(&annotations),
        managed,
        back_link: OnceLock::new(),
        creator_index: property.creator_param.as_ref().map(|p| p.index),
    }))
}

/// Builds the deserializer of a bean type. Never consults the binding cache.
pub(crate) fn build_bean_deserializer(
    env: &BindingEnv,
    ty: &TypeDescriptor,
) -> Result<Arc<dyn Deserializer>> {
    let description = describe_bean(&env.introspector, ty)?;
    let resolver = TypeResolver::new(&env.introspector);

    let mut builder = BeanDeserializerBuilder::new(ty, &description.class.name);
    for name in &description.ignorable {
        builder.add_ignorable(name);
    }
    for property in &description.properties {
        match settable_property(env, &resolver, property)? {
            Some(settable) => builder.add_property(settable),
            // Read-only properties are accepted and dropped.
            None if property.is_readable() => builder.add_ignorable(&property.name),
            None => {}
        }
    }

    let creators = &description.creators;
    if !creators.can_instantiate() {
        debug!(class = %description.class.name, "bean has no usable creator");
    }
    if let Some(default) = &creators.default {
        builder.default_creator = Some(default.create.clone());
    }
    builder.property_creator = creators.properties.as_ref().map(|creator| {
        let params = creator
            .creator
            .params
            .iter()
            .zip(&creator.names)
            .map(|(param, name)| CreatorParam {
                name: name.clone(),
                ty: param.ty.clone(),
            })
            .collect();
        (creator.creator.raw.create.clone(), params)
    });
    builder.delegating = creators.delegating.as_ref().map(|creator| Delegate {
        create: creator.creator.raw.create.clone(),
        value: BindingRef::lazy(BindingKey::plain(&creator.param)),
    });
    builder.scalars = ScalarCreators {
        string: creators.string.as_ref().map(|c| c.creator.raw.create.clone()),
        int: creators.int.as_ref().map(|c| c.creator.raw.create.clone()),
        long: creators.long.as_ref().map(|c| c.creator.raw.create.clone()),
    };
    if let Some(any_setter) = &description.any_setter {
        builder.set_any_setter(any_setter.clone());
    }
    for (name, link) in &description.linkers {
        builder.add_back_reference(name, link.clone());
    }
    builder.set_ignore_unknown(description.ignore_unknown);
    Ok(builder.build())
}

/// Mutable collector for one bean deserializer, discarded by [`build`](Self::build).
pub(crate) struct BeanDeserializerBuilder {
    ty: TypeDescriptor,
    class_name: String,
    properties: IndexMap<String, SettableProperty>,
    ignorable: Vec<String>,
    any_setter: Option<AnySetFn>,
    back_references: Vec<(String, LinkFn)>,
    ignore_unknown: bool,
    pub(crate) default_creator: Option<DefaultFn>,
    pub(crate) property_creator: Option<(CreateFn, Vec<CreatorParam>)>,
    pub(crate) delegating: Option<Delegate>,
    pub(crate) scalars: ScalarCreators,
}

impl BeanDeserializerBuilder {
    pub(crate) fn new(ty: &TypeDescriptor, class_name: &str) -> Self {
        BeanDeserializerBuilder {
            ty: ty.clone(),
            class_name: class_name.to_string(),
            properties: IndexMap::new(),
            ignorable: Vec::new(),
            any_setter: None,
            back_references: Vec::new(),
            ignore_unknown: false,
            default_creator: None,
            property_creator: None,
            delegating: None,
            scalars: ScalarCreators::default(),
        }
    }

    /// Adds a property, replacing an earlier one with the same name.
    pub(crate) fn add_property(&mut self, property: SettableProperty) {
        self.properties.insert(property.name.clone(), property);
    }

    pub(crate) fn add_ignorable(&mut self, name: &str) {
        if !self.ignorable.iter().any(|n| n == name) {
            self.ignorable.push(name.to_string());
        }
    }

    pub(crate) fn set_any_setter(&mut self, any_setter: AnySetFn) {
        self.any_setter = Some(any_setter);
    }

    pub(crate) fn add_back_reference(&mut self, name: &str, link: LinkFn) {
        self.back_references.push((name.to_string(), link));
    }

    pub(crate) fn set_ignore_unknown(&mut self, ignore_unknown: bool) {
        self.ignore_unknown = ignore_unknown;
    }

    pub(crate) fn build(self) -> Arc<dyn Deserializer> {
        debug!(
            class = %self.class_name,
            properties = self.properties.len(),
            property_creator = self.property_creator.is_some(),
            delegating = self.delegating.is_some(),
            "built bean deserializer"
        );
        Arc::new(BeanDeserializer {
            ty: self.ty,
            class_name: self.class_name,
            properties: self.properties,
            default_creator: self.default_creator,
            property_creator: self.property_creator,
            delegating: self.delegating,
            scalars: self.scalars,
            any_setter: self.any_setter,
            linkers: self.back_references,
            ignorable: self.ignorable,
            ignore_unknown: self.ignore_unknown,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeFactory;

    #[test]
    fn test_builder_collects_ignorable_names_once() {
        let ty = TypeFactory::new().construct::<String>();
        let mut builder = BeanDeserializerBuilder::new(&ty, "Legacy");
        builder.add_ignorable("secret");
        builder.add_ignorable("secret");
        builder.add_ignorable("debug");
        builder.set_ignore_unknown(true);
        assert_eq!(builder.ignorable, vec!["secret", "debug"]);

        let built = builder.build();
        assert_eq!(built.handled_type(), Some(&ty));
    }
}
