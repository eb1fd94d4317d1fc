//! Class registration, directives and structural introspection.
//!
//! The pipeline for one bean type:
//!
//! 1. [`Bean::describe`] registers members on a [`ClassBuilder`].
//! 2. The [`Introspector`] applies mix-ins, directive names, ignore markers and
//!    the [`VisibilityPolicy`], caching an [`AnnotatedClass`].
//! 3. [`describe_bean`] aggregates members into ordered [`PropertyDefinition`]s
//!    and selects the [`CreatorSet`].
//!
//! Both binding builders start from the resulting [`BeanDescription`].

mod annotation;
mod class;
mod creators;
mod directive;
mod introspector;
mod properties;
mod visibility;

pub use annotation::{
    Annotation, Annotations, As, AutoDetect, CreatorMode, Detect, IdScheme, Inclusion, MixIn,
    PropertyOrder, ReferenceKind, Subtype, TypeInfoSpec, WrapFn,
};
pub use class::{
    AbstractBuilder, Accessed, AnyGetFn, AnySetFn, Bean, ClassBuilder, CreateFn, CreatorArgs,
    DefaultFn, LinkFn, MemberAccess, MemberKind, NarrowFn, Param, Polymorphic, RawAbstract,
    RawClass, RawCreator, RawDefaultCreator, RawMember, ReadFn, WriteFn,
};
pub use creators::{select_creators, CreatorSet, DelegateCreator, PropertyCreator};
pub use directive::{AttributeDirectives, DirectiveChain, DirectiveSource, NativeDirectives};
pub use introspector::{
    derive_name, AnnotatedClass, AnnotatedCreator, AnnotatedMember, AnnotatedParam, Introspector,
};
pub use properties::{attach_creator_params, collect_properties, order_properties, PropertyDefinition};
pub use visibility::{Visibility, VisibilityPolicy};

pub(crate) use class::{raw_abstract, raw_class};
pub(crate) use directive::EMPTY_CHAIN;

use std::sync::Arc;

use crate::{Error, Result};

/// Aggregated view of a bean shared by the serializer and deserializer builders.
pub struct BeanDescription {
    pub class: Arc<AnnotatedClass>,
    pub properties: Vec<PropertyDefinition>,
    pub creators: CreatorSet,
    /// Member whose value replaces the whole object.
    pub as_value: Option<AnnotatedMember>,
    pub any_setter: Option<AnySetFn>,
    pub any_getter: Option<AnyGetFn>,
    /// Back-reference name to linker.
    pub linkers: Vec<(String, LinkFn)>,
    pub ignorable: Vec<String>,
    pub ignore_unknown: bool,
}

/// Builds the [`BeanDescription`] of a bean type.
pub fn describe_bean(
    introspector: &Introspector,
    ty: &crate::TypeDescriptor,
) -> Result<BeanDescription> {
    let class = introspector.introspect(ty)?;
    let config = introspector.config();
    let directives = config.directives();

    let as_value = class
        .members
        .iter()
        .find(|m| !m.ignored && directives.has_as_value(&m.annotations))
        .cloned();

    let creators = select_creators(&class)?;
    let mut properties = collect_properties(&class, directives)?;
    let creator_names = match &creators.properties {
        Some(creator) => {
            attach_creator_params(&mut properties, &creator.creator.params);
            creator.names.clone()
        }
        None => Vec::new(),
    };

    for property in &properties {
        if let (Some(param), Some(crate::ReferenceKind::Managed(_))) = (
            &property.creator_param,
            directives.find_reference(&property.annotations()),
        ) {
            return Err(Error::configuration(
                &class.name,
                format!(
                    "managed reference \"{}\" cannot be bound to creator parameter {}",
                    property.name, param.index
                ),
            ));
        }
    }

    let order = directives
        .find_property_order(&class.annotations)
        .unwrap_or_default();
    let alphabetic = order.alphabetic || config.settings().sort_properties_alphabetically;
    let properties = order_properties(properties, &order.names, &creator_names, alphabetic);

    let mut any_setter = None;
    let mut any_getter = None;
    let mut linkers = Vec::new();
    for member in class.members.iter().filter(|m| !m.ignored) {
        match &member.access {
            MemberAccess::AnySet(set)
                if member.kind == MemberKind::AnySetter
                    || directives.has_any_setter(&member.annotations) =>
            {
                any_setter = Some(set.clone());
            }
            MemberAccess::AnyGet(get)
                if member.kind == MemberKind::AnyGetter
                    || directives.has_any_getter(&member.annotations) =>
            {
                any_getter = Some(get.clone());
            }
            MemberAccess::Link(link) => {
                let name = match directives.find_reference(&member.annotations) {
                    Some(crate::ReferenceKind::Back(name)) => name,
                    _ => member.raw_name.clone(),
                };
                linkers.push((name, link.clone()));
            }
            _ => {}
        }
    }

    let ignore_unknown = directives
        .find_ignore_unknown(&class.annotations)
        .unwrap_or(false);

    Ok(BeanDescription {
        ignorable: class.ignored_names.clone(),
        class,
        properties,
        creators,
        as_value,
        any_setter,
        any_getter,
        linkers,
        ignore_unknown,
    })
}
