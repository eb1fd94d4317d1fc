//! Structural introspection of registered classes.

use dashmap::DashMap;
use std::any::TypeId;
use std::sync::Arc;
use tracing::debug;

use super::annotation::{Annotations, CreatorMode};
use super::class::{MemberAccess, MemberKind, RawClass, RawCreator, RawDefaultCreator};
use super::directive::DirectiveSource;
use super::visibility::{Visibility, VisibilityPolicy};
use crate::config::MapperConfig;
use crate::types::{TypeDescriptor, TypeFactory};
use crate::{Error, Result};

/// A member after directives, mix-ins and visibility have been applied.
#[derive(Clone)]
pub struct AnnotatedMember {
    /// Registered (syntactic) name.
    pub raw_name: String,
    /// Logical property name: explicit or derived.
    pub name: String,
    /// Whether `name` came from a directive.
    pub explicit: bool,
    pub ignored: bool,
    pub kind: MemberKind,
    pub visibility: Visibility,
    pub annotations: Annotations,
    pub ty: Option<TypeDescriptor>,
    pub access: MemberAccess,
    pub depth: usize,
    /// Registration position, used for declaration order.
    pub index: usize,
}

#[derive(Clone)]
pub struct AnnotatedParam {
    pub index: usize,
    /// Explicit property name; `None` for unnamed parameters.
    pub name: Option<String>,
    pub ty: TypeDescriptor,
    pub annotations: Annotations,
}

#[derive(Clone)]
pub struct AnnotatedCreator {
    pub raw: RawCreator,
    pub annotations: Annotations,
    pub mode: Option<CreatorMode>,
    pub params: Vec<AnnotatedParam>,
    /// Passes the creator visibility threshold or carries a creator marker.
    pub visible: bool,
}

/// Everything known about a bean after introspection.
pub struct AnnotatedClass {
    pub ty: TypeDescriptor,
    pub name: String,
    pub annotations: Annotations,
    pub policy: VisibilityPolicy,
    pub members: Vec<AnnotatedMember>,
    pub creators: Vec<AnnotatedCreator>,
    pub default_creator: Option<RawDefaultCreator>,
    /// Names of ignored members and class-level ignored names.
    pub ignored_names: Vec<String>,
}

impl AnnotatedClass {
    #[must_use]
    pub fn find_member(&self, kind: MemberKind) -> Option<&AnnotatedMember> {
        self.members.iter().find(|m| m.kind == kind && !m.ignored)
    }
}

/// Builds and caches [`AnnotatedClass`] descriptions.
pub struct Introspector {
    config: Arc<MapperConfig>,
    types: Arc<TypeFactory>,
    classes: DashMap<TypeId, Arc<AnnotatedClass>>,
}

/// Derives a property name from an accessor name.
///
/// `get_name`/`getName` become `name`, `is_active`/`isActive` become `active`
/// (for boolean getters only) and `set_name`/`setName` become `name`. A
/// leading run of capitals is lowercased. Names without a recognised prefix
/// are used as-is.
#[must_use]
pub fn derive_name(kind: MemberKind, raw: &str) -> String {
    let prefix = match kind {
        MemberKind::Getter => Some("get"),
        MemberKind::IsGetter => Some("is"),
        MemberKind::Setter => Some("set"),
        _ => None,
    };
    let Some(prefix) = prefix else {
        return raw.to_string();
    };
    let Some(rest) = raw.strip_prefix(prefix) else {
        return raw.to_string();
    };
    if let Some(snake) = rest.strip_prefix('_') {
        if !snake.is_empty() {
            return snake.to_string();
        }
        return raw.to_string();
    }
    match rest.chars().next() {
        Some(c) if c.is_uppercase() => decapitalize(rest),
        _ => raw.to_string(),
    }
}

fn decapitalize(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len());
    let mut leading = true;
    for (i, c) in chars.iter().enumerate() {
        if leading && c.is_uppercase() {
            // "URLValue" -> "urlValue": keep the capital that starts the next word.
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if i > 0 && next_lower {
                leading = false;
                out.push(*c);
            } else {
                out.extend(c.to_lowercase());
            }
        } else {
            leading = false;
            out.push(*c);
        }
    }
    out
}

impl Introspector {
    #[must_use]
    pub fn new(config: Arc<MapperConfig>, types: Arc<TypeFactory>) -> Self {
        Introspector {
            config,
            types,
            classes: DashMap::new(),
        }
    }

    pub fn types(&self) -> &TypeFactory {
        &self.types
    }

    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    pub fn flush(&self) {
        self.classes.clear();
    }

    /// Introspects a bean type, using the cached result when present.
    pub fn introspect(&self, ty: &TypeDescriptor) -> Result<Arc<AnnotatedClass>> {
        if let Some(found) = self.classes.get(&ty.type_id()) {
            return Ok(found.clone());
        }
        let raw = ty.raw_class().ok_or_else(|| {
            Error::configuration(ty.name(), "type is not registered as a bean")
        })?;
        let built = Arc::new(self.build(ty, raw)?);
        Ok(self
            .classes
            .entry(ty.type_id())
            .or_insert(built)
            .clone())
    }

    /// Class-level annotations of any type: bean, abstract base or other.
    pub fn class_annotations(&self, ty: &TypeDescriptor) -> Annotations {
        let own = if let Some(raw) = ty.raw_abstract() {
            raw.annotations
        } else if let Some(raw) = ty.raw_class() {
            raw.annotations
        } else {
            Annotations::new()
        };
        match self.config.mix_in(ty.type_id()) {
            Some(mix) => own.merge_overriding(&mix.class),
            None => own,
        }
    }

    fn build(&self, ty: &TypeDescriptor, raw: RawClass) -> Result<AnnotatedClass> {
        let directives = self.config.directives();
        let mix_in = self.config.mix_in(ty.type_id());
        let annotations = match mix_in {
            Some(mix) => raw.annotations.merge_overriding(&mix.class),
            None => raw.annotations.clone(),
        };
        let policy = match directives.find_auto_detect(&annotations) {
            Some(detect) => self.config.visibility().refined(&detect),
            None => self.config.visibility(),
        };
        let name = raw
            .name
            .clone()
            .unwrap_or_else(|| ty.name().to_string());

        let mut ignored_names = directives
            .find_ignored_names(&annotations)
            .unwrap_or_default();
        let mut members = Vec::new();
        for (index, member) in raw.members.into_iter().enumerate() {
            let member_annotations = match mix_in.and_then(|m| m.member_annotations(&member.name)) {
                Some(overrides) => member.annotations.merge_overriding(overrides),
                None => member.annotations.clone(),
            };
            let ignored = directives.is_ignored(&member_annotations);
            let explicit_name = directives.find_name(&member_annotations);
            let derived = derive_name(member.kind, &member.name);
            let threshold = match member.kind {
                MemberKind::Field => policy.field,
                MemberKind::Getter => policy.getter,
                MemberKind::IsGetter => policy.is_getter,
                MemberKind::Setter => policy.setter,
                // Special members are registered explicitly and always visible.
                _ => crate::Detect::Any,
            };
            let (name, explicit) = match explicit_name {
                Some(explicit) if !explicit.is_empty() => (explicit, true),
                Some(_) => (derived, true),
                None if threshold.allows(member.visibility) => (derived, false),
                None if ignored => (derived, false),
                None => {
                    debug!(class = %name, member = %member.name, "member not visible, skipped");
                    continue;
                }
            };
            if ignored {
                ignored_names.push(name.clone());
            }
            members.push(AnnotatedMember {
                raw_name: member.name,
                name,
                explicit,
                ignored,
                kind: member.kind,
                visibility: member.visibility,
                annotations: member_annotations,
                ty: member.ty.map(|type_ref| type_ref(&self.types)),
                access: member.access,
                depth: member.depth,
                index,
            });
        }

        let creators = raw
            .creators
            .into_iter()
            .map(|creator| {
                let creator_annotations =
                    match mix_in.and_then(|m| m.member_annotations(&creator.name)) {
                        Some(overrides) => creator.annotations.merge_overriding(overrides),
                        None => creator.annotations.clone(),
                    };
                let mode = directives.find_creator_mode(&creator_annotations);
                let visible = mode.is_some() || policy.creator.allows(creator.visibility);
                let params = creator
                    .params
                    .iter()
                    .enumerate()
                    .map(|(index, param)| AnnotatedParam {
                        index,
                        name: directives
                            .find_name(&param.annotations)
                            .filter(|n| !n.is_empty()),
                        ty: (param.ty)(&self.types),
                        annotations: param.annotations.clone(),
                    })
                    .collect();
                AnnotatedCreator {
                    raw: creator,
                    annotations: creator_annotations,
                    mode,
                    params,
                    visible,
                }
            })
            .collect();

        let default_creator = raw
            .default_creator
            .filter(|c| policy.creator.allows(c.visibility));

        debug!(class = %name, "introspected class");
        Ok(AnnotatedClass {
            ty: ty.clone(),
            name,
            annotations,
            policy,
            members,
            creators,
            default_creator,
            ignored_names,
        })
    }
}
