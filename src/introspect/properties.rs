//! Aggregation of members into logical properties.

use indexmap::IndexMap;

use super::annotation::Annotations;
use super::class::MemberKind;
use super::directive::DirectiveSource;
use super::introspector::{AnnotatedClass, AnnotatedMember, AnnotatedParam};
use crate::types::TypeDescriptor;
use crate::{Error, Result};

/// A logical property assembled from up to one field, getter, setter and
/// creator parameter.
#[derive(Clone)]
pub struct PropertyDefinition {
    pub name: String,
    pub field: Option<AnnotatedMember>,
    pub getter: Option<AnnotatedMember>,
    pub setter: Option<AnnotatedMember>,
    pub creator_param: Option<AnnotatedParam>,
    /// Registration position of the first member; creator-only properties sort last.
    pub first_index: usize,
}

impl PropertyDefinition {
    fn new(name: String, first_index: usize) -> Self {
        PropertyDefinition {
            name,
            field: None,
            getter: None,
            setter: None,
            creator_param: None,
            first_index,
        }
    }

    /// Member used to read the value: getter, else field.
    #[must_use]
    pub fn accessor(&self) -> Option<&AnnotatedMember> {
        self.getter.as_ref().or(self.field.as_ref())
    }

    /// Member used to write the value: setter, else field.
    #[must_use]
    pub fn mutator(&self) -> Option<&AnnotatedMember> {
        self.setter.as_ref().or(self.field.as_ref())
    }

    #[must_use]
    pub fn is_readable(&self) -> bool {
        self.accessor().is_some()
    }

    #[must_use]
    pub fn is_writable(&self) -> bool {
        self.mutator().is_some() || self.creator_param.is_some()
    }

    /// Nominal type for serialization.
    #[must_use]
    pub fn read_type(&self) -> Option<&TypeDescriptor> {
        self.accessor().and_then(|m| m.ty.as_ref())
    }

    /// Nominal type for deserialization.
    #[must_use]
    pub fn write_type(&self) -> Option<&TypeDescriptor> {
        self.creator_param
            .as_ref()
            .map(|p| &p.ty)
            .or_else(|| self.mutator().and_then(|m| m.ty.as_ref()))
    }

    /// All annotations of the property, accessor side first.
    #[must_use]
    pub fn annotations(&self) -> Annotations {
        let mut merged = Annotations::new();
        let members = [&self.getter, &self.setter, &self.field];
        for member in members.into_iter().flatten() {
            for annotation in member.annotations.iter() {
                merged.push(annotation.clone());
            }
        }
        if let Some(param) = &self.creator_param {
            for annotation in param.annotations.iter() {
                merged.push(annotation.clone());
            }
        }
        merged
    }
}

/// Picks the most-derived member of one role, rejecting same-depth duplicates.
fn pick_role(
    class: &str,
    property: &str,
    role: &str,
    mut candidates: Vec<AnnotatedMember>,
) -> Result<Option<AnnotatedMember>> {
    candidates.sort_by_key(|m| m.depth);
    if candidates.len() > 1 && candidates[0].depth == candidates[1].depth {
        return Err(Error::configuration(
            class,
            format!(
                "duplicate property definitions for \"{}\": {} {} and {}",
                property, role, candidates[0].raw_name, candidates[1].raw_name
            ),
        ));
    }
    Ok(candidates.into_iter().next())
}

/// Merges the members of a class into properties, in declaration order.
pub fn collect_properties(
    class: &AnnotatedClass,
    directives: &dyn DirectiveSource,
) -> Result<Vec<PropertyDefinition>> {
    let mut grouped: IndexMap<String, Vec<&AnnotatedMember>> = IndexMap::new();
    for member in &class.members {
        if matches!(
            member.kind,
            MemberKind::Field | MemberKind::Getter | MemberKind::IsGetter | MemberKind::Setter
        ) {
            grouped.entry(member.name.clone()).or_default().push(member);
        }
    }

    let class_ignored = directives
        .find_ignored_names(&class.annotations)
        .unwrap_or_default();

    let mut properties = Vec::with_capacity(grouped.len());
    for (name, members) in grouped {
        if class_ignored.contains(&name) {
            continue;
        }
        let any_ignored = members.iter().any(|m| m.ignored);
        let kept: Vec<&AnnotatedMember> = if any_ignored {
            if !members.iter().any(|m| !m.ignored && m.explicit) {
                continue;
            }
            members.into_iter().filter(|m| !m.ignored).collect()
        } else {
            members
        };
        let Some(first_index) = kept.iter().map(|m| m.index).min() else {
            continue;
        };

        let of_kind = |kind: MemberKind| -> Vec<AnnotatedMember> {
            kept.iter()
                .filter(|m| m.kind == kind)
                .map(|m| (*m).clone())
                .collect()
        };
        let mut property = PropertyDefinition::new(name.clone(), first_index);
        property.field = pick_role(&class.name, &name, "fields", of_kind(MemberKind::Field))?;
        property.getter = match pick_role(&class.name, &name, "getters", of_kind(MemberKind::Getter))? {
            Some(getter) => Some(getter),
            None => pick_role(&class.name, &name, "getters", of_kind(MemberKind::IsGetter))?,
        };
        property.setter = pick_role(&class.name, &name, "setters", of_kind(MemberKind::Setter))?;
        properties.push(property);
    }
    Ok(properties)
}

/// Attaches creator parameters, creating creator-only properties as needed.
pub fn attach_creator_params(properties: &mut Vec<PropertyDefinition>, params: &[AnnotatedParam]) {
    for param in params {
        let Some(name) = &param.name else { continue };
        match properties.iter_mut().find(|p| &p.name == name) {
            Some(property) => property.creator_param = Some(param.clone()),
            None => {
                let mut property = PropertyDefinition::new(name.clone(), usize::MAX);
                property.creator_param = Some(param.clone());
                properties.push(property);
            }
        }
    }
}

/// Orders properties for output.
///
/// Explicitly listed names come first in list order, then creator parameters in
/// creator order, then the rest alphabetically or in declaration order.
pub fn order_properties(
    properties: Vec<PropertyDefinition>,
    explicit: &[String],
    creator_names: &[String],
    alphabetic: bool,
) -> Vec<PropertyDefinition> {
    let mut remaining = properties;
    let mut ordered = Vec::with_capacity(remaining.len());

    for name in explicit.iter().chain(creator_names) {
        if let Some(pos) = remaining.iter().position(|p| &p.name == name) {
            ordered.push(remaining.remove(pos));
        }
    }
    if alphabetic {
        remaining.sort_by(|a, b| a.name.cmp(&b.name));
    } else {
        remaining.sort_by_key(|p| p.first_index);
    }
    ordered.extend(remaining);
    ordered
}
