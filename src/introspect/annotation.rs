//! Declarative directives attached to classes and members.
//!
//! The native vocabulary is the [`Annotation`] enum. A second, string-keyed
//! vocabulary travels in [`Annotation::Attr`] so that attribute-style metadata
//! (for example tags loaded from configuration) can sit next to typed directives
//! and be composed through a [`DirectiveChain`](crate::DirectiveChain).

use std::fmt;
use std::mem::discriminant;
use std::sync::Arc;

use crate::de::Deserializer;
use crate::ser::Serializer;
use crate::types::{take, type_ref, AnyValue, Bind, TypeRef};
use crate::Result;

/// Which detection threshold a member kind uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Detect {
    Any,
    NonPrivate,
    PublicOnly,
    None,
}

/// Per-class override of the visibility policy. `None` keeps the inherited level.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AutoDetect {
    pub field: Option<Detect>,
    pub getter: Option<Detect>,
    pub is_getter: Option<Detect>,
    pub setter: Option<Detect>,
    pub creator: Option<Detect>,
}

impl AutoDetect {
    /// Sets every member kind to the same threshold.
    #[must_use]
    pub fn all(detect: Detect) -> Self {
        AutoDetect {
            field: Some(detect),
            getter: Some(detect),
            is_getter: Some(detect),
            setter: Some(detect),
            creator: Some(detect),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CreatorMode {
    /// Marker without a mode: delegating for a single unnamed argument,
    /// property-based otherwise.
    Default,
    Delegating,
    Properties,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Inclusion {
    #[default]
    Always,
    NonNull,
    NonEmpty,
    NonDefault,
}

/// How a polymorphic type is identified.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IdScheme {
    /// Full Rust type path.
    Class,
    /// Logical name from the subtype registration or `TypeName`.
    Name,
    /// No type markers at all.
    None,
}

/// Where a type marker is embedded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum As {
    /// An extra field inside the object (`{"type":"circle", ...}`).
    Property,
    /// A single-field object keyed by the type id.
    WrapperObject,
    /// A two-element array `[id, value]`.
    WrapperArray,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TypeInfoSpec {
    pub id: IdScheme,
    pub include: As,
    pub property: String,
    pub default_id: Option<String>,
}

impl TypeInfoSpec {
    /// Logical names embedded as a property, the most common configuration.
    #[must_use]
    pub fn named_property(property: &str) -> Self {
        TypeInfoSpec {
            id: IdScheme::Name,
            include: As::Property,
            property: property.to_string(),
            default_id: None,
        }
    }

    #[must_use]
    pub fn new(id: IdScheme, include: As) -> Self {
        TypeInfoSpec {
            id,
            include,
            property: "@type".to_string(),
            default_id: None,
        }
    }

    #[must_use]
    pub fn with_property(mut self, property: &str) -> Self {
        self.property = property.to_string();
        self
    }

    #[must_use]
    pub fn with_default_id(mut self, id: &str) -> Self {
        self.default_id = Some(id.to_string());
        self
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PropertyOrder {
    pub names: Vec<String>,
    pub alphabetic: bool,
}

/// Converts a subtype value into its abstract base.
pub type WrapFn = Arc<dyn Fn(AnyValue) -> Result<AnyValue> + Send + Sync>;

/// A concrete type that may stand in for an abstract base.
#[derive(Clone)]
pub struct Subtype {
    pub ty: TypeRef,
    pub name: Option<String>,
    pub wrap: WrapFn,
}

impl Subtype {
    /// Registers `S` as a subtype of `P`, converted with `upcast`.
    pub fn of<S: Bind, P: 'static>(name: Option<&str>, upcast: fn(S) -> P) -> Self {
        Subtype {
            ty: type_ref::<S>(),
            name: name.map(str::to_string),
            wrap: Arc::new(move |value| Ok(Box::new(upcast(take::<S>(value)?)) as AnyValue)),
        }
    }

    pub(crate) fn identity(ty: TypeRef) -> Self {
        Subtype {
            ty,
            name: None,
            wrap: Arc::new(|value| Ok(value)),
        }
    }
}

impl fmt::Debug for Subtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subtype").field("name", &self.name).finish()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReferenceKind {
    Managed(String),
    Back(String),
}

/// A declarative directive.
#[derive(Clone)]
pub enum Annotation {
    /// Explicit property name. An empty string marks the member as explicitly
    /// included while keeping the derived name.
    Property(String),
    Ignore,
    IgnoreProperties { names: Vec<String>, ignore_unknown: bool },
    PropertyOrder(PropertyOrder),
    AutoDetect(AutoDetect),
    Creator(CreatorMode),
    View(Vec<String>),
    Include(Inclusion),
    /// The getter's result replaces the whole object.
    Value,
    TypeInfo(TypeInfoSpec),
    TypeName(String),
    SubTypes(Vec<Subtype>),
    TypeOverride(TypeRef),
    ManagedReference(String),
    BackReference(String),
    AnySetter,
    AnyGetter,
    SerializeWith(Arc<dyn Serializer>),
    DeserializeWith(Arc<dyn Deserializer>),
    /// Entry of the string-keyed vocabulary.
    Attr { key: String, value: String },
}

impl Annotation {
    pub fn property(name: &str) -> Self {
        Annotation::Property(name.to_string())
    }

    pub fn attr(key: &str, value: &str) -> Self {
        Annotation::Attr {
            key: key.to_string(),
            value: value.to_string(),
        }
    }

    pub fn views(names: &[&str]) -> Self {
        Annotation::View(names.iter().map(|n| n.to_string()).collect())
    }

    pub fn order(names: &[&str]) -> Self {
        Annotation::PropertyOrder(PropertyOrder {
            names: names.iter().map(|n| n.to_string()).collect(),
            alphabetic: false,
        })
    }

    pub fn ignore_properties(names: &[&str]) -> Self {
        Annotation::IgnoreProperties {
            names: names.iter().map(|n| n.to_string()).collect(),
            ignore_unknown: false,
        }
    }

    pub fn ignore_unknown() -> Self {
        Annotation::IgnoreProperties {
            names: Vec::new(),
            ignore_unknown: true,
        }
    }

    pub fn type_override<T: Bind>() -> Self {
        Annotation::TypeOverride(type_ref::<T>())
    }

    pub fn serialize_with<S: Serializer + 'static>(serializer: S) -> Self {
        Annotation::SerializeWith(Arc::new(serializer))
    }

    pub fn deserialize_with<D: Deserializer + 'static>(deserializer: D) -> Self {
        Annotation::DeserializeWith(Arc::new(deserializer))
    }

    /// Two annotations with the same slot replace each other in mix-ins.
    fn same_slot(&self, other: &Annotation) -> bool {
        match (self, other) {
            (Annotation::Attr { key: a, .. }, Annotation::Attr { key: b, .. }) => a == b,
            _ => discriminant(self) == discriminant(other),
        }
    }
}

impl fmt::Debug for Annotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Annotation::Property(name) => write!(f, "Property({:?})", name),
            Annotation::Ignore => f.write_str("Ignore"),
            Annotation::IgnoreProperties {
                names,
                ignore_unknown,
            } => write!(f, "IgnoreProperties({:?}, {})", names, ignore_unknown),
            Annotation::PropertyOrder(order) => write!(f, "{:?}", order),
            Annotation::AutoDetect(detect) => write!(f, "{:?}", detect),
            Annotation::Creator(mode) => write!(f, "Creator({:?})", mode),
            Annotation::View(views) => write!(f, "View({:?})", views),
            Annotation::Include(inclusion) => write!(f, "Include({:?})", inclusion),
            Annotation::Value => f.write_str("Value"),
            Annotation::TypeInfo(spec) => write!(f, "{:?}", spec),
            Annotation::TypeName(name) => write!(f, "TypeName({:?})", name),
            Annotation::SubTypes(subtypes) => write!(f, "SubTypes({:?})", subtypes),
            Annotation::TypeOverride(_) => f.write_str("TypeOverride"),
            Annotation::ManagedReference(name) => write!(f, "ManagedReference({:?})", name),
            Annotation::BackReference(name) => write!(f, "BackReference({:?})", name),
            Annotation::AnySetter => f.write_str("AnySetter"),
            Annotation::AnyGetter => f.write_str("AnyGetter"),
            Annotation::SerializeWith(_) => f.write_str("SerializeWith"),
            Annotation::DeserializeWith(_) => f.write_str("DeserializeWith"),
            Annotation::Attr { key, value } => write!(f, "Attr({}={})", key, value),
        }
    }
}

/// The annotations attached to one declaration.
#[derive(Clone, Debug, Default)]
pub struct Annotations(Vec<Annotation>);

impl Annotations {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, annotation: Annotation) {
        self.0.push(annotation);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Annotation> {
        self.0.iter()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns these annotations with every slot present in `overrides` replaced.
    #[must_use]
    pub fn merge_overriding(&self, overrides: &Annotations) -> Annotations {
        let mut merged: Vec<Annotation> = self
            .0
            .iter()
            .filter(|own| !overrides.0.iter().any(|o| o.same_slot(own)))
            .cloned()
            .collect();
        merged.extend(overrides.0.iter().cloned());
        Annotations(merged)
    }
}

impl From<()> for Annotations {
    fn from(_: ()) -> Self {
        Annotations::default()
    }
}

impl From<Annotation> for Annotations {
    fn from(annotation: Annotation) -> Self {
        Annotations(vec![annotation])
    }
}

impl From<Vec<Annotation>> for Annotations {
    fn from(annotations: Vec<Annotation>) -> Self {
        Annotations(annotations)
    }
}

impl<const N: usize> From<[Annotation; N]> for Annotations {
    fn from(annotations: [Annotation; N]) -> Self {
        Annotations(annotations.into())
    }
}

/// Annotation overlay registered for a target type without modifying it.
///
/// Member overlays are keyed by the registered member name (field, accessor
/// or creator name).
#[derive(Clone, Debug, Default)]
pub struct MixIn {
    pub class: Annotations,
    pub members: Vec<(String, Annotations)>,
}

impl MixIn {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn class(mut self, annotations: impl Into<Annotations>) -> Self {
        self.class = annotations.into();
        self
    }

    #[must_use]
    pub fn member(mut self, name: &str, annotations: impl Into<Annotations>) -> Self {
        self.members.push((name.to_string(), annotations.into()));
        self
    }

    pub(crate) fn member_annotations(&self, name: &str) -> Option<&Annotations> {
        self.members
            .iter()
            .find(|(member, _)| member == name)
            .map(|(_, annotations)| annotations)
    }
}
