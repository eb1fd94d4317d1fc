//! Polymorphic type markers.
//!
//! When a declared type may hold several concrete types, the stream carries a
//! type id next to the value. [`TypeResolver`] decides whether a declared type
//! needs markers and builds the [`TypeSerializer`] / [`TypeDeserializer`] pair
//! that writes and reads them.
//!
//! Resolution precedence:
//!
//! 1. a `TypeInfo` directive on the property (or the container owning the value)
//! 2. a `TypeInfo` directive on the declared type itself
//! 3. [`MapperConfig::with_default_typing`](crate::MapperConfig::with_default_typing),
//!    for abstract types only
//!
//! `Option` and `Box` layers are transparent.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::de::DeserializationContext;
use crate::introspect::{
    As, DirectiveSource, IdScheme, Introspector, Subtype, TypeInfoSpec, WrapFn,
};
use crate::types::{AnyValue, TypeDescriptor, TypeKind};
use crate::{Error, MappingErrorKind, Result, Token, TokenWriter};

/// Structural shape of the value a marker wraps.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Shape {
    Object,
    Array,
    Scalar,
}

/// A subtype known to a [`TypeIdResolver`].
#[derive(Clone)]
pub struct ResolvedSubtype {
    pub id: String,
    pub ty: TypeDescriptor,
    pub wrap: WrapFn,
}

/// Bidirectional mapping between concrete types and type ids for one base.
pub struct TypeIdResolver {
    base: TypeDescriptor,
    by_type: HashMap<TypeId, usize>,
    by_id: HashMap<String, usize>,
    subtypes: Vec<ResolvedSubtype>,
}

impl TypeIdResolver {
    fn build(introspector: &Introspector, base: &TypeDescriptor, scheme: IdScheme) -> Self {
        let config = introspector.config();
        let types = introspector.types();
        let mut declared: Vec<Subtype> = Vec::new();
        match base.raw_abstract() {
            Some(raw) => {
                declared.extend(raw.subtypes);
                let annotations = introspector.class_annotations(base);
                declared.extend(config.directives().find_subtypes(&annotations).unwrap_or_default());
                declared.extend(config.registered_subtypes(base.type_id()).iter().cloned());
            }
            // A concrete type is its own single subtype.
            None => {
                return Self::from_resolved(
                    base,
                    vec![ResolvedSubtype {
                        id: Self::id_for(introspector, base, None, scheme),
                        ty: base.clone(),
                        wrap: Arc::new(|value| Ok(value)),
                    }],
                );
            }
        }

        let mut resolved: Vec<ResolvedSubtype> = Vec::new();
        for subtype in declared {
            let ty = (subtype.ty)(types);
            if resolved.iter().any(|r| r.ty.type_id() == ty.type_id()) {
                continue;
            }
            resolved.push(ResolvedSubtype {
                id: Self::id_for(introspector, &ty, subtype.name.as_deref(), scheme),
                ty,
                wrap: subtype.wrap,
            });
        }
        Self::from_resolved(base, resolved)
    }

    fn from_resolved(base: &TypeDescriptor, subtypes: Vec<ResolvedSubtype>) -> Self {
        let mut by_type = HashMap::new();
        let mut by_id = HashMap::new();
        for (i, subtype) in subtypes.iter().enumerate() {
            by_type.entry(subtype.ty.type_id()).or_insert(i);
            by_id.entry(subtype.id.clone()).or_insert(i);
        }
        TypeIdResolver {
            base: base.clone(),
            by_type,
            by_id,
            subtypes,
        }
    }

    fn id_for(
        introspector: &Introspector,
        ty: &TypeDescriptor,
        explicit: Option<&str>,
        scheme: IdScheme,
    ) -> String {
        if scheme == IdScheme::Class {
            return ty.rust_name().to_string();
        }
        if let Some(name) = explicit.filter(|n| !n.is_empty()) {
            return name.to_string();
        }
        let annotations = introspector.class_annotations(ty);
        introspector
            .config()
            .directives()
            .find_type_name(&annotations)
            .unwrap_or_else(|| ty.name().to_string())
    }

    #[must_use]
    pub fn base(&self) -> &TypeDescriptor {
        &self.base
    }

    /// Type id of a concrete value.
    pub fn id_of(&self, concrete: &dyn Any) -> Result<&str> {
        let type_id = (*concrete).type_id();
        self.by_type
            .get(&type_id)
            .map(|&i| self.subtypes[i].id.as_str())
            .ok_or_else(|| {
                Error::configuration(
                    self.base.name(),
                    "value is not of a registered subtype",
                )
            })
    }

    pub fn subtype_of(&self, concrete: &dyn Any) -> Option<&ResolvedSubtype> {
        self.by_type
            .get(&(*concrete).type_id())
            .map(|&i| &self.subtypes[i])
    }

    pub fn resolve(&self, id: &str) -> Result<&ResolvedSubtype> {
        self.by_id.get(id).map(|&i| &self.subtypes[i]).ok_or_else(|| {
            Error::mapping(MappingErrorKind::InvalidTypeId {
                id: id.to_string(),
                base: self.base.name().to_string(),
            })
        })
    }

    pub fn subtypes(&self) -> &[ResolvedSubtype] {
        &self.subtypes
    }
}

/// Writes type markers around a value.
#[derive(Clone)]
pub struct TypeSerializer {
    spec: TypeInfoSpec,
    ids: Arc<TypeIdResolver>,
}

impl TypeSerializer {
    #[must_use]
    pub fn spec(&self) -> &TypeInfoSpec {
        &self.spec
    }

    /// Scalars cannot carry an embedded property; they use a wrapper array.
    fn effective(&self, shape: Shape) -> As {
        match (self.spec.include, shape) {
            (As::Property, Shape::Scalar | Shape::Array) => As::WrapperArray,
            (include, _) => include,
        }
    }

    /// Writes the opening tokens, including the value's own start token.
    pub fn write_prefix(&self, concrete: &dyn Any, shape: Shape, w: &mut dyn TokenWriter) -> Result<()> {
        let id = self.ids.id_of(concrete)?.to_string();
        match self.effective(shape) {
            As::Property => {
                w.start_object()?;
                w.field_name(&self.spec.property)?;
                w.write_token(Token::String(id))?;
                return Ok(());
            }
            As::WrapperObject => {
                w.start_object()?;
                w.write_token(Token::FieldName(id))?;
            }
            As::WrapperArray => {
                w.start_array()?;
                w.write_token(Token::String(id))?;
            }
        }
        match shape {
            Shape::Object => w.start_object(),
            Shape::Array => w.start_array(),
            Shape::Scalar => Ok(()),
        }
    }

    /// Writes the closing tokens matching [`TypeSerializer::write_prefix`].
    pub fn write_suffix(&self, shape: Shape, w: &mut dyn TokenWriter) -> Result<()> {
        let include = self.effective(shape);
        if include == As::Property {
            return w.end_object();
        }
        match shape {
            Shape::Object => w.end_object()?,
            Shape::Array => w.end_array()?,
            Shape::Scalar => {}
        }
        match include {
            As::WrapperObject => w.end_object(),
            _ => w.end_array(),
        }
    }
}

/// Reads type markers and dispatches to the concrete deserializer.
#[derive(Clone)]
pub struct TypeDeserializer {
    spec: TypeInfoSpec,
    ids: Arc<TypeIdResolver>,
}

impl TypeDeserializer {
    #[must_use]
    pub fn spec(&self) -> &TypeInfoSpec {
        &self.spec
    }

    fn missing(&self) -> Error {
        Error::mapping(MappingErrorKind::MissingTypeId {
            base: self.ids.base().name().to_string(),
            expected: match self.spec.include {
                As::Property => format!("property \"{}\"", self.spec.property),
                As::WrapperObject => "wrapper object".to_string(),
                As::WrapperArray => "wrapper array".to_string(),
            },
        })
    }

    fn read_id(ctx: &mut DeserializationContext<'_>) -> Result<String> {
        match ctx.current()? {
            Token::String(id) => Ok(id.clone()),
            other => Err(Error::type_mismatch("type id string", other.describe())),
        }
    }

    fn dispatch(&self, id: &str, ctx: &mut DeserializationContext<'_>) -> Result<AnyValue> {
        let subtype = self.ids.resolve(id)?;
        let deserializer = ctx.provider().find_value_deserializer(&subtype.ty)?;
        let value = deserializer.deserialize(ctx)?;
        (subtype.wrap)(value)
    }

    /// Reads a marked value; the current token is the value's first token.
    pub fn deserialize_typed(&self, ctx: &mut DeserializationContext<'_>) -> Result<AnyValue> {
        let current = ctx.current()?.clone();
        match (self.spec.include, current) {
            (As::Property, Token::StartObject) => self.read_property(ctx),
            (As::Property | As::WrapperArray, Token::StartArray) => {
                ctx.advance()?;
                let id = Self::read_id(ctx)?;
                ctx.advance()?;
                let value = self.dispatch(&id, ctx)?;
                ctx.advance()?;
                ctx.expect(&Token::EndArray)?;
                Ok(value)
            }
            (As::WrapperObject, Token::StartObject) => {
                ctx.advance()?;
                let id = match ctx.current()? {
                    Token::FieldName(id) => id.clone(),
                    _ => return Err(self.missing()),
                };
                ctx.advance()?;
                let value = self.dispatch(&id, ctx)?;
                ctx.advance()?;
                ctx.expect(&Token::EndObject)?;
                Ok(value)
            }
            _ => match &self.spec.default_id {
                Some(id) => self.dispatch(id, ctx),
                None => Err(self.missing()),
            },
        }
    }

    fn read_property(&self, ctx: &mut DeserializationContext<'_>) -> Result<AnyValue> {
        let mut buffered = vec![Token::StartObject];
        let id = loop {
            ctx.advance()?;
            match ctx.current()?.clone() {
                Token::FieldName(name) if name == self.spec.property => {
                    ctx.advance()?;
                    break Some(Self::read_id(ctx)?);
                }
                Token::FieldName(name) => {
                    buffered.push(Token::FieldName(name));
                    ctx.advance()?;
                    buffered.extend(ctx.capture_value()?);
                }
                Token::EndObject => {
                    buffered.push(Token::EndObject);
                    break None;
                }
                other => return Err(Error::type_mismatch("field name", other.describe())),
            }
        };
        let id = match id.or_else(|| self.spec.default_id.clone()) {
            Some(id) => id,
            None => return Err(self.missing()),
        };
        debug!(id = %id, replayed = buffered.len(), "resolved type id");
        ctx.push_back(buffered);
        ctx.advance()?;
        self.dispatch(&id, ctx)
    }
}

/// Decides where type markers are needed.
pub struct TypeResolver<'a> {
    introspector: &'a Introspector,
}

impl<'a> TypeResolver<'a> {
    #[must_use]
    pub fn new(introspector: &'a Introspector) -> Self {
        TypeResolver { introspector }
    }

    /// Effective marker configuration for a value of declared type `ty`.
    ///
    /// `explicit` is the property-level or content-level configuration. It never
    /// applies to a container itself: callers pass it on to the contents.
    #[must_use]
    pub fn resolve_spec(
        &self,
        ty: &TypeDescriptor,
        explicit: Option<&TypeInfoSpec>,
    ) -> Option<TypeInfoSpec> {
        let base = ty.unwrapped();
        if base.is_container() || matches!(base.kind(), TypeKind::Scalar(_) | TypeKind::Tree) {
            return None;
        }
        let config = self.introspector.config();
        let spec = explicit.cloned().or_else(|| {
            let annotations = self.introspector.class_annotations(base);
            config.directives().find_type_info(&annotations)
        });
        let spec = match spec {
            Some(spec) => Some(spec),
            None if base.is_abstract() => config.default_typing().cloned(),
            None => None,
        };
        spec.filter(|s| s.id != IdScheme::None)
    }

    fn id_resolver(&self, ty: &TypeDescriptor, spec: &TypeInfoSpec) -> Arc<TypeIdResolver> {
        Arc::new(TypeIdResolver::build(self.introspector, ty.unwrapped(), spec.id))
    }

    pub fn type_serializer(
        &self,
        ty: &TypeDescriptor,
        explicit: Option<&TypeInfoSpec>,
    ) -> Option<TypeSerializer> {
        let spec = self.resolve_spec(ty, explicit)?;
        let ids = self.id_resolver(ty, &spec);
        Some(TypeSerializer { spec, ids })
    }

    pub fn type_deserializer(
        &self,
        ty: &TypeDescriptor,
        explicit: Option<&TypeInfoSpec>,
    ) -> Option<TypeDeserializer> {
        let spec = self.resolve_spec(ty, explicit)?;
        let ids = self.id_resolver(ty, &spec);
        Some(TypeDeserializer { spec, ids })
    }

    /// All subtypes of an abstract base, for bindings that dispatch without markers.
    pub fn subtypes(&self, base: &TypeDescriptor) -> Arc<TypeIdResolver> {
        Arc::new(TypeIdResolver::build(self.introspector, base, IdScheme::Name))
    }
}
