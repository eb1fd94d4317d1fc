//! Resolved type descriptions.
//!
//! Rust has no runtime reflection, so every bindable type implements [`Bind`] and
//! hands the engine a [`TypeDescriptor`]: its identity, its generic parameters and
//! a small table of erased operations (iterate a sequence, look inside an option,
//! map an enum variant to its name, ...). Descriptors are created once per type by
//! a [`TypeFactory`] and shared through an `Arc`.
//!
//! ```rust
//! use databind::{TypeFactory, TypeKind};
//!
//! let types = TypeFactory::new();
//! let list = types.construct::<Vec<Option<String>>>();
//!
//! assert_eq!(list.kind(), TypeKind::Sequence);
//! assert!(list.is_container());
//! assert_eq!(list.content_type().unwrap().kind(), TypeKind::Optional);
//! assert_eq!(list, types.construct::<Vec<Option<String>>>());
//! ```

mod impls;
pub(crate) mod keys;

use dashmap::DashMap;
use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::introspect::{RawAbstract, RawClass};
use crate::{Error, Result};

pub use impls::Enumerated;

/// An owned, type-erased value.
pub type AnyValue = Box<dyn Any>;

/// Lazily constructs a descriptor; usable in `const` positions and annotations.
pub type TypeRef = fn(&TypeFactory) -> TypeDescriptor;

/// Returns the [`TypeRef`] of `T`.
#[must_use]
pub fn type_ref<T: Bind>() -> TypeRef {
    TypeFactory::construct::<T>
}

/// Downcasts an erased value, reporting the expected type on failure.
pub fn take<T: 'static>(value: AnyValue) -> Result<T> {
    value
        .downcast::<T>()
        .map(|boxed| *boxed)
        .map_err(|_| Error::custom(format!("value is not a {}", std::any::type_name::<T>())))
}

/// Borrows the concrete type behind an erased reference.
pub fn downcast<T: 'static>(value: &dyn Any) -> Result<&T> {
    value
        .downcast_ref::<T>()
        .ok_or_else(|| Error::custom(format!("value is not a {}", std::any::type_name::<T>())))
}

/// Mutable counterpart of [`downcast`].
pub fn downcast_mut<T: 'static>(value: &mut dyn Any) -> Result<&mut T> {
    value
        .downcast_mut::<T>()
        .ok_or_else(|| Error::custom(format!("value is not a {}", std::any::type_name::<T>())))
}

/// A type the binding engine knows how to describe.
pub trait Bind: 'static {
    fn type_descriptor(types: &TypeFactory) -> TypeDescriptor;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Char,
    String,
    BigInt,
    DateTime,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Scalar(ScalarKind),
    /// `Option<T>`; `None` maps to a null token.
    Optional,
    /// `Box<T>`; transparent to the token stream.
    Indirect,
    Sequence,
    Map,
    Enum,
    Bean,
    Abstract,
    /// The [`Value`](crate::Value) tree.
    Tree,
}

type IterFn = for<'a> fn(&'a dyn Any) -> Box<dyn Iterator<Item = &'a dyn Any> + 'a>;
type IterMutFn = for<'a> fn(&'a mut dyn Any) -> Box<dyn Iterator<Item = &'a mut dyn Any> + 'a>;
type EntryIterFn =
    for<'a> fn(&'a dyn Any) -> Box<dyn Iterator<Item = (&'a dyn Any, &'a dyn Any)> + 'a>;

/// Erased operations of a sequence type.
#[derive(Clone, Copy)]
pub struct SeqOps {
    pub len: fn(&dyn Any) -> usize,
    pub iter: IterFn,
    /// `None` for sets, whose elements cannot be mutated in place.
    pub iter_mut: Option<IterMutFn>,
    pub build: fn(Vec<AnyValue>) -> Result<AnyValue>,
}

/// Erased operations of a map type.
#[derive(Clone, Copy)]
pub struct MapOps {
    pub len: fn(&dyn Any) -> usize,
    pub iter: EntryIterFn,
    pub values_mut: IterMutFn,
    pub build: fn(Vec<(AnyValue, AnyValue)>) -> Result<AnyValue>,
}

/// Erased operations of `Option<T>` and `Box<T>`.
#[derive(Clone, Copy)]
pub struct WrapOps {
    pub get: for<'a> fn(&'a dyn Any) -> Option<&'a dyn Any>,
    pub get_mut: for<'a> fn(&'a mut dyn Any) -> Option<&'a mut dyn Any>,
    pub wrap: fn(AnyValue) -> Result<AnyValue>,
}

/// Erased operations of a unit enum.
#[derive(Clone, Copy)]
pub struct EnumOps {
    pub variants: fn() -> &'static [&'static str],
    pub name_of: fn(&dyn Any) -> Option<&'static str>,
    pub from_name: fn(&str) -> Option<AnyValue>,
}

#[derive(Clone, Copy)]
enum TypeOps {
    None,
    Seq(SeqOps),
    Map(MapOps),
    Wrap(WrapOps),
    Enum(EnumOps),
    Bean(fn() -> RawClass),
    Abstract(fn() -> RawAbstract),
}

struct TypeInner {
    id: TypeId,
    rust_name: &'static str,
    name: String,
    kind: TypeKind,
    params: Vec<TypeDescriptor>,
    ops: TypeOps,
    default_value: Option<fn() -> AnyValue>,
}

/// Immutable description of a resolved type.
///
/// Cloning is cheap. Equality and hashing only look at the type identity and
/// the generic parameters, so descriptors can key binding caches.
#[derive(Clone)]
pub struct TypeDescriptor(Arc<TypeInner>);

impl TypeDescriptor {
    fn new<T: 'static>(kind: TypeKind, params: Vec<TypeDescriptor>, ops: TypeOps) -> Self {
        let rust_name = std::any::type_name::<T>();
        TypeDescriptor(Arc::new(TypeInner {
            id: TypeId::of::<T>(),
            rust_name,
            name: short_type_name(rust_name),
            kind,
            params,
            ops,
            default_value: None,
        }))
    }

    fn with_default(self, default_value: fn() -> AnyValue) -> Self {
        let inner = &*self.0;
        TypeDescriptor(Arc::new(TypeInner {
            id: inner.id,
            rust_name: inner.rust_name,
            name: inner.name.clone(),
            kind: inner.kind,
            params: inner.params.clone(),
            ops: inner.ops,
            default_value: Some(default_value),
        }))
    }

    pub fn scalar<T: Default + 'static>(kind: ScalarKind) -> Self {
        Self::new::<T>(TypeKind::Scalar(kind), Vec::new(), TypeOps::None)
            .with_default(|| Box::new(T::default()) as AnyValue)
    }

    pub fn sequence<T: 'static>(element: TypeDescriptor, ops: SeqOps) -> Self {
        Self::new::<T>(TypeKind::Sequence, vec![element], TypeOps::Seq(ops))
    }

    pub fn map<T: 'static>(key: TypeDescriptor, value: TypeDescriptor, ops: MapOps) -> Self {
        Self::new::<T>(TypeKind::Map, vec![key, value], TypeOps::Map(ops))
    }

    pub fn optional<T: 'static>(inner: TypeDescriptor, ops: WrapOps) -> Self {
        Self::new::<T>(TypeKind::Optional, vec![inner], TypeOps::Wrap(ops))
    }

    pub fn indirect<T: 'static>(inner: TypeDescriptor, ops: WrapOps) -> Self {
        Self::new::<T>(TypeKind::Indirect, vec![inner], TypeOps::Wrap(ops))
    }

    pub fn enumeration<T: Enumerated>() -> Self {
        Self::new::<T>(TypeKind::Enum, Vec::new(), TypeOps::Enum(impls::enum_ops::<T>()))
    }

    pub fn bean<T: crate::Bean>() -> Self {
        Self::new::<T>(TypeKind::Bean, Vec::new(), TypeOps::Bean(crate::introspect::raw_class::<T>))
    }

    pub fn abstract_type<T: crate::Polymorphic>() -> Self {
        Self::new::<T>(
            TypeKind::Abstract,
            Vec::new(),
            TypeOps::Abstract(crate::introspect::raw_abstract::<T>),
        )
    }

    pub(crate) fn tree() -> Self {
        Self::new::<crate::Value>(TypeKind::Tree, Vec::new(), TypeOps::None)
            .with_default(|| Box::new(crate::Value::Null) as AnyValue)
    }

    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.0.id
    }

    /// Short display name (`Person`, `Vec`, `Shape`).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Full Rust type name, used for [`IdScheme::Class`](crate::IdScheme::Class) markers.
    #[must_use]
    pub fn rust_name(&self) -> &'static str {
        self.0.rust_name
    }

    #[must_use]
    pub fn kind(&self) -> TypeKind {
        self.0.kind
    }

    #[must_use]
    pub fn params(&self) -> &[TypeDescriptor] {
        &self.0.params
    }

    /// Element type of sequences, value type of maps, inner type of wrappers.
    #[must_use]
    pub fn content_type(&self) -> Option<&TypeDescriptor> {
        match self.0.kind {
            TypeKind::Map => self.0.params.get(1),
            TypeKind::Sequence | TypeKind::Optional | TypeKind::Indirect => self.0.params.first(),
            _ => None,
        }
    }

    #[must_use]
    pub fn key_type(&self) -> Option<&TypeDescriptor> {
        match self.0.kind {
            TypeKind::Map => self.0.params.first(),
            _ => None,
        }
    }

    /// Strips `Option` and `Box` layers.
    #[must_use]
    pub fn unwrapped(&self) -> &TypeDescriptor {
        let mut ty = self;
        while matches!(ty.kind(), TypeKind::Optional | TypeKind::Indirect) {
            match ty.params().first() {
                Some(inner) => ty = inner,
                None => break,
            }
        }
        ty
    }

    #[must_use]
    pub fn is_container(&self) -> bool {
        matches!(self.0.kind, TypeKind::Sequence | TypeKind::Map)
    }

    #[must_use]
    pub fn is_abstract(&self) -> bool {
        self.0.kind == TypeKind::Abstract
    }

    #[must_use]
    pub fn is_enum(&self) -> bool {
        self.0.kind == TypeKind::Enum
    }

    /// Every Rust type except trait-object bases is final: no subtype can stand in for it.
    #[must_use]
    pub fn is_final(&self) -> bool {
        !self.is_abstract() && self.0.kind != TypeKind::Tree
    }

    #[must_use]
    pub fn seq_ops(&self) -> Option<&SeqOps> {
        match &self.0.ops {
            TypeOps::Seq(ops) => Some(ops),
            _ => None,
        }
    }

    #[must_use]
    pub fn map_ops(&self) -> Option<&MapOps> {
        match &self.0.ops {
            TypeOps::Map(ops) => Some(ops),
            _ => None,
        }
    }

    #[must_use]
    pub fn wrap_ops(&self) -> Option<&WrapOps> {
        match &self.0.ops {
            TypeOps::Wrap(ops) => Some(ops),
            _ => None,
        }
    }

    #[must_use]
    pub fn enum_ops(&self) -> Option<&EnumOps> {
        match &self.0.ops {
            TypeOps::Enum(ops) => Some(ops),
            _ => None,
        }
    }

    pub(crate) fn raw_class(&self) -> Option<RawClass> {
        match self.0.ops {
            TypeOps::Bean(describe) => Some(describe()),
            _ => None,
        }
    }

    pub(crate) fn raw_abstract(&self) -> Option<RawAbstract> {
        match self.0.ops {
            TypeOps::Abstract(describe) => Some(describe()),
            _ => None,
        }
    }

    /// A fresh instance of the type's neutral value (zero, empty, `None`), if it has one.
    #[must_use]
    pub fn default_value(&self) -> Option<AnyValue> {
        self.0.default_value.map(|make| make())
    }

    /// Visits every bean reachable through this type's containers and wrappers.
    pub(crate) fn for_each_bean_mut(
        &self,
        value: &mut dyn Any,
        visit: &mut dyn FnMut(&mut dyn Any) -> Result<()>,
    ) -> Result<()> {
        match (&self.0.ops, self.0.params.first()) {
            (TypeOps::Bean(_), _) => visit(value),
            (TypeOps::Wrap(ops), Some(inner)) => match (ops.get_mut)(value) {
                Some(content) => inner.for_each_bean_mut(content, visit),
                None => Ok(()),
            },
            (TypeOps::Seq(ops), Some(element)) => match ops.iter_mut {
                Some(iter_mut) => {
                    for item in iter_mut(value) {
                        element.for_each_bean_mut(item, visit)?;
                    }
                    Ok(())
                }
                None => Ok(()),
            },
            (TypeOps::Map(ops), _) => match self.0.params.get(1) {
                Some(content) => {
                    for item in (ops.values_mut)(value) {
                        content.for_each_bean_mut(item, visit)?;
                    }
                    Ok(())
                }
                None => Ok(()),
            },
            _ => Ok(()),
        }
    }
}

impl PartialEq for TypeDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id && self.0.params == other.0.params
    }
}

impl Eq for TypeDescriptor {}

impl Hash for TypeDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
        self.0.params.hash(state);
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.rust_name)
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.name)
    }
}

/// Reduces a Rust type path to its last segment, without generics.
///
/// `Box<dyn Trait>` is named after the trait.
#[must_use]
pub fn short_type_name(full: &str) -> String {
    let mut name = full;
    if let Some(inner) = name
        .strip_prefix("alloc::boxed::Box<dyn ")
        .and_then(|rest| rest.strip_suffix('>'))
    {
        name = inner.split(" +").next().unwrap_or(inner);
    }
    let base = name.split('<').next().unwrap_or(name);
    base.rsplit("::").next().unwrap_or(base).to_string()
}

/// Creates and caches [`TypeDescriptor`]s.
#[derive(Default)]
pub struct TypeFactory {
    cache: DashMap<TypeId, TypeDescriptor>,
}

impl TypeFactory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the descriptor of `T`, building it on first use.
    pub fn construct<T: Bind>(&self) -> TypeDescriptor {
        let id = TypeId::of::<T>();
        if let Some(found) = self.cache.get(&id) {
            return found.clone();
        }
        // Built without holding the shard lock: parameters recurse into the factory.
        let built = T::type_descriptor(self);
        self.cache.entry(id).or_insert(built).clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}
