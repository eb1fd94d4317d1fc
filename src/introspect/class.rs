//! Explicit class registration.
//!
//! A [`Bean`] describes its members once through a typed [`ClassBuilder`]. The
//! builder erases every accessor into a closure over `dyn Any`, producing a
//! [`RawClass`] the introspector can read without knowing the concrete type.
//!
//! ```rust
//! use databind::{Bean, ClassBuilder, Visibility};
//!
//! #[derive(Default)]
//! struct Point {
//!     x: i32,
//!     y: i32,
//! }
//!
//! impl Bean for Point {
//!     fn describe(class: ClassBuilder<Self>) -> ClassBuilder<Self> {
//!         class
//!             .field("x", Visibility::Public, (), |p| &p.x, |p| &mut p.x)
//!             .field("y", Visibility::Public, (), |p| &p.y, |p| &mut p.y)
//!             .default_creator(Visibility::Public, Point::default)
//!     }
//! }
//! ```

use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;

use super::annotation::{Annotations, Subtype};
use super::visibility::Visibility;
use crate::types::{downcast, downcast_mut, take, type_ref, AnyValue, Bind, TypeRef};
use crate::{Error, ObjectMap, Result, Value};

/// A borrowed or computed property value.
pub enum Accessed<'a> {
    Borrowed(&'a dyn Any),
    Owned(AnyValue),
}

impl Accessed<'_> {
    #[must_use]
    pub fn as_any(&self) -> &dyn Any {
        match self {
            Accessed::Borrowed(value) => *value,
            Accessed::Owned(value) => value.as_ref(),
        }
    }
}

pub type ReadFn = Arc<dyn for<'a> Fn(&'a dyn Any) -> Result<Accessed<'a>> + Send + Sync>;
pub type WriteFn = Arc<dyn Fn(&mut dyn Any, AnyValue) -> Result<()> + Send + Sync>;
pub type LinkFn = Arc<dyn Fn(&mut dyn Any, &dyn Any) -> Result<()> + Send + Sync>;
pub type AnySetFn = Arc<dyn Fn(&mut dyn Any, String, Value) -> Result<()> + Send + Sync>;
pub type AnyGetFn = Arc<dyn Fn(&dyn Any) -> Result<ObjectMap> + Send + Sync>;
pub type CreateFn = Arc<dyn Fn(CreatorArgs) -> Result<AnyValue> + Send + Sync>;
pub type DefaultFn = Arc<dyn Fn() -> AnyValue + Send + Sync>;
pub type NarrowFn = Arc<dyn for<'a> Fn(&'a dyn Any) -> Result<&'a dyn Any> + Send + Sync>;

fn read_fn<F>(f: F) -> ReadFn
where
    F: for<'a> Fn(&'a dyn Any) -> Result<Accessed<'a>> + Send + Sync + 'static,
{
    Arc::new(f)
}

fn narrow_fn<F>(f: F) -> NarrowFn
where
    F: for<'a> Fn(&'a dyn Any) -> Result<&'a dyn Any> + Send + Sync + 'static,
{
    Arc::new(f)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MemberKind {
    Field,
    Getter,
    IsGetter,
    Setter,
    /// Receives the owning object of a managed reference.
    Linker,
    AnySetter,
    AnyGetter,
}

#[derive(Clone)]
pub enum MemberAccess {
    Read(ReadFn),
    ReadWrite(ReadFn, WriteFn),
    Write(WriteFn),
    Link(LinkFn),
    AnySet(AnySetFn),
    AnyGet(AnyGetFn),
}

impl MemberAccess {
    pub(crate) fn reader(&self) -> Option<&ReadFn> {
        match self {
            MemberAccess::Read(read) | MemberAccess::ReadWrite(read, _) => Some(read),
            _ => None,
        }
    }

    pub(crate) fn writer(&self) -> Option<&WriteFn> {
        match self {
            MemberAccess::Write(write) | MemberAccess::ReadWrite(_, write) => Some(write),
            _ => None,
        }
    }
}

/// One registered member before directives and visibility are applied.
#[derive(Clone)]
pub struct RawMember {
    pub name: String,
    pub kind: MemberKind,
    pub visibility: Visibility,
    pub annotations: Annotations,
    /// Value type; for linkers, the owner type.
    pub ty: Option<TypeRef>,
    pub access: MemberAccess,
    /// 0 for the class itself, +1 per `extends` level.
    pub depth: usize,
}

/// A creator parameter.
#[derive(Clone)]
pub struct Param {
    pub ty: TypeRef,
    pub annotations: Annotations,
}

impl Param {
    /// A parameter bound to the named property.
    pub fn named<T: Bind>(name: &str) -> Self {
        Param {
            ty: type_ref::<T>(),
            annotations: crate::Annotation::property(name).into(),
        }
    }

    pub fn unnamed<T: Bind>() -> Self {
        Param {
            ty: type_ref::<T>(),
            annotations: Annotations::new(),
        }
    }

    pub fn annotated<T: Bind>(annotations: impl Into<Annotations>) -> Self {
        Param {
            ty: type_ref::<T>(),
            annotations: annotations.into(),
        }
    }
}

/// Arguments handed to a creator, in parameter order.
pub struct CreatorArgs {
    values: Vec<Option<AnyValue>>,
}

impl CreatorArgs {
    pub(crate) fn new(values: Vec<Option<AnyValue>>) -> Self {
        CreatorArgs { values }
    }

    /// Takes the argument at `index`.
    ///
    /// # Errors
    ///
    /// Fails if the argument was already taken or has a different type.
    pub fn take<T: 'static>(&mut self, index: usize) -> Result<T> {
        let value = self
            .values
            .get_mut(index)
            .and_then(Option::take)
            .ok_or_else(|| Error::custom(format!("creator argument {} is missing", index)))?;
        take::<T>(value)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Clone)]
pub struct RawCreator {
    pub name: String,
    pub visibility: Visibility,
    pub annotations: Annotations,
    pub params: Vec<Param>,
    pub create: CreateFn,
}

#[derive(Clone)]
pub struct RawDefaultCreator {
    pub visibility: Visibility,
    pub create: DefaultFn,
}

/// Erased registration of a bean.
#[derive(Clone)]
pub struct RawClass {
    pub name: Option<String>,
    pub annotations: Annotations,
    pub members: Vec<RawMember>,
    pub creators: Vec<RawCreator>,
    pub default_creator: Option<RawDefaultCreator>,
}

/// A concrete record bound property by property.
pub trait Bean: Sized + 'static {
    fn describe(class: ClassBuilder<Self>) -> ClassBuilder<Self>;
}

pub(crate) fn raw_class<T: Bean>() -> RawClass {
    T::describe(ClassBuilder::new()).raw
}

/// Typed builder for a [`RawClass`].
pub struct ClassBuilder<T> {
    raw: RawClass,
    marker: PhantomData<fn() -> T>,
}

impl<T: 'static> Default for ClassBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> ClassBuilder<T> {
    #[must_use]
    pub fn new() -> Self {
        ClassBuilder {
            raw: RawClass {
                name: None,
                annotations: Annotations::new(),
                members: Vec::new(),
                creators: Vec::new(),
                default_creator: None,
            },
            marker: PhantomData,
        }
    }

    /// Overrides the display name used in errors and root wrapping.
    #[must_use]
    pub fn named(mut self, name: &str) -> Self {
        self.raw.name = Some(name.to_string());
        self
    }

    /// Adds class-level annotations.
    #[must_use]
    pub fn annotate(mut self, annotations: impl Into<Annotations>) -> Self {
        for annotation in annotations.into().iter() {
            self.raw.annotations.push(annotation.clone());
        }
        self
    }

    fn member(
        mut self,
        name: &str,
        kind: MemberKind,
        visibility: Visibility,
        annotations: Annotations,
        ty: Option<TypeRef>,
        access: MemberAccess,
    ) -> Self {
        self.raw.members.push(RawMember {
            name: name.to_string(),
            kind,
            visibility,
            annotations,
            ty,
            access,
            depth: 0,
        });
        self
    }

    /// Registers a field readable and writable in place.
    #[must_use]
    pub fn field<F: Bind>(
        self,
        name: &str,
        visibility: Visibility,
        annotations: impl Into<Annotations>,
        get: fn(&T) -> &F,
        get_mut: fn(&mut T) -> &mut F,
    ) -> Self {
        let read = read_fn(move |value| Ok(Accessed::Borrowed(get(downcast::<T>(value)?))));
        let write: WriteFn = Arc::new(move |target, value| {
            *get_mut(downcast_mut::<T>(target)?) = take::<F>(value)?;
            Ok(())
        });
        self.member(
            name,
            MemberKind::Field,
            visibility,
            annotations.into(),
            Some(type_ref::<F>()),
            MemberAccess::ReadWrite(read, write),
        )
    }

    /// Registers an accessor method returning an owned value.
    #[must_use]
    pub fn getter<R: Bind>(
        self,
        name: &str,
        visibility: Visibility,
        annotations: impl Into<Annotations>,
        get: fn(&T) -> R,
    ) -> Self {
        let read = read_fn(move |value| {
            Ok(Accessed::Owned(Box::new(get(downcast::<T>(value)?))))
        });
        self.member(
            name,
            MemberKind::Getter,
            visibility,
            annotations.into(),
            Some(type_ref::<R>()),
            MemberAccess::Read(read),
        )
    }

    /// Registers a boolean accessor following the `is_` convention.
    #[must_use]
    pub fn is_getter(
        self,
        name: &str,
        visibility: Visibility,
        annotations: impl Into<Annotations>,
        get: fn(&T) -> bool,
    ) -> Self {
        let read = read_fn(move |value| {
            Ok(Accessed::Owned(Box::new(get(downcast::<T>(value)?))))
        });
        self.member(
            name,
            MemberKind::IsGetter,
            visibility,
            annotations.into(),
            Some(type_ref::<bool>()),
            MemberAccess::Read(read),
        )
    }

    #[must_use]
    pub fn setter<V: Bind>(
        self,
        name: &str,
        visibility: Visibility,
        annotations: impl Into<Annotations>,
        set: fn(&mut T, V),
    ) -> Self {
        let write: WriteFn = Arc::new(move |target, value| {
            set(downcast_mut::<T>(target)?, take::<V>(value)?);
            Ok(())
        });
        self.member(
            name,
            MemberKind::Setter,
            visibility,
            annotations.into(),
            Some(type_ref::<V>()),
            MemberAccess::Write(write),
        )
    }

    /// Registers the receiving side of a managed reference.
    ///
    /// After the owner reads a `ManagedReference` property whose contents are
    /// `T`, each content value is passed to `link` with the owner.
    #[must_use]
    pub fn linker<P: 'static>(
        self,
        name: &str,
        annotations: impl Into<Annotations>,
        link: fn(&mut T, &P),
    ) -> Self {
        let erased: LinkFn = Arc::new(move |target, owner| {
            link(downcast_mut::<T>(target)?, downcast::<P>(owner)?);
            Ok(())
        });
        self.member(
            name,
            MemberKind::Linker,
            Visibility::Public,
            annotations.into(),
            None,
            MemberAccess::Link(erased),
        )
    }

    /// Registers a fallback receiving every unmatched field.
    #[must_use]
    pub fn any_setter(
        self,
        name: &str,
        annotations: impl Into<Annotations>,
        set: fn(&mut T, String, Value),
    ) -> Self {
        let erased: AnySetFn = Arc::new(move |target, key, value| {
            set(downcast_mut::<T>(target)?, key, value);
            Ok(())
        });
        self.member(
            name,
            MemberKind::AnySetter,
            Visibility::Public,
            annotations.into(),
            None,
            MemberAccess::AnySet(erased),
        )
    }

    /// Registers a map whose entries are written as extra fields.
    #[must_use]
    pub fn any_getter(
        self,
        name: &str,
        annotations: impl Into<Annotations>,
        get: fn(&T) -> ObjectMap,
    ) -> Self {
        let erased: AnyGetFn = Arc::new(move |value| Ok(get(downcast::<T>(value)?)));
        self.member(
            name,
            MemberKind::AnyGetter,
            Visibility::Public,
            annotations.into(),
            None,
            MemberAccess::AnyGet(erased),
        )
    }

    /// Registers a constructor or factory function.
    #[must_use]
    pub fn creator(
        mut self,
        name: &str,
        visibility: Visibility,
        annotations: impl Into<Annotations>,
        params: Vec<Param>,
        create: fn(CreatorArgs) -> Result<T>,
    ) -> Self {
        let erased: CreateFn = Arc::new(move |args| Ok(Box::new(create(args)?) as AnyValue));
        self.raw.creators.push(RawCreator {
            name: name.to_string(),
            visibility,
            annotations: annotations.into(),
            params,
            create: erased,
        });
        self
    }

    /// Registers the zero-argument constructor.
    #[must_use]
    pub fn default_creator(mut self, visibility: Visibility, create: fn() -> T) -> Self {
        self.raw.default_creator = Some(RawDefaultCreator {
            visibility,
            create: Arc::new(move || Box::new(create()) as AnyValue),
        });
        self
    }

    /// Inherits the members and class annotations of an embedded parent bean.
    ///
    /// Parent members are listed first. A member of this class with the same
    /// kind and name shadows the inherited one; class annotations of this
    /// class override parent annotations of the same kind.
    #[must_use]
    pub fn extends<P: Bean>(mut self, get: fn(&T) -> &P, get_mut: fn(&mut T) -> &mut P) -> Self {
        let parent = raw_class::<P>();
        let inherited: Vec<RawMember> = parent
            .members
            .into_iter()
            .filter(|m| {
                !self
                    .raw
                    .members
                    .iter()
                    .any(|own| own.kind == m.kind && own.name == m.name)
            })
            .map(|m| lift_member::<T, P>(m, get, get_mut))
            .collect();
        let own = std::mem::take(&mut self.raw.members);
        self.raw.members = inherited;
        self.raw.members.extend(own);
        self.raw.annotations = parent.annotations.merge_overriding(&self.raw.annotations);
        self
    }
}

fn lift_member<T: 'static, P: 'static>(
    member: RawMember,
    get: fn(&T) -> &P,
    get_mut: fn(&mut T) -> &mut P,
) -> RawMember {
    let access = match member.access {
        MemberAccess::Read(read) => MemberAccess::Read(lift_read(read, get)),
        MemberAccess::ReadWrite(read, write) => {
            MemberAccess::ReadWrite(lift_read(read, get), lift_write(write, get_mut))
        }
        MemberAccess::Write(write) => MemberAccess::Write(lift_write(write, get_mut)),
        MemberAccess::Link(link) => MemberAccess::Link(Arc::new(move |target, owner| {
            link(get_mut(downcast_mut::<T>(target)?) as &mut dyn Any, owner)
        })),
        MemberAccess::AnySet(set) => MemberAccess::AnySet(Arc::new(move |target, key, value| {
            set(get_mut(downcast_mut::<T>(target)?) as &mut dyn Any, key, value)
        })),
        MemberAccess::AnyGet(read) => {
            MemberAccess::AnyGet(Arc::new(move |value| read(get(downcast::<T>(value)?) as &dyn Any)))
        }
    };
    RawMember {
        access,
        depth: member.depth + 1,
        ..member
    }
}

fn lift_read<T: 'static, P: 'static>(read: ReadFn, get: fn(&T) -> &P) -> ReadFn {
    read_fn(move |value| read(get(downcast::<T>(value)?) as &dyn Any))
}

fn lift_write<T: 'static, P: 'static>(write: WriteFn, get_mut: fn(&mut T) -> &mut P) -> WriteFn {
    Arc::new(move |target, value| write(get_mut(downcast_mut::<T>(target)?) as &mut dyn Any, value))
}

/// Erased registration of an abstract base.
#[derive(Clone)]
pub struct RawAbstract {
    pub annotations: Annotations,
    pub subtypes: Vec<Subtype>,
    pub narrow: NarrowFn,
}

/// An abstract base type, typically `Box<dyn Trait>`.
pub trait Polymorphic: Sized + 'static {
    fn describe(base: AbstractBuilder<Self>) -> AbstractBuilder<Self>;
}

pub(crate) fn raw_abstract<T: Polymorphic>() -> RawAbstract {
    T::describe(AbstractBuilder::new()).raw
}

/// Typed builder for a [`RawAbstract`].
pub struct AbstractBuilder<T> {
    raw: RawAbstract,
    marker: PhantomData<fn() -> T>,
}

impl<T: 'static> Default for AbstractBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> AbstractBuilder<T> {
    #[must_use]
    pub fn new() -> Self {
        AbstractBuilder {
            raw: RawAbstract {
                annotations: Annotations::new(),
                subtypes: Vec::new(),
                narrow: narrow_fn(|_| {
                    Err(Error::configuration(
                        std::any::type_name::<T>(),
                        "abstract type has no narrowing function",
                    ))
                }),
            },
            marker: PhantomData,
        }
    }

    #[must_use]
    pub fn annotate(mut self, annotations: impl Into<Annotations>) -> Self {
        for annotation in annotations.into().iter() {
            self.raw.annotations.push(annotation.clone());
        }
        self
    }

    /// Sets how to reach the concrete value behind the base, usually `|s| s.as_any()`.
    #[must_use]
    pub fn narrow(mut self, narrow: fn(&T) -> &dyn Any) -> Self {
        self.raw.narrow = narrow_fn(move |value| Ok(narrow(downcast::<T>(value)?)));
        self
    }

    /// Declares a concrete subtype and how to convert it into the base.
    #[must_use]
    pub fn subtype<S: Bind>(mut self, name: Option<&str>, upcast: fn(S) -> T) -> Self {
        self.raw.subtypes.push(Subtype::of::<S, T>(name, upcast));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Annotation;

    #[derive(Default)]
    struct Base {
        id: i64,
    }

    impl Bean for Base {
        fn describe(class: ClassBuilder<Self>) -> ClassBuilder<Self> {
            class
                .annotate(Annotation::TypeName("base".to_string()))
                .field("id", Visibility::Public, (), |b| &b.id, |b| &mut b.id)
                .setter("set_note", Visibility::Public, (), |_b, _v: String| {})
        }
    }

    #[derive(Default)]
    struct Derived {
        base: Base,
        note: String,
    }

    impl Bean for Derived {
        fn describe(class: ClassBuilder<Self>) -> ClassBuilder<Self> {
            class
                .setter("set_note", Visibility::Public, (), |d, v: String| d.note = v)
                .extends(|d| &d.base, |d| &mut d.base)
        }
    }

    #[test]
    fn test_extends_lifts_and_shadows() {
        let raw = raw_class::<Derived>();
        let names: Vec<_> = raw.members.iter().map(|m| (m.name.as_str(), m.depth)).collect();
        assert_eq!(names, vec![("id", 1), ("set_note", 0)]);
        assert_eq!(raw.annotations.iter().count(), 1);

        let mut value = Derived::default();
        let write = raw.members[0].access.writer().unwrap().clone();
        write(&mut value as &mut dyn Any, Box::new(42i64) as AnyValue).unwrap();
        assert_eq!(value.base.id, 42);

        let read = raw.members[0].access.reader().unwrap().clone();
        let accessed = read(&value as &dyn Any).unwrap();
        assert_eq!(accessed.as_any().downcast_ref::<i64>(), Some(&42));
    }

    #[test]
    fn test_creator_args_take() {
        let mut args = CreatorArgs::new(vec![Some(Box::new(5u8) as AnyValue), None]);
        assert_eq!(args.take::<u8>(0).unwrap(), 5);
        assert!(args.take::<u8>(0).is_err());
        assert!(args.take::<u8>(1).is_err());
    }
}
