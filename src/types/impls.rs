//! [`Bind`] implementations for standard library and ecosystem types.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use num_bigint::BigInt;
use std::any::Any;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::hash::Hash;

use super::{
    take, AnyValue, Bind, EnumOps, MapOps, ScalarKind, SeqOps, TypeDescriptor,
    TypeFactory, WrapOps,
};
use crate::{Result, Value};

/// A unit-only enum bound by variant name.
///
/// Usually implemented through [`bind_enum!`](crate::bind_enum).
pub trait Enumerated: Sized + 'static {
    fn variant_names() -> &'static [&'static str];

    fn variant_name(&self) -> &'static str;

    fn from_variant_name(name: &str) -> Option<Self>;
}

pub(super) fn enum_ops<T: Enumerated>() -> EnumOps {
    EnumOps {
        variants: T::variant_names,
        name_of: |value| value.downcast_ref::<T>().map(T::variant_name),
        from_name: |name| T::from_variant_name(name).map(|v| Box::new(v) as AnyValue),
    }
}

macro_rules! bind_scalar {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(
            impl Bind for $ty {
                fn type_descriptor(_types: &TypeFactory) -> TypeDescriptor {
                    TypeDescriptor::scalar::<$ty>(ScalarKind::$kind)
                }
            }
        )*
    };
}

bind_scalar! {
    bool => Bool,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    char => Char,
    String => String,
    BigInt => BigInt,
    DateTime<Utc> => DateTime,
}

impl Bind for Value {
    fn type_descriptor(_types: &TypeFactory) -> TypeDescriptor {
        TypeDescriptor::tree()
    }
}

fn option_get<T: 'static>(value: &dyn Any) -> Option<&dyn Any> {
    value
        .downcast_ref::<Option<T>>()
        .and_then(|opt| opt.as_ref())
        .map(|inner| inner as &dyn Any)
}

fn option_get_mut<T: 'static>(value: &mut dyn Any) -> Option<&mut dyn Any> {
    value
        .downcast_mut::<Option<T>>()
        .and_then(|opt| opt.as_mut())
        .map(|inner| inner as &mut dyn Any)
}

impl<T: Bind> Bind for Option<T> {
    fn type_descriptor(types: &TypeFactory) -> TypeDescriptor {
        let ops = WrapOps {
            get: option_get::<T>,
            get_mut: option_get_mut::<T>,
            wrap: |value| Ok(Box::new(Some(take::<T>(value)?)) as AnyValue),
        };
        TypeDescriptor::optional::<Option<T>>(types.construct::<T>(), ops)
            .with_default(|| Box::new(None::<T>) as AnyValue)
    }
}

fn box_get<T: 'static>(value: &dyn Any) -> Option<&dyn Any> {
    value
        .downcast_ref::<Box<T>>()
        .map(|inner| &**inner as &dyn Any)
}

fn box_get_mut<T: 'static>(value: &mut dyn Any) -> Option<&mut dyn Any> {
    value
        .downcast_mut::<Box<T>>()
        .map(|inner| &mut **inner as &mut dyn Any)
}

impl<T: Bind> Bind for Box<T> {
    fn type_descriptor(types: &TypeFactory) -> TypeDescriptor {
        let ops = WrapOps {
            get: box_get::<T>,
            get_mut: box_get_mut::<T>,
            wrap: |value| Ok(Box::new(Box::new(take::<T>(value)?)) as AnyValue),
        };
        TypeDescriptor::indirect::<Box<T>>(types.construct::<T>(), ops)
    }
}

macro_rules! bind_sequence {
    ($coll:ident, $iter:ident, $iter_mut:expr, [$($bound:path),*]) => {
        fn $iter<'a, T: 'static $(+ $bound)*>(
            value: &'a dyn Any,
        ) -> Box<dyn Iterator<Item = &'a dyn Any> + 'a> {
            match value.downcast_ref::<$coll<T>>() {
                Some(items) => Box::new(items.iter().map(|item| item as &dyn Any)),
                None => Box::new(std::iter::empty()),
            }
        }

        impl<T: Bind $(+ $bound)*> Bind for $coll<T> {
            fn type_descriptor(types: &TypeFactory) -> TypeDescriptor {
                let ops = SeqOps {
                    len: |value| value.downcast_ref::<$coll<T>>().map_or(0, |items| items.len()),
                    iter: $iter::<T>,
                    iter_mut: $iter_mut,
                    build: |items| {
                        let built = items
                            .into_iter()
                            .map(take::<T>)
                            .collect::<Result<$coll<T>>>()?;
                        Ok(Box::new(built) as AnyValue)
                    },
                };
                TypeDescriptor::sequence::<$coll<T>>(types.construct::<T>(), ops)
                    .with_default(|| Box::new($coll::<T>::new()) as AnyValue)
            }
        }
    };
}

fn vec_iter_mut<'a, T: 'static>(
    value: &'a mut dyn Any,
) -> Box<dyn Iterator<Item = &'a mut dyn Any> + 'a> {
    match value.downcast_mut::<Vec<T>>() {
        Some(items) => Box::new(items.iter_mut().map(|item| item as &mut dyn Any)),
        None => Box::new(std::iter::empty()),
    }
}

fn deque_iter_mut<'a, T: 'static>(
    value: &'a mut dyn Any,
) -> Box<dyn Iterator<Item = &'a mut dyn Any> + 'a> {
    match value.downcast_mut::<VecDeque<T>>() {
        Some(items) => Box::new(items.iter_mut().map(|item| item as &mut dyn Any)),
        None => Box::new(std::iter::empty()),
    }
}

bind_sequence!(Vec, vec_iter, Some(vec_iter_mut::<T>), []);
bind_sequence!(VecDeque, deque_iter, Some(deque_iter_mut::<T>), []);
bind_sequence!(BTreeSet, btree_set_iter, None, [Ord]);
bind_sequence!(HashSet, hash_set_iter, None, [Eq, Hash]);

macro_rules! bind_map {
    ($coll:ident, $iter:ident, $values_mut:ident, [$($bound:path),*]) => {
        fn $iter<'a, K: 'static, V: 'static>(
            value: &'a dyn Any,
        ) -> Box<dyn Iterator<Item = (&'a dyn Any, &'a dyn Any)> + 'a> {
            match value.downcast_ref::<$coll<K, V>>() {
                Some(map) => Box::new(map.iter().map(|(k, v)| (k as &dyn Any, v as &dyn Any))),
                None => Box::new(std::iter::empty()),
            }
        }

        fn $values_mut<'a, K: 'static, V: 'static>(
            value: &'a mut dyn Any,
        ) -> Box<dyn Iterator<Item = &'a mut dyn Any> + 'a> {
            match value.downcast_mut::<$coll<K, V>>() {
                Some(map) => Box::new(map.values_mut().map(|v| v as &mut dyn Any)),
                None => Box::new(std::iter::empty()),
            }
        }

        impl<K: Bind $(+ $bound)*, V: Bind> Bind for $coll<K, V> {
            fn type_descriptor(types: &TypeFactory) -> TypeDescriptor {
                let ops = MapOps {
                    len: |value| value.downcast_ref::<$coll<K, V>>().map_or(0, |map| map.len()),
                    iter: $iter::<K, V>,
                    values_mut: $values_mut::<K, V>,
                    build: |entries| {
                        let mut map = $coll::<K, V>::new();
                        for (key, value) in entries {
                            map.insert(take::<K>(key)?, take::<V>(value)?);
                        }
                        Ok(Box::new(map) as AnyValue)
                    },
                };
                TypeDescriptor::map::<$coll<K, V>>(
                    types.construct::<K>(),
                    types.construct::<V>(),
                    ops,
                )
                .with_default(|| Box::new($coll::<K, V>::new()) as AnyValue)
            }
        }
    };
}

bind_map!(BTreeMap, btree_map_iter, btree_map_values_mut, [Ord]);
bind_map!(HashMap, hash_map_iter, hash_map_values_mut, [Eq, Hash]);
bind_map!(IndexMap, index_map_iter, index_map_values_mut, [Eq, Hash]);
