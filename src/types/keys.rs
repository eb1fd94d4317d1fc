//! Map key conversion. Keys travel as field names.

use std::any::Any;

use super::{downcast, AnyValue, EnumOps, ScalarKind, TypeDescriptor, TypeKind};
use crate::{Error, Result};

#[derive(Clone, Copy)]
pub(crate) enum KeyCodec {
    String,
    Integer(ScalarKind),
    Enum(EnumOps),
}

macro_rules! integer_keys {
    ($kind:expr, $key:expr, $($variant:ident => $ty:ty),*) => {
        match $kind {
            $(ScalarKind::$variant => Ok(downcast::<$ty>($key)?.to_string()),)*
            _ => Err(Error::custom("unsupported map key")),
        }
    };
}

macro_rules! parse_integer_key {
    ($kind:expr, $text:expr, $($variant:ident => $ty:ty),*) => {
        match $kind {
            $(ScalarKind::$variant => $text
                .parse::<$ty>()
                .map(|v| Box::new(v) as AnyValue)
                .map_err(|_| Error::type_mismatch(stringify!($ty), "non-numeric key")),)*
            _ => Err(Error::custom("unsupported map key")),
        }
    };
}

impl KeyCodec {
    pub(crate) fn for_type(ty: &TypeDescriptor) -> Result<Self> {
        match ty.kind() {
            TypeKind::Scalar(ScalarKind::String) => Ok(KeyCodec::String),
            TypeKind::Scalar(
                kind @ (ScalarKind::I8
                | ScalarKind::I16
                | ScalarKind::I32
                | ScalarKind::I64
                | ScalarKind::U8
                | ScalarKind::U16
                | ScalarKind::U32
                | ScalarKind::U64),
            ) => Ok(KeyCodec::Integer(kind)),
            TypeKind::Enum => match ty.enum_ops() {
                Some(ops) => Ok(KeyCodec::Enum(*ops)),
                None => Err(Error::configuration(ty.name(), "enum without variant table")),
            },
            _ => Err(Error::configuration(
                ty.name(),
                "map keys must be strings, integers or enums",
            )),
        }
    }

    pub(crate) fn encode(&self, key: &dyn Any) -> Result<String> {
        match self {
            KeyCodec::String => Ok(downcast::<String>(key)?.clone()),
            KeyCodec::Integer(kind) => integer_keys!(
                kind, key,
                I8 => i8, I16 => i16, I32 => i32, I64 => i64,
                U8 => u8, U16 => u16, U32 => u32, U64 => u64
            ),
            KeyCodec::Enum(ops) => (ops.name_of)(key)
                .map(str::to_string)
                .ok_or_else(|| Error::custom("enum key has no variant name")),
        }
    }

    pub(crate) fn decode(&self, text: &str) -> Result<AnyValue> {
        match self {
            KeyCodec::String => Ok(Box::new(text.to_string())),
            KeyCodec::Integer(kind) => parse_integer_key!(
                kind, text,
                I8 => i8, I16 => i16, I32 => i32, I64 => i64,
                U8 => u8, U16 => u16, U32 => u32, U64 => u64
            ),
            KeyCodec::Enum(ops) => (ops.from_name)(text).ok_or_else(|| {
                Error::custom(format!(
                    "unknown enum key \"{}\", expected one of: {}",
                    text,
                    (ops.variants)().join(", ")
                ))
            }),
        }
    }
}
