//! # databind
//!
//! A declarative data-binding engine: it converts between in-memory object
//! graphs and a stream of typed tokens, driven by per-type registrations and
//! per-member directives instead of hand-written conversion code.
//!
//! ## How it fits together
//!
//! Rust has no runtime reflection, so every bound type describes itself once:
//!
//! - scalars, `Option`, `Box`, sequences, maps and [`Value`] are bound out of the box;
//! - records implement [`Bean`] and register fields, accessors and creators on a
//!   [`ClassBuilder`], then get [`Bind`] through [`bind_bean!`];
//! - abstract bases (`Box<dyn Trait>`) implement [`Polymorphic`] and use [`bind_abstract!`];
//! - unit enums use [`bind_enum!`].
//!
//! From these registrations the engine builds one immutable binding per type,
//! caches it in the [`ObjectMapper`]'s providers and reuses it on every call.
//! Directives ([`Annotation`]) rename, ignore, order, filter by view, pick
//! creators, add polymorphic type markers and link back references.
//!
//! ## Quick start
//!
//! ```rust
//! use databind::{bind_bean, Annotation, Bean, ClassBuilder, ObjectMapper, Param, Visibility};
//!
//! #[derive(Debug, PartialEq)]
//! struct User {
//!     id: u32,
//!     name: String,
//!     tags: Vec<String>,
//! }
//!
//! impl Bean for User {
//!     fn describe(class: ClassBuilder<Self>) -> ClassBuilder<Self> {
//!         class
//!             .getter("get_id", Visibility::Public, (), |u| u.id)
//!             .field("name", Visibility::Public, Annotation::property("userName"), |u| &u.name, |u| &mut u.name)
//!             .field("tags", Visibility::Public, (), |u| &u.tags, |u| &mut u.tags)
//!             .creator(
//!                 "new",
//!                 Visibility::Public,
//!                 (),
//!                 vec![Param::named::<u32>("id"), Param::named::<String>("userName")],
//!                 |mut args| {
//!                     Ok(User {
//!                         id: args.take(0)?,
//!                         name: args.take(1)?,
//!                         tags: Vec::new(),
//!                     })
//!                 },
//!             )
//!     }
//! }
//! bind_bean!(User);
//!
//! let mapper = ObjectMapper::new();
//! let user = User { id: 7, name: "Ada".to_string(), tags: vec!["admin".to_string()] };
//!
//! let tree = mapper.to_value(&user).unwrap();
//! assert_eq!(tree.get("userName").and_then(|v| v.as_str()), Some("Ada"));
//!
//! let back: User = mapper.from_value(tree).unwrap();
//! assert_eq!(back, user);
//! ```
//!
//! ## Text formats
//!
//! The crate owns no codec. [`Value`] implements serde's `Serialize` and
//! `Deserialize`, so any serde format can render or parse the tree:
//!
//! ```rust
//! use databind::{ObjectMapper, Value};
//!
//! let parsed: Value = serde_json::from_str(r#"[1, 2, 3]"#).unwrap();
//! let numbers: Vec<u16> = ObjectMapper::new().from_value(parsed).unwrap();
//! assert_eq!(numbers, vec![1, 2, 3]);
//! ```
//!
//! ## Errors
//!
//! Every fallible operation returns [`Result`]. Mapping errors carry the path to
//! the failing value (`orders[2].items["sku"]`); configuration errors name the
//! type whose declarations are invalid.

pub mod config;
pub mod de;
pub mod error;
pub mod introspect;
pub mod macros;
pub mod map;
pub mod mapper;
pub mod polymorphic;
pub mod provider;
pub mod ser;
pub mod token;
pub mod types;
pub mod value;

pub use config::{Feature, MapperConfig, MapperSettings, ProblemHandler};
pub use de::{DeserializationContext, Deserializer, DeserializerProvider};
pub use error::{Error, MappingError, MappingErrorKind, PathSegment, PropertyPath, Result};
pub use introspect::{
    AbstractBuilder, Annotation, Annotations, As, AutoDetect, Bean, ClassBuilder, CreatorArgs,
    CreatorMode, Detect, DirectiveChain, DirectiveSource, IdScheme, Inclusion, MixIn, Param,
    Polymorphic, ReferenceKind, TypeInfoSpec, Visibility, VisibilityPolicy,
};
pub use map::ObjectMap;
pub use mapper::{ObjectMapper, ObjectReader, ObjectWriter};
pub use ser::{SerializationContext, Serializer, SerializerProvider};
pub use token::{BufferReader, Token, TokenBuffer, TokenReader, TokenWriter, TreeReader, TreeWriter};
pub use types::{AnyValue, Bind, Enumerated, ScalarKind, TypeDescriptor, TypeFactory, TypeKind};
pub use value::{Number, Value};

use std::sync::OnceLock;

/// Mapper with the default configuration behind the free functions.
fn default_mapper() -> &'static ObjectMapper {
    static MAPPER: OnceLock<ObjectMapper> = OnceLock::new();
    MAPPER.get_or_init(ObjectMapper::new)
}

/// Converts `value` into tokens with the default configuration.
///
/// # Examples
///
/// ```rust
/// use databind::Token;
///
/// let tokens = databind::to_tokens(&Some("hi".to_string())).unwrap();
/// assert_eq!(tokens, vec![Token::String("hi".to_string())]);
/// ```
///
/// # Errors
///
/// Returns an error if no binding can be built for `T`.
pub fn to_tokens<T: Bind>(value: &T) -> Result<Vec<Token>> {
    default_mapper().to_tokens(value)
}

/// Reads a `T` from tokens with the default configuration.
///
/// # Errors
///
/// Returns an error if the tokens do not match `T`.
pub fn from_tokens<T: Bind>(tokens: Vec<Token>) -> Result<T> {
    default_mapper().from_tokens(tokens)
}

/// Converts `value` into a [`Value`] tree with the default configuration.
///
/// # Errors
///
/// Returns an error if no binding can be built for `T`.
pub fn to_value<T: Bind>(value: &T) -> Result<Value> {
    default_mapper().to_value(value)
}

/// Reads a `T` from a [`Value`] tree with the default configuration.
///
/// # Examples
///
/// ```rust
/// use databind::value;
/// use std::collections::BTreeMap;
///
/// let scores: BTreeMap<String, i64> = databind::from_value(value!({ "a": 1 })).unwrap();
/// assert_eq!(scores["a"], 1);
/// ```
///
/// # Errors
///
/// Returns an error if the tree does not match `T`.
pub fn from_value<T: Bind>(value: Value) -> Result<T> {
    default_mapper().from_value(value)
}
