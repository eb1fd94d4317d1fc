//! Error types for binding construction and token conversion.
//!
//! Errors fall into three groups:
//!
//! - **Codec errors**: failures reported by a [`TokenReader`](crate::TokenReader) or
//!   [`TokenWriter`](crate::TokenWriter). They pass through the engine unchanged.
//! - **Configuration errors**: ambiguous creators, duplicate property definitions,
//!   dangling back references. Detected while a binding is built and never retried.
//! - **Mapping errors**: a value's runtime shape does not match the expected type.
//!   They carry the property path accumulated while the error unwinds through
//!   each property, index and map key.
//!
//! ## Examples
//!
//! ```rust
//! use databind::{Error, PathSegment};
//!
//! let err = Error::type_mismatch("integer", "string")
//!     .with_path(PathSegment::Field("age".to_string()))
//!     .with_path(PathSegment::Index(2))
//!     .with_path(PathSegment::Field("people".to_string()));
//!
//! assert_eq!(err.path().unwrap().to_string(), "people[2].age");
//! ```

use std::fmt;
use thiserror::Error;

/// Represents every failure the binding engine can report.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Failure inside the token codec. Never wrapped with path information.
    #[error("codec error: {0}")]
    Codec(String),

    /// Invalid or ambiguous declarations found while building a binding.
    #[error("invalid definition for type {type_name}: {msg}")]
    Configuration { type_name: String, msg: String },

    /// Structural mismatch between the token stream and the bound type.
    #[error("{0}")]
    Mapping(Box<MappingError>),
}

/// A structural conversion error with the path to the offending value.
#[derive(Debug, Clone)]
pub struct MappingError {
    pub kind: MappingErrorKind,
    pub path: PropertyPath,
}

impl fmt::Display for MappingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{} (at {})", self.kind, self.path)
        }
    }
}

/// What went wrong while converting a value.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MappingErrorKind {
    #[error("unrecognized field \"{name}\" for type {type_name}, not marked as ignorable (known properties: [{}])", .known.join(", "))]
    UnknownProperty {
        name: String,
        type_name: String,
        known: Vec<String>,
    },

    #[error("expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("missing required property \"{name}\" for type {type_name}")]
    MissingProperty { name: String, type_name: String },

    #[error("maximum nesting depth of {limit} exceeded")]
    DepthExceeded { limit: usize },

    #[error("could not resolve type id \"{id}\" as a subtype of {base}")]
    InvalidTypeId { id: String, base: String },

    #[error("missing type id when reading {base} (expected {expected})")]
    MissingTypeId { base: String, expected: String },

    #[error("{0}")]
    Message(String),
}

/// One step of a [`PropertyPath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Field(String),
    Index(usize),
    Key(String),
}

/// Location of a value inside the converted structure.
///
/// Segments are recorded innermost-first while an error unwinds, so adding a
/// frame never needs more than a push.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyPath {
    reversed: Vec<PathSegment>,
}

impl PropertyPath {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reversed.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.reversed.len()
    }

    /// Segments from the root down to the failing value.
    pub fn segments(&self) -> impl Iterator<Item = &PathSegment> {
        self.reversed.iter().rev()
    }

    fn push_outer(&mut self, segment: PathSegment) {
        self.reversed.push(segment);
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments().enumerate() {
            match segment {
                PathSegment::Field(name) if i == 0 => write!(f, "{}", name)?,
                PathSegment::Field(name) => write!(f, ".{}", name)?,
                PathSegment::Index(index) => write!(f, "[{}]", index)?,
                PathSegment::Key(key) => write!(f, "[\"{}\"]", key)?,
            }
        }
        Ok(())
    }
}

impl Error {
    /// Creates a configuration error for the given type.
    pub fn configuration(type_name: &str, msg: impl Into<String>) -> Self {
        Error::Configuration {
            type_name: type_name.to_string(),
            msg: msg.into(),
        }
    }

    /// Creates a mapping error without path information.
    pub fn mapping(kind: MappingErrorKind) -> Self {
        Error::Mapping(Box::new(MappingError {
            kind,
            path: PropertyPath::default(),
        }))
    }

    /// Creates a type mismatch error.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use databind::Error;
    ///
    /// let err = Error::type_mismatch("integer", "string");
    /// assert!(err.to_string().contains("expected integer"));
    /// ```
    pub fn type_mismatch(expected: &str, found: &str) -> Self {
        Error::mapping(MappingErrorKind::TypeMismatch {
            expected: expected.to_string(),
            found: found.to_string(),
        })
    }

    /// Creates a free-form mapping error.
    pub fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::mapping(MappingErrorKind::Message(msg.to_string()))
    }

    pub fn codec<T: fmt::Display>(msg: T) -> Self {
        Error::Codec(msg.to_string())
    }

    pub fn depth_exceeded(limit: usize) -> Self {
        Error::mapping(MappingErrorKind::DepthExceeded { limit })
    }

    /// Adds an enclosing path segment to a mapping error.
    ///
    /// Codec and configuration errors are returned unchanged.
    #[must_use]
    pub fn with_path(mut self, segment: PathSegment) -> Self {
        if let Error::Mapping(inner) = &mut self {
            inner.path.push_outer(segment);
        }
        self
    }

    /// Shorthand for [`Error::with_path`] with a field segment.
    #[must_use]
    pub fn at_field(self, name: &str) -> Self {
        self.with_path(PathSegment::Field(name.to_string()))
    }

    /// The structural path, for mapping errors.
    #[must_use]
    pub fn path(&self) -> Option<&PropertyPath> {
        match self {
            Error::Mapping(inner) => Some(&inner.path),
            _ => None,
        }
    }

    /// The mapping error kind, for mapping errors.
    #[must_use]
    pub fn kind(&self) -> Option<&MappingErrorKind> {
        match self {
            Error::Mapping(inner) => Some(&inner.kind),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::Configuration { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
