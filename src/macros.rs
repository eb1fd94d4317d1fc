/// Builds a [`Value`](crate::Value) tree from a JSON-like literal.
///
/// ```rust
/// use databind::{value, Value};
///
/// let v = value!({ "name": "Ada", "tags": ["x", 1, null] });
/// assert_eq!(v.get("name"), Some(&Value::String("Ada".to_string())));
/// ```
#[macro_export]
macro_rules! value {
    (null) => {
        $crate::Value::Null
    };

    (true) => {
        $crate::Value::Bool(true)
    };

    (false) => {
        $crate::Value::Bool(false)
    };

    ([]) => {
        $crate::Value::Array(vec![])
    };

    ([ $($elem:tt),* $(,)? ]) => {
        $crate::Value::Array(vec![$($crate::value!($elem)),*])
    };

    ({}) => {
        $crate::Value::Object($crate::ObjectMap::new())
    };

    ({ $($key:literal : $value:tt),* $(,)? }) => {{
        let mut object = $crate::ObjectMap::new();
        $(
            object.insert($key.to_string(), $crate::value!($value));
        )*
        $crate::Value::Object(object)
    }};

    ($other:expr) => {
        $crate::Value::from($other)
    };
}

/// Implements [`Bind`](crate::Bind) for types implementing [`Bean`](crate::Bean).
#[macro_export]
macro_rules! bind_bean {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::Bind for $ty {
                fn type_descriptor(_types: &$crate::TypeFactory) -> $crate::TypeDescriptor {
                    $crate::TypeDescriptor::bean::<$ty>()
                }
            }
        )+
    };
}

/// Implements [`Bind`](crate::Bind) for an abstract base implementing
/// [`Polymorphic`](crate::Polymorphic), usually `Box<dyn Trait>`.
#[macro_export]
macro_rules! bind_abstract {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::Bind for $ty {
                fn type_descriptor(_types: &$crate::TypeFactory) -> $crate::TypeDescriptor {
                    $crate::TypeDescriptor::abstract_type::<$ty>()
                }
            }
        )+
    };
}

/// Binds a unit-only enum by variant name.
///
/// Variants may be renamed with `=> "name"`.
///
/// ```rust
/// use databind::{bind_enum, Enumerated};
///
/// #[derive(Debug, PartialEq)]
/// enum Level {
///     Low,
///     High,
/// }
///
/// bind_enum!(Level { Low => "low", High });
///
/// assert_eq!(Level::variant_names(), &["low", "High"]);
/// assert_eq!(Level::from_variant_name("low"), Some(Level::Low));
/// ```
#[macro_export]
macro_rules! bind_enum {
    (@name $variant:ident) => {
        stringify!($variant)
    };

    (@name $variant:ident $name:literal) => {
        $name
    };

    ($ty:ident { $($variant:ident $(=> $name:literal)?),+ $(,)? }) => {
        impl $crate::Enumerated for $ty {
            fn variant_names() -> &'static [&'static str] {
                &[$($crate::bind_enum!(@name $variant $($name)?)),+]
            }

            fn variant_name(&self) -> &'static str {
                match self {
                    $($ty::$variant => $crate::bind_enum!(@name $variant $($name)?),)+
                }
            }

            fn from_variant_name(name: &str) -> Option<Self> {
                $(
                    if name == $crate::bind_enum!(@name $variant $($name)?) {
                        return Some($ty::$variant);
                    }
                )+
                None
            }
        }

        impl $crate::Bind for $ty {
            fn type_descriptor(_types: &$crate::TypeFactory) -> $crate::TypeDescriptor {
                $crate::TypeDescriptor::enumeration::<$ty>()
            }
        }
    };
}
