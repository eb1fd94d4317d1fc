//! Phase-one construction of serializers.

use std::sync::Arc;

use super::bean::AbstractSerializer;
use super::builder::build_bean_serializer;
use super::std_ser::{
    EnumSerializer, MapSerializer, ScalarSerializer, SeqSerializer, TreeSerializer,
    TypedRootSerializer, WrapperSerializer,
};
use super::Serializer;
use crate::introspect::{DirectiveSource, TypeInfoSpec};
use crate::polymorphic::TypeResolver;
use crate::provider::{BindingContext, BindingEnv, BindingKey, BindingRef};
use crate::types::keys::KeyCodec;
use crate::types::{TypeDescriptor, TypeKind};
use crate::{Error, Result};

/// Creates serializers from type descriptors.
///
/// The factory only reads the type system and the introspector; references to
/// other bindings are left lazy so construction never re-enters the cache.
#[derive(Debug, Default)]
pub struct SerializerFactory;

/// Key for the contents of a container, carrying content type markers down
/// through nested containers.
fn content_key(content: &TypeDescriptor, spec: Option<&TypeInfoSpec>) -> BindingKey {
    match spec {
        Some(spec) if content.unwrapped().is_container() => {
            BindingKey::content_typed(content, spec.clone())
        }
        _ => BindingKey::plain(content),
    }
}

fn missing_ops(ty: &TypeDescriptor) -> Error {
    Error::configuration(ty.name(), "type descriptor is missing its operations")
}

impl SerializerFactory {
    #[must_use]
    pub fn new() -> Self {
        SerializerFactory
    }

    pub fn create(&self, env: &BindingEnv, key: &BindingKey) -> Result<Arc<dyn Serializer>> {
        let ty = &key.ty;
        let resolver = TypeResolver::new(&env.introspector);
        let content_spec = match &key.context {
            BindingContext::TypedRoot => {
                return Ok(Arc::new(TypedRootSerializer::new(
                    ty.clone(),
                    BindingRef::lazy(BindingKey::plain(ty)),
                    resolver.type_serializer(ty, None),
                )));
            }
            BindingContext::ContentTyped(spec) => Some(spec),
            BindingContext::Plain => None,
        };

        let class_annotations = env.introspector.class_annotations(ty);
        if let Some(custom) = env.config.directives().find_serializer(&class_annotations) {
            return Ok(custom);
        }

        let serializer: Arc<dyn Serializer> = match ty.kind() {
            TypeKind::Scalar(kind) => Arc::new(ScalarSerializer::new(ty.clone(), kind)),
            TypeKind::Optional | TypeKind::Indirect => {
                let ops = *ty.wrap_ops().ok_or_else(|| missing_ops(ty))?;
                let inner = ty.content_type().ok_or_else(|| missing_ops(ty))?;
                let inner_key = match content_spec {
                    Some(spec) => BindingKey::content_typed(inner, spec.clone()),
                    None => BindingKey::plain(inner),
                };
                Arc::new(WrapperSerializer::new(ty.clone(), ops, BindingRef::lazy(inner_key)))
            }
            TypeKind::Sequence => {
                let ops = *ty.seq_ops().ok_or_else(|| missing_ops(ty))?;
                let element = ty.content_type().ok_or_else(|| missing_ops(ty))?;
                Arc::new(SeqSerializer::new(
                    ty.clone(),
                    ops,
                    BindingRef::lazy(content_key(element, content_spec)),
                    resolver.type_serializer(element, content_spec),
                ))
            }
            TypeKind::Map => {
                let ops = *ty.map_ops().ok_or_else(|| missing_ops(ty))?;
                let key_ty = ty.key_type().ok_or_else(|| missing_ops(ty))?;
                let value_ty = ty.content_type().ok_or_else(|| missing_ops(ty))?;
                Arc::new(MapSerializer::new(
                    ty.clone(),
                    ops,
                    KeyCodec::for_type(key_ty)?,
                    BindingRef::lazy(content_key(value_ty, content_spec)),
                    resolver.type_serializer(value_ty, content_spec),
                ))
            }
            TypeKind::Enum => {
                let ops = *ty.enum_ops().ok_or_else(|| missing_ops(ty))?;
                Arc::new(EnumSerializer::new(ty.clone(), ops))
            }
            TypeKind::Bean => build_bean_serializer(env, ty)?,
            TypeKind::Abstract => {
                let raw = ty.raw_abstract().ok_or_else(|| missing_ops(ty))?;
                Arc::new(AbstractSerializer {
                    ty: ty.clone(),
                    narrow: raw.narrow,
                    subtypes: resolver.subtypes(ty),
                })
            }
            TypeKind::Tree => Arc::new(TreeSerializer::new(ty.clone())),
        };
        Ok(serializer)
    }
}
