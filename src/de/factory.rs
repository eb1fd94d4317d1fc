//! Phase-one construction of deserializers.

use std::sync::Arc;

use super::builder::build_bean_deserializer;
use super::std_de::{
    AbstractDeserializer, EnumDeserializer, MapDeserializer, ScalarDeserializer, SeqDeserializer,
    TreeDeserializer, TypedRootDeserializer, WrapperDeserializer,
};
use super::Deserializer;
use crate::introspect::{DirectiveSource, TypeInfoSpec};
use crate::polymorphic::TypeResolver;
use crate::provider::{BindingContext, BindingEnv, BindingKey, BindingRef};
use crate::types::keys::KeyCodec;
use crate::types::{TypeDescriptor, TypeKind};
use crate::{Error, Result};

/// Creates deserializers from type descriptors.
#[derive(Debug, Default)]
pub struct DeserializerFactory;

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

impl DeserializerFactory {
    #[must_use]
    pub fn new() -> Self {
        DeserializerFactory
    }

    pub fn create(&self, env: &BindingEnv, key: &BindingKey) -> Result<Arc<dyn Deserializer>> {
        let ty = &key.ty;
        let resolver = TypeResolver::new(&env.introspector);
        let content_spec = match &key.context {
            BindingContext::TypedRoot => {
                return Ok(Arc::new(TypedRootDeserializer::new(
                    ty.clone(),
                    BindingRef::lazy(BindingKey::plain(ty)),
                    resolver.type_deserializer(ty, None),
                )));
            }
            BindingContext::ContentTyped(spec) => Some(spec),
            BindingContext::Plain => None,
        };

        let class_annotations = env.introspector.class_annotations(ty);
        if let Some(custom) = env.config.directives().find_deserializer(&class_annotations) {
            return Ok(custom);
        }

        let deserializer: Arc<dyn Deserializer> = match ty.kind() {
            TypeKind::Scalar(kind) => Arc::new(ScalarDeserializer::new(ty.clone(), kind)),
            kind @ (TypeKind::Optional | TypeKind::Indirect) => {
                let ops = *ty.wrap_ops().ok_or_else(|| missing_ops(ty))?;
                let inner = ty.content_type().ok_or_else(|| missing_ops(ty))?;
                let inner_key = match content_spec {
                    Some(spec) => BindingKey::content_typed(inner, spec.clone()),
                    None => BindingKey::plain(inner),
                };
                Arc::new(WrapperDeserializer::new(
                    ty.clone(),
                    ops,
                    BindingRef::lazy(inner_key),
                    kind == TypeKind::Optional,
                ))
            }
            TypeKind::Sequence => {
                let ops = *ty.seq_ops().ok_or_else(|| missing_ops(ty))?;
                let element = ty.content_type().ok_or_else(|| missing_ops(ty))?;
                Arc::new(SeqDeserializer::new(
                    ty.clone(),
                    ops,
                    BindingRef::lazy(content_key(element, content_spec)),
                    resolver.type_deserializer(element, content_spec),
                ))
            }
            TypeKind::Map => {
                let ops = *ty.map_ops().ok_or_else(|| missing_ops(ty))?;
                let key_ty = ty.key_type().ok_or_else(|| missing_ops(ty))?;
                let value_ty = ty.content_type().ok_or_else(|| missing_ops(ty))?;
                Arc::new(MapDeserializer::new(
                    ty.clone(),
                    ops,
                    KeyCodec::for_type(key_ty)?,
                    BindingRef::lazy(content_key(value_ty, content_spec)),
                    resolver.type_deserializer(value_ty, content_spec),
                ))
            }
            TypeKind::Enum => {
                let ops = *ty.enum_ops().ok_or_else(|| missing_ops(ty))?;
                Arc::new(EnumDeserializer::new(ty.clone(), ops))
            }
            TypeKind::Bean => build_bean_deserializer(env, ty)?,
            TypeKind::Abstract => Arc::new(AbstractDeserializer::new(ty.clone())),
            TypeKind::Tree => Arc::new(TreeDeserializer::new(ty.clone())),
        };
        Ok(deserializer)
    }
}
