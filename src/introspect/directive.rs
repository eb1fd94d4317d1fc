//! Directive sources and their composition.
//!
//! A [`DirectiveSource`] answers questions about the annotations of one
//! declaration. Every query has a neutral default, so a source only implements
//! what its vocabulary expresses. Sources are combined in a [`DirectiveChain`],
//! a flat list reduced from the highest to the lowest priority:
//!
//! | Query kind | Merge policy |
//! |------------|--------------|
//! | existence (`is_ignored`, `has_any_setter`, ...) | logical OR |
//! | single answer (`find_name`, `find_inclusion`, ...) | first non-empty answer |
//! | lists (`find_subtypes`, `find_ignored_names`, `find_views`) | concatenation |
//!
//! An empty name means "included, but use the default name". It is returned
//! only when no source offers a concrete name.

use std::sync::Arc;

use super::annotation::{
    Annotation, Annotations, AutoDetect, CreatorMode, Inclusion, PropertyOrder, ReferenceKind,
    Subtype, TypeInfoSpec,
};
use crate::de::Deserializer;
use crate::ser::Serializer;
use crate::types::TypeRef;

/// Query surface for declarative directives.
pub trait DirectiveSource: Send + Sync {
    fn is_ignored(&self, _annotations: &Annotations) -> bool {
        false
    }

    fn has_as_value(&self, _annotations: &Annotations) -> bool {
        false
    }

    fn has_any_setter(&self, _annotations: &Annotations) -> bool {
        false
    }

    fn has_any_getter(&self, _annotations: &Annotations) -> bool {
        false
    }

    fn find_name(&self, _annotations: &Annotations) -> Option<String> {
        None
    }

    fn find_creator_mode(&self, _annotations: &Annotations) -> Option<CreatorMode> {
        None
    }

    fn find_type_override(&self, _annotations: &Annotations) -> Option<TypeRef> {
        None
    }

    fn find_inclusion(&self, _annotations: &Annotations) -> Option<Inclusion> {
        None
    }

    fn find_type_info(&self, _annotations: &Annotations) -> Option<TypeInfoSpec> {
        None
    }

    fn find_type_name(&self, _annotations: &Annotations) -> Option<String> {
        None
    }

    fn find_property_order(&self, _annotations: &Annotations) -> Option<PropertyOrder> {
        None
    }

    fn find_auto_detect(&self, _annotations: &Annotations) -> Option<AutoDetect> {
        None
    }

    fn find_reference(&self, _annotations: &Annotations) -> Option<ReferenceKind> {
        None
    }

    fn find_ignore_unknown(&self, _annotations: &Annotations) -> Option<bool> {
        None
    }

    fn find_serializer(&self, _annotations: &Annotations) -> Option<Arc<dyn Serializer>> {
        None
    }

    fn find_deserializer(&self, _annotations: &Annotations) -> Option<Arc<dyn Deserializer>> {
        None
    }

    fn find_subtypes(&self, _annotations: &Annotations) -> Option<Vec<Subtype>> {
        None
    }

    fn find_ignored_names(&self, _annotations: &Annotations) -> Option<Vec<String>> {
        None
    }

    fn find_views(&self, _annotations: &Annotations) -> Option<Vec<String>> {
        None
    }

    /// Lets [`DirectiveChain::pair`] flatten nested chains.
    fn as_chain(&self) -> Option<&DirectiveChain> {
        None
    }
}

/// The typed [`Annotation`] vocabulary.
#[derive(Clone, Copy, Debug, Default)]
pub struct NativeDirectives;

fn first<T>(annotations: &Annotations, pick: impl FnMut(&Annotation) -> Option<T>) -> Option<T> {
    annotations.iter().find_map(pick)
}

impl DirectiveSource for NativeDirectives {
    fn is_ignored(&self, annotations: &Annotations) -> bool {
        annotations.iter().any(|a| matches!(a, Annotation::Ignore))
    }

    fn has_as_value(&self, annotations: &Annotations) -> bool {
        annotations.iter().any(|a| matches!(a, Annotation::Value))
    }

    fn has_any_setter(&self, annotations: &Annotations) -> bool {
        annotations.iter().any(|a| matches!(a, Annotation::AnySetter))
    }

    fn has_any_getter(&self, annotations: &Annotations) -> bool {
        annotations.iter().any(|a| matches!(a, Annotation::AnyGetter))
    }

    fn find_name(&self, annotations: &Annotations) -> Option<String> {
        first(annotations, |a| match a {
            Annotation::Property(name) => Some(name.clone()),
            _ => None,
        })
    }

    fn find_creator_mode(&self, annotations: &Annotations) -> Option<CreatorMode> {
        first(annotations, |a| match a {
            Annotation::Creator(mode) => Some(*mode),
            _ => None,
        })
    }

    fn find_type_override(&self, annotations: &Annotations) -> Option<TypeRef> {
        first(annotations, |a| match a {
            Annotation::TypeOverride(ty) => Some(*ty),
            _ => None,
        })
    }

    fn find_inclusion(&self, annotations: &Annotations) -> Option<Inclusion> {
        first(annotations, |a| match a {
            Annotation::Include(inclusion) => Some(*inclusion),
            _ => None,
        })
    }

    fn find_type_info(&self, annotations: &Annotations) -> Option<TypeInfoSpec> {
        first(annotations, |a| match a {
            Annotation::TypeInfo(spec) => Some(spec.clone()),
            _ => None,
        })
    }

    fn find_type_name(&self, annotations: &Annotations) -> Option<String> {
        first(annotations, |a| match a {
            Annotation::TypeName(name) => Some(name.clone()),
            _ => None,
        })
    }

    fn find_property_order(&self, annotations: &Annotations) -> Option<PropertyOrder> {
        first(annotations, |a| match a {
            Annotation::PropertyOrder(order) => Some(order.clone()),
            _ => None,
        })
    }

    fn find_auto_detect(&self, annotations: &Annotations) -> Option<AutoDetect> {
        first(annotations, |a| match a {
            Annotation::AutoDetect(detect) => Some(*detect),
            _ => None,
        })
    }

    fn find_reference(&self, annotations: &Annotations) -> Option<ReferenceKind> {
        first(annotations, |a| match a {
            Annotation::ManagedReference(name) => Some(ReferenceKind::Managed(name.clone())),
            Annotation::BackReference(name) => Some(ReferenceKind::Back(name.clone())),
            _ => None,
        })
    }

    fn find_ignore_unknown(&self, annotations: &Annotations) -> Option<bool> {
        first(annotations, |a| match a {
            Annotation::IgnoreProperties { ignore_unknown, .. } => Some(*ignore_unknown),
            _ => None,
        })
    }

    fn find_serializer(&self, annotations: &Annotations) -> Option<Arc<dyn Serializer>> {
        first(annotations, |a| match a {
            Annotation::SerializeWith(ser) => Some(ser.clone()),
            _ => None,
        })
    }

    fn find_deserializer(&self, annotations: &Annotations) -> Option<Arc<dyn Deserializer>> {
        first(annotations, |a| match a {
            Annotation::DeserializeWith(de) => Some(de.clone()),
            _ => None,
        })
    }

    fn find_subtypes(&self, annotations: &Annotations) -> Option<Vec<Subtype>> {
        let found: Vec<Subtype> = annotations
            .iter()
            .filter_map(|a| match a {
                Annotation::SubTypes(list) => Some(list.iter().cloned()),
                _ => None,
            })
            .flatten()
            .collect();
        (!found.is_empty()).then_some(found)
    }

    fn find_ignored_names(&self, annotations: &Annotations) -> Option<Vec<String>> {
        first(annotations, |a| match a {
            Annotation::IgnoreProperties { names, .. } if !names.is_empty() => Some(names.clone()),
            _ => None,
        })
    }

    fn find_views(&self, annotations: &Annotations) -> Option<Vec<String>> {
        first(annotations, |a| match a {
            Annotation::View(views) => Some(views.clone()),
            _ => None,
        })
    }
}

/// The string-keyed [`Annotation::Attr`] vocabulary.
///
/// | Key | Value |
/// |-----|-------|
/// | `name` | property name |
/// | `ignore` | `true` |
/// | `order` | comma-separated names |
/// | `alphabetic` | `true` |
/// | `views` | comma-separated view names |
/// | `creator` | `default`, `delegating` or `properties` |
/// | `include` | `always`, `non_null`, `non_empty` or `non_default` |
/// | `type_name` | logical subtype name |
/// | `ignore_unknown` | `true` |
#[derive(Clone, Copy, Debug, Default)]
pub struct AttributeDirectives;

fn attr<'a>(annotations: &'a Annotations, wanted: &str) -> Option<&'a str> {
    annotations.iter().find_map(|a| match a {
        Annotation::Attr { key, value } if key == wanted => Some(value.as_str()),
        _ => None,
    })
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

impl DirectiveSource for AttributeDirectives {
    fn is_ignored(&self, annotations: &Annotations) -> bool {
        attr(annotations, "ignore") == Some("true")
    }

    fn find_name(&self, annotations: &Annotations) -> Option<String> {
        attr(annotations, "name").map(str::to_string)
    }

    fn find_creator_mode(&self, annotations: &Annotations) -> Option<CreatorMode> {
        match attr(annotations, "creator")? {
            "default" => Some(CreatorMode::Default),
            "delegating" => Some(CreatorMode::Delegating),
            "properties" => Some(CreatorMode::Properties),
            _ => None,
        }
    }

    fn find_inclusion(&self, annotations: &Annotations) -> Option<Inclusion> {
        match attr(annotations, "include")? {
            "always" => Some(Inclusion::Always),
            "non_null" => Some(Inclusion::NonNull),
            "non_empty" => Some(Inclusion::NonEmpty),
            "non_default" => Some(Inclusion::NonDefault),
            _ => None,
        }
    }

    fn find_type_name(&self, annotations: &Annotations) -> Option<String> {
        attr(annotations, "type_name").map(str::to_string)
    }

    fn find_property_order(&self, annotations: &Annotations) -> Option<PropertyOrder> {
        let names = attr(annotations, "order").map(split_list);
        let alphabetic = attr(annotations, "alphabetic") == Some("true");
        if names.is_none() && !alphabetic {
            return None;
        }
        Some(PropertyOrder {
            names: names.unwrap_or_default(),
            alphabetic,
        })
    }

    fn find_ignore_unknown(&self, annotations: &Annotations) -> Option<bool> {
        attr(annotations, "ignore_unknown").map(|v| v == "true")
    }

    fn find_views(&self, annotations: &Annotations) -> Option<Vec<String>> {
        attr(annotations, "views").map(split_list)
    }
}

/// Ordered composition of directive sources, highest priority first.
#[derive(Clone, Default)]
pub struct DirectiveChain {
    sources: Vec<Arc<dyn DirectiveSource>>,
}

pub(crate) static EMPTY_CHAIN: DirectiveChain = DirectiveChain {
    sources: Vec::new(),
};

impl DirectiveChain {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Chain holding only the native vocabulary.
    #[must_use]
    pub fn native() -> Self {
        DirectiveChain {
            sources: vec![Arc::new(NativeDirectives)],
        }
    }

    /// Combines two sources; `primary` takes precedence. Nested chains are flattened.
    pub fn pair(primary: Arc<dyn DirectiveSource>, secondary: Arc<dyn DirectiveSource>) -> Self {
        let mut chain = DirectiveChain::new();
        chain.push(primary);
        chain.push(secondary);
        chain
    }

    /// Appends a source with lower priority than every source already present.
    pub fn push(&mut self, source: Arc<dyn DirectiveSource>) {
        match source.as_chain() {
            Some(nested) => self.sources.extend(nested.sources.iter().cloned()),
            None => self.sources.push(source),
        }
    }

    /// Inserts a source ahead of every source already present.
    pub fn push_front(&mut self, source: Arc<dyn DirectiveSource>) {
        let mut front = DirectiveChain::new();
        front.push(source);
        front.sources.append(&mut self.sources);
        self.sources = front.sources;
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    fn any(&self, query: impl Fn(&dyn DirectiveSource) -> bool) -> bool {
        self.sources.iter().any(|s| query(s.as_ref()))
    }

    fn first<T>(&self, query: impl Fn(&dyn DirectiveSource) -> Option<T>) -> Option<T> {
        self.sources.iter().find_map(|s| query(s.as_ref()))
    }

    fn concat<T>(&self, query: impl Fn(&dyn DirectiveSource) -> Option<Vec<T>>) -> Option<Vec<T>> {
        let mut found: Option<Vec<T>> = None;
        for source in &self.sources {
            if let Some(items) = query(source.as_ref()) {
                found.get_or_insert_with(Vec::new).extend(items);
            }
        }
        found
    }
}

impl DirectiveSource for DirectiveChain {
    fn is_ignored(&self, a: &Annotations) -> bool {
        self.any(|s| s.is_ignored(a))
    }

    fn has_as_value(&self, a: &Annotations) -> bool {
        self.any(|s| s.has_as_value(a))
    }

    fn has_any_setter(&self, a: &Annotations) -> bool {
        self.any(|s| s.has_any_setter(a))
    }

    fn has_any_getter(&self, a: &Annotations) -> bool {
        self.any(|s| s.has_any_getter(a))
    }

    fn find_name(&self, a: &Annotations) -> Option<String> {
        let mut deferred = None;
        for source in &self.sources {
            match source.find_name(a) {
                Some(name) if !name.is_empty() => return Some(name),
                Some(empty) => {
                    deferred.get_or_insert(empty);
                }
                None => {}
            }
        }
        deferred
    }

    fn find_creator_mode(&self, a: &Annotations) -> Option<CreatorMode> {
        self.first(|s| s.find_creator_mode(a))
    }

    fn find_type_override(&self, a: &Annotations) -> Option<TypeRef> {
        self.first(|s| s.find_type_override(a))
    }

    fn find_inclusion(&self, a: &Annotations) -> Option<Inclusion> {
        self.first(|s| s.find_inclusion(a))
    }

    fn find_type_info(&self, a: &Annotations) -> Option<TypeInfoSpec> {
        self.first(|s| s.find_type_info(a))
    }

    fn find_type_name(&self, a: &Annotations) -> Option<String> {
        self.first(|s| s.find_type_name(a).filter(|n| !n.is_empty()))
    }

    fn find_property_order(&self, a: &Annotations) -> Option<PropertyOrder> {
        self.first(|s| s.find_property_order(a))
    }

    fn find_auto_detect(&self, a: &Annotations) -> Option<AutoDetect> {
        self.first(|s| s.find_auto_detect(a))
    }

    fn find_reference(&self, a: &Annotations) -> Option<ReferenceKind> {
        self.first(|s| s.find_reference(a))
    }

    fn find_ignore_unknown(&self, a: &Annotations) -> Option<bool> {
        self.first(|s| s.find_ignore_unknown(a))
    }

    fn find_serializer(&self, a: &Annotations) -> Option<Arc<dyn Serializer>> {
        self.first(|s| s.find_serializer(a))
    }

    fn find_deserializer(&self, a: &Annotations) -> Option<Arc<dyn Deserializer>> {
        self.first(|s| s.find_deserializer(a))
    }

    fn find_subtypes(&self, a: &Annotations) -> Option<Vec<Subtype>> {
        self.concat(|s| s.find_subtypes(a))
    }

    fn find_ignored_names(&self, a: &Annotations) -> Option<Vec<String>> {
        self.concat(|s| s.find_ignored_names(a))
    }

    fn find_views(&self, a: &Annotations) -> Option<Vec<String>> {
        self.concat(|s| s.find_views(a))
    }

    fn as_chain(&self) -> Option<&DirectiveChain> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed {
        name: Option<&'static str>,
        ignored: bool,
        views: Option<Vec<String>>,
    }

    impl DirectiveSource for Fixed {
        fn is_ignored(&self, _: &Annotations) -> bool {
            self.ignored
        }

        fn find_name(&self, _: &Annotations) -> Option<String> {
            self.name.map(str::to_string)
        }

        fn find_views(&self, _: &Annotations) -> Option<Vec<String>> {
            self.views.clone()
        }
    }

    fn fixed(name: Option<&'static str>, ignored: bool) -> Arc<dyn DirectiveSource> {
        Arc::new(Fixed {
            name,
            ignored,
            views: Some(vec![name.unwrap_or("none").to_string()]),
        })
    }

    #[test]
    fn test_primary_name_wins() {
        let chain = DirectiveChain::pair(fixed(Some("a"), false), fixed(Some("b"), false));
        assert_eq!(chain.find_name(&Annotations::new()).as_deref(), Some("a"));
    }

    #[test]
    fn test_empty_name_deferred_to_secondary() {
        let chain = DirectiveChain::pair(fixed(Some(""), false), fixed(Some("b"), false));
        assert_eq!(chain.find_name(&Annotations::new()).as_deref(), Some("b"));

        let chain = DirectiveChain::pair(fixed(Some(""), false), fixed(None, false));
        assert_eq!(chain.find_name(&Annotations::new()).as_deref(), Some(""));
    }

    #[test]
    fn test_existence_is_or() {
        let chain = DirectiveChain::pair(fixed(None, false), fixed(None, true));
        assert!(chain.is_ignored(&Annotations::new()));
    }

    #[test]
    fn test_nested_pairs_flatten() {
        let inner: Arc<dyn DirectiveSource> =
            Arc::new(DirectiveChain::pair(fixed(Some("b"), false), fixed(Some("c"), false)));
        let chain = DirectiveChain::pair(fixed(None, false), inner);
        assert_eq!(chain.len(), 3);
        assert_eq!(chain.find_name(&Annotations::new()).as_deref(), Some("b"));
        assert_eq!(
            chain.find_views(&Annotations::new()).unwrap(),
            vec!["none", "b", "c"]
        );
    }

    #[test]
    fn test_attribute_vocabulary() {
        let annotations: Annotations = vec![
            Annotation::attr("name", "full_name"),
            Annotation::attr("views", "public, internal"),
            Annotation::attr("include", "non_null"),
        ]
        .into();
        let source = AttributeDirectives;
        assert_eq!(source.find_name(&annotations).as_deref(), Some("full_name"));
        assert_eq!(
            source.find_views(&annotations).unwrap(),
            vec!["public", "internal"]
        );
        assert_eq!(source.find_inclusion(&annotations), Some(Inclusion::NonNull));
        assert!(NativeDirectives.find_name(&annotations).is_none());
    }
}
