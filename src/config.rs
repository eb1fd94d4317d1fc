//! Mapper configuration.
//!
//! - [`MapperSettings`]: plain feature switches, loadable from any serde format
//! - [`MapperConfig`]: the full configuration, built with `with_*` methods
//!
//! ## Examples
//!
//! ```rust
//! use databind::{Feature, MapperConfig};
//!
//! let config = MapperConfig::new()
//!     .with_feature(Feature::FailOnUnknownProperties, false)
//!     .with_max_depth(64);
//! assert!(!config.settings().fail_on_unknown_properties);
//! assert_eq!(config.max_depth(), 64);
//! ```

use serde::Deserialize;
use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::introspect::{
    DirectiveChain, DirectiveSource, Inclusion, MixIn, Subtype, TypeInfoSpec,
    VisibilityPolicy, EMPTY_CHAIN,
};
use crate::types::Bind;
use crate::{Result, Value};

/// Feature switches.
///
/// Every field defaults independently, so a partial document is enough:
///
/// ```rust
/// use databind::MapperSettings;
///
/// let settings: MapperSettings =
///     serde_json::from_str(r#"{"wrap_root_value": true}"#).unwrap();
/// assert!(settings.wrap_root_value);
/// assert!(settings.fail_on_unknown_properties);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MapperSettings {
    pub fail_on_unknown_properties: bool,
    pub fail_on_empty_beans: bool,
    pub fail_on_null_for_primitives: bool,
    pub fail_on_missing_creator_properties: bool,
    pub accept_single_value_as_array: bool,
    /// Dates as epoch milliseconds instead of RFC 3339 strings.
    pub write_dates_as_timestamps: bool,
    /// Whether properties without a view tag are part of every view.
    pub default_view_inclusion: bool,
    pub sort_properties_alphabetically: bool,
    pub wrap_root_value: bool,
    pub unwrap_root_value: bool,
    pub write_null_map_values: bool,
}

impl Default for MapperSettings {
    fn default() -> Self {
        MapperSettings {
            fail_on_unknown_properties: true,
            fail_on_empty_beans: true,
            fail_on_null_for_primitives: false,
            fail_on_missing_creator_properties: false,
            accept_single_value_as_array: false,
            write_dates_as_timestamps: true,
            default_view_inclusion: true,
            sort_properties_alphabetically: false,
            wrap_root_value: false,
            unwrap_root_value: false,
            write_null_map_values: true,
        }
    }
}

/// Names one switch of [`MapperSettings`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Feature {
    FailOnUnknownProperties,
    FailOnEmptyBeans,
    FailOnNullForPrimitives,
    FailOnMissingCreatorProperties,
    AcceptSingleValueAsArray,
    WriteDatesAsTimestamps,
    DefaultViewInclusion,
    SortPropertiesAlphabetically,
    WrapRootValue,
    UnwrapRootValue,
    WriteNullMapValues,
}

impl MapperSettings {
    fn slot(&mut self, feature: Feature) -> &mut bool {
        match feature {
            Feature::FailOnUnknownProperties => &mut self.fail_on_unknown_properties,
            Feature::FailOnEmptyBeans => &mut self.fail_on_empty_beans,
            Feature::FailOnNullForPrimitives => &mut self.fail_on_null_for_primitives,
            Feature::FailOnMissingCreatorProperties => {
                &mut self.fail_on_missing_creator_properties
            }
            Feature::AcceptSingleValueAsArray => &mut self.accept_single_value_as_array,
            Feature::WriteDatesAsTimestamps => &mut self.write_dates_as_timestamps,
            Feature::DefaultViewInclusion => &mut self.default_view_inclusion,
            Feature::SortPropertiesAlphabetically => &mut self.sort_properties_alphabetically,
            Feature::WrapRootValue => &mut self.wrap_root_value,
            Feature::UnwrapRootValue => &mut self.unwrap_root_value,
            Feature::WriteNullMapValues => &mut self.write_null_map_values,
        }
    }

    #[must_use]
    pub fn is_enabled(&self, feature: Feature) -> bool {
        match feature {
            Feature::FailOnUnknownProperties => self.fail_on_unknown_properties,
            Feature::FailOnEmptyBeans => self.fail_on_empty_beans,
            Feature::FailOnNullForPrimitives => self.fail_on_null_for_primitives,
            Feature::FailOnMissingCreatorProperties => self.fail_on_missing_creator_properties,
            Feature::AcceptSingleValueAsArray => self.accept_single_value_as_array,
            Feature::WriteDatesAsTimestamps => self.write_dates_as_timestamps,
            Feature::DefaultViewInclusion => self.default_view_inclusion,
            Feature::SortPropertiesAlphabetically => self.sort_properties_alphabetically,
            Feature::WrapRootValue => self.wrap_root_value,
            Feature::UnwrapRootValue => self.unwrap_root_value,
            Feature::WriteNullMapValues => self.write_null_map_values,
        }
    }

    #[must_use]
    pub fn with(mut self, feature: Feature, enabled: bool) -> Self {
        *self.slot(feature) = enabled;
        self
    }
}

/// Hook consulted for properties no binding claims.
pub trait ProblemHandler: Send + Sync {
    /// Returns `Ok(true)` when the property was handled and should be skipped.
    fn handle_unknown_property(&self, type_name: &str, property: &str, value: &Value)
        -> Result<bool>;
}

/// Everything a mapper needs to know besides the types themselves.
#[derive(Clone)]
pub struct MapperConfig {
    settings: MapperSettings,
    visibility: VisibilityPolicy,
    directives: DirectiveChain,
    use_directives: bool,
    mix_ins: HashMap<TypeId, MixIn>,
    view_parents: HashMap<String, String>,
    subtypes: HashMap<TypeId, Vec<Subtype>>,
    default_typing: Option<TypeInfoSpec>,
    default_inclusion: Inclusion,
    problem_handlers: Vec<Arc<dyn ProblemHandler>>,
    max_depth: usize,
    max_cached_bindings: usize,
}

impl Default for MapperConfig {
    fn default() -> Self {
        MapperConfig {
            settings: MapperSettings::default(),
            visibility: VisibilityPolicy::default(),
            directives: DirectiveChain::native(),
            use_directives: true,
            mix_ins: HashMap::new(),
            view_parents: HashMap::new(),
            subtypes: HashMap::new(),
            default_typing: None,
            default_inclusion: Inclusion::Always,
            problem_handlers: Vec::new(),
            max_depth: 500,
            max_cached_bindings: 2000,
        }
    }
}

impl fmt::Debug for MapperConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapperConfig")
            .field("settings", &self.settings)
            .field("visibility", &self.visibility)
            .field("directive_sources", &self.directives.len())
            .field("mix_ins", &self.mix_ins.len())
            .field("default_typing", &self.default_typing)
            .field("default_inclusion", &self.default_inclusion)
            .field("max_depth", &self.max_depth)
            .finish_non_exhaustive()
    }
}

impl MapperConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_settings(mut self, settings: MapperSettings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn with_feature(mut self, feature: Feature, enabled: bool) -> Self {
        self.settings = self.settings.with(feature, enabled);
        self
    }

    #[must_use]
    pub fn with_visibility(mut self, policy: VisibilityPolicy) -> Self {
        self.visibility = policy;
        self
    }

    /// Replaces the directive sources.
    #[must_use]
    pub fn with_directives(mut self, chain: DirectiveChain) -> Self {
        self.directives = chain;
        self
    }

    /// Adds a source consulted after the existing ones.
    #[must_use]
    pub fn with_additional_directives(mut self, source: Arc<dyn DirectiveSource>) -> Self {
        self.directives.push(source);
        self
    }

    /// Disables every directive; only visibility rules decide.
    #[must_use]
    pub fn with_use_directives(mut self, enabled: bool) -> Self {
        self.use_directives = enabled;
        self
    }

    /// Overlays annotations on `T` without touching its registration.
    #[must_use]
    pub fn with_mix_in<T: Bind>(mut self, mix_in: MixIn) -> Self {
        self.mix_ins.insert(TypeId::of::<T>(), mix_in);
        self
    }

    /// Declares `view` a specialisation of `parent`: an active `view` also
    /// includes properties tagged with `parent`.
    #[must_use]
    pub fn with_view_parent(mut self, view: &str, parent: &str) -> Self {
        self.view_parents.insert(view.to_string(), parent.to_string());
        self
    }

    /// Registers `S` as a subtype of the abstract base `P`.
    #[must_use]
    pub fn register_subtype<S: Bind, P: 'static>(
        mut self,
        name: Option<&str>,
        upcast: fn(S) -> P,
    ) -> Self {
        self.subtypes
            .entry(TypeId::of::<P>())
            .or_default()
            .push(Subtype::of::<S, P>(name, upcast));
        self
    }

    /// Type markers for abstract types that declare none themselves.
    #[must_use]
    pub fn with_default_typing(mut self, spec: TypeInfoSpec) -> Self {
        self.default_typing = Some(spec);
        self
    }

    #[must_use]
    pub fn with_default_inclusion(mut self, inclusion: Inclusion) -> Self {
        self.default_inclusion = inclusion;
        self
    }

    #[must_use]
    pub fn with_problem_handler(mut self, handler: Arc<dyn ProblemHandler>) -> Self {
        self.problem_handlers.push(handler);
        self
    }

    #[must_use]
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Binding count at which the provider caches are cleared.
    #[must_use]
    pub fn with_max_cached_bindings(mut self, max: usize) -> Self {
        self.max_cached_bindings = max.max(1);
        self
    }

    #[must_use]
    pub fn settings(&self) -> &MapperSettings {
        &self.settings
    }

    #[must_use]
    pub fn visibility(&self) -> VisibilityPolicy {
        self.visibility
    }

    /// The active directive sources; empty when directives are disabled.
    #[must_use]
    pub fn directives(&self) -> &DirectiveChain {
        if self.use_directives {
            &self.directives
        } else {
            &EMPTY_CHAIN
        }
    }

    #[must_use]
    pub fn mix_in(&self, type_id: TypeId) -> Option<&MixIn> {
        self.mix_ins.get(&type_id)
    }

    #[must_use]
    pub fn registered_subtypes(&self, base: TypeId) -> &[Subtype] {
        self.subtypes.get(&base).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn default_typing(&self) -> Option<&TypeInfoSpec> {
        self.default_typing.as_ref()
    }

    #[must_use]
    pub fn default_inclusion(&self) -> Inclusion {
        self.default_inclusion
    }

    #[must_use]
    pub fn problem_handlers(&self) -> &[Arc<dyn ProblemHandler>] {
        &self.problem_handlers
    }

    #[must_use]
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    #[must_use]
    pub fn max_cached_bindings(&self) -> usize {
        self.max_cached_bindings
    }

    /// Whether a property tagged with `tagged` belongs to the `active` view.
    #[must_use]
    pub fn view_includes(&self, active: &str, tagged: &str) -> bool {
        let mut current = Some(active);
        let mut steps = 0;
        while let Some(view) = current {
            if view == tagged {
                return true;
            }
            steps += 1;
            if steps > self.view_parents.len() {
                break;
            }
            current = self.view_parents.get(view).map(String::as_str);
        }
        false
    }
}
