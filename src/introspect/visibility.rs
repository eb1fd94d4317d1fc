//! Auto-detection thresholds for undecorated members.

use super::annotation::{AutoDetect, Detect};

/// Declared access level of a registered member.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Visibility {
    Private,
    /// Visible inside the crate (`pub(crate)` and friends).
    Restricted,
    Public,
}

impl Detect {
    /// Whether a member declared with `visibility` passes this threshold.
    #[must_use]
    pub fn allows(self, visibility: Visibility) -> bool {
        match self {
            Detect::Any => true,
            Detect::NonPrivate => visibility != Visibility::Private,
            Detect::PublicOnly => visibility == Visibility::Public,
            Detect::None => false,
        }
    }
}

/// Minimum visibility per member kind for name-convention detection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VisibilityPolicy {
    pub field: Detect,
    pub getter: Detect,
    pub is_getter: Detect,
    pub setter: Detect,
    pub creator: Detect,
}

impl Default for VisibilityPolicy {
    fn default() -> Self {
        VisibilityPolicy {
            field: Detect::PublicOnly,
            getter: Detect::PublicOnly,
            is_getter: Detect::PublicOnly,
            setter: Detect::Any,
            creator: Detect::Any,
        }
    }
}

impl VisibilityPolicy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_field(mut self, detect: Detect) -> Self {
        self.field = detect;
        self
    }

    #[must_use]
    pub fn with_getter(mut self, detect: Detect) -> Self {
        self.getter = detect;
        self
    }

    #[must_use]
    pub fn with_is_getter(mut self, detect: Detect) -> Self {
        self.is_getter = detect;
        self
    }

    #[must_use]
    pub fn with_setter(mut self, detect: Detect) -> Self {
        self.setter = detect;
        self
    }

    #[must_use]
    pub fn with_creator(mut self, detect: Detect) -> Self {
        self.creator = detect;
        self
    }

    /// Applies a class-level [`AutoDetect`] refinement.
    #[must_use]
    pub fn refined(self, overrides: &AutoDetect) -> Self {
        VisibilityPolicy {
            field: overrides.field.unwrap_or(self.field),
            getter: overrides.getter.unwrap_or(self.getter),
            is_getter: overrides.is_getter.unwrap_or(self.is_getter),
            setter: overrides.setter.unwrap_or(self.setter),
            creator: overrides.creator.unwrap_or(self.creator),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thresholds() {
        assert!(Detect::NonPrivate.allows(Visibility::Restricted));
        assert!(!Detect::NonPrivate.allows(Visibility::Private));
        assert!(!Detect::PublicOnly.allows(Visibility::Restricted));
        assert!(!Detect::None.allows(Visibility::Public));
    }

    #[test]
    fn test_refined_keeps_unset_levels() {
        let policy = VisibilityPolicy::default().refined(&AutoDetect {
            field: Some(Detect::Any),
            ..AutoDetect::default()
        });
        assert_eq!(policy.field, Detect::Any);
        assert_eq!(policy.getter, Detect::PublicOnly);
    }
}
