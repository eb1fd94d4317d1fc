//! Instantiation strategy selection.

use tracing::debug;

use super::annotation::CreatorMode;
use super::class::RawDefaultCreator;
use super::introspector::{AnnotatedClass, AnnotatedCreator};
use crate::types::{ScalarKind, TypeDescriptor, TypeKind};
use crate::{Error, Result};

/// A creator bound to named properties.
#[derive(Clone)]
pub struct PropertyCreator {
    pub creator: AnnotatedCreator,
    /// Property name of each parameter, in parameter order.
    pub names: Vec<String>,
}

/// A single-argument creator fed with a whole value.
#[derive(Clone)]
pub struct DelegateCreator {
    pub creator: AnnotatedCreator,
    pub param: TypeDescriptor,
}

/// The instantiation strategies available for one type.
#[derive(Clone, Default)]
pub struct CreatorSet {
    pub default: Option<RawDefaultCreator>,
    pub string: Option<DelegateCreator>,
    pub int: Option<DelegateCreator>,
    pub long: Option<DelegateCreator>,
    pub delegating: Option<DelegateCreator>,
    pub properties: Option<PropertyCreator>,
}

impl CreatorSet {
    #[must_use]
    pub fn can_instantiate(&self) -> bool {
        self.default.is_some()
            || self.string.is_some()
            || self.int.is_some()
            || self.long.is_some()
            || self.delegating.is_some()
            || self.properties.is_some()
    }
}

struct Tier<T> {
    explicit: Vec<T>,
    implicit: Vec<T>,
}

// No `T: Default` bound, unlike the derive.
impl<T> Default for Tier<T> {
    fn default() -> Self {
        Tier {
            explicit: Vec::new(),
            implicit: Vec::new(),
        }
    }
}

impl<T> Tier<T> {
    fn add(&mut self, explicit: bool, item: T) {
        if explicit {
            self.explicit.push(item);
        } else {
            self.implicit.push(item);
        }
    }

    /// Explicit candidates take precedence; two at the winning tier conflict.
    fn pick(mut self, class: &str, what: &str, name: impl Fn(&T) -> String) -> Result<Option<T>> {
        let winners = if self.explicit.is_empty() {
            &mut self.implicit
        } else {
            &mut self.explicit
        };
        if winners.len() > 1 {
            let names: Vec<String> = winners.iter().map(name).collect();
            return Err(Error::configuration(
                class,
                format!("conflicting {} creators: {}", what, names.join(", ")),
            ));
        }
        Ok(winners.pop())
    }
}

fn scalar_slot(ty: &TypeDescriptor) -> Option<ScalarKind> {
    match ty.kind() {
        TypeKind::Scalar(kind @ (ScalarKind::String | ScalarKind::I32 | ScalarKind::I64)) => {
            Some(kind)
        }
        _ => None,
    }
}

/// Classifies the creators of a class.
pub fn select_creators(class: &AnnotatedClass) -> Result<CreatorSet> {
    let mut properties: Tier<PropertyCreator> = Tier::default();
    let mut delegating: Tier<DelegateCreator> = Tier::default();
    let mut string: Tier<DelegateCreator> = Tier::default();
    let mut int: Tier<DelegateCreator> = Tier::default();
    let mut long: Tier<DelegateCreator> = Tier::default();

    for creator in &class.creators {
        if !creator.visible {
            debug!(class = %class.name, creator = %creator.raw.name, "creator not visible, skipped");
            continue;
        }
        let params = &creator.params;
        if params.is_empty() {
            continue;
        }
        let explicit = creator.mode.is_some();
        let single_unnamed = params.len() == 1 && params[0].name.is_none();

        if single_unnamed {
            match creator.mode {
                Some(CreatorMode::Properties) => {
                    return Err(Error::configuration(
                        &class.name,
                        format!(
                            "property-based creator {} has an unnamed parameter",
                            creator.raw.name
                        ),
                    ));
                }
                Some(CreatorMode::Delegating | CreatorMode::Default) => {
                    delegating.add(true, delegate(creator));
                }
                None => match scalar_slot(&params[0].ty) {
                    Some(ScalarKind::String) => string.add(false, delegate(creator)),
                    Some(ScalarKind::I32) => int.add(false, delegate(creator)),
                    Some(_) => long.add(false, delegate(creator)),
                    None => {
                        debug!(class = %class.name, creator = %creator.raw.name, "single-argument creator without marker ignored");
                    }
                },
            }
            continue;
        }

        if creator.mode == Some(CreatorMode::Delegating) {
            if params.len() != 1 {
                return Err(Error::configuration(
                    &class.name,
                    format!(
                        "delegating creator {} must take exactly one argument",
                        creator.raw.name
                    ),
                ));
            }
            delegating.add(true, delegate(creator));
            continue;
        }

        let names: Option<Vec<String>> = params.iter().map(|p| p.name.clone()).collect();
        match names {
            Some(names) => properties.add(
                explicit,
                PropertyCreator {
                    creator: creator.clone(),
                    names,
                },
            ),
            None if explicit => {
                return Err(Error::configuration(
                    &class.name,
                    format!(
                        "creator {} is marked but not every parameter has a property name",
                        creator.raw.name
                    ),
                ));
            }
            None => {
                debug!(class = %class.name, creator = %creator.raw.name, "partially named creator skipped");
            }
        }
    }

    let label = |c: &DelegateCreator| c.creator.raw.name.clone();
    Ok(CreatorSet {
        default: class.default_creator.clone(),
        string: string.pick(&class.name, "string", label)?,
        int: int.pick(&class.name, "int", label)?,
        long: long.pick(&class.name, "long", label)?,
        delegating: delegating.pick(&class.name, "delegating", label)?,
        properties: properties.pick(&class.name, "property-based", |c| c.creator.raw.name.clone())?,
    })
}

fn delegate(creator: &AnnotatedCreator) -> DelegateCreator {
    DelegateCreator {
        creator: creator.clone(),
        param: creator.params[0].ty.clone(),
    }
}
