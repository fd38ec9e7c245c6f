//! The entity model capability consumed by the graph builder.
//!
//! A model is a set of typed entity instances with ordered attributes. Some
//! attributes reference other entities, which is the graph the builder makes
//! explicit.

use std::fmt;

use crate::error::ModelReadError;
use crate::value::Value;

/// Arena index of one entity inside a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityHandle(pub(crate) usize);

impl EntityHandle {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for EntityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

/// Model-assigned positive instance number (`#5` in a STEP file).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NaturalKey(u64);

impl NaturalKey {
    /// Returns `None` for zero, which STEP tooling uses for "no id".
    pub fn new(key: u64) -> Option<Self> {
        (key > 0).then_some(Self(key))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How an attribute participates in the graph.
///
/// A `None` reference could not be resolved to a live entity (or was
/// omitted); it never produces a relationship.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeKind {
    Literal(Value),
    EntityRef(Option<EntityHandle>),
    AggregateRef(Vec<Option<EntityHandle>>),
    /// Computed by the schema; neither a property nor a relationship.
    Derived,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub kind: AttributeKind,
}

impl Attribute {
    pub fn literal(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            kind: AttributeKind::Literal(value.into()),
        }
    }

    pub fn entity(name: impl Into<String>, target: Option<EntityHandle>) -> Self {
        Self {
            name: name.into(),
            kind: AttributeKind::EntityRef(target),
        }
    }

    pub fn aggregate(name: impl Into<String>, elements: Vec<Option<EntityHandle>>) -> Self {
        Self {
            name: name.into(),
            kind: AttributeKind::AggregateRef(elements),
        }
    }

    pub fn derived(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: AttributeKind::Derived,
        }
    }
}

/// Position of an anonymous entity inside the entity that holds it.
///
/// `index` is 0 for a plain entity reference and the element position for
/// an aggregate member.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InlineOrigin {
    pub parent: EntityHandle,
    pub attribute: String,
    pub index: usize,
}

/// Ordered inverse attribute name → referencing entities.
pub type InverseAttributes = Vec<(String, Vec<EntityHandle>)>;

/// Read access to a parsed engineering model.
pub trait EntityModel {
    /// Entities with a natural key, in the model's native order.
    fn top_level_entities(&self) -> Vec<EntityHandle>;

    fn type_name(&self, handle: EntityHandle) -> Result<&str, ModelReadError>;

    fn natural_key(&self, handle: EntityHandle) -> Result<Option<NaturalKey>, ModelReadError>;

    fn attributes(&self, handle: EntityHandle) -> Result<&[Attribute], ModelReadError>;

    /// Supertype names, nearest first. Only consulted for hierarchy labels.
    fn ancestor_types(&self, handle: EntityHandle) -> Result<Vec<String>, ModelReadError>;

    /// Inverse attribute name → entities that reference this one under it,
    /// in schema declaration order.
    fn inverse_attributes(&self, handle: EntityHandle) -> Result<InverseAttributes, ModelReadError>;

    /// Where an anonymous entity sits; `None` for entities with a natural key.
    fn inline_origin(&self, handle: EntityHandle) -> Result<Option<&InlineOrigin>, ModelReadError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_natural_key_rejects_zero() {
        assert!(NaturalKey::new(0).is_none());
        assert_eq!(NaturalKey::new(7).map(NaturalKey::get), Some(7));
    }
}
