//! Stable identities for model entities.
//!
//! Entities with a natural key are keyed by that key in decimal. Anonymous
//! entities are addressed by their position under the nearest keyed
//! ancestor: `12/Placement/0`, `12/Placement/0/RelativePlacement/0`.
//! Attribute names are escaped (`%` → `%25`, `/` → `%2F`) so distinct
//! positions never share an address. The address depends only on the
//! model, so every pass derives the same value.

use std::collections::HashSet;

use ifcgraph_model::{EntityHandle, EntityModel, ModelReadError};

use crate::schema::Identity;

/// Derives identities from an [`EntityModel`]. Holds no state of its own.
pub struct IdentityResolver<'m, M: EntityModel + ?Sized> {
    model: &'m M,
}

impl<'m, M: EntityModel + ?Sized> IdentityResolver<'m, M> {
    pub fn new(model: &'m M) -> Self {
        Self { model }
    }

    /// Identity of `handle`.
    ///
    /// Fails with `MissingOrigin` when an anonymous entity has no recorded
    /// position, or when the chain of origins loops back on itself.
    pub fn identity_of(&self, handle: EntityHandle) -> Result<Identity, ModelReadError> {
        let mut segments: Vec<(&str, usize)> = Vec::new();
        let mut visited = HashSet::new();
        let mut current = handle;

        let root = loop {
            if let Some(key) = self.model.natural_key(current)? {
                break key;
            }
            if !visited.insert(current) {
                return Err(ModelReadError::MissingOrigin(handle));
            }
            let origin = self
                .model
                .inline_origin(current)?
                .ok_or(ModelReadError::MissingOrigin(current))?;
            segments.push((origin.attribute.as_str(), origin.index));
            current = origin.parent;
        };

        let mut identity = root.to_string();
        for (attribute, index) in segments.iter().rev() {
            identity.push('/');
            push_segment(&mut identity, attribute);
            identity.push('/');
            identity.push_str(&index.to_string());
        }
        Ok(Identity::new(identity))
    }

    /// True when `handle` has no natural key.
    pub fn is_anonymous(&self, handle: EntityHandle) -> Result<bool, ModelReadError> {
        Ok(self.model.natural_key(handle)?.is_none())
    }
}

/// Append an attribute name with `%` and `/` percent-encoded, so a name
/// can never be mistaken for a path separator.
fn push_segment(identity: &mut String, attribute: &str) {
    for c in attribute.chars() {
        match c {
            '%' => identity.push_str("%25"),
            '/' => identity.push_str("%2F"),
            c => identity.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ifcgraph_model::{Attribute, MemoryModel};

    fn nested_model() -> (MemoryModel, EntityHandle, EntityHandle, EntityHandle) {
        let mut model = MemoryModel::new();
        let wall = model.add_entity(12, "Wall", vec![]).unwrap();
        let placement = model
            .add_inline(wall, "Placement", 0, "LocalPlacement", vec![])
            .unwrap();
        let point = model
            .add_inline(placement, "Location", 2, "CartesianPoint", vec![])
            .unwrap();
        model
            .push_attribute(wall, Attribute::entity("Placement", Some(placement)))
            .unwrap();
        (model, wall, placement, point)
    }

    #[test]
    fn test_natural_key_identity() {
        let (model, wall, _, _) = nested_model();
        let resolver = IdentityResolver::new(&model);
        assert_eq!(resolver.identity_of(wall).unwrap().as_str(), "12");
        assert!(!resolver.is_anonymous(wall).unwrap());
    }

    #[test]
    fn test_anonymous_identity_uses_path() {
        let (model, _, placement, point) = nested_model();
        let resolver = IdentityResolver::new(&model);
        assert_eq!(resolver.identity_of(placement).unwrap().as_str(), "12/Placement/0");
        assert_eq!(
            resolver.identity_of(point).unwrap().as_str(),
            "12/Placement/0/Location/2"
        );
    }

    #[test]
    fn test_separator_in_attribute_name_is_escaped() {
        let mut model = MemoryModel::new();
        let owner = model.add_entity(12, "Wall", vec![]).unwrap();
        let outer = model.add_inline(owner, "a", 0, "P", vec![]).unwrap();
        let nested = model.add_inline(outer, "b", 0, "Q", vec![]).unwrap();
        let lookalike = model.add_inline(owner, "a/0/b", 0, "R", vec![]).unwrap();
        let percent = model.add_inline(owner, "50%", 1, "S", vec![]).unwrap();

        let resolver = IdentityResolver::new(&model);
        assert_eq!(resolver.identity_of(nested).unwrap().as_str(), "12/a/0/b/0");
        assert_eq!(resolver.identity_of(lookalike).unwrap().as_str(), "12/a%2F0%2Fb/0");
        assert_eq!(resolver.identity_of(percent).unwrap().as_str(), "12/50%25/1");
    }

    #[test]
    fn test_identity_is_stable() {
        let (mut model, _, placement, _) = nested_model();
        let first = IdentityResolver::new(&model).identity_of(placement).unwrap();

        // Unrelated entities added later do not move existing identities.
        model.add_entity(13, "Wall", vec![]).unwrap();
        let other = model.resolve(13).unwrap();
        model.add_inline(other, "Placement", 0, "LocalPlacement", vec![]).unwrap();

        let resolver = IdentityResolver::new(&model);
        assert_eq!(resolver.identity_of(placement).unwrap(), first);
        assert_eq!(resolver.identity_of(placement).unwrap(), first);
    }

    #[test]
    fn test_unknown_handle_is_model_error() {
        let (model, _, _, _) = nested_model();
        let empty = MemoryModel::new();
        let resolver = IdentityResolver::new(&empty);
        let handle = model.handles().last().unwrap();
        assert!(matches!(
            resolver.identity_of(handle),
            Err(ModelReadError::UnknownHandle(_))
        ));
    }

    /// One anonymous entity that does not know where it sits.
    struct Orphan;

    impl EntityModel for Orphan {
        fn top_level_entities(&self) -> Vec<EntityHandle> {
            Vec::new()
        }
        fn type_name(&self, _: EntityHandle) -> Result<&str, ModelReadError> {
            Ok("Point")
        }
        fn natural_key(&self, _: EntityHandle) -> Result<Option<ifcgraph_model::NaturalKey>, ModelReadError> {
            Ok(None)
        }
        fn attributes(&self, _: EntityHandle) -> Result<&[Attribute], ModelReadError> {
            Ok(&[])
        }
        fn ancestor_types(&self, _: EntityHandle) -> Result<Vec<String>, ModelReadError> {
            Ok(Vec::new())
        }
        fn inverse_attributes(
            &self,
            _: EntityHandle,
        ) -> Result<ifcgraph_model::InverseAttributes, ModelReadError> {
            Ok(Vec::new())
        }
        fn inline_origin(
            &self,
            _: EntityHandle,
        ) -> Result<Option<&ifcgraph_model::InlineOrigin>, ModelReadError> {
            Ok(None)
        }
    }

    #[test]
    fn test_missing_origin() {
        let (_model, _, placement, _) = nested_model();
        let resolver = IdentityResolver::new(&Orphan);
        assert!(matches!(
            resolver.identity_of(placement),
            Err(ModelReadError::MissingOrigin(h)) if h == placement
        ));
    }
}
