//! Arena-backed in-memory entity model.

use std::collections::HashMap;

use tracing::debug;

use crate::error::ModelReadError;
use crate::model::{
    Attribute, AttributeKind, EntityHandle, EntityModel, InlineOrigin, InverseAttributes,
    NaturalKey,
};
use crate::schema::Schema;

#[derive(Debug, Clone)]
struct EntityRecord {
    key: Option<NaturalKey>,
    type_name: String,
    attributes: Vec<Attribute>,
    origin: Option<InlineOrigin>,
    inverses: InverseAttributes,
}

/// Entities stored in insertion order.
///
/// Top-level entities carry a natural key; anonymous entities are attached
/// to a parent with [`MemoryModel::add_inline`] so their position is known.
#[derive(Debug, Clone, Default)]
pub struct MemoryModel {
    entities: Vec<EntityRecord>,
    by_key: HashMap<NaturalKey, EntityHandle>,
    ancestors: HashMap<String, Vec<String>>,
}

impl MemoryModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Reserve a top-level entity so later entities can reference it.
    /// Attributes can be filled in afterwards with [`set_attributes`].
    ///
    /// [`set_attributes`]: MemoryModel::set_attributes
    pub fn declare(
        &mut self,
        key: u64,
        type_name: impl Into<String>,
    ) -> Result<EntityHandle, ModelReadError> {
        let natural = NaturalKey::new(key).ok_or(ModelReadError::InvalidKey(key))?;
        if self.by_key.contains_key(&natural) {
            return Err(ModelReadError::DuplicateKey(key));
        }
        let handle = self.push(EntityRecord {
            key: Some(natural),
            type_name: type_name.into(),
            attributes: Vec::new(),
            origin: None,
            inverses: Vec::new(),
        });
        self.by_key.insert(natural, handle);
        Ok(handle)
    }

    /// Add a top-level entity with its attributes.
    pub fn add_entity(
        &mut self,
        key: u64,
        type_name: impl Into<String>,
        attributes: Vec<Attribute>,
    ) -> Result<EntityHandle, ModelReadError> {
        let handle = self.declare(key, type_name)?;
        self.set_attributes(handle, attributes)?;
        Ok(handle)
    }

    /// Add an anonymous entity held by `parent` under `attribute` at `index`.
    ///
    /// The caller is responsible for also placing the returned handle in the
    /// parent's attribute value.
    pub fn add_inline(
        &mut self,
        parent: EntityHandle,
        attribute: impl Into<String>,
        index: usize,
        type_name: impl Into<String>,
        attributes: Vec<Attribute>,
    ) -> Result<EntityHandle, ModelReadError> {
        self.record(parent)?;
        Ok(self.push(EntityRecord {
            key: None,
            type_name: type_name.into(),
            attributes,
            origin: Some(InlineOrigin {
                parent,
                attribute: attribute.into(),
                index,
            }),
            inverses: Vec::new(),
        }))
    }

    pub fn set_attributes(
        &mut self,
        handle: EntityHandle,
        attributes: Vec<Attribute>,
    ) -> Result<(), ModelReadError> {
        self.record_mut(handle)?.attributes = attributes;
        Ok(())
    }

    /// Append one attribute to an entity.
    pub fn push_attribute(
        &mut self,
        handle: EntityHandle,
        attribute: Attribute,
    ) -> Result<(), ModelReadError> {
        self.record_mut(handle)?.attributes.push(attribute);
        Ok(())
    }

    /// Record the supertype names reported for `type_name`, nearest first.
    pub fn set_ancestors(&mut self, type_name: impl Into<String>, ancestors: Vec<String>) {
        self.ancestors.insert(type_name.into(), ancestors);
    }

    /// Declare that `source` references `target` under inverse `name`.
    pub fn add_inverse(
        &mut self,
        target: EntityHandle,
        name: impl Into<String>,
        source: EntityHandle,
    ) -> Result<(), ModelReadError> {
        self.record(source)?;
        let name = name.into();
        let inverses = &mut self.record_mut(target)?.inverses;
        match inverses.iter_mut().find(|(n, _)| *n == name) {
            Some((_, sources)) => sources.push(source),
            None => inverses.push((name, vec![source])),
        }
        Ok(())
    }

    pub fn resolve(&self, key: u64) -> Option<EntityHandle> {
        NaturalKey::new(key).and_then(|k| self.by_key.get(&k).copied())
    }

    /// Every handle in insertion order, anonymous entities included.
    pub fn handles(&self) -> impl Iterator<Item = EntityHandle> + '_ {
        (0..self.entities.len()).map(EntityHandle)
    }

    /// Fill ancestor labels and inverse attributes from a schema.
    ///
    /// Replaces any inverses recorded so far. For each inverse declared on an
    /// entity's type, referencing entities are those whose type is the
    /// declared source type (or a subtype) and whose source attribute points
    /// at the entity, directly or as an aggregate element.
    pub fn derive_from_schema(&mut self, schema: &Schema) {
        for record in &self.entities {
            if !self.ancestors.contains_key(&record.type_name) {
                let ancestors = schema
                    .ancestors(&record.type_name)
                    .into_iter()
                    .map(str::to_string)
                    .collect();
                self.ancestors.insert(record.type_name.clone(), ancestors);
            }
        }

        // (target, source type, source attribute) -> referencing entities
        let mut references: HashMap<(EntityHandle, String), Vec<(EntityHandle, &str)>> =
            HashMap::new();
        for (i, record) in self.entities.iter().enumerate() {
            let source = EntityHandle(i);
            for attribute in &record.attributes {
                let targets: Vec<EntityHandle> = match &attribute.kind {
                    AttributeKind::EntityRef(Some(t)) => vec![*t],
                    AttributeKind::AggregateRef(items) => items.iter().flatten().copied().collect(),
                    _ => continue,
                };
                for target in targets {
                    references
                        .entry((target, attribute.name.to_ascii_uppercase()))
                        .or_default()
                        .push((source, record.type_name.as_str()));
                }
            }
        }

        let mut derived: Vec<InverseAttributes> = Vec::with_capacity(self.entities.len());
        for (i, record) in self.entities.iter().enumerate() {
            let target = EntityHandle(i);
            let mut inverses = InverseAttributes::new();
            for decl in schema.all_inverses(&record.type_name) {
                let key = (target, decl.source_attribute.to_ascii_uppercase());
                let mut sources: Vec<EntityHandle> = references
                    .get(&key)
                    .map(|refs| {
                        refs.iter()
                            .filter(|(_, ty)| schema.is_subtype_of(ty, &decl.source_type))
                            .map(|(h, _)| *h)
                            .collect()
                    })
                    .unwrap_or_default();
                sources.dedup();
                if !sources.is_empty() {
                    inverses.push((decl.name.clone(), sources));
                }
            }
            derived.push(inverses);
        }

        let mut count = 0;
        for (record, inverses) in self.entities.iter_mut().zip(derived) {
            count += inverses.len();
            record.inverses = inverses;
        }
        debug!("Derived {} inverse attributes over {} entities", count, self.entities.len());
    }

    fn push(&mut self, record: EntityRecord) -> EntityHandle {
        self.entities.push(record);
        EntityHandle(self.entities.len() - 1)
    }

    fn record(&self, handle: EntityHandle) -> Result<&EntityRecord, ModelReadError> {
        self.entities
            .get(handle.0)
            .ok_or(ModelReadError::UnknownHandle(handle))
    }

    fn record_mut(&mut self, handle: EntityHandle) -> Result<&mut EntityRecord, ModelReadError> {
        self.entities
            .get_mut(handle.0)
            .ok_or(ModelReadError::UnknownHandle(handle))
    }
}

impl EntityModel for MemoryModel {
    fn top_level_entities(&self) -> Vec<EntityHandle> {
        self.entities
            .iter()
            .enumerate()
            .filter(|(_, r)| r.key.is_some())
            .map(|(i, _)| EntityHandle(i))
            .collect()
    }

    fn type_name(&self, handle: EntityHandle) -> Result<&str, ModelReadError> {
        Ok(&self.record(handle)?.type_name)
    }

    fn natural_key(&self, handle: EntityHandle) -> Result<Option<NaturalKey>, ModelReadError> {
        Ok(self.record(handle)?.key)
    }

    fn attributes(&self, handle: EntityHandle) -> Result<&[Attribute], ModelReadError> {
        Ok(&self.record(handle)?.attributes)
    }

    fn ancestor_types(&self, handle: EntityHandle) -> Result<Vec<String>, ModelReadError> {
        let record = self.record(handle)?;
        Ok(self
            .ancestors
            .get(&record.type_name)
            .cloned()
            .unwrap_or_default())
    }

    fn inverse_attributes(&self, handle: EntityHandle) -> Result<InverseAttributes, ModelReadError> {
        Ok(self.record(handle)?.inverses.clone())
    }

    fn inline_origin(&self, handle: EntityHandle) -> Result<Option<&InlineOrigin>, ModelReadError> {
        Ok(self.record(handle)?.origin.as_ref())
    }
}
