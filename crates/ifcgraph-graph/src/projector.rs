//! Entity → node and entity → relationship projection.
//!
//! `NodeProjector` turns an entity into labels plus literal properties.
//! `RelationshipProjector` enumerates the edges an entity contributes:
//! forward references, aggregate elements and inverse attributes, in that
//! order, minus the edges removed by the history pruning rule.

use std::str::FromStr;

use ifcgraph_model::{AttributeKind, EntityHandle, EntityModel, ModelReadError};
use serde::{Deserialize, Serialize};

use crate::identity::IdentityResolver;
use crate::schema::{Node, Relationship, IDENTITY, INSTANCE_OF, NATURAL_KEY};

/// Direction of relationships derived from inverse attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InverseDirection {
    /// `(entity)-[Inverse]->(referencing entity)`.
    #[default]
    Outgoing,
    /// `(referencing entity)-[Inverse]->(entity)`.
    Incoming,
}

impl InverseDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            InverseDirection::Outgoing => "outgoing",
            InverseDirection::Incoming => "incoming",
        }
    }
}

impl FromStr for InverseDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "outgoing" => Ok(InverseDirection::Outgoing),
            "incoming" => Ok(InverseDirection::Incoming),
            other => Err(format!("unknown inverse direction: {} (expected outgoing or incoming)", other)),
        }
    }
}

/// Projection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionConfig {
    /// Add every ancestor type as a label.
    pub include_hierarchy: bool,
    /// Referenced by almost everything; edges into it are pruned.
    pub history_type: String,
    /// The one type still allowed to point at `history_type`.
    pub root_type: String,
    pub inverse_direction: InverseDirection,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            include_hierarchy: false,
            history_type: "IfcOwnerHistory".to_string(),
            root_type: "IfcProject".to_string(),
            inverse_direction: InverseDirection::Outgoing,
        }
    }
}

impl ProjectionConfig {
    /// Whether an edge from `source_type` into `target_type` is suppressed.
    pub fn is_pruned(&self, source_type: &str, target_type: &str) -> bool {
        target_type.eq_ignore_ascii_case(&self.history_type)
            && !source_type.eq_ignore_ascii_case(&self.root_type)
    }
}

/// Projects entities into [`Node`] records.
pub struct NodeProjector<'a, M: EntityModel + ?Sized> {
    model: &'a M,
    identities: IdentityResolver<'a, M>,
    include_hierarchy: bool,
}

impl<'a, M: EntityModel + ?Sized> NodeProjector<'a, M> {
    pub fn new(model: &'a M, config: &ProjectionConfig) -> Self {
        Self {
            model,
            identities: IdentityResolver::new(model),
            include_hierarchy: config.include_hierarchy,
        }
    }

    /// Labels are the entity type (plus ancestors when hierarchy labels are
    /// on). Properties are the non-null literal attributes followed by the
    /// reserved keys, which overwrite any attribute of the same name.
    pub fn project_node(&self, handle: EntityHandle) -> Result<Node, ModelReadError> {
        let type_name = self.model.type_name(handle)?;
        let identity = self.identities.identity_of(handle)?;
        let natural_key = self.model.natural_key(handle)?;

        let mut node = Node::new(identity.clone()).with_label(type_name);
        if self.include_hierarchy {
            node.labels.extend(self.model.ancestor_types(handle)?);
        }

        for attribute in self.model.attributes(handle)? {
            if let AttributeKind::Literal(value) = &attribute.kind {
                let json = value.to_json();
                if !json.is_null() {
                    node.properties.insert(attribute.name.clone(), json);
                }
            }
        }

        node.properties.insert(INSTANCE_OF.to_string(), type_name.into());
        node.properties.insert(IDENTITY.to_string(), identity.as_str().into());
        match natural_key {
            Some(key) => {
                node.properties.insert(NATURAL_KEY.to_string(), key.get().into());
            }
            None => {
                node.properties.remove(NATURAL_KEY);
            }
        }

        Ok(node)
    }
}

/// Relationships contributed by one entity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectedRelationships {
    pub relationships: Vec<Relationship>,
    /// Edges removed by the pruning rule, kept for reporting.
    pub pruned: Vec<Relationship>,
}

/// Projects entities into [`Relationship`] records.
pub struct RelationshipProjector<'a, M: EntityModel + ?Sized> {
    model: &'a M,
    identities: IdentityResolver<'a, M>,
    config: &'a ProjectionConfig,
}

impl<'a, M: EntityModel + ?Sized> RelationshipProjector<'a, M> {
    pub fn new(model: &'a M, config: &'a ProjectionConfig) -> Self {
        Self {
            model,
            identities: IdentityResolver::new(model),
            config,
        }
    }

    /// All relationships of `handle`: attribute declaration order first,
    /// then inverse attributes. Unresolved references are skipped.
    pub fn project_relationships(
        &self,
        handle: EntityHandle,
    ) -> Result<ProjectedRelationships, ModelReadError> {
        let mut out = ProjectedRelationships::default();

        for attribute in self.model.attributes(handle)? {
            match &attribute.kind {
                AttributeKind::Literal(_) | AttributeKind::Derived => {}
                AttributeKind::EntityRef(target) => {
                    if let Some(target) = target {
                        self.push(&mut out, handle, *target, &attribute.name)?;
                    }
                }
                AttributeKind::AggregateRef(elements) => {
                    for target in elements.iter().flatten() {
                        self.push(&mut out, handle, *target, &attribute.name)?;
                    }
                }
            }
        }

        for (name, referencing) in self.model.inverse_attributes(handle)? {
            for other in referencing {
                match self.config.inverse_direction {
                    InverseDirection::Outgoing => self.push(&mut out, handle, other, &name)?,
                    InverseDirection::Incoming => self.push(&mut out, other, handle, &name)?,
                }
            }
        }

        Ok(out)
    }

    /// Anonymous entities referenced directly by `handle`, with the
    /// attribute that holds them, in attribute and element order.
    pub fn anonymous_children(
        &self,
        handle: EntityHandle,
    ) -> Result<Vec<(String, EntityHandle)>, ModelReadError> {
        let mut children = Vec::new();
        for attribute in self.model.attributes(handle)? {
            let targets: Vec<EntityHandle> = match &attribute.kind {
                AttributeKind::EntityRef(Some(t)) => vec![*t],
                AttributeKind::AggregateRef(elements) => elements.iter().flatten().copied().collect(),
                _ => continue,
            };
            for target in targets {
                if self.identities.is_anonymous(target)? {
                    children.push((attribute.name.clone(), target));
                }
            }
        }
        Ok(children)
    }

    /// The single relationship `(source)-[rel_type]->(target)`, or `None`
    /// when the pruning rule removes it.
    pub fn relationship(
        &self,
        source: EntityHandle,
        target: EntityHandle,
        rel_type: &str,
    ) -> Result<Option<Relationship>, ModelReadError> {
        let (relationship, pruned) = self.edge(source, target, rel_type)?;
        Ok((!pruned).then_some(relationship))
    }

    fn push(
        &self,
        out: &mut ProjectedRelationships,
        source: EntityHandle,
        target: EntityHandle,
        rel_type: &str,
    ) -> Result<(), ModelReadError> {
        let (relationship, pruned) = self.edge(source, target, rel_type)?;
        if pruned {
            out.pruned.push(relationship);
        } else {
            out.relationships.push(relationship);
        }
        Ok(())
    }

    fn edge(
        &self,
        source: EntityHandle,
        target: EntityHandle,
        rel_type: &str,
    ) -> Result<(Relationship, bool), ModelReadError> {
        let pruned = self
            .config
            .is_pruned(self.model.type_name(source)?, self.model.type_name(target)?);
        let relationship = Relationship::new(
            self.identities.identity_of(source)?,
            self.identities.identity_of(target)?,
            rel_type,
        );
        Ok((relationship, pruned))
    }
}
