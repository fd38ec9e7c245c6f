//! Property graph records.
//!
//! - `Identity`: the unique key of a node across a whole run
//! - `Node`: labels plus scalar properties, upserted by identity
//! - `Relationship`: a typed directed edge between two identities
//! - `GraphNode` / `GraphRelationship`: the stored forms read back from SQLite

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Property holding the node's own type name.
pub const INSTANCE_OF: &str = "__instance_of";
/// Property holding the node's identity string.
pub const IDENTITY: &str = "__identity";
/// Property holding the model's natural key, when the entity has one.
pub const NATURAL_KEY: &str = "__natural_key";

/// Property keys the projector writes itself. They take precedence over
/// literal attributes with the same name.
pub const RESERVED_KEYS: [&str; 3] = [INSTANCE_OF, IDENTITY, NATURAL_KEY];

pub type Properties = serde_json::Map<String, serde_json::Value>;

/// Stable node key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identity {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Identity {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A node ready to be upserted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub identity: Identity,
    pub labels: BTreeSet<String>,
    pub properties: Properties,
}

impl Node {
    pub fn new(identity: Identity) -> Self {
        Self {
            identity,
            labels: BTreeSet::new(),
            properties: Properties::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.labels.insert(label.into());
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Properties without the reserved keys.
    pub fn attribute_properties(&self) -> Properties {
        self.properties
            .iter()
            .filter(|(k, _)| !RESERVED_KEYS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// A relationship between two existing nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub source: Identity,
    pub target: Identity,
    pub rel_type: String,
    #[serde(default)]
    pub properties: Properties,
}

impl Relationship {
    pub fn new(source: Identity, target: Identity, rel_type: impl Into<String>) -> Self {
        Self {
            source,
            target,
            rel_type: rel_type.into(),
            properties: Properties::new(),
        }
    }
}

impl fmt::Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})-[{}]->({})", self.source, self.rel_type, self.target)
    }
}

/// A node as stored in the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    pub identity: Identity,
    pub labels: BTreeSet<String>,
    pub properties: Properties,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

/// A relationship as stored in the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphRelationship {
    pub id: i64,
    pub source: Identity,
    pub target: Identity,
    pub rel_type: String,
    pub properties: Properties,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_serializes_as_string() {
        let id = Identity::new("12/Placement/0");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"12/Placement/0\"");
        assert_eq!(id.to_string(), "12/Placement/0");
    }

    #[test]
    fn test_attribute_properties_drop_reserved() {
        let node = Node::new(Identity::from("5"))
            .with_label("Wall")
            .with_property("Name", "Wall-1")
            .with_property(INSTANCE_OF, "Wall")
            .with_property(NATURAL_KEY, 5);
        let props = node.attribute_properties();
        assert_eq!(props.len(), 1);
        assert_eq!(props["Name"], "Wall-1");
    }

    #[test]
    fn test_relationship_display() {
        let rel = Relationship::new("9".into(), "10".into(), "Children");
        assert_eq!(rel.to_string(), "(9)-[Children]->(10)");
    }
}
