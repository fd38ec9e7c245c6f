//! In-memory graph store.
//!
//! Keeps every node and relationship in `tokio::sync::RwLock` collections
//! and records each write in order, so tests and dry runs can inspect
//! exactly what a build issued.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::StoreWriteError;
use crate::schema::{Identity, Node, Relationship};
use crate::storage::GraphStoreAdapter;

/// One write, as issued.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    UpsertNode(Node),
    CreateRelationship(Relationship),
}

#[derive(Debug, Default)]
struct MemoryState {
    nodes: Vec<Node>,
    index: HashMap<Identity, usize>,
    relationships: Vec<Relationship>,
    calls: Vec<StoreCall>,
}

#[derive(Debug, Default)]
pub struct MemoryGraphStore {
    state: RwLock<MemoryState>,
    rejected: HashSet<Identity>,
}

impl MemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that refuses to upsert `identity`.
    pub fn rejecting(identity: impl Into<Identity>) -> Self {
        let mut store = Self::default();
        store.rejected.insert(identity.into());
        store
    }

    /// Stored nodes in first-upsert order.
    pub async fn nodes(&self) -> Vec<Node> {
        self.state.read().await.nodes.clone()
    }

    pub async fn node(&self, identity: &str) -> Option<Node> {
        let state = self.state.read().await;
        state
            .index
            .get(&Identity::from(identity))
            .map(|&i| state.nodes[i].clone())
    }

    pub async fn relationships(&self) -> Vec<Relationship> {
        self.state.read().await.relationships.clone()
    }

    /// Every write in the order it was issued.
    pub async fn calls(&self) -> Vec<StoreCall> {
        self.state.read().await.calls.clone()
    }

    pub async fn node_count(&self) -> usize {
        self.state.read().await.nodes.len()
    }

    pub async fn relationship_count(&self) -> usize {
        self.state.read().await.relationships.len()
    }
}

#[async_trait]
impl GraphStoreAdapter for MemoryGraphStore {
    async fn upsert_node(&self, node: &Node) -> Result<(), StoreWriteError> {
        if self.rejected.contains(&node.identity) {
            return Err(StoreWriteError::Rejected(format!(
                "node {} is not accepted by this store",
                node.identity
            )));
        }

        let mut state = self.state.write().await;
        state.calls.push(StoreCall::UpsertNode(node.clone()));
        match state.index.get(&node.identity).copied() {
            Some(i) => {
                let stored = &mut state.nodes[i];
                stored.labels.extend(node.labels.iter().cloned());
                stored
                    .properties
                    .extend(node.properties.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
            None => {
                let i = state.nodes.len();
                state.nodes.push(node.clone());
                state.index.insert(node.identity.clone(), i);
            }
        }
        Ok(())
    }

    async fn create_relationship(&self, relationship: &Relationship) -> Result<(), StoreWriteError> {
        let mut state = self.state.write().await;
        for endpoint in [&relationship.source, &relationship.target] {
            if !state.index.contains_key(endpoint) {
                return Err(StoreWriteError::MissingEndpoint {
                    identity: endpoint.clone(),
                    rel_type: relationship.rel_type.clone(),
                });
            }
        }
        state
            .calls
            .push(StoreCall::CreateRelationship(relationship.clone()));
        state.relationships.push(relationship.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upsert_merges_by_identity() {
        let store = MemoryGraphStore::new();
        store
            .upsert_node(&Node::new("5".into()).with_label("Wall").with_property("Name", "a"))
            .await
            .unwrap();
        store
            .upsert_node(&Node::new("5".into()).with_label("Element").with_property("Name", "b"))
            .await
            .unwrap();

        assert_eq!(store.node_count().await, 1);
        assert_eq!(store.calls().await.len(), 2);
        let node = store.node("5").await.unwrap();
        assert_eq!(node.labels.len(), 2);
        assert_eq!(node.properties["Name"], "b");
    }

    #[tokio::test]
    async fn test_relationship_needs_endpoints() {
        let store = MemoryGraphStore::new();
        store.upsert_node(&Node::new("1".into())).await.unwrap();

        let err = store
            .create_relationship(&Relationship::new("1".into(), "2".into(), "Next"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreWriteError::MissingEndpoint { .. }));
        assert!(store.relationships().await.is_empty());
    }

    #[tokio::test]
    async fn test_rejecting_store() {
        let store = MemoryGraphStore::rejecting("7");
        let err = store.upsert_node(&Node::new("7".into())).await.unwrap_err();
        assert!(matches!(err, StoreWriteError::Rejected(_)));
        assert!(store.calls().await.is_empty());
    }
}
