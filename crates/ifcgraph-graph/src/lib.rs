//! IFC Graph - property graph projection for entity models.
//!
//! This crate turns an [`EntityModel`](ifcgraph_model::EntityModel) into
//! labeled nodes and typed relationships. It includes:
//!
//! - **Identity**: stable keys for keyed and anonymous entities
//! - **Projectors**: entity → node and entity → relationships, with pruning
//! - **Builder**: the two-pass protocol (all nodes, then all relationships)
//! - **Storage**: the store adapter plus SQLite, in-memory and Cypher backends
//!
//! # Example
//!
//! ```ignore
//! use ifcgraph_graph::{GraphBuilder, NoProgress, ProjectionConfig, SqliteGraphStore};
//!
//! let store = SqliteGraphStore::open(Path::new("model.db")).await?;
//! let mut builder = GraphBuilder::new(ProjectionConfig::default());
//! let summary = builder.build(&model, &store, &NoProgress).await?;
//! println!("{} nodes, {} relationships", summary.nodes, summary.relationships);
//! ```

pub mod builder;
pub mod cypher;
pub mod error;
pub mod identity;
pub mod memory;
pub mod projector;
pub mod schema;
pub mod storage;

// Re-export commonly used types
pub use builder::{BuildPhase, BuildSummary, GraphBuilder, NoProgress, ProgressSink};
pub use cypher::CypherScriptStore;
pub use error::{BuildError, StoreWriteError};
pub use identity::IdentityResolver;
pub use memory::{MemoryGraphStore, StoreCall};
pub use projector::{
    InverseDirection, NodeProjector, ProjectedRelationships, ProjectionConfig,
    RelationshipProjector,
};
pub use schema::{GraphNode, GraphRelationship, Identity, Node, Relationship};
pub use storage::{GraphStoreAdapter, SqliteGraphStore};
