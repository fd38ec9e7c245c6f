//! IFC Graph Model - typed entity models for graph projection.
//!
//! This crate provides the read side of the ifcgraph pipeline:
//!
//! - **Model**: the [`EntityModel`] capability the graph builder consumes
//! - **Schema**: entity type descriptors (attribute order, supertypes, inverses)
//! - **Readers**: STEP physical files and JSON model documents
//!
//! # Example
//!
//! ```ignore
//! use ifcgraph_model::{step, EntityModel, Schema};
//!
//! let schema = Schema::ifc_core()?;
//! let model = step::load(&std::fs::read_to_string("house.ifc")?, &schema)?;
//! for handle in model.top_level_entities() {
//!     println!("{} {}", handle, model.type_name(handle)?);
//! }
//! ```

pub mod document;
pub mod error;
pub mod memory;
pub mod model;
pub mod schema;
pub mod step;
pub mod value;

// Re-export commonly used types
pub use document::ModelDocument;
pub use error::ModelReadError;
pub use memory::MemoryModel;
pub use model::{
    Attribute, AttributeKind, EntityHandle, EntityModel, InlineOrigin, InverseAttributes,
    NaturalKey,
};
pub use schema::{AttributeDecl, AttributeRole, EntityType, InverseDecl, Schema};
pub use value::Value;
