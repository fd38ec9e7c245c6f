use ifcgraph_model::{EntityHandle, ModelReadError};
use thiserror::Error;

use crate::builder::BuildPhase;
use crate::schema::Identity;

/// A graph store rejected a write.
#[derive(Debug, Error)]
pub enum StoreWriteError {
    #[error("relationship {rel_type} references missing node {identity}")]
    MissingEndpoint { identity: Identity, rel_type: String },

    #[error("store rejected write: {0}")]
    Rejected(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("failed to encode properties: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed to write script: {0}")]
    Io(#[from] std::io::Error),
}

/// Why a build run stopped. None of these are recovered internally.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    ModelRead(#[from] ModelReadError),

    #[error(transparent)]
    StoreWrite(#[from] StoreWriteError),

    /// A relationship endpoint was never upserted in the node pass. This is
    /// a bug in identity assignment or ordering, not bad input data.
    #[error("integrity violation: {source_id}-[{rel_type}]->{target_id} references {missing}, which was never upserted")]
    IntegrityViolation {
        source_id: Identity,
        target_id: Identity,
        rel_type: String,
        missing: Identity,
    },

    /// Two different entities resolved to the same identity.
    #[error("identity {identity} is shared by entities {first} and {second}")]
    IdentityCollision {
        identity: Identity,
        first: EntityHandle,
        second: EntityHandle,
    },

    #[error("builder already ran (state: {0})")]
    AlreadyStarted(BuildPhase),
}
