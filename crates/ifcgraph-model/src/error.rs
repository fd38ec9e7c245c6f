use std::path::PathBuf;

use thiserror::Error;

use crate::model::EntityHandle;

/// Failure to read entities out of a model.
///
/// Dangling references are not errors: they load as unresolved and the
/// projectors skip them.
#[derive(Debug, Error)]
pub enum ModelReadError {
    #[error("entity handle {0} does not belong to this model")]
    UnknownHandle(EntityHandle),

    #[error("anonymous entity {0} has no recorded origin")]
    MissingOrigin(EntityHandle),

    #[error("entity #{key} of type {type_name} has {found} arguments, schema declares {expected}")]
    ArityMismatch {
        key: u64,
        type_name: String,
        expected: usize,
        found: usize,
    },

    #[error("duplicate entity #{0}")]
    DuplicateKey(u64),

    #[error("entity key must be positive, got {0}")]
    InvalidKey(u64),

    #[error("parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("invalid schema: {0}")]
    Schema(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
