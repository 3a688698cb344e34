use thiserror::Error;

use crate::backend::BackendError;

/// Failures while bringing a property relation in line with its type.
///
/// Every variant is fatal for the type being synchronized.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SchemaSyncError {
    #[error("Failed to create relation `{table}`: {source}")]
    CreateRelation { table: String, source: BackendError },

    #[error("Failed to read columns of `{table}`: {source}")]
    Introspection { table: String, source: BackendError },

    #[error("Unexpected column metadata for `{table}`: {message}")]
    MalformedColumn { table: String, message: String },

    #[error("Migration step `{step}` failed: {source}")]
    Step { step: String, source: BackendError },
}
