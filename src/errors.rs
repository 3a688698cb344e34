//! # Store Error Types
//!
//! Top-level error returned by [`crate::store::ModelStore`] and [`crate::store::Model`].
//! Lower layers keep their own enums; they are wrapped here unchanged so callers can still
//! match on the precise cause.
//!
//! ## Error Categories
//!
//! - **Definition**: declaration, catalog or migration failures. The type never becomes
//!   ready.
//! - **Programming errors**: a part of the wrong type, a value of the wrong kind, an
//!   existing object without its surrogate. Fail fast, never retried.
//! - **Backend**: any statement failure during reads or writes, surfaced as-is. A failed
//!   cascade reports the first failing sub-operation and undoes nothing.
//!
//! Not-found on lookup is not an error: `get` returns `Ok(None)`.

use thiserror::Error;
use uuid::Uuid;

use crate::backend::BackendError;
use crate::model_catalog::{CatalogError, ModelSchemaError};
use crate::query_compiler::{CompileError, MaterializeError};
use crate::schema_sync::{SchemaSyncError, SyncState};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    #[error(transparent)]
    Schema(#[from] ModelSchemaError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Sync(#[from] SchemaSyncError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Materialize(#[from] MaterializeError),

    #[error("Type `{type_name}` has not been defined")]
    UnknownType { type_name: String },

    #[error("Type `{type_name}` is not ready (state: {state:?})")]
    NotReady { type_name: String, state: SyncState },

    #[error("Expected an instance of `{expected}`, got `{found}`")]
    TypeMismatch { expected: String, found: String },

    #[error("Part `{accessor}` of `{owner}` must be a `{expected}`, got {found}")]
    PartTypeMismatch {
        owner: String,
        accessor: String,
        expected: String,
        found: String,
    },

    #[error("Invalid value for `{type_name}.{attribute}`: {message}")]
    InvalidValue {
        type_name: String,
        attribute: String,
        message: String,
    },

    #[error("Persisted `{type_name}` instance has no surrogate")]
    MissingSurrogate { type_name: String },

    #[error("Lookup of `{type_name}` id {id} returned {count} rows")]
    MultipleRows {
        type_name: String,
        id: i64,
        count: usize,
    },

    #[error("No `{type_name}` row with surrogate {surrogate}; it was deleted or never saved")]
    StaleObject { type_name: String, surrogate: Uuid },
}
