//! # Model Catalog Error Types
//!
//! Errors raised while turning type declarations into [`super::TypeGraph`]s and while
//! recording the structural edges in the global catalog relations.
//!
//! ## Error Categories
//!
//! - **Definition Errors**: invalid names, reserved or duplicate properties, colliding
//!   accessors, references to unknown types, cyclic generalization/aggregation
//! - **Catalog Errors**: bootstrap or edge bookkeeping failures in the backend
//! - **Configuration Errors**: YAML model file I/O and parsing
//!
//! All of them are fatal for the type being registered: a type never becomes ready while
//! its declaration or its catalog rows are inconsistent.

use thiserror::Error;

use crate::backend::BackendError;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ModelSchemaError {
    #[error("Invalid type name `{name}` (expected an identifier of at most {max} characters)")]
    InvalidTypeName { name: String, max: usize },

    #[error("Invalid property name `{property}` on type `{type_name}` (expected a lower-case identifier)")]
    InvalidPropertyName { type_name: String, property: String },

    #[error("Property `{property}` on type `{type_name}` uses a reserved column name")]
    ReservedProperty { type_name: String, property: String },

    #[error("Property `{property}` is declared twice on type `{type_name}`")]
    DuplicateProperty { type_name: String, property: String },

    #[error("Empty generalization label on `{sub}` extends `{sup}`")]
    EmptyLabel { sup: String, sub: String },

    #[error("Type `{sub}` extends `{sup}` more than once")]
    DuplicateAncestor { sup: String, sub: String },

    #[error("Type `{owner}` composes `{part}` more than once")]
    DuplicatePart { owner: String, part: String },

    #[error("Name `{name}` on type `{type_name}` is used by more than one property, part or ancestor")]
    AccessorCollision { type_name: String, name: String },

    #[error("Type `{referenced}` referenced by `{type_name}` has not been defined")]
    UnknownType {
        type_name: String,
        referenced: String,
    },

    #[error("Cyclic type definition: {path}")]
    CyclicDefinition { path: String },

    #[error("Failed to read model configuration: {error}")]
    ConfigReadError { error: String },

    #[error("Failed to parse model configuration: {error}")]
    ConfigParseError { error: String },
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum CatalogError {
    #[error("Catalog bootstrap failed: {source}")]
    Bootstrap { source: BackendError },

    #[error("Failed to record catalog entries for `{type_name}`: {source}")]
    Record {
        type_name: String,
        source: BackendError,
    },

    #[error("Failed to read catalog relation `{table}`: {source}")]
    Read { table: String, source: BackendError },

    #[error("Malformed catalog row in `{table}`: {message}")]
    MalformedRow { table: String, message: String },
}
