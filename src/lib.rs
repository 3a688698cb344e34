//! rmtgraph - RM/T object model mapping over a relational store
//!
//! Types are declared with scalar properties, generalization (`extends`) and aggregation
//! (`composes`) and mapped onto relations:
//! - one entity relation `e_<type>` and one property relation `p_<type>` per type
//! - global catalog relations recording the type graph
//! - schema synchronization by column diffing
//! - single-query reads over the whole graph, cascading writes and deletes

pub mod utils;

pub mod backend;
pub mod config;
pub mod errors;
pub mod model_catalog;
pub mod object;
pub mod query_compiler;
pub mod schema_sync;
pub mod sql_generator;
pub mod store;
pub mod write_coordinator;

pub use errors::StoreError;
pub use model_catalog::{PropertyKind, TypeDefinition};
pub use object::{AttrValue, ModelObject};
pub use store::{Model, ModelStore};
