pub mod catalog;
pub mod config;
pub mod errors;
pub mod registry;
pub mod type_graph;

pub use catalog::{
    AggregationEdge, Catalog, CatalogTables, GeneralizationEdge, RelationMapping,
    DEFAULT_CATALOG_PREFIX,
};
pub use config::{ExtendsConfig, ModelSchemaConfig, TypeConfig};
pub use errors::{CatalogError, ModelSchemaError};
pub use registry::TypeRegistry;
pub use type_graph::{
    AncestorRef, ExtendsDecl, PartRef, Property, PropertyKind, TypeDefinition, TypeGraph,
    ID_COLUMN, SURROGATE_COLUMN,
};
