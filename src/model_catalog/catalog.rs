//! Global catalog relations.
//!
//! Three relations record the type graph itself:
//!
//! | relation | columns | meaning |
//! |---|---|---|
//! | `<prefix>ugi` | `sup, label, sub` | generalization edges |
//! | `<prefix>ag`  | `sup, sub` | aggregation edges (owner, part) |
//! | `<prefix>pg`  | `sup, sub` | type to property relation mapping |
//!
//! All three are keyed by `(sup, sub)`. Bootstrap runs at most once per [`Catalog`]; every
//! (re)registration of a type first clears the rows that type owns and then inserts them
//! again, so repeated registration never duplicates an edge.

use futures_util::future::try_join_all;
use std::sync::Arc;
use tokio::sync::OnceCell;

use super::errors::CatalogError;
use super::type_graph::TypeGraph;
use crate::backend::{Row, SqlExecutor};
use crate::sql_generator::{
    ColumnDef, ColumnRef, CreateTable, Delete, Insert, Select, SelectItem, SqlType, SqlValue,
    Statement, TableRef,
};

pub const DEFAULT_CATALOG_PREFIX: &str = "rmt_";

/// Names of the three catalog relations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogTables {
    pub generalization: String,
    pub aggregation: String,
    pub relation_mapping: String,
}

impl CatalogTables {
    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            generalization: format!("{}ugi", prefix),
            aggregation: format!("{}ag", prefix),
            relation_mapping: format!("{}pg", prefix),
        }
    }
}

impl Default for CatalogTables {
    fn default() -> Self {
        Self::with_prefix(DEFAULT_CATALOG_PREFIX)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneralizationEdge {
    pub sup: String,
    pub label: String,
    pub sub: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationEdge {
    pub owner: String,
    pub part: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationMapping {
    pub type_name: String,
    pub relation: String,
}

pub struct Catalog {
    executor: Arc<dyn SqlExecutor>,
    tables: CatalogTables,
    bootstrapped: OnceCell<()>,
}

impl Catalog {
    pub fn new(executor: Arc<dyn SqlExecutor>, tables: CatalogTables) -> Self {
        Self {
            executor,
            tables,
            bootstrapped: OnceCell::new(),
        }
    }

    pub fn tables(&self) -> &CatalogTables {
        &self.tables
    }

    pub fn is_bootstrapped(&self) -> bool {
        self.bootstrapped.initialized()
    }

    /// Create the catalog relations if absent.
    ///
    /// Concurrent callers wait on the same initialization; a failed bootstrap leaves the
    /// gate open so the next caller retries.
    pub async fn ensure_bootstrapped(&self) -> Result<(), CatalogError> {
        self.bootstrapped
            .get_or_try_init(|| async {
                log::info!(
                    "Bootstrapping catalog relations: {}, {}, {}",
                    self.tables.generalization,
                    self.tables.aggregation,
                    self.tables.relation_mapping
                );
                let creates = [
                    edge_table(&self.tables.generalization, true),
                    edge_table(&self.tables.aggregation, false),
                    edge_table(&self.tables.relation_mapping, false),
                ];
                try_join_all(creates.iter().map(|stmt| self.executor.execute(stmt)))
                    .await
                    .map_err(|source| CatalogError::Bootstrap { source })?;
                Ok(())
            })
            .await
            .map(|_| ())
    }

    /// Reset-then-insert every catalog row owned by `graph`
    pub async fn register(&self, graph: &TypeGraph) -> Result<(), CatalogError> {
        self.ensure_bootstrapped().await?;
        self.reset(graph.name()).await?;

        let mut inserts = Vec::new();
        for ancestor in graph.ancestors() {
            inserts.push(self.generalization_insert(
                ancestor.graph.name(),
                &ancestor.label,
                graph.name(),
            ));
        }
        for part in graph.parts() {
            inserts.push(self.composition_insert(graph.name(), part.graph.name()));
        }
        inserts.push(self.mapping_insert(graph.name(), &graph.property_relation()));

        log::debug!(
            "Recording {} catalog rows for type {}",
            inserts.len(),
            graph.name()
        );
        self.run_all(graph.name(), &inserts).await
    }

    /// Remove every row the type owns: generalization edges where it is the sub-type,
    /// aggregation edges and relation mappings where it is the owner
    pub async fn reset(&self, type_name: &str) -> Result<(), CatalogError> {
        let key = SqlValue::Text(type_name.to_string());
        let deletes = [
            delete_by(&self.tables.generalization, "sub", key.clone()),
            delete_by(&self.tables.aggregation, "sup", key.clone()),
            delete_by(&self.tables.relation_mapping, "sup", key),
        ];
        self.run_all(type_name, &deletes).await
    }

    pub async fn record_generalization(
        &self,
        sup: &str,
        label: &str,
        sub: &str,
    ) -> Result<(), CatalogError> {
        self.run_all(sub, &[self.generalization_insert(sup, label, sub)])
            .await
    }

    pub async fn record_composition(&self, owner: &str, part: &str) -> Result<(), CatalogError> {
        self.run_all(owner, &[self.composition_insert(owner, part)])
            .await
    }

    pub async fn generalizations(&self) -> Result<Vec<GeneralizationEdge>, CatalogError> {
        let table = &self.tables.generalization;
        self.read(table, &["sup", "label", "sub"])
            .await?
            .iter()
            .map(|row| {
                Ok(GeneralizationEdge {
                    sup: text(table, row, "sup")?,
                    label: text(table, row, "label")?,
                    sub: text(table, row, "sub")?,
                })
            })
            .collect()
    }

    pub async fn compositions(&self) -> Result<Vec<AggregationEdge>, CatalogError> {
        let table = &self.tables.aggregation;
        self.read(table, &["sup", "sub"])
            .await?
            .iter()
            .map(|row| {
                Ok(AggregationEdge {
                    owner: text(table, row, "sup")?,
                    part: text(table, row, "sub")?,
                })
            })
            .collect()
    }

    pub async fn relation_mappings(&self) -> Result<Vec<RelationMapping>, CatalogError> {
        let table = &self.tables.relation_mapping;
        self.read(table, &["sup", "sub"])
            .await?
            .iter()
            .map(|row| {
                Ok(RelationMapping {
                    type_name: text(table, row, "sup")?,
                    relation: text(table, row, "sub")?,
                })
            })
            .collect()
    }

    fn generalization_insert(&self, sup: &str, label: &str, sub: &str) -> Statement {
        edge_insert(
            &self.tables.generalization,
            &[("sup", sup), ("label", label), ("sub", sub)],
        )
    }

    fn composition_insert(&self, owner: &str, part: &str) -> Statement {
        edge_insert(&self.tables.aggregation, &[("sup", owner), ("sub", part)])
    }

    fn mapping_insert(&self, type_name: &str, relation: &str) -> Statement {
        edge_insert(
            &self.tables.relation_mapping,
            &[("sup", type_name), ("sub", relation)],
        )
    }

    async fn run_all(&self, type_name: &str, statements: &[Statement]) -> Result<(), CatalogError> {
        try_join_all(statements.iter().map(|stmt| self.executor.execute(stmt)))
            .await
            .map_err(|source| CatalogError::Record {
                type_name: type_name.to_string(),
                source,
            })?;
        Ok(())
    }

    async fn read(&self, table: &str, columns: &[&str]) -> Result<Vec<Row>, CatalogError> {
        let select = Statement::Select(Select {
            from: TableRef::new(table, "c0"),
            joins: Vec::new(),
            items: columns
                .iter()
                .map(|c| SelectItem {
                    column: ColumnRef::new("c0", *c),
                    alias: c.to_string(),
                })
                .collect(),
            filter: None,
            order_by: vec![ColumnRef::new("c0", "sup"), ColumnRef::new("c0", "sub")],
        });
        self.executor
            .execute(&select)
            .await
            .map(|result| result.rows)
            .map_err(|source| CatalogError::Read {
                table: table.to_string(),
                source,
            })
    }
}

fn edge_table(table: &str, labelled: bool) -> Statement {
    let mut columns = vec![ColumnDef::new("sup", SqlType::Text)];
    if labelled {
        columns.push(ColumnDef::new("label", SqlType::Text));
    }
    columns.push(ColumnDef::new("sub", SqlType::Text));
    Statement::CreateTable(CreateTable {
        table: table.to_string(),
        columns,
        primary_key: vec!["sup".to_string(), "sub".to_string()],
        if_not_exists: true,
    })
}

fn edge_insert(table: &str, values: &[(&str, &str)]) -> Statement {
    Statement::Insert(Insert {
        table: table.to_string(),
        columns: values.iter().map(|(c, _)| c.to_string()).collect(),
        values: values
            .iter()
            .map(|(_, v)| SqlValue::Text(v.to_string()))
            .collect(),
        returning: Vec::new(),
        on_conflict_do_nothing: true,
    })
}

fn delete_by(table: &str, column: &str, value: SqlValue) -> Statement {
    Statement::Delete(Delete {
        table: table.to_string(),
        key_column: column.to_string(),
        key_value: value,
    })
}

fn text(table: &str, row: &Row, column: &str) -> Result<String, CatalogError> {
    row.get(column)
        .and_then(SqlValue::as_text)
        .map(str::to_string)
        .ok_or_else(|| CatalogError::MalformedRow {
            table: table.to_string(),
            message: format!("column `{}` is missing or not text", column),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryExecutor;
    use crate::model_catalog::registry::TypeRegistry;
    use crate::model_catalog::type_graph::{PropertyKind, TypeDefinition};

    #[tokio::test]
    async fn test_bootstrap_runs_once() {
        let db = Arc::new(MemoryExecutor::new());
        let catalog = Catalog::new(db.clone(), CatalogTables::default());

        let (a, b) = tokio::join!(catalog.ensure_bootstrapped(), catalog.ensure_bootstrapped());
        a.unwrap();
        b.unwrap();
        catalog.ensure_bootstrapped().await.unwrap();

        assert!(catalog.is_bootstrapped());
        assert_eq!(db.statements().len(), 3);
        assert_eq!(
            db.table_names(),
            vec!["rmt_ag".to_string(), "rmt_pg".to_string(), "rmt_ugi".to_string()]
        );
    }

    #[tokio::test]
    async fn test_reregistration_does_not_duplicate_edges() {
        let db = Arc::new(MemoryExecutor::new());
        let catalog = Catalog::new(db.clone(), CatalogTables::with_prefix("t_"));

        let mut registry = TypeRegistry::new();
        let wheel_def =
            TypeDefinition::new("Wheel").property("circumference", PropertyKind::String);
        let wheel = Arc::new(registry.resolve(&wheel_def).unwrap());
        registry.insert(wheel.clone());
        let vehicle = Arc::new(
            registry
                .resolve(&TypeDefinition::new("Vehicle").composes(["Wheel"]))
                .unwrap(),
        );
        registry.insert(vehicle.clone());
        let car = registry
            .resolve(&TypeDefinition::new("Car").extends("is-a", "Vehicle"))
            .unwrap();

        for _ in 0..3 {
            catalog.register(&wheel).await.unwrap();
            catalog.register(&vehicle).await.unwrap();
            catalog.register(&car).await.unwrap();
        }

        assert_eq!(
            catalog.generalizations().await.unwrap(),
            vec![GeneralizationEdge {
                sup: "Vehicle".to_string(),
                label: "is-a".to_string(),
                sub: "Car".to_string(),
            }]
        );
        assert_eq!(
            catalog.compositions().await.unwrap(),
            vec![AggregationEdge {
                owner: "Vehicle".to_string(),
                part: "Wheel".to_string(),
            }]
        );
        let mappings = catalog.relation_mappings().await.unwrap();
        assert_eq!(mappings.len(), 3);
        assert!(mappings
            .iter()
            .all(|m| m.relation == format!("p_{}", m.type_name.to_lowercase())));
    }

    #[tokio::test]
    async fn test_record_helpers_ignore_duplicates() {
        let db = Arc::new(MemoryExecutor::new());
        let catalog = Catalog::new(db.clone(), CatalogTables::default());
        catalog.ensure_bootstrapped().await.unwrap();

        catalog.record_generalization("Vehicle", "is-a", "Car").await.unwrap();
        catalog.record_generalization("Vehicle", "is-a", "Car").await.unwrap();
        catalog.record_composition("Vehicle", "Engine").await.unwrap();
        catalog.record_composition("Vehicle", "Engine").await.unwrap();

        assert_eq!(db.row_count("rmt_ugi"), 1);
        assert_eq!(db.row_count("rmt_ag"), 1);
    }
}
