//! Writes and deletes across every relation a type hierarchy touches.
//!
//! A save is planned from the type's generalization chain, in which every ancestor appears
//! once even when several `extends` paths lead to it:
//!
//! 1. every new composed part declared on any level of the chain is saved (recursively),
//!    once per accessor, and its surrogate becomes the value of the reference column
//! 2. every ancestor level gets its property row inserted (create) or updated by surrogate
//!    (update), all carrying the object's surrogate
//! 3. after both complete, the type's own entity and property rows are written
//!
//! Part saves run concurrently, as do ancestor level writes. There is no transaction around
//! the cascade: when a sub-operation fails, the error is reported and rows already written
//! stay in place.

pub mod values;

use futures_util::future::{try_join_all, BoxFuture, FutureExt};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

use crate::backend::SqlExecutor;
use crate::errors::StoreError;
use crate::model_catalog::{PartRef, TypeGraph, ID_COLUMN, SURROGATE_COLUMN};
use crate::object::{AttrValue, ModelObject};
use crate::query_compiler::{materialize, CompiledQuery};
use crate::sql_generator::{Delete, Insert, SqlValue, Statement, Update};

pub use values::property_value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SaveMode {
    Create,
    Update,
}

/// Outcome of preparing one composed part
enum PartOutcome {
    Saved(String, ModelObject),
    Referenced(String, Uuid),
    Cleared(String),
}

fn part_mismatch(owner: &TypeGraph, part: &PartRef, value: &AttrValue) -> StoreError {
    let found = match value {
        AttrValue::Object(nested) => format!("`{}`", nested.type_name),
        other => other.kind_name().to_string(),
    };
    StoreError::PartTypeMismatch {
        owner: owner.name().to_string(),
        accessor: part.accessor.clone(),
        expected: part.graph.name().to_string(),
        found,
    }
}

/// Check attribute names, value kinds and part types of `object` and of every new nested
/// part, for `graph` and each of its ancestors.
///
/// With `strict`, an attribute no level accepts is an error; ancestor views skip the
/// attributes they do not own.
fn validate(graph: &TypeGraph, object: &ModelObject, strict: bool) -> Result<(), StoreError> {
    for (name, value) in &object.attributes {
        if let Some(part) = graph.part(name) {
            match value {
                AttrValue::Null => {}
                AttrValue::Object(nested) if nested.is_type(part.graph.name()) => {
                    if nested.is_new() {
                        validate(&part.graph, nested, true)?;
                    }
                }
                other => return Err(part_mismatch(graph, part, other)),
            }
        } else if let Some(property) = graph.property(name) {
            property_value(graph.name(), property, value)?;
        } else if strict && !graph.accepts_attribute(name) {
            return Err(StoreError::InvalidValue {
                type_name: graph.name().to_string(),
                attribute: name.clone(),
                message: "not declared on this type or its ancestors".to_string(),
            });
        }
    }
    for ancestor in graph.ancestors() {
        validate(&ancestor.graph, object, false)?;
    }
    Ok(())
}

/// Column values of one level's property row: its flattened scalars present on the object,
/// then the reference column of every part it declares that was provided
fn level_columns(
    level: &TypeGraph,
    object: &ModelObject,
    references: &HashMap<String, SqlValue>,
) -> Result<Vec<(String, SqlValue)>, StoreError> {
    let mut columns = Vec::new();
    for property in level.properties() {
        if let Some(value) = object.get(&property.name) {
            columns.push((
                property.name.clone(),
                property_value(level.name(), property, value)?,
            ));
        }
    }
    for part in level.parts() {
        if let Some(reference) = references.get(&part.accessor) {
            columns.push((part.accessor.clone(), reference.clone()));
        }
    }
    Ok(columns)
}

pub struct WriteCoordinator {
    executor: Arc<dyn SqlExecutor>,
}

impl WriteCoordinator {
    pub fn new(executor: Arc<dyn SqlExecutor>) -> Self {
        Self { executor }
    }

    /// Create `object` when it has no public identifier yet, update it otherwise
    pub async fn save(
        &self,
        graph: &Arc<TypeGraph>,
        object: ModelObject,
    ) -> Result<ModelObject, StoreError> {
        if !object.is_type(graph.name()) {
            return Err(StoreError::TypeMismatch {
                expected: graph.name().to_string(),
                found: object.type_name.clone(),
            });
        }

        let (mode, surrogate) = if object.is_new() {
            (SaveMode::Create, object.surrogate.unwrap_or_else(Uuid::new_v4))
        } else {
            let surrogate = object.surrogate.ok_or_else(|| StoreError::MissingSurrogate {
                type_name: graph.name().to_string(),
            })?;
            (SaveMode::Update, surrogate)
        };

        // Everything that can be rejected without the backend is rejected before the first
        // statement runs
        validate(graph, &object, true)?;

        log::debug!("{:?} {} {}", mode, graph.name(), surrogate);
        self.save_object(Arc::clone(graph), object, surrogate, mode).await
    }

    /// Write every level of `graph`'s generalization chain exactly once.
    fn save_object(
        &self,
        graph: Arc<TypeGraph>,
        mut object: ModelObject,
        surrogate: Uuid,
        mode: SaveMode,
    ) -> BoxFuture<'_, Result<ModelObject, StoreError>> {
        async move {
            let chain = graph.generalization_chain();

            let mut accessors = HashSet::new();
            let part_saves = chain
                .iter()
                .flat_map(|level| level.parts().iter().map(move |part| (level, part)))
                .filter(|(_, part)| accessors.insert(part.accessor.clone()))
                .filter_map(|(level, part)| {
                    object
                        .get(&part.accessor)
                        .map(|value| self.prepare_part(level, part, value.clone()))
                })
                .collect::<Vec<_>>();

            log::debug!(
                "Saving {}: {} level(s), {} part(s)",
                graph.name(),
                chain.len(),
                part_saves.len()
            );

            let mut references = HashMap::new();
            for part in try_join_all(part_saves).await? {
                match part {
                    PartOutcome::Saved(accessor, saved) => {
                        let reference = saved.surrogate.map_or(SqlValue::Null, SqlValue::Uuid);
                        references.insert(accessor.clone(), reference);
                        object.set(accessor, saved);
                    }
                    PartOutcome::Referenced(accessor, part_surrogate) => {
                        references.insert(accessor, SqlValue::Uuid(part_surrogate));
                    }
                    PartOutcome::Cleared(accessor) => {
                        references.insert(accessor, SqlValue::Null);
                    }
                }
            }

            let mut levels = chain
                .iter()
                .map(|level| -> Result<_, StoreError> {
                    let columns = level_columns(level, &object, &references)?;
                    Ok((Arc::clone(level), columns))
                })
                .collect::<Result<Vec<_>, _>>()?;
            let (own_level, own_columns) = levels.remove(0);

            try_join_all(
                levels
                    .into_iter()
                    .map(|(level, columns)| self.write_level(level, surrogate, columns, mode)),
            )
            .await?;

            if let Some(id) = self
                .write_level(own_level, surrogate, own_columns, mode)
                .await?
            {
                object.id = Some(id);
            }
            object.surrogate = Some(surrogate);
            Ok(object)
        }
        .boxed()
    }

    /// Insert (create) or update the rows of one level; returns the public id on create
    async fn write_level(
        &self,
        level: Arc<TypeGraph>,
        surrogate: Uuid,
        columns: Vec<(String, SqlValue)>,
        mode: SaveMode,
    ) -> Result<Option<i64>, StoreError> {
        match mode {
            SaveMode::Create => Ok(Some(self.insert_rows(&level, surrogate, columns).await?)),
            SaveMode::Update => {
                self.update_row(&level, surrogate, columns).await?;
                Ok(None)
            }
        }
    }

    fn prepare_part(
        &self,
        owner: &TypeGraph,
        part: &PartRef,
        value: AttrValue,
    ) -> BoxFuture<'_, Result<PartOutcome, StoreError>> {
        let accessor = part.accessor.clone();
        let part_graph = Arc::clone(&part.graph);

        let nested = match value {
            AttrValue::Null => return async move { Ok(PartOutcome::Cleared(accessor)) }.boxed(),
            AttrValue::Object(nested) if nested.is_type(part_graph.name()) => *nested,
            other => {
                let err = part_mismatch(owner, part, &other);
                return async move { Err(err) }.boxed();
            }
        };

        async move {
            if !nested.is_new() {
                let part_surrogate = nested.surrogate.ok_or_else(|| StoreError::MissingSurrogate {
                    type_name: part_graph.name().to_string(),
                })?;
                return Ok(PartOutcome::Referenced(accessor, part_surrogate));
            }
            let surrogate = nested.surrogate.unwrap_or_else(Uuid::new_v4);
            let saved = self
                .save_object(part_graph, nested, surrogate, SaveMode::Create)
                .await?;
            Ok(PartOutcome::Saved(accessor, saved))
        }
        .boxed()
    }

    /// Insert the entity row and the property row; returns the assigned public identifier
    async fn insert_rows(
        &self,
        graph: &TypeGraph,
        surrogate: Uuid,
        columns: Vec<(String, SqlValue)>,
    ) -> Result<i64, StoreError> {
        let entity = Statement::Insert(Insert {
            table: graph.entity_relation(),
            columns: vec![ID_COLUMN.to_string()],
            values: vec![SqlValue::Uuid(surrogate)],
            returning: Vec::new(),
            on_conflict_do_nothing: false,
        });

        let (names, values): (Vec<String>, Vec<SqlValue>) = columns.into_iter().unzip();
        let property = Statement::Insert(Insert {
            table: graph.property_relation(),
            columns: std::iter::once(SURROGATE_COLUMN.to_string())
                .chain(names)
                .collect(),
            values: std::iter::once(SqlValue::Uuid(surrogate))
                .chain(values)
                .collect(),
            returning: vec![ID_COLUMN.to_string()],
            on_conflict_do_nothing: false,
        });

        let (_, inserted) = tokio::try_join!(
            self.executor.execute(&entity),
            self.executor.execute(&property)
        )?;

        inserted
            .rows
            .first()
            .and_then(|row| row.get(ID_COLUMN))
            .and_then(SqlValue::as_integer)
            .ok_or_else(|| StoreError::InvalidValue {
                type_name: graph.name().to_string(),
                attribute: ID_COLUMN.to_string(),
                message: "insert did not return a public identifier".to_string(),
            })
    }

    async fn update_row(
        &self,
        graph: &TypeGraph,
        surrogate: Uuid,
        mut columns: Vec<(String, SqlValue)>,
    ) -> Result<(), StoreError> {
        if columns.is_empty() {
            // Still touch the row so a missing one is detected
            columns.push((SURROGATE_COLUMN.to_string(), SqlValue::Uuid(surrogate)));
        }
        let update = Statement::Update(Update {
            table: graph.property_relation(),
            assignments: columns,
            key_column: SURROGATE_COLUMN.to_string(),
            key_value: SqlValue::Uuid(surrogate),
        });

        let result = self.executor.execute(&update).await?;
        if result.rows_affected == 0 {
            log::warn!("Update of {} {} matched no row", graph.name(), surrogate);
            return Err(StoreError::StaleObject {
                type_name: graph.name().to_string(),
                surrogate,
            });
        }
        Ok(())
    }

    /// Remove `object` from the entity and property relations of its type and of every
    /// transitive ancestor. Composed parts are left in place.
    pub async fn delete(
        &self,
        graph: &Arc<TypeGraph>,
        object: &ModelObject,
    ) -> Result<(), StoreError> {
        let surrogate = object.surrogate.ok_or_else(|| StoreError::MissingSurrogate {
            type_name: graph.name().to_string(),
        })?;

        let deletes: Vec<Statement> = graph
            .generalization_chain()
            .iter()
            .flat_map(|level| {
                [
                    Statement::Delete(Delete {
                        table: level.entity_relation(),
                        key_column: ID_COLUMN.to_string(),
                        key_value: SqlValue::Uuid(surrogate),
                    }),
                    Statement::Delete(Delete {
                        table: level.property_relation(),
                        key_column: SURROGATE_COLUMN.to_string(),
                        key_value: SqlValue::Uuid(surrogate),
                    }),
                ]
            })
            .collect();

        log::debug!(
            "Deleting {} {}: {} statement(s)",
            graph.name(),
            surrogate,
            deletes.len()
        );
        try_join_all(deletes.iter().map(|stmt| self.executor.execute(stmt))).await?;
        Ok(())
    }

    pub async fn get(
        &self,
        query: &CompiledQuery,
        id: i64,
    ) -> Result<Option<ModelObject>, StoreError> {
        let result = self.executor.execute(&query.for_id(id)).await?;
        match result.rows.as_slice() {
            [] => Ok(None),
            [row] => Ok(Some(materialize(query, row)?)),
            rows => Err(StoreError::MultipleRows {
                type_name: query.root().name().to_string(),
                id,
                count: rows.len(),
            }),
        }
    }

    pub async fn list(&self, query: &CompiledQuery) -> Result<Vec<ModelObject>, StoreError> {
        let result = self.executor.execute(&query.for_all()).await?;
        result
            .rows
            .iter()
            .map(|row| materialize(query, row).map_err(StoreError::from))
            .collect()
    }
}
