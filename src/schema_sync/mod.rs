//! Property relation synchronization.
//!
//! For each type the synchronizer makes sure `e_<type>` and `p_<type>` exist, reads the
//! live columns of `p_<type>`, diffs them against the type's desired column set and drains
//! the resulting [`MigrationQueue`] one statement at a time. While that happens the type is
//! [`SyncState::Synchronizing`] and unavailable for reads and writes.

pub mod column_info;
pub mod diff;
pub mod errors;

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;

pub use column_info::{query_table_columns, LiveColumn};
pub use diff::{plan_migration, MigrationStep};
pub use errors::SchemaSyncError;

use crate::backend::SqlExecutor;
use crate::model_catalog::{TypeGraph, ID_COLUMN, SURROGATE_COLUMN};
use crate::sql_generator::{ColumnDef, CreateTable, SqlType, Statement};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncState {
    #[default]
    Uninitialized,
    Synchronizing,
    Ready,
}

/// Outcome of one synchronization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub type_name: String,
    pub table: String,
    pub steps: Vec<MigrationStep>,
}

impl SyncReport {
    pub fn is_noop(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Ordered migration steps for one relation
#[derive(Debug, Default)]
pub struct MigrationQueue {
    steps: VecDeque<MigrationStep>,
}

impl MigrationQueue {
    pub fn new(steps: Vec<MigrationStep>) -> Self {
        Self {
            steps: steps.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run every step in order; the first failure stops the drain
    pub async fn drain(
        &mut self,
        executor: &dyn SqlExecutor,
    ) -> Result<Vec<MigrationStep>, SchemaSyncError> {
        let mut applied = Vec::with_capacity(self.steps.len());
        while let Some(step) = self.steps.pop_front() {
            log::info!("Migration: {}", step);
            for statement in step.statements() {
                executor.execute(&statement).await.map_err(|source| {
                    log::error!("Migration step {} failed: {}", step, source);
                    SchemaSyncError::Step {
                        step: step.to_string(),
                        source,
                    }
                })?;
            }
            applied.push(step);
        }
        Ok(applied)
    }
}

pub struct SchemaSynchronizer {
    executor: Arc<dyn SqlExecutor>,
    states: RwLock<HashMap<String, SyncState>>,
    // Migrations never overlap, not even for different types
    migration_lock: Mutex<()>,
}

impl SchemaSynchronizer {
    pub fn new(executor: Arc<dyn SqlExecutor>) -> Self {
        Self {
            executor,
            states: RwLock::new(HashMap::new()),
            migration_lock: Mutex::new(()),
        }
    }

    pub fn state(&self, type_key: &str) -> SyncState {
        self.states
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(type_key)
            .copied()
            .unwrap_or_default()
    }

    /// Move a type to `state`; also used by the store to roll back a failed definition
    pub fn set_state(&self, type_key: &str, state: SyncState) {
        log::debug!("Type {} is now {:?}", type_key, state);
        self.states
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(type_key.to_string(), state);
    }

    /// Create the entity and property relations of `graph` if they do not exist
    pub async fn ensure_relations(&self, graph: &TypeGraph) -> Result<(), SchemaSyncError> {
        for create in relation_ddl(graph) {
            let table = create.table().to_string();
            self.executor
                .execute(&create)
                .await
                .map_err(|source| SchemaSyncError::CreateRelation { table, source })?;
        }
        Ok(())
    }

    pub async fn live_columns(
        &self,
        graph: &TypeGraph,
    ) -> Result<Vec<LiveColumn>, SchemaSyncError> {
        query_table_columns(self.executor.as_ref(), &graph.property_relation()).await
    }

    /// Steps that would bring `p_<type>` in line, without applying them
    pub async fn plan(&self, graph: &TypeGraph) -> Result<Vec<MigrationStep>, SchemaSyncError> {
        let live = self.live_columns(graph).await?;
        Ok(plan_migration(
            &graph.property_relation(),
            &live,
            &graph.desired_columns(),
        ))
    }

    /// Create missing relations and drain the migration queue for `graph`.
    ///
    /// On success the type is [`SyncState::Ready`]; on failure it falls back to
    /// [`SyncState::Uninitialized`] and stays unusable.
    pub async fn synchronize(&self, graph: &TypeGraph) -> Result<SyncReport, SchemaSyncError> {
        let _guard = self.migration_lock.lock().await;
        self.set_state(graph.key(), SyncState::Synchronizing);

        match self.run(graph).await {
            Ok(report) => {
                self.set_state(graph.key(), SyncState::Ready);
                Ok(report)
            }
            Err(e) => {
                self.set_state(graph.key(), SyncState::Uninitialized);
                Err(e)
            }
        }
    }

    async fn run(&self, graph: &TypeGraph) -> Result<SyncReport, SchemaSyncError> {
        self.ensure_relations(graph).await?;
        let mut queue = MigrationQueue::new(self.plan(graph).await?);
        log::info!(
            "Synchronizing {} ({} step(s))",
            graph.property_relation(),
            queue.len()
        );
        let steps = queue.drain(self.executor.as_ref()).await?;
        Ok(SyncReport {
            type_name: graph.name().to_string(),
            table: graph.property_relation(),
            steps,
        })
    }
}

/// `e_<type>(id uuid PRIMARY KEY)` and
/// `p_<type>(surrogate uuid NOT NULL UNIQUE, id serial PRIMARY KEY)`
pub fn relation_ddl(graph: &TypeGraph) -> [Statement; 2] {
    [
        Statement::CreateTable(CreateTable {
            table: graph.entity_relation(),
            columns: vec![ColumnDef::new(ID_COLUMN, SqlType::Uuid)],
            primary_key: vec![ID_COLUMN.to_string()],
            if_not_exists: true,
        }),
        Statement::CreateTable(CreateTable {
            table: graph.property_relation(),
            columns: vec![
                ColumnDef::new(SURROGATE_COLUMN, SqlType::Uuid)
                    .not_null()
                    .unique(),
                ColumnDef::new(ID_COLUMN, SqlType::Serial),
            ],
            primary_key: vec![ID_COLUMN.to_string()],
            if_not_exists: true,
        }),
    ]
}
