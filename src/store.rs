//! Model store facade.
//!
//! [`ModelStore::define`] takes a type declaration through the whole registration
//! pipeline:
//!
//! 1. resolve it against the already defined types (validation, cycle detection,
//!    flattening)
//! 2. bootstrap the catalog once and reset-then-insert the type's catalog rows
//! 3. synchronize `e_<type>` and `p_<type>`
//! 4. compile the read query
//!
//! Only when all four succeed does the type become ready; [`Model`] handles refuse every
//! operation until then.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::Mutex;

use crate::backend::SqlExecutor;
use crate::config::StoreConfig;
use crate::errors::StoreError;
use crate::model_catalog::{
    Catalog, CatalogTables, ModelSchemaConfig, TypeDefinition, TypeGraph, TypeRegistry,
};
use crate::object::ModelObject;
use crate::query_compiler::{compile, CompiledQuery};
use crate::schema_sync::{SchemaSynchronizer, SyncReport, SyncState};
use crate::write_coordinator::WriteCoordinator;

#[derive(Default)]
struct Defined {
    registry: TypeRegistry,
    queries: HashMap<String, Arc<CompiledQuery>>,
    definitions: HashMap<String, TypeDefinition>,
}

pub struct ModelStore {
    catalog: Catalog,
    synchronizer: SchemaSynchronizer,
    writer: WriteCoordinator,
    defined: RwLock<Defined>,
    define_lock: Mutex<()>,
}

impl ModelStore {
    pub fn new(executor: Arc<dyn SqlExecutor>) -> Self {
        Self::with_tables(executor, CatalogTables::default())
    }

    pub fn with_config(executor: Arc<dyn SqlExecutor>, config: &StoreConfig) -> Self {
        Self::with_tables(executor, config.catalog_tables())
    }

    pub fn with_tables(executor: Arc<dyn SqlExecutor>, tables: CatalogTables) -> Self {
        Self {
            catalog: Catalog::new(Arc::clone(&executor), tables),
            synchronizer: SchemaSynchronizer::new(Arc::clone(&executor)),
            writer: WriteCoordinator::new(executor),
            defined: RwLock::new(Defined::default()),
            define_lock: Mutex::new(()),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn synchronizer(&self) -> &SchemaSynchronizer {
        &self.synchronizer
    }

    fn read(&self) -> RwLockReadGuard<'_, Defined> {
        self.defined.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Defined> {
        self.defined.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register (or re-register) a type and make it ready.
    ///
    /// Re-registration re-synchronizes the relations and never duplicates catalog rows.
    /// Every type already defined on top of this one (through ancestors or parts, at any
    /// depth) is re-installed afterwards against the new declaration; a dependent that no
    /// longer resolves, synchronizes or compiles is left `Uninitialized`.
    pub async fn define(&self, definition: TypeDefinition) -> Result<Model<'_>, StoreError> {
        let _guard = self.define_lock.lock().await;

        let graph = Arc::new(self.read().registry.resolve(&definition)?);
        let key = graph.key().to_string();
        let installed = self.install(Arc::clone(&graph)).await;
        if installed.is_ok() {
            self.write().definitions.insert(key.clone(), definition);
        }

        self.refresh_dependents(&key).await;

        let query = installed?;
        Ok(Model {
            store: self,
            graph,
            query,
        })
    }

    /// Run the registration pipeline for a resolved graph and publish it on success
    async fn install(&self, graph: Arc<TypeGraph>) -> Result<Arc<CompiledQuery>, StoreError> {
        log::info!(
            "Defining type {} ({} properties, {} parts, {} ancestors)",
            graph.name(),
            graph.properties().len(),
            graph.parts().len(),
            graph.ancestors().len()
        );

        self.synchronizer.set_state(graph.key(), SyncState::Synchronizing);
        match self.register(&graph).await {
            Ok((query, report)) => {
                if !report.is_noop() {
                    log::info!(
                        "Type {} synchronized with {} migration step(s)",
                        graph.name(),
                        report.steps.len()
                    );
                }
                let mut defined = self.write();
                defined.registry.insert(Arc::clone(&graph));
                defined
                    .queries
                    .insert(graph.key().to_string(), Arc::clone(&query));
                drop(defined);
                self.synchronizer.set_state(graph.key(), SyncState::Ready);
                Ok(query)
            }
            Err(e) => {
                log::error!("Failed to define type {}: {}", graph.name(), e);
                self.withdraw(graph.key());
                Err(e)
            }
        }
    }

    /// Take a type out of service: no graph, no query, not ready
    fn withdraw(&self, key: &str) {
        self.synchronizer.set_state(key, SyncState::Uninitialized);
        let mut defined = self.write();
        defined.registry.remove(key);
        defined.queries.remove(key);
        defined.definitions.remove(key);
    }

    /// Re-install every registered type whose graph reaches `key`, dependencies first
    async fn refresh_dependents(&self, key: &str) {
        let mut pending: Vec<Arc<TypeGraph>> = {
            let defined = self.read();
            defined
                .queries
                .values()
                .map(|q| Arc::clone(q.root()))
                .filter(|g| g.key() != key && g.depends_on(key))
                .collect()
        };

        while !pending.is_empty() {
            let next = pending
                .iter()
                .position(|g| !pending.iter().any(|other| g.depends_on(other.key())))
                .unwrap_or(0);
            let stale = pending.remove(next);

            let definition = self.read().definitions.get(stale.key()).cloned();
            let Some(definition) = definition else {
                self.withdraw(stale.key());
                continue;
            };
            log::info!("Re-defining {} after a change to {}", stale.name(), key);

            let resolved = self.read().registry.resolve(&definition);
            match resolved {
                Ok(graph) => {
                    // install() withdraws the type itself on failure
                    let _ = self.install(Arc::new(graph)).await;
                }
                Err(e) => {
                    log::warn!("Type {} no longer resolves: {}", stale.name(), e);
                    self.withdraw(stale.key());
                }
            }
        }
    }

    async fn register(
        &self,
        graph: &Arc<TypeGraph>,
    ) -> Result<(Arc<CompiledQuery>, SyncReport), StoreError> {
        // Nothing is written for a graph that cannot be read
        let query = Arc::new(compile(graph)?);
        self.catalog.ensure_bootstrapped().await?;
        self.catalog.register(graph).await?;
        let report = self.synchronizer.synchronize(graph).await?;
        Ok((query, report))
    }

    /// Define several types in order; stops at the first failure
    pub async fn define_all<I>(&self, definitions: I) -> Result<Vec<String>, StoreError>
    where
        I: IntoIterator<Item = TypeDefinition>,
    {
        let mut names = Vec::new();
        for definition in definitions {
            let model = self.define(definition).await?;
            names.push(model.name().to_string());
        }
        Ok(names)
    }

    pub async fn define_from_config(
        &self,
        config: &ModelSchemaConfig,
    ) -> Result<Vec<String>, StoreError> {
        self.define_all(config.definitions()).await
    }

    /// Handle to a defined type
    pub fn model(&self, type_name: &str) -> Result<Model<'_>, StoreError> {
        let defined = self.read();
        let graph = defined
            .registry
            .get(type_name)
            .ok_or_else(|| StoreError::UnknownType {
                type_name: type_name.to_string(),
            })?;
        let query = defined
            .queries
            .get(graph.key())
            .cloned()
            .ok_or_else(|| StoreError::NotReady {
                type_name: type_name.to_string(),
                state: self.synchronizer.state(graph.key()),
            })?;
        Ok(Model {
            store: self,
            graph,
            query,
        })
    }

    pub fn state(&self, type_name: &str) -> SyncState {
        self.synchronizer.state(&type_name.to_lowercase())
    }

    /// Names of every defined type
    pub fn type_names(&self) -> Vec<String> {
        let defined = self.read();
        let mut names: Vec<String> = defined
            .queries
            .values()
            .map(|q| q.root().name().to_string())
            .collect();
        names.sort();
        names
    }
}

/// CRUD entry point for one defined type
#[derive(Clone)]
pub struct Model<'s> {
    store: &'s ModelStore,
    graph: Arc<TypeGraph>,
    query: Arc<CompiledQuery>,
}

impl Model<'_> {
    pub fn name(&self) -> &str {
        self.graph.name()
    }

    pub fn graph(&self) -> &Arc<TypeGraph> {
        &self.graph
    }

    pub fn query(&self) -> &CompiledQuery {
        &self.query
    }

    /// Empty, unsaved instance of this type
    pub fn instance(&self) -> ModelObject {
        ModelObject::new(self.graph.name())
    }

    /// The type's current snapshot, refusing service while it is not ready.
    ///
    /// A redefinition replaces the snapshot, so operations never run against the one this
    /// handle was created with.
    fn current(&self) -> Result<Model<'_>, StoreError> {
        match self.store.synchronizer.state(self.graph.key()) {
            SyncState::Ready => self.store.model(self.graph.name()),
            state => Err(StoreError::NotReady {
                type_name: self.graph.name().to_string(),
                state,
            }),
        }
    }

    /// Object with public identifier `id`, or `None`
    pub async fn get(&self, id: i64) -> Result<Option<ModelObject>, StoreError> {
        let current = self.current()?;
        self.store.writer.get(&current.query, id).await
    }

    pub async fn list(&self) -> Result<Vec<ModelObject>, StoreError> {
        let current = self.current()?;
        self.store.writer.list(&current.query).await
    }

    /// Create or update; returns the object with identifiers and saved parts filled in
    pub async fn save(&self, object: ModelObject) -> Result<ModelObject, StoreError> {
        let current = self.current()?;
        self.store.writer.save(&current.graph, object).await
    }

    pub async fn delete(&self, object: &ModelObject) -> Result<(), StoreError> {
        let current = self.current()?;
        self.store.writer.delete(&current.graph, object).await
    }
}
