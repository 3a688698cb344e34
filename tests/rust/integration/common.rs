use std::sync::Arc;

use rmtgraph::backend::MemoryExecutor;
use rmtgraph::{ModelStore, PropertyKind, TypeDefinition};

pub fn wheel() -> TypeDefinition {
    TypeDefinition::new("Wheel").property("circumference", PropertyKind::String)
}

pub fn engine() -> TypeDefinition {
    TypeDefinition::new("Engine").property("power", PropertyKind::String)
}

pub fn vehicle() -> TypeDefinition {
    TypeDefinition::new("Vehicle")
        .composes(["Wheel", "Engine"])
        .property("maker", PropertyKind::String)
}

pub fn car() -> TypeDefinition {
    TypeDefinition::new("Car")
        .extends("is-a", "Vehicle")
        .property("color", PropertyKind::String)
}

/// Store with Wheel, Engine, Vehicle and Car defined
pub async fn garage() -> anyhow::Result<(Arc<MemoryExecutor>, ModelStore)> {
    let db = Arc::new(MemoryExecutor::new());
    let store = ModelStore::new(db.clone());
    store.define_all([wheel(), engine(), vehicle(), car()]).await?;
    Ok((db, store))
}
