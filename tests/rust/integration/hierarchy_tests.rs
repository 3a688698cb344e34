//! Deeper generalization graphs: transitive adoption, multiple ancestors, join counts.

use std::sync::Arc;

use rmtgraph::backend::MemoryExecutor;
use rmtgraph::sql_generator::SqlValue;
use rmtgraph::{AttrValue, ModelObject, ModelStore, PropertyKind, StoreError, TypeDefinition};
use test_case::test_case;

use super::common::{car, engine, garage, vehicle, wheel};

async fn amphibious_store() -> anyhow::Result<(Arc<MemoryExecutor>, ModelStore)> {
    let db = Arc::new(MemoryExecutor::new());
    let store = ModelStore::new(db.clone());
    store
        .define_all([
            wheel(),
            engine(),
            vehicle(),
            car(),
            TypeDefinition::new("Boat")
                .property("draft", PropertyKind::Integer)
                .property("maker", PropertyKind::String),
            TypeDefinition::new("AmphibiousCar")
                .extends("drives-as", "Car")
                .extends("floats-as", "Boat")
                .property("certified", PropertyKind::Boolean),
        ])
        .await?;
    Ok((db, store))
}

#[test_case("Wheel", 0; "leaf part")]
#[test_case("Vehicle", 2; "two parts")]
#[test_case("Car", 3; "one ancestor with two parts")]
#[test_case("AmphibiousCar", 5; "two ancestors")]
#[tokio::test]
async fn test_join_count(type_name: &str, joins: usize) {
    let (_db, store) = amphibious_store().await.unwrap();
    let model = store.model(type_name).unwrap();
    assert_eq!(model.query().join_count(), joins);
    assert_eq!(model.graph().join_count(), joins);
}

#[tokio::test]
async fn test_multiple_ancestors_share_one_surrogate() -> anyhow::Result<()> {
    let (db, store) = amphibious_store().await?;
    let model = store.model("AmphibiousCar")?;

    let saved = model
        .save(
            model
                .instance()
                .with("certified", true)
                .with("color", "yellow")
                .with("maker", "Amphicar")
                .with("draft", 40)
                .with("wheel", ModelObject::new("Wheel").with("circumference", "15in")),
        )
        .await?;
    let surrogate = SqlValue::Uuid(saved.surrogate.unwrap());

    for table in ["p_amphibiouscar", "p_car", "p_vehicle", "p_boat"] {
        let rows = db.rows(table);
        assert_eq!(rows.len(), 1, "{}", table);
        assert_eq!(rows[0].get("surrogate"), Some(&surrogate), "{}", table);
    }
    assert_eq!(db.rows("p_boat")[0].get("draft"), Some(&SqlValue::Integer(40)));
    assert_eq!(db.rows("p_car")[0].get("color"), Some(&SqlValue::from("yellow")));

    let read = model.get(saved.id.unwrap()).await?.unwrap();
    assert_eq!(read.get("certified"), Some(&AttrValue::Boolean(true)));
    assert_eq!(read.get("color"), Some(&AttrValue::from("yellow")));
    assert_eq!(read.get("draft"), Some(&AttrValue::Integer(40)));
    assert_eq!(read.get("maker"), Some(&AttrValue::from("Amphicar")));
    assert_eq!(
        read.get_object("wheel").and_then(|w| w.get("circumference")),
        Some(&AttrValue::from("15in"))
    );

    // Visible through every ancestor as well
    let as_boat = store.model("Boat")?.get(1).await?.unwrap();
    assert_eq!(as_boat.surrogate, saved.surrogate);
    assert_eq!(as_boat.get("draft"), Some(&AttrValue::Integer(40)));
    Ok(())
}

#[tokio::test]
async fn test_delete_removes_every_ancestor_level_but_not_parts() -> anyhow::Result<()> {
    let (db, store) = amphibious_store().await?;
    let model = store.model("AmphibiousCar")?;
    let saved = model
        .save(
            model
                .instance()
                .with("draft", 35)
                .with("engine", ModelObject::new("Engine").with("power", "43hp")),
        )
        .await?;

    model.delete(&saved).await?;
    assert!(model.get(saved.id.unwrap()).await?.is_none());

    for level in ["amphibiouscar", "car", "vehicle", "boat"] {
        assert_eq!(db.row_count(&format!("e_{}", level)), 0, "e_{}", level);
        assert_eq!(db.row_count(&format!("p_{}", level)), 0, "p_{}", level);
    }
    assert_eq!(db.row_count("p_engine"), 1);
    assert_eq!(db.row_count("e_engine"), 1);
    Ok(())
}

#[tokio::test]
async fn test_cycle_through_redefinition_is_rejected() -> anyhow::Result<()> {
    let (_db, store) = garage().await?;
    let err = store
        .define(vehicle().extends("is-a", "Car"))
        .await
        .err()
        .expect("cycle rejected");
    assert!(matches!(err, StoreError::Schema(_)), "{}", err);

    // The previous declaration keeps working
    assert_eq!(store.model("Vehicle")?.list().await?.len(), 0);
    Ok(())
}

#[tokio::test]
async fn test_shared_ancestor_is_written_once() -> anyhow::Result<()> {
    let db = Arc::new(MemoryExecutor::new());
    let store = ModelStore::new(db.clone());
    store
        .define_all([
            TypeDefinition::new("Named").property("label", PropertyKind::String),
            TypeDefinition::new("Left")
                .extends("is-a", "Named")
                .property("l", PropertyKind::Integer),
            TypeDefinition::new("Right")
                .extends("is-a", "Named")
                .property("r", PropertyKind::Integer),
            TypeDefinition::new("Both")
                .extends("leans", "Left")
                .extends("leans", "Right"),
        ])
        .await?;

    let both = store.model("Both")?;
    let saved = both
        .save(
            both.instance()
                .with("label", "twin")
                .with("l", 1)
                .with("r", 2),
        )
        .await?;
    let surrogate = SqlValue::Uuid(saved.surrogate.unwrap());

    for level in ["both", "left", "right", "named"] {
        for table in [format!("e_{}", level), format!("p_{}", level)] {
            assert_eq!(db.row_count(&table), 1, "{}", table);
        }
    }
    assert_eq!(db.rows("p_named")[0].get("surrogate"), Some(&surrogate));
    assert_eq!(db.rows("p_named")[0].get("label"), Some(&SqlValue::from("twin")));

    let mut renamed = both.get(saved.id.unwrap()).await?.expect("saved object");
    assert_eq!(renamed.get("l"), Some(&AttrValue::Integer(1)));
    assert_eq!(renamed.get("r"), Some(&AttrValue::Integer(2)));
    assert_eq!(renamed.get("label"), Some(&AttrValue::from("twin")));

    renamed.set("label", "pair");
    both.save(renamed.clone()).await?;
    assert_eq!(db.rows("p_named")[0].get("label"), Some(&SqlValue::from("pair")));
    assert_eq!(
        store.model("Named")?.get(1).await?.and_then(|n| n.get("label").cloned()),
        Some(AttrValue::from("pair"))
    );

    both.delete(&renamed).await?;
    for level in ["both", "left", "right", "named"] {
        assert_eq!(db.row_count(&format!("p_{}", level)), 0, "p_{}", level);
        assert_eq!(db.row_count(&format!("e_{}", level)), 0, "e_{}", level);
    }
    Ok(())
}
