//! Re-registration, listing, deletion and configuration-driven definition.

use std::sync::Arc;

use rmtgraph::backend::{BackendError, MemoryExecutor, SqlExecutor};
use rmtgraph::config::StoreConfig;
use rmtgraph::model_catalog::ModelSchemaConfig;
use rmtgraph::schema_sync::SyncState;
use rmtgraph::sql_generator::{Insert, SqlValue, Statement};
use rmtgraph::{AttrValue, ModelObject, ModelStore, StoreError};
use uuid::Uuid;

use super::common::{car, engine, garage, vehicle, wheel};

#[tokio::test]
async fn test_redefinition_is_idempotent() -> anyhow::Result<()> {
    let (db, store) = garage().await?;
    db.clear_log();

    store.define_all([wheel(), engine(), vehicle(), car()]).await?;

    let schema_changes = db
        .statements()
        .iter()
        .filter(|s| s.sql.starts_with("ALTER TABLE"))
        .count();
    assert_eq!(schema_changes, 0);
    assert_eq!(db.row_count("rmt_ugi"), 1);
    assert_eq!(db.row_count("rmt_ag"), 2);
    assert_eq!(db.row_count("rmt_pg"), 4);

    // Bootstrap ran exactly once for the store's lifetime
    let creates = db
        .statements()
        .iter()
        .filter(|s| s.sql.contains("\"rmt_ugi\"") && s.sql.starts_with("CREATE TABLE"))
        .count();
    assert_eq!(creates, 0);
    Ok(())
}

#[tokio::test]
async fn test_list_counts_created_minus_deleted() -> anyhow::Result<()> {
    let (_db, store) = garage().await?;
    let cars = store.model("Car")?;

    let mut saved = Vec::new();
    for color in ["red", "green", "blue", "white"] {
        saved.push(cars.save(cars.instance().with("color", color)).await?);
    }
    cars.delete(&saved[1]).await?;

    let listed = cars.list().await?;
    assert_eq!(listed.len(), 3);
    let colors: Vec<&AttrValue> = listed.iter().filter_map(|c| c.get("color")).collect();
    assert_eq!(
        colors,
        vec![
            &AttrValue::from("red"),
            &AttrValue::from("blue"),
            &AttrValue::from("white")
        ]
    );
    assert!(listed.iter().all(|c| c.get("wheel") == Some(&AttrValue::Null)));

    assert!(cars.get(saved[1].id.unwrap()).await?.is_none());
    assert!(store.model("Vehicle")?.get(2).await?.is_none());
    assert_eq!(store.model("Vehicle")?.list().await?.len(), 3);
    Ok(())
}

#[tokio::test]
async fn test_values_travel_as_parameters() -> anyhow::Result<()> {
    let (db, store) = garage().await?;
    db.clear_log();

    store
        .model("Car")?
        .save(
            ModelObject::new("Car")
                .with("color", "'; DROP TABLE p_car; --")
                .with("wheel", ModelObject::new("Wheel").with("circumference", "13cm")),
        )
        .await?;

    for statement in db.statements() {
        assert!(!statement.sql.contains("DROP TABLE"), "{}", statement.sql);
        assert!(!statement.sql.contains("13cm"), "{}", statement.sql);
    }
    assert_eq!(
        store.model("Car")?.get(1).await?.unwrap().get("color"),
        Some(&AttrValue::from("'; DROP TABLE p_car; --"))
    );
    Ok(())
}

#[tokio::test]
async fn test_delete_requires_surrogate() -> anyhow::Result<()> {
    let (_db, store) = garage().await?;
    let wheels = store.model("Wheel")?;
    let err = wheels.delete(&wheels.instance()).await.unwrap_err();
    assert!(matches!(err, StoreError::MissingSurrogate { .. }));
    Ok(())
}

#[tokio::test]
async fn test_define_from_yaml_with_custom_prefix() -> anyhow::Result<()> {
    let models = ModelSchemaConfig::from_yaml_str(
        r#"
name: garage
types:
  - name: Wheel
    properties:
      - { name: circumference, kind: string }
  - name: Engine
    properties:
      - { name: power, kind: string }
      - { name: specs, kind: object }
  - name: Vehicle
    properties:
      - { name: maker }
    composes: [Wheel, Engine]
  - name: Car
    properties:
      - { name: color }
      - { name: doors, kind: integer }
    extends:
      - { label: is-a, type: Vehicle }
"#,
    )?;
    let config = StoreConfig {
        catalog_prefix: "meta_".to_string(),
        ..Default::default()
    };

    let db = Arc::new(MemoryExecutor::new());
    let store = ModelStore::with_config(db.clone(), &config);
    let names = store.define_from_config(&models).await?;
    assert_eq!(names, vec!["Wheel", "Engine", "Vehicle", "Car"]);
    assert_eq!(store.type_names(), vec!["Car", "Engine", "Vehicle", "Wheel"]);
    assert!(db.has_table("meta_ugi") && db.has_table("meta_ag") && db.has_table("meta_pg"));
    assert!(!db.has_table("rmt_ugi"));

    for name in &names {
        assert_eq!(store.state(name), SyncState::Ready);
    }

    let cars = store.model("Car")?;
    let specs = serde_json::json!({"cylinders": 4, "turbo": false});
    let saved = cars
        .save(
            cars.instance()
                .with("doors", 3)
                .with("engine", ModelObject::new("Engine").with("specs", specs.clone())),
        )
        .await?;

    let read = cars.get(saved.id.unwrap()).await?.unwrap();
    assert_eq!(read.get("doors"), Some(&AttrValue::Integer(3)));
    assert_eq!(
        read.get_object("engine").and_then(|e| e.get("specs")),
        Some(&AttrValue::Opaque(specs))
    );
    Ok(())
}

#[tokio::test]
async fn test_partial_cascade_failure_keeps_written_rows() -> anyhow::Result<()> {
    let (db, store) = garage().await?;

    // Occupy the entity row the engine part is about to claim
    let taken = Uuid::new_v4();
    db.execute(&Statement::Insert(Insert {
        table: "e_engine".to_string(),
        columns: vec!["id".to_string()],
        values: vec![SqlValue::Uuid(taken)],
        returning: Vec::new(),
        on_conflict_do_nothing: false,
    }))
    .await?;

    let mut engine = ModelObject::new("Engine").with("power", "75hp");
    engine.surrogate = Some(taken);
    let err = store
        .model("Car")?
        .save(
            ModelObject::new("Car")
                .with("color", "teal")
                .with("wheel", ModelObject::new("Wheel").with("circumference", "14in"))
                .with("engine", engine),
        )
        .await
        .unwrap_err();

    assert!(
        matches!(
            err,
            StoreError::Backend(BackendError::ConstraintViolation { ref table, .. })
                if table == "e_engine"
        ),
        "{}",
        err
    );

    // The sibling part went through and is not rolled back; the owner levels never ran
    assert_eq!(db.row_count("p_wheel"), 1);
    assert_eq!(db.row_count("e_wheel"), 1);
    assert_eq!(db.row_count("e_engine"), 1);
    for table in ["e_car", "p_car", "e_vehicle", "p_vehicle"] {
        assert_eq!(db.row_count(table), 0, "{}", table);
    }
    Ok(())
}
