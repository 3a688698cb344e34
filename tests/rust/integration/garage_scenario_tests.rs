//! Wheel / Engine / Vehicle / Car walkthrough: definition, save, lookup, and schema
//! evolution by re-declaration.

use rmtgraph::model_catalog::{AggregationEdge, GeneralizationEdge};
use rmtgraph::schema_sync::SyncState;
use rmtgraph::sql_generator::{SqlType, SqlValue};
use rmtgraph::{AttrValue, ModelObject, PropertyKind, TypeDefinition};

use super::common::{garage, wheel};

fn black_car() -> ModelObject {
    ModelObject::new("Car")
        .with("color", "black")
        .with("maker", "MM")
        .with("wheel", ModelObject::new("Wheel").with("circumference", "13cm"))
        .with("engine", ModelObject::new("Engine").with("power", "130hp"))
}

#[tokio::test]
async fn test_definition_records_edges_and_relations() -> anyhow::Result<()> {
    let (db, store) = garage().await?;

    assert_eq!(
        store.catalog().generalizations().await?,
        vec![GeneralizationEdge {
            sup: "Vehicle".to_string(),
            label: "is-a".to_string(),
            sub: "Car".to_string(),
        }]
    );
    assert_eq!(
        store.catalog().compositions().await?,
        vec![
            AggregationEdge {
                owner: "Vehicle".to_string(),
                part: "Engine".to_string(),
            },
            AggregationEdge {
                owner: "Vehicle".to_string(),
                part: "Wheel".to_string(),
            },
        ]
    );

    for table in [
        "e_car", "p_car", "e_vehicle", "p_vehicle", "e_wheel", "p_wheel", "e_engine", "p_engine",
    ] {
        assert!(db.has_table(table), "missing relation {}", table);
    }

    // Adopted scalars are copied, parts are not
    let car_columns: Vec<String> = db
        .columns("p_car")
        .unwrap()
        .into_iter()
        .map(|(name, _)| name)
        .collect();
    assert_eq!(car_columns, vec!["surrogate", "id", "color", "maker"]);
    assert_eq!(
        db.columns("p_vehicle").unwrap()[3..].to_vec(),
        vec![
            ("wheel".to_string(), SqlType::Uuid),
            ("engine".to_string(), SqlType::Uuid),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn test_save_creates_rows_at_every_level() -> anyhow::Result<()> {
    let (db, store) = garage().await?;
    let cars = store.model("Car")?;

    let saved = cars.save(black_car()).await?;
    let surrogate = saved.surrogate.expect("surrogate assigned");
    assert_eq!(saved.id, Some(1));
    assert_eq!(saved.get("color"), Some(&AttrValue::from("black")));
    assert_eq!(saved.get("maker"), Some(&AttrValue::from("MM")));

    let wheel = saved.get_object("wheel").expect("wheel saved");
    let engine = saved.get_object("engine").expect("engine saved");
    assert_eq!(wheel.get("circumference"), Some(&AttrValue::from("13cm")));
    assert_eq!(engine.get("power"), Some(&AttrValue::from("130hp")));
    assert_ne!(wheel.surrogate, Some(surrogate));
    assert_ne!(wheel.surrogate, engine.surrogate);

    let vehicle_row = &db.rows("p_vehicle")[0];
    assert_eq!(vehicle_row.get("surrogate"), Some(&SqlValue::Uuid(surrogate)));
    assert_eq!(
        vehicle_row.get("wheel").and_then(SqlValue::as_uuid),
        wheel.surrogate
    );
    assert_eq!(
        vehicle_row.get("engine").and_then(SqlValue::as_uuid),
        engine.surrogate
    );

    let car_row = &db.rows("p_car")[0];
    assert_eq!(car_row.get("surrogate"), Some(&SqlValue::Uuid(surrogate)));
    assert_eq!(db.rows("e_car")[0].get("id"), Some(&SqlValue::Uuid(surrogate)));
    assert_eq!(db.rows("e_vehicle")[0].get("id"), Some(&SqlValue::Uuid(surrogate)));
    Ok(())
}

#[tokio::test]
async fn test_get_round_trips_nested_values() -> anyhow::Result<()> {
    let (_db, store) = garage().await?;
    let cars = store.model("Car")?;
    let saved = cars.save(black_car()).await?;

    let read = cars.get(saved.id.unwrap()).await?.expect("car found");
    assert_eq!(read.type_name, "Car");
    assert_eq!(read.id, saved.id);
    assert_eq!(read.surrogate, saved.surrogate);
    assert_eq!(read.get("color"), Some(&AttrValue::from("black")));
    assert_eq!(read.get("maker"), Some(&AttrValue::from("MM")));

    let wheel = read.get_object("wheel").expect("wheel decoded");
    assert_eq!(wheel.type_name, "Wheel");
    assert_eq!(wheel.get("circumference"), Some(&AttrValue::from("13cm")));
    assert_eq!(wheel.surrogate, saved.get_object("wheel").unwrap().surrogate);
    assert_eq!(
        read.get_object("engine").and_then(|e| e.get("power")),
        Some(&AttrValue::from("130hp"))
    );

    assert!(cars.get(99).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_added_property_preserves_existing_values() -> anyhow::Result<()> {
    let (db, store) = garage().await?;
    store.model("Car")?.save(black_car()).await?;

    let wheels = store
        .define(wheel().property("material", PropertyKind::String))
        .await?;

    let columns: Vec<String> = db
        .columns("p_wheel")
        .unwrap()
        .into_iter()
        .map(|(name, _)| name)
        .collect();
    assert_eq!(columns, vec!["surrogate", "id", "circumference", "material"]);

    let existing = wheels.get(1).await?.expect("wheel kept");
    assert_eq!(existing.get("circumference"), Some(&AttrValue::from("13cm")));
    assert_eq!(existing.get("material"), Some(&AttrValue::Null));

    let mut updated = existing;
    updated.set("material", "alloy");
    wheels.save(updated).await?;
    assert_eq!(
        wheels.get(1).await?.unwrap().get("material"),
        Some(&AttrValue::from("alloy"))
    );
    Ok(())
}

#[tokio::test]
async fn test_removed_property_drops_column() -> anyhow::Result<()> {
    let (db, store) = garage().await?;
    store.model("Car")?.save(black_car()).await?;

    let wheels = store
        .define(TypeDefinition::new("Wheel").property("material", PropertyKind::String))
        .await?;

    let columns: Vec<String> = db
        .columns("p_wheel")
        .unwrap()
        .into_iter()
        .map(|(name, _)| name)
        .collect();
    assert_eq!(columns, vec!["surrogate", "id", "material"]);

    let wheel = wheels.get(1).await?.expect("row kept");
    assert!(wheel.get("circumference").is_none());
    assert_eq!(wheel.get("material"), Some(&AttrValue::Null));
    Ok(())
}

#[tokio::test]
async fn test_redefined_part_is_picked_up_by_owners() -> anyhow::Result<()> {
    let (db, store) = garage().await?;
    let cars = store.model("Car")?;
    let saved = cars.save(black_car()).await?;

    store
        .define(TypeDefinition::new("Wheel").property("material", PropertyKind::String))
        .await?;

    for name in ["Wheel", "Vehicle", "Car"] {
        assert_eq!(store.state(name), SyncState::Ready, "{}", name);
    }

    // The handle taken before the redefinition reads through the new graph
    let read = cars.get(saved.id.unwrap()).await?.expect("car kept");
    let wheel = read.get_object("wheel").expect("wheel still referenced");
    assert!(wheel.get("circumference").is_none());
    assert_eq!(wheel.get("material"), Some(&AttrValue::Null));

    let alloy = cars
        .save(
            ModelObject::new("Car")
                .with("color", "silver")
                .with("wheel", ModelObject::new("Wheel").with("material", "alloy")),
        )
        .await?;
    assert_eq!(
        cars.get(alloy.id.unwrap())
            .await?
            .and_then(|car| car.get_object("wheel").and_then(|w| w.get("material")).cloned()),
        Some(AttrValue::from("alloy"))
    );
    assert_eq!(db.row_count("p_wheel"), 2);
    Ok(())
}
