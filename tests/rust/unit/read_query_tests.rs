use std::sync::Arc;

use rmtgraph::model_catalog::{PropertyKind, TypeDefinition, TypeRegistry};
use rmtgraph::query_compiler::compile;
use rmtgraph::utils::column_naming::parse_column_alias;

fn vehicle_registry() -> TypeRegistry {
    let mut registry = TypeRegistry::new();
    for def in [
        TypeDefinition::new("Wheel").property("circumference", PropertyKind::String),
        TypeDefinition::new("Vehicle")
            .property("maker", PropertyKind::String)
            .composes(["Wheel"]),
        TypeDefinition::new("Car")
            .property("color", PropertyKind::String)
            .extends("is-a", "Vehicle"),
    ] {
        let graph = registry.resolve(&def).unwrap();
        registry.insert(Arc::new(graph));
    }
    registry
}

#[test]
fn test_vehicle_select_text() {
    let registry = vehicle_registry();
    let compiled = compile(&registry.get("Vehicle").unwrap()).unwrap();

    let rendered = compiled.for_id(12).render();
    assert_eq!(
        rendered.sql,
        "SELECT \"a0\".\"id\" AS \"p7_vehicle_id\", \
         \"a0\".\"surrogate\" AS \"p7_vehicle_surrogate\", \
         \"a0\".\"maker\" AS \"p7_vehicle_maker\", \
         \"a1\".\"id\" AS \"p13_vehicle.wheel_id\", \
         \"a1\".\"surrogate\" AS \"p13_vehicle.wheel_surrogate\", \
         \"a1\".\"circumference\" AS \"p13_vehicle.wheel_circumference\" \
         FROM \"p_vehicle\" AS \"a0\" \
         LEFT OUTER JOIN \"p_wheel\" AS \"a1\" ON \"a1\".\"surrogate\" = \"a0\".\"wheel\" \
         WHERE \"a0\".\"id\" = $1"
    );
}

#[test]
fn test_every_selected_column_decodes_to_a_known_path() {
    let registry = vehicle_registry();
    let compiled = compile(&registry.get("Car").unwrap()).unwrap();

    let paths: Vec<String> = compiled
        .select()
        .items
        .iter()
        .map(|item| {
            parse_column_alias(&item.alias)
                .map(|(path, _)| path)
                .unwrap_or_else(|| panic!("undecodable alias {}", item.alias))
        })
        .collect();

    for path in &paths {
        assert!(
            ["car", "car.vehicle", "car.vehicle.wheel"].contains(&path.as_str()),
            "unexpected path {}",
            path
        );
    }
    assert_eq!(compiled.join_count(), 2);
}
