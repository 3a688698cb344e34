use std::sync::Arc;

use rmtgraph::model_catalog::{ModelSchemaConfig, ModelSchemaError, TypeGraph, TypeRegistry};
use rmtgraph::sql_generator::SqlType;

const FLEET: &str = r#"
types:
  - name: Wheel
    properties:
      - { name: circumference }
  - name: Vehicle
    properties:
      - { name: maker }
    composes: [Wheel]
  - name: Car
    properties:
      - { name: color }
    extends:
      - { label: is-a, type: Vehicle }
  - name: SportsCar
    properties:
      - { name: top_speed, kind: integer }
    extends:
      - { label: is-a, type: Car }
"#;

fn resolve_all(yaml: &str) -> Result<TypeRegistry, ModelSchemaError> {
    let config = ModelSchemaConfig::from_yaml_str(yaml)?;
    let mut registry = TypeRegistry::new();
    for definition in config.definitions() {
        let graph = registry.resolve(&definition)?;
        registry.insert(Arc::new(graph));
    }
    Ok(registry)
}

fn names(graph: &TypeGraph) -> Vec<&str> {
    graph.properties().iter().map(|p| p.name.as_str()).collect()
}

#[test]
fn test_adoption_through_two_levels() {
    let registry = resolve_all(FLEET).unwrap();
    let sports = registry.get("SportsCar").unwrap();

    assert_eq!(names(&sports), vec!["top_speed", "color", "maker"]);
    assert!(sports.parts().is_empty());
    assert!(sports.accepts_attribute("wheel"));
    assert_eq!(
        sports.desired_columns(),
        vec![
            ("top_speed".to_string(), SqlType::Integer),
            ("color".to_string(), SqlType::Text),
            ("maker".to_string(), SqlType::Text),
        ]
    );

    let chain: Vec<String> = sports
        .generalization_chain()
        .iter()
        .map(|g| g.name().to_string())
        .collect();
    assert_eq!(chain, vec!["SportsCar", "Car", "Vehicle"]);
}

#[test]
fn test_relation_names_are_lower_cased() {
    let registry = resolve_all(FLEET).unwrap();
    let sports = registry.get("sportscar").unwrap();
    assert_eq!(sports.entity_relation(), "e_sportscar");
    assert_eq!(sports.property_relation(), "p_sportscar");

    let vehicle = registry.get("Vehicle").unwrap();
    assert_eq!(vehicle.part("wheel").unwrap().graph.name(), "Wheel");
}

#[test]
fn test_out_of_order_declaration_is_rejected() {
    let yaml = r#"
types:
  - name: Car
    extends:
      - { label: is-a, type: Vehicle }
  - name: Vehicle
"#;
    assert!(matches!(
        resolve_all(yaml),
        Err(ModelSchemaError::UnknownType { ref referenced, .. }) if referenced == "Vehicle"
    ));
}

#[test]
fn test_empty_label_and_bad_property_name() {
    let empty_label = r#"
types:
  - name: Vehicle
  - name: Car
    extends:
      - { label: "", type: Vehicle }
"#;
    assert!(matches!(
        resolve_all(empty_label),
        Err(ModelSchemaError::EmptyLabel { .. })
    ));

    let bad_property = r#"
types:
  - name: Wheel
    properties:
      - { name: "Circumference" }
"#;
    assert!(matches!(
        resolve_all(bad_property),
        Err(ModelSchemaError::InvalidPropertyName { .. })
    ));
}
