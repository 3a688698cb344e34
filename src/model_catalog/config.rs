/// Model declarations loaded from YAML.
///
/// Types are listed in definition order; every `extends` and `composes` target must be
/// declared earlier in the list (or already defined in the store).
///
/// ```yaml
/// name: garage
/// types:
///   - name: Wheel
///     properties:
///       - { name: circumference, kind: string }
///   - name: Engine
///     properties:
///       - { name: power, kind: string }
///   - name: Vehicle
///     properties:
///       - { name: maker, kind: string }
///     composes: [Wheel, Engine]
///   - name: Car
///     properties:
///       - { name: color, kind: string }
///     extends:
///       - { label: is-a, type: Vehicle }
/// ```
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use super::errors::ModelSchemaError;
use super::type_graph::{ExtendsDecl, Property, TypeDefinition};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSchemaConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub types: Vec<TypeConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeConfig {
    pub name: String,
    #[serde(default)]
    pub properties: Vec<Property>,
    #[serde(default)]
    pub extends: Vec<ExtendsConfig>,
    #[serde(default)]
    pub composes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtendsConfig {
    pub label: String,
    #[serde(rename = "type")]
    pub super_type: String,
}

impl ModelSchemaConfig {
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, ModelSchemaError> {
        let contents = fs::read_to_string(path).map_err(|e| ModelSchemaError::ConfigReadError {
            error: e.to_string(),
        })?;

        Self::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, ModelSchemaError> {
        serde_yaml::from_str(yaml).map_err(|e| ModelSchemaError::ConfigParseError {
            error: e.to_string(),
        })
    }

    /// Declarations in file order, ready to hand to the store
    pub fn definitions(&self) -> Vec<TypeDefinition> {
        self.types.iter().map(TypeConfig::to_definition).collect()
    }
}

impl TypeConfig {
    pub fn to_definition(&self) -> TypeDefinition {
        TypeDefinition {
            name: self.name.clone(),
            properties: self.properties.clone(),
            extends: self
                .extends
                .iter()
                .map(|e| ExtendsDecl {
                    label: e.label.clone(),
                    super_type: e.super_type.clone(),
                })
                .collect(),
            composes: self.composes.clone(),
        }
    }
}
