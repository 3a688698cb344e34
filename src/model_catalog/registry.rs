//! Registry of resolved type graphs.
//!
//! Resolution validates a [`TypeDefinition`], looks up every referenced type among the
//! already registered graphs, rejects cycles, and flattens the adopted property set. The
//! result is memoized as an `Arc<TypeGraph>` until the type is declared again.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::errors::ModelSchemaError;
use super::type_graph::{
    is_valid_column_name, is_valid_type_name, AncestorRef, PartRef, Property, TypeDefinition,
    TypeGraph, ID_COLUMN, MAX_TYPE_NAME_LEN, SURROGATE_COLUMN,
};

#[derive(Debug, Default, Clone)]
pub struct TypeRegistry {
    types: HashMap<String, Arc<TypeGraph>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Arc<TypeGraph>> {
        self.types.get(&name.to_lowercase()).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(&name.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Replace any previous graph registered under the same name
    pub fn insert(&mut self, graph: Arc<TypeGraph>) -> Option<Arc<TypeGraph>> {
        self.types.insert(graph.key().to_string(), graph)
    }

    pub fn remove(&mut self, name: &str) -> Option<Arc<TypeGraph>> {
        self.types.remove(&name.to_lowercase())
    }

    fn lookup(&self, owner: &str, referenced: &str) -> Result<Arc<TypeGraph>, ModelSchemaError> {
        self.get(referenced).ok_or_else(|| ModelSchemaError::UnknownType {
            type_name: owner.to_string(),
            referenced: referenced.to_string(),
        })
    }

    /// Build the immutable graph for a declaration without registering it
    pub fn resolve(&self, definition: &TypeDefinition) -> Result<TypeGraph, ModelSchemaError> {
        let name = definition.name.clone();
        if !is_valid_type_name(&name) {
            return Err(ModelSchemaError::InvalidTypeName {
                name,
                max: MAX_TYPE_NAME_LEN,
            });
        }
        let key = name.to_lowercase();

        let own_properties = own_properties(definition)?;

        let mut ancestors: Vec<AncestorRef> = Vec::with_capacity(definition.extends.len());
        for decl in &definition.extends {
            if decl.label.trim().is_empty() {
                return Err(ModelSchemaError::EmptyLabel {
                    sup: decl.super_type.clone(),
                    sub: name.clone(),
                });
            }
            if decl.super_type.eq_ignore_ascii_case(&name) {
                return Err(ModelSchemaError::CyclicDefinition {
                    path: format!("{} -> {}", name, name),
                });
            }
            let graph = self.lookup(&name, &decl.super_type)?;
            if ancestors.iter().any(|a| a.graph.key() == graph.key()) {
                return Err(ModelSchemaError::DuplicateAncestor {
                    sup: graph.name().to_string(),
                    sub: name.clone(),
                });
            }
            ancestors.push(AncestorRef {
                label: decl.label.clone(),
                graph,
            });
        }

        let mut parts: Vec<PartRef> = Vec::with_capacity(definition.composes.len());
        for part_name in &definition.composes {
            if part_name.eq_ignore_ascii_case(&name) {
                return Err(ModelSchemaError::CyclicDefinition {
                    path: format!("{} -> {}", name, name),
                });
            }
            let graph = self.lookup(&name, part_name)?;
            if parts.iter().any(|p| p.graph.key() == graph.key()) {
                return Err(ModelSchemaError::DuplicatePart {
                    owner: name.clone(),
                    part: graph.name().to_string(),
                });
            }
            parts.push(PartRef {
                accessor: graph.key().to_string(),
                graph,
            });
        }

        // A re-declaration can close a loop through snapshots registered earlier
        for referenced in ancestors
            .iter()
            .map(|a| &a.graph)
            .chain(parts.iter().map(|p| &p.graph))
        {
            if let Some(mut path) = path_to(referenced, &key) {
                path.insert(0, name.clone());
                return Err(ModelSchemaError::CyclicDefinition {
                    path: path.join(" -> "),
                });
            }
        }

        let properties = flatten(&own_properties, &ancestors);

        let property_names: HashSet<&str> = properties.iter().map(|p| p.name.as_str()).collect();
        for part in &parts {
            let accessor = part.accessor.as_str();
            if accessor == ID_COLUMN
                || accessor == SURROGATE_COLUMN
                || property_names.contains(accessor)
                || ancestors.iter().any(|a| a.graph.key() == accessor)
            {
                return Err(ModelSchemaError::AccessorCollision {
                    type_name: name.clone(),
                    name: part.accessor.clone(),
                });
            }
        }

        Ok(TypeGraph {
            name,
            key,
            own_properties,
            properties,
            parts,
            ancestors,
        })
    }
}

fn own_properties(definition: &TypeDefinition) -> Result<Vec<Property>, ModelSchemaError> {
    let mut seen = HashSet::new();
    let mut properties = Vec::with_capacity(definition.properties.len());
    for property in &definition.properties {
        if property.name == ID_COLUMN {
            // The public identifier is managed by the mapping, never stored as a property
            continue;
        }
        if property.name == SURROGATE_COLUMN {
            return Err(ModelSchemaError::ReservedProperty {
                type_name: definition.name.clone(),
                property: property.name.clone(),
            });
        }
        if !is_valid_column_name(&property.name) {
            return Err(ModelSchemaError::InvalidPropertyName {
                type_name: definition.name.clone(),
                property: property.name.clone(),
            });
        }
        if !seen.insert(property.name.clone()) {
            return Err(ModelSchemaError::DuplicateProperty {
                type_name: definition.name.clone(),
                property: property.name.clone(),
            });
        }
        properties.push(property.clone());
    }
    Ok(properties)
}

/// Own properties first, then each ancestor's flattened set in declaration order.
/// A name already present keeps its first (most specific) declaration.
fn flatten(own: &[Property], ancestors: &[AncestorRef]) -> Vec<Property> {
    let mut properties: Vec<Property> = own.to_vec();
    for ancestor in ancestors {
        for adopted in ancestor.graph.properties() {
            if !properties.iter().any(|p| p.name == adopted.name) {
                properties.push(adopted.clone());
            }
        }
    }
    properties
}

/// Names along a path from `graph` to a type keyed `target`, if one exists
fn path_to(graph: &Arc<TypeGraph>, target: &str) -> Option<Vec<String>> {
    if graph.key() == target {
        return Some(vec![graph.name().to_string()]);
    }
    graph
        .ancestors()
        .iter()
        .map(|a| &a.graph)
        .chain(graph.parts().iter().map(|p| &p.graph))
        .find_map(|next| {
            path_to(next, target).map(|mut rest| {
                rest.insert(0, graph.name().to_string());
                rest
            })
        })
}
