//! Structural type descriptors.
//!
//! A [`TypeDefinition`] is what the host declares: scalar properties plus ordered
//! `extends(label, super)` and `composes(parts...)` calls. The registry resolves it into an
//! immutable [`TypeGraph`] that holds shared snapshots of every ancestor and part graph, so
//! traversal never goes back to a mutable registry.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::sql_generator::SqlType;

/// Column holding the public sequential identifier
pub const ID_COLUMN: &str = "id";
/// Column holding the shared surrogate
pub const SURROGATE_COLUMN: &str = "surrogate";

/// Longest accepted type name; keeps `p_<name>` inside PostgreSQL's identifier limit
pub const MAX_TYPE_NAME_LEN: usize = 48;

lazy_static! {
    static ref TYPE_NAME: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap();
    static ref PROPERTY_NAME: Regex = Regex::new(r"^[a-z_][a-z0-9_]*$").unwrap();
}

pub fn is_valid_type_name(name: &str) -> bool {
    name.len() <= MAX_TYPE_NAME_LEN && TYPE_NAME.is_match(name)
}

/// Lower-case identifier usable as a column name without quoting surprises
pub fn is_valid_column_name(name: &str) -> bool {
    PROPERTY_NAME.is_match(name)
}

/// Declared kind of a scalar property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PropertyKind {
    #[default]
    String,
    Integer,
    Boolean,
    /// Anything else the host can describe (object, array, null, any); stored as JSON text
    #[serde(alias = "object", alias = "array", alias = "null", alias = "any")]
    Opaque,
}

impl PropertyKind {
    pub fn sql_type(&self) -> SqlType {
        match self {
            PropertyKind::Integer => SqlType::Integer,
            PropertyKind::Boolean => SqlType::Boolean,
            PropertyKind::String | PropertyKind::Opaque => SqlType::Text,
        }
    }
}

impl fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PropertyKind::String => "string",
            PropertyKind::Integer => "integer",
            PropertyKind::Boolean => "boolean",
            PropertyKind::Opaque => "opaque",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    #[serde(default)]
    pub kind: PropertyKind,
}

impl Property {
    pub fn new(name: impl Into<String>, kind: PropertyKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Declaration of one `extends(label, super)` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendsDecl {
    pub label: String,
    pub super_type: String,
}

/// What the host declares for a type, before resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDefinition {
    pub name: String,
    pub properties: Vec<Property>,
    pub extends: Vec<ExtendsDecl>,
    pub composes: Vec<String>,
}

impl TypeDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: Vec::new(),
            extends: Vec::new(),
            composes: Vec::new(),
        }
    }

    pub fn property(mut self, name: impl Into<String>, kind: PropertyKind) -> Self {
        self.properties.push(Property::new(name, kind));
        self
    }

    /// Record an "is-a" role towards an already defined super-type
    pub fn extends(mut self, label: impl Into<String>, super_type: impl Into<String>) -> Self {
        self.extends.push(ExtendsDecl {
            label: label.into(),
            super_type: super_type.into(),
        });
        self
    }

    pub fn composes<I, S>(mut self, parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.composes.extend(parts.into_iter().map(Into::into));
        self
    }
}

/// A composed part: accessor/reference column name plus the part's graph
#[derive(Debug, Clone)]
pub struct PartRef {
    pub accessor: String,
    pub graph: Arc<TypeGraph>,
}

/// A generalization role towards a super-type
#[derive(Debug, Clone)]
pub struct AncestorRef {
    pub label: String,
    pub graph: Arc<TypeGraph>,
}

/// Resolved, immutable structure of one type
#[derive(Debug, Clone)]
pub struct TypeGraph {
    pub(super) name: String,
    pub(super) key: String,
    pub(super) own_properties: Vec<Property>,
    pub(super) properties: Vec<Property>,
    pub(super) parts: Vec<PartRef>,
    pub(super) ancestors: Vec<AncestorRef>,
}

impl TypeGraph {
    /// Declared type name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lower-cased name used for relation names and path segments
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn entity_relation(&self) -> String {
        format!("e_{}", self.key)
    }

    pub fn property_relation(&self) -> String {
        format!("p_{}", self.key)
    }

    /// Properties declared on this type only
    pub fn own_properties(&self) -> &[Property] {
        &self.own_properties
    }

    /// Own properties plus everything adopted transitively from ancestors
    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn parts(&self) -> &[PartRef] {
        &self.parts
    }

    pub fn part(&self, accessor: &str) -> Option<&PartRef> {
        self.parts.iter().find(|p| p.accessor == accessor)
    }

    pub fn ancestors(&self) -> &[AncestorRef] {
        &self.ancestors
    }

    /// Columns the property relation must carry besides `surrogate` and `id`
    pub fn desired_columns(&self) -> Vec<(String, SqlType)> {
        self.properties
            .iter()
            .map(|p| (p.name.clone(), p.kind.sql_type()))
            .chain(
                self.parts
                    .iter()
                    .map(|p| (p.accessor.clone(), SqlType::Uuid)),
            )
            .collect()
    }

    /// Whether an attribute is meaningful anywhere in this type's generalization chain
    pub fn accepts_attribute(&self, name: &str) -> bool {
        self.property(name).is_some()
            || self.part(name).is_some()
            || self.ancestors.iter().any(|a| a.graph.accepts_attribute(name))
    }

    /// This type followed by every transitive ancestor, each listed once
    pub fn generalization_chain(self: &Arc<Self>) -> Vec<Arc<TypeGraph>> {
        let mut seen = HashSet::new();
        let mut chain = Vec::new();
        let mut stack = vec![Arc::clone(self)];
        while let Some(graph) = stack.pop() {
            if !seen.insert(graph.key.clone()) {
                continue;
            }
            for ancestor in graph.ancestors.iter().rev() {
                stack.push(Arc::clone(&ancestor.graph));
            }
            chain.push(graph);
        }
        chain
    }

    /// Whether the type keyed `key` is an ancestor or a part of this type, at any depth
    pub fn depends_on(&self, key: &str) -> bool {
        self.ancestors
            .iter()
            .map(|a| &a.graph)
            .chain(self.parts.iter().map(|p| &p.graph))
            .any(|g| g.key == key || g.depends_on(key))
    }

    /// Joins needed to read this type: one per ancestor and per part, transitively
    pub fn join_count(&self) -> usize {
        self.parts
            .iter()
            .map(|p| 1 + p.graph.join_count())
            .chain(self.ancestors.iter().map(|a| 1 + a.graph.join_count()))
            .sum()
    }
}
