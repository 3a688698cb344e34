//! Flat result row back to a nested object graph.
//!
//! Mirrors the compile walk: for the relation at a given path, decode composed parts into
//! nested objects under their accessor, merge every ancestor's attributes in, then copy the
//! relation's own scalars (which win over adopted copies) and its surrogate.

use uuid::Uuid;

use super::compiler::CompiledQuery;
use super::errors::MaterializeError;
use crate::backend::Row;
use crate::model_catalog::{PropertyKind, TypeGraph, ID_COLUMN, SURROGATE_COLUMN};
use crate::object::{AttrValue, ModelObject};
use crate::sql_generator::SqlValue;
use crate::utils::column_naming::{child_path, column_alias};

/// Decode one row of `compiled` into an instance of its root type
pub fn materialize(compiled: &CompiledQuery, row: &Row) -> Result<ModelObject, MaterializeError> {
    decode(compiled.root(), compiled.root_path(), row)?.ok_or_else(|| {
        MaterializeError::UnexpectedValue {
            column: column_alias(compiled.root_path(), SURROGATE_COLUMN),
            expected: "uuid".to_string(),
            found: "NULL".to_string(),
        }
    })
}

/// `None` when the relation at `path` had no matching row (outer join miss)
fn decode(
    graph: &TypeGraph,
    path: &str,
    row: &Row,
) -> Result<Option<ModelObject>, MaterializeError> {
    let Some(surrogate) = surrogate(row, path)? else {
        return Ok(None);
    };

    let mut object = ModelObject::new(graph.name());

    for part in graph.parts() {
        let value = match decode(&part.graph, &child_path(path, &part.accessor), row)? {
            Some(nested) => AttrValue::from(nested),
            None => AttrValue::Null,
        };
        object.attributes.insert(part.accessor.clone(), value);
    }

    for ancestor in graph.ancestors() {
        if let Some(view) = decode(&ancestor.graph, &child_path(path, ancestor.graph.key()), row)? {
            for (name, value) in view.attributes {
                object.attributes.entry(name).or_insert(value);
            }
        }
    }

    for property in graph.properties() {
        let column = column_alias(path, &property.name);
        let value = scalar(&column, property.kind, cell(row, &column)?)?;
        object.attributes.insert(property.name.clone(), value);
    }

    let id_column = column_alias(path, ID_COLUMN);
    object.id = match cell(row, &id_column)? {
        SqlValue::Null => None,
        SqlValue::Integer(id) => Some(*id),
        other => return Err(unexpected(&id_column, "integer", other)),
    };
    object.surrogate = Some(surrogate);

    Ok(Some(object))
}

fn cell<'r>(row: &'r Row, column: &str) -> Result<&'r SqlValue, MaterializeError> {
    row.get(column).ok_or_else(|| MaterializeError::MissingColumn {
        column: column.to_string(),
    })
}

fn surrogate(row: &Row, path: &str) -> Result<Option<Uuid>, MaterializeError> {
    let column = column_alias(path, SURROGATE_COLUMN);
    match cell(row, &column)? {
        SqlValue::Null => Ok(None),
        value => value
            .as_uuid()
            .map(Some)
            .ok_or_else(|| unexpected(&column, "uuid", value)),
    }
}

fn scalar(
    column: &str,
    kind: PropertyKind,
    value: &SqlValue,
) -> Result<AttrValue, MaterializeError> {
    match (kind, value) {
        (_, SqlValue::Null) => Ok(AttrValue::Null),
        (PropertyKind::String, SqlValue::Text(s)) => Ok(AttrValue::Text(s.clone())),
        (PropertyKind::Integer, SqlValue::Integer(i)) => Ok(AttrValue::Integer(*i)),
        (PropertyKind::Boolean, SqlValue::Boolean(b)) => Ok(AttrValue::Boolean(*b)),
        (PropertyKind::Opaque, SqlValue::Text(s)) => serde_json::from_str(s)
            .map(AttrValue::Opaque)
            .map_err(|e| MaterializeError::InvalidJson {
                column: column.to_string(),
                message: e.to_string(),
            }),
        (kind, other) => Err(unexpected(column, &kind.to_string(), other)),
    }
}

fn unexpected(column: &str, expected: &str, found: &SqlValue) -> MaterializeError {
    MaterializeError::UnexpectedValue {
        column: column.to_string(),
        expected: expected.to_string(),
        found: found.to_string(),
    }
}
