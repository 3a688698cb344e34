//! Attribute value to column value conversion

use crate::errors::StoreError;
use crate::model_catalog::{Property, PropertyKind};
use crate::object::AttrValue;
use crate::sql_generator::SqlValue;

/// Check `value` against the declared kind and convert it for binding.
///
/// Opaque properties accept anything but a nested model object and are stored as JSON text.
pub fn property_value(
    type_name: &str,
    property: &Property,
    value: &AttrValue,
) -> Result<SqlValue, StoreError> {
    let invalid = |message: String| StoreError::InvalidValue {
        type_name: type_name.to_string(),
        attribute: property.name.clone(),
        message,
    };

    match (property.kind, value) {
        (_, AttrValue::Null) => Ok(SqlValue::Null),
        (PropertyKind::String, AttrValue::Text(s)) => Ok(SqlValue::Text(s.clone())),
        (PropertyKind::Integer, AttrValue::Integer(i)) => Ok(SqlValue::Integer(*i)),
        (PropertyKind::Boolean, AttrValue::Boolean(b)) => Ok(SqlValue::Boolean(*b)),
        (PropertyKind::Opaque, AttrValue::Object(_)) => Err(invalid(
            "a model object cannot be stored in an opaque property".to_string(),
        )),
        (PropertyKind::Opaque, AttrValue::Opaque(json)) => Ok(SqlValue::Text(json.to_string())),
        (PropertyKind::Opaque, other) => serde_json::to_string(other)
            .map(SqlValue::Text)
            .map_err(|e| invalid(e.to_string())),
        (kind, other) => Err(invalid(format!(
            "expected {}, got {}",
            kind,
            other.kind_name()
        ))),
    }
}
