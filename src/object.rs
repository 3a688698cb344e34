//! Dynamic model instances
//!
//! A [`ModelObject`] is what callers hand to `save` and what `get`/`list` decode: a type
//! name, the two identities, and a bag of attributes. Composed parts are nested objects
//! stored under the part's accessor name.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Text(String),
    Object(Box<ModelObject>),
    /// Arbitrary JSON, stored as text
    Opaque(serde_json::Value),
}

impl AttrValue {
    pub fn is_null(&self) -> bool {
        matches!(self, AttrValue::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttrValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            AttrValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ModelObject> {
        match self {
            AttrValue::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Short kind name used in error messages
    pub fn kind_name(&self) -> &'static str {
        match self {
            AttrValue::Null => "null",
            AttrValue::Boolean(_) => "boolean",
            AttrValue::Integer(_) => "integer",
            AttrValue::Text(_) => "string",
            AttrValue::Object(_) => "object",
            AttrValue::Opaque(_) => "opaque",
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Text(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::Text(value)
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        AttrValue::Integer(value)
    }
}

impl From<i32> for AttrValue {
    fn from(value: i32) -> Self {
        AttrValue::Integer(value.into())
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        AttrValue::Boolean(value)
    }
}

impl From<ModelObject> for AttrValue {
    fn from(value: ModelObject) -> Self {
        AttrValue::Object(Box::new(value))
    }
}

impl From<serde_json::Value> for AttrValue {
    fn from(value: serde_json::Value) -> Self {
        AttrValue::Opaque(value)
    }
}

/// One instance of a defined type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelObject {
    #[serde(rename = "$type")]
    pub type_name: String,
    /// Public sequential identifier, assigned on first save
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Identity shared across the generalization chain
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub surrogate: Option<Uuid>,
    #[serde(flatten)]
    pub attributes: BTreeMap<String, AttrValue>,
}

impl ModelObject {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            id: None,
            surrogate: None,
            attributes: BTreeMap::new(),
        }
    }

    /// Builder-style attribute assignment
    pub fn with(mut self, name: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<AttrValue>) {
        self.attributes.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.attributes.get(name)
    }

    pub fn get_object(&self, name: &str) -> Option<&ModelObject> {
        self.get(name).and_then(AttrValue::as_object)
    }

    /// Not persisted yet: no public identifier has been assigned
    pub fn is_new(&self) -> bool {
        self.id.is_none()
    }

    pub fn is_type(&self, type_name: &str) -> bool {
        self.type_name.eq_ignore_ascii_case(type_name)
    }
}
