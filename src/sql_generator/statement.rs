//! Typed statements emitted by the mapping layer.
//!
//! Every piece of SQL the crate runs is built as one of these values first and only then
//! rendered (see [`super::to_sql`]). Values never appear in SQL text: they travel as
//! numbered parameters, and identifiers are always quoted.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Relational column types used by the mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SqlType {
    Text,
    Integer,
    Boolean,
    Uuid,
    /// Auto-incrementing integer, only used for the public identifier column
    Serial,
}

impl SqlType {
    /// Spelling used in DDL
    pub fn ddl_name(&self) -> &'static str {
        match self {
            SqlType::Text => "character varying",
            SqlType::Integer => "integer",
            SqlType::Boolean => "boolean",
            SqlType::Uuid => "uuid",
            SqlType::Serial => "serial",
        }
    }

    /// Spelling reported by `information_schema.columns.data_type`
    pub fn catalog_name(&self) -> &'static str {
        match self {
            SqlType::Serial => "integer",
            other => other.ddl_name(),
        }
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.ddl_name())
    }
}

/// A bound parameter or a returned cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SqlValue {
    Null,
    Text(String),
    Integer(i64),
    Boolean(bool),
    Uuid(Uuid),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            SqlValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            SqlValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SqlValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            SqlValue::Uuid(u) => Some(*u),
            // Text-typed uuids come back from drivers that do not decode the uuid type
            SqlValue::Text(s) => Uuid::parse_str(s).ok(),
            _ => None,
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => f.write_str("NULL"),
            SqlValue::Text(s) => write!(f, "'{}'", s),
            SqlValue::Integer(i) => write!(f, "{}", i),
            SqlValue::Boolean(b) => write!(f, "{}", b),
            SqlValue::Uuid(u) => write!(f, "'{}'", u),
        }
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Integer(value)
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        SqlValue::Boolean(value)
    }
}

impl From<Uuid> for SqlValue {
    fn from(value: Uuid) -> Self {
        SqlValue::Uuid(value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub sql_type: SqlType,
    pub not_null: bool,
    pub unique: bool,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            sql_type,
            not_null: false,
            unique: false,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateTable {
    pub table: String,
    pub columns: Vec<ColumnDef>,
    pub primary_key: Vec<String>,
    pub if_not_exists: bool,
}

/// `alias.column`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    pub alias: String,
    pub column: String,
}

impl ColumnRef {
    pub fn new(alias: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            column: column.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableRef {
    pub table: String,
    pub alias: String,
}

impl TableRef {
    pub fn new(table: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            alias: alias.into(),
        }
    }
}

/// `LEFT OUTER JOIN table AS alias ON left = right`, where `left` belongs to the joined table
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub table: TableRef,
    pub left: ColumnRef,
    pub right: ColumnRef,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectItem {
    pub column: ColumnRef,
    pub alias: String,
}

/// Single equality predicate `column = value`
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub column: ColumnRef,
    pub value: SqlValue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    pub from: TableRef,
    pub joins: Vec<Join>,
    pub items: Vec<SelectItem>,
    pub filter: Option<Predicate>,
    pub order_by: Vec<ColumnRef>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Insert {
    pub table: String,
    pub columns: Vec<String>,
    pub values: Vec<SqlValue>,
    pub returning: Vec<String>,
    /// Silently skip rows that would violate a key (used for catalog edges)
    pub on_conflict_do_nothing: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub table: String,
    pub assignments: Vec<(String, SqlValue)>,
    pub key_column: String,
    pub key_value: SqlValue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Delete {
    pub table: String,
    pub key_column: String,
    pub key_value: SqlValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    CreateTable(CreateTable),
    /// Live `(column_name, data_type)` pairs of a relation, in ordinal order
    DescribeColumns { table: String },
    AddColumn {
        table: String,
        column: String,
        sql_type: SqlType,
    },
    DropColumn { table: String, column: String },
    Insert(Insert),
    Update(Update),
    Delete(Delete),
    Select(Select),
}

impl Statement {
    /// Relation the statement is rooted at
    pub fn table(&self) -> &str {
        match self {
            Statement::CreateTable(create) => &create.table,
            Statement::DescribeColumns { table }
            | Statement::AddColumn { table, .. }
            | Statement::DropColumn { table, .. } => table,
            Statement::Insert(insert) => &insert.table,
            Statement::Update(update) => &update.table,
            Statement::Delete(delete) => &delete.table,
            Statement::Select(select) => &select.from.table,
        }
    }

    pub fn is_schema_change(&self) -> bool {
        matches!(
            self,
            Statement::CreateTable(_) | Statement::AddColumn { .. } | Statement::DropColumn { .. }
        )
    }
}
