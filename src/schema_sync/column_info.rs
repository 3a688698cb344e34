//! Live column metadata of a relation
//!
//! Read through `information_schema.columns`, in ordinal order, so the synchronizer can
//! compare what exists with what a type declares.

use log::debug;

use super::errors::SchemaSyncError;
use crate::backend::SqlExecutor;
use crate::sql_generator::{SqlType, SqlValue, Statement};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveColumn {
    pub name: String,
    /// `information_schema` spelling, e.g. `character varying`
    pub data_type: String,
}

impl LiveColumn {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }

    /// Whether the stored kind is the one `sql_type` would create
    pub fn has_type(&self, sql_type: SqlType) -> bool {
        self.data_type.eq_ignore_ascii_case(sql_type.catalog_name())
    }
}

/// Query the columns of `table`; an absent relation yields an empty list
pub async fn query_table_columns(
    executor: &dyn SqlExecutor,
    table: &str,
) -> Result<Vec<LiveColumn>, SchemaSyncError> {
    let statement = Statement::DescribeColumns {
        table: table.to_string(),
    };
    let result = executor
        .execute(&statement)
        .await
        .map_err(|source| SchemaSyncError::Introspection {
            table: table.to_string(),
            source,
        })?;

    let columns = result
        .rows
        .iter()
        .map(|row| {
            let name = row.get("column_name").and_then(SqlValue::as_text);
            let data_type = row.get("data_type").and_then(SqlValue::as_text);
            match (name, data_type) {
                (Some(name), Some(data_type)) => Ok(LiveColumn::new(name, data_type)),
                _ => Err(SchemaSyncError::MalformedColumn {
                    table: table.to_string(),
                    message: format!("expected column_name and data_type, got {:?}", row.columns()),
                }),
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    debug!(
        "Found {} columns for {}: {:?}",
        columns.len(),
        table,
        columns.iter().map(|c| c.name.as_str()).collect::<Vec<_>>()
    );

    Ok(columns)
}
