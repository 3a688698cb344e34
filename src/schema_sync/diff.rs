//! Structural diff between live and desired columns

use std::collections::HashSet;
use std::fmt;

use super::column_info::LiveColumn;
use crate::model_catalog::{ID_COLUMN, SURROGATE_COLUMN};
use crate::sql_generator::{SqlType, Statement};

/// One schema change on a property relation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationStep {
    Add {
        table: String,
        column: String,
        sql_type: SqlType,
    },
    Drop {
        table: String,
        column: String,
    },
    /// Drop and re-add with a new type. Existing values in the column are lost.
    Retype {
        table: String,
        column: String,
        from: String,
        to: SqlType,
    },
}

impl MigrationStep {
    pub fn table(&self) -> &str {
        match self {
            MigrationStep::Add { table, .. }
            | MigrationStep::Drop { table, .. }
            | MigrationStep::Retype { table, .. } => table,
        }
    }

    pub fn column(&self) -> &str {
        match self {
            MigrationStep::Add { column, .. }
            | MigrationStep::Drop { column, .. }
            | MigrationStep::Retype { column, .. } => column,
        }
    }

    /// Statements implementing the step, to be run in order
    pub fn statements(&self) -> Vec<Statement> {
        match self {
            MigrationStep::Add {
                table,
                column,
                sql_type,
            } => vec![Statement::AddColumn {
                table: table.clone(),
                column: column.clone(),
                sql_type: *sql_type,
            }],
            MigrationStep::Drop { table, column } => vec![Statement::DropColumn {
                table: table.clone(),
                column: column.clone(),
            }],
            MigrationStep::Retype {
                table, column, to, ..
            } => vec![
                Statement::DropColumn {
                    table: table.clone(),
                    column: column.clone(),
                },
                Statement::AddColumn {
                    table: table.clone(),
                    column: column.clone(),
                    sql_type: *to,
                },
            ],
        }
    }
}

impl fmt::Display for MigrationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationStep::Add {
                table,
                column,
                sql_type,
            } => write!(f, "ADD {}.{} {}", table, column, sql_type),
            MigrationStep::Drop { table, column } => write!(f, "DROP {}.{}", table, column),
            MigrationStep::Retype {
                table,
                column,
                from,
                to,
            } => write!(f, "RETYPE {}.{} {} -> {}", table, column, from, to),
        }
    }
}

/// Minimal step list turning `live` into `desired`.
///
/// `id` and `surrogate` are never touched. Live columns are visited first, in ordinal
/// order, producing drops and retypes; missing columns are then added in declaration order.
pub fn plan_migration(
    table: &str,
    live: &[LiveColumn],
    desired: &[(String, SqlType)],
) -> Vec<MigrationStep> {
    let mut steps = Vec::new();
    let mut present = HashSet::new();

    for column in live {
        if column.name == ID_COLUMN || column.name == SURROGATE_COLUMN {
            continue;
        }
        present.insert(column.name.as_str());
        match desired.iter().find(|(name, _)| *name == column.name) {
            None => steps.push(MigrationStep::Drop {
                table: table.to_string(),
                column: column.name.clone(),
            }),
            Some((_, sql_type)) if !column.has_type(*sql_type) => {
                steps.push(MigrationStep::Retype {
                    table: table.to_string(),
                    column: column.name.clone(),
                    from: column.data_type.clone(),
                    to: *sql_type,
                })
            }
            Some(_) => {}
        }
    }

    for (name, sql_type) in desired {
        if !present.contains(name.as_str()) {
            steps.push(MigrationStep::Add {
                table: table.to_string(),
                column: name.clone(),
                sql_type: *sql_type,
            });
        }
    }

    steps
}
