//! In-process relational store
//!
//! Interprets [`Statement`] values directly instead of parsing SQL. It honours the parts of
//! PostgreSQL behaviour the mapping relies on:
//!
//! - `CREATE TABLE IF NOT EXISTS`, `ADD COLUMN`, `DROP COLUMN`
//! - `information_schema.columns` style introspection (`serial` reports as `integer`)
//! - serial column assignment, `NOT NULL`, primary key and `UNIQUE` enforcement,
//!   `ON CONFLICT DO NOTHING`, `RETURNING`
//! - `LEFT OUTER JOIN` on column equality with SQL null semantics
//!
//! Every statement is rendered and kept in an execution log so callers can inspect exactly
//! what would have been sent to a real database.

use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use super::{BackendError, QueryResult, Row, SqlExecutor};
use crate::sql_generator::{
    ColumnRef, CreateTable, Delete, Insert, RenderedStatement, Select, SqlType, SqlValue,
    Statement, Update,
};

type StoredRow = HashMap<String, SqlValue>;

#[derive(Debug, Clone)]
struct MemColumn {
    name: String,
    sql_type: SqlType,
    not_null: bool,
    unique: bool,
}

#[derive(Debug, Clone, Default)]
struct MemTable {
    columns: Vec<MemColumn>,
    rows: Vec<StoredRow>,
    primary_key: Vec<String>,
    serials: HashMap<String, i64>,
}

impl MemTable {
    fn column(&self, table: &str, name: &str) -> Result<&MemColumn, BackendError> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| BackendError::UnknownColumn {
                table: table.to_string(),
                column: name.to_string(),
            })
    }

    /// Key columns whose values must be unique across rows
    fn key_sets(&self) -> Vec<Vec<String>> {
        let mut keys = Vec::new();
        if !self.primary_key.is_empty() {
            keys.push(self.primary_key.clone());
        }
        for column in self.columns.iter().filter(|c| c.unique) {
            keys.push(vec![column.name.clone()]);
        }
        keys
    }

    fn conflicts(&self, candidate: &StoredRow) -> Option<Vec<String>> {
        for key in self.key_sets() {
            let values: Vec<&SqlValue> = key
                .iter()
                .map(|c| candidate.get(c).unwrap_or(&SqlValue::Null))
                .collect();
            if values.iter().any(|v| v.is_null()) {
                continue;
            }
            let clash = self.rows.iter().any(|row| {
                key.iter()
                    .zip(values.iter())
                    .all(|(c, v)| row.get(c) == Some(*v))
            });
            if clash {
                return Some(key);
            }
        }
        None
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    tables: BTreeMap<String, MemTable>,
    log: Vec<RenderedStatement>,
}

/// Relational store living entirely in process memory
#[derive(Debug, Default)]
pub struct MemoryExecutor {
    state: Mutex<MemoryState>,
}

impl MemoryExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        // A panic while holding the lock cannot leave a table half-written: every mutation
        // below is validated before it is applied.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Every statement executed so far, rendered as it would be sent to PostgreSQL
    pub fn statements(&self) -> Vec<RenderedStatement> {
        self.state().log.clone()
    }

    pub fn clear_log(&self) {
        self.state().log.clear();
    }

    pub fn table_names(&self) -> Vec<String> {
        self.state().tables.keys().cloned().collect()
    }

    pub fn has_table(&self, table: &str) -> bool {
        self.state().tables.contains_key(table)
    }

    /// `(name, type)` pairs of a relation in ordinal order
    pub fn columns(&self, table: &str) -> Option<Vec<(String, SqlType)>> {
        self.state()
            .tables
            .get(table)
            .map(|t| t.columns.iter().map(|c| (c.name.clone(), c.sql_type)).collect())
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.state().tables.get(table).map_or(0, |t| t.rows.len())
    }

    /// Snapshot of a relation's rows, columns in ordinal order
    pub fn rows(&self, table: &str) -> Vec<Row> {
        let state = self.state();
        let Some(t) = state.tables.get(table) else {
            return Vec::new();
        };
        let names: Vec<String> = t.columns.iter().map(|c| c.name.clone()).collect();
        t.rows
            .iter()
            .map(|row| {
                let values = names
                    .iter()
                    .map(|n| row.get(n).cloned().unwrap_or(SqlValue::Null))
                    .collect();
                Row::new(names.clone(), values)
            })
            .collect()
    }

    fn apply(state: &mut MemoryState, statement: &Statement) -> Result<QueryResult, BackendError> {
        match statement {
            Statement::CreateTable(create) => create_table(state, create),
            Statement::DescribeColumns { table } => Ok(describe_columns(state, table)),
            Statement::AddColumn {
                table,
                column,
                sql_type,
            } => {
                let t = table_mut(state, table)?;
                if t.columns.iter().any(|c| &c.name == column) {
                    return Err(BackendError::DuplicateColumn {
                        table: table.clone(),
                        column: column.clone(),
                    });
                }
                t.columns.push(MemColumn {
                    name: column.clone(),
                    sql_type: *sql_type,
                    not_null: false,
                    unique: false,
                });
                for row in t.rows.iter_mut() {
                    row.insert(column.clone(), SqlValue::Null);
                }
                Ok(QueryResult::default())
            }
            Statement::DropColumn { table, column } => {
                let t = table_mut(state, table)?;
                let idx = t
                    .columns
                    .iter()
                    .position(|c| &c.name == column)
                    .ok_or_else(|| BackendError::UnknownColumn {
                        table: table.clone(),
                        column: column.clone(),
                    })?;
                t.columns.remove(idx);
                t.primary_key.retain(|k| k != column);
                t.serials.remove(column);
                for row in t.rows.iter_mut() {
                    row.remove(column);
                }
                Ok(QueryResult::default())
            }
            Statement::Insert(insert) => insert_row(state, insert),
            Statement::Update(update) => update_rows(state, update),
            Statement::Delete(delete) => delete_rows(state, delete),
            Statement::Select(select) => select_rows(state, select),
        }
    }
}

#[async_trait]
impl SqlExecutor for MemoryExecutor {
    async fn execute(&self, statement: &Statement) -> Result<QueryResult, BackendError> {
        let rendered = statement.render();
        log::debug!("memory: {}", rendered);

        let mut state = self.state();
        state.log.push(rendered);
        Self::apply(&mut state, statement)
    }
}

fn table_ref<'a>(state: &'a MemoryState, table: &str) -> Result<&'a MemTable, BackendError> {
    state
        .tables
        .get(table)
        .ok_or_else(|| BackendError::UnknownTable(table.to_string()))
}

fn table_mut<'a>(
    state: &'a mut MemoryState,
    table: &str,
) -> Result<&'a mut MemTable, BackendError> {
    state
        .tables
        .get_mut(table)
        .ok_or_else(|| BackendError::UnknownTable(table.to_string()))
}

/// Coerce a bound value to the column's storage type
fn coerce(column: &MemColumn, value: &SqlValue) -> Result<SqlValue, BackendError> {
    let mismatch = || BackendError::Conversion {
        column: column.name.clone(),
        message: format!("{} is not a valid {}", value, column.sql_type),
    };
    match (column.sql_type, value) {
        (_, SqlValue::Null) => Ok(SqlValue::Null),
        (SqlType::Text, SqlValue::Text(_)) => Ok(value.clone()),
        // `integer` is four bytes wide
        (SqlType::Integer, SqlValue::Integer(i)) => i32::try_from(*i)
            .map(|_| value.clone())
            .map_err(|_| BackendError::Conversion {
                column: column.name.clone(),
                message: format!("{} is out of range for type integer", i),
            }),
        (SqlType::Serial, SqlValue::Integer(_)) => Ok(value.clone()),
        (SqlType::Boolean, SqlValue::Boolean(_)) => Ok(value.clone()),
        (SqlType::Uuid, SqlValue::Uuid(_)) => Ok(value.clone()),
        (SqlType::Uuid, SqlValue::Text(s)) => {
            Uuid::parse_str(s).map(SqlValue::Uuid).map_err(|_| mismatch())
        }
        _ => Err(mismatch()),
    }
}

fn create_table(
    state: &mut MemoryState,
    create: &CreateTable,
) -> Result<QueryResult, BackendError> {
    if state.tables.contains_key(&create.table) {
        if create.if_not_exists {
            return Ok(QueryResult::default());
        }
        return Err(BackendError::Query {
            sql: Statement::CreateTable(create.clone()).render().sql,
            message: format!("relation \"{}\" already exists", create.table),
        });
    }

    let mut table = MemTable {
        primary_key: create.primary_key.clone(),
        ..MemTable::default()
    };
    for def in &create.columns {
        if def.sql_type == SqlType::Serial {
            table.serials.insert(def.name.clone(), 0);
        }
        table.columns.push(MemColumn {
            name: def.name.clone(),
            sql_type: def.sql_type,
            not_null: def.not_null || create.primary_key.contains(&def.name),
            unique: def.unique,
        });
    }
    for key in &create.primary_key {
        table.column(&create.table, key)?;
    }

    state.tables.insert(create.table.clone(), table);
    Ok(QueryResult::default())
}

fn describe_columns(state: &MemoryState, table: &str) -> QueryResult {
    let names = vec!["column_name".to_string(), "data_type".to_string()];
    let rows = state
        .tables
        .get(table)
        .map(|t| {
            t.columns
                .iter()
                .map(|c| {
                    Row::new(
                        names.clone(),
                        vec![
                            SqlValue::Text(c.name.clone()),
                            SqlValue::Text(c.sql_type.catalog_name().to_string()),
                        ],
                    )
                })
                .collect()
        })
        .unwrap_or_default();
    QueryResult::with_rows(rows)
}

fn insert_row(state: &mut MemoryState, insert: &Insert) -> Result<QueryResult, BackendError> {
    let table = table_mut(state, &insert.table)?;

    let mut provided: HashMap<&str, &SqlValue> = HashMap::new();
    for (column, value) in insert.columns.iter().zip(insert.values.iter()) {
        table.column(&insert.table, column)?;
        provided.insert(column.as_str(), value);
    }

    let mut row = StoredRow::new();
    for column in &table.columns {
        let value = match provided.get(column.name.as_str()) {
            Some(value) => coerce(column, value)?,
            None => match table.serials.get(&column.name) {
                Some(last) => SqlValue::Integer(last + 1),
                None => SqlValue::Null,
            },
        };
        if column.not_null && value.is_null() {
            return Err(BackendError::Query {
                sql: Statement::Insert(insert.clone()).render().sql,
                message: format!(
                    "null value in column \"{}\" violates not-null constraint",
                    column.name
                ),
            });
        }
        row.insert(column.name.clone(), value);
    }

    if let Some(key) = table.conflicts(&row) {
        if insert.on_conflict_do_nothing {
            return Ok(QueryResult::default());
        }
        return Err(BackendError::ConstraintViolation {
            table: insert.table.clone(),
            columns: key.join(", "),
        });
    }

    for (column, last) in table.serials.iter_mut() {
        if let Some(SqlValue::Integer(assigned)) = row.get(column) {
            *last = (*last).max(*assigned);
        }
    }

    let returned = if insert.returning.is_empty() {
        Vec::new()
    } else {
        let values = insert
            .returning
            .iter()
            .map(|c| {
                row.get(c).cloned().ok_or_else(|| BackendError::UnknownColumn {
                    table: insert.table.clone(),
                    column: c.clone(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        vec![Row::new(insert.returning.clone(), values)]
    };

    table.rows.push(row);
    Ok(QueryResult {
        rows: returned,
        rows_affected: 1,
    })
}

fn update_rows(state: &mut MemoryState, update: &Update) -> Result<QueryResult, BackendError> {
    let table = table_mut(state, &update.table)?;
    let key_column = table.column(&update.table, &update.key_column)?.clone();
    let key = coerce(&key_column, &update.key_value)?;

    let mut assignments = Vec::with_capacity(update.assignments.len());
    for (column, value) in &update.assignments {
        let def = table.column(&update.table, column)?;
        assignments.push((column.clone(), coerce(def, value)?));
    }

    if key.is_null() {
        return Ok(QueryResult::affected(0));
    }

    let mut affected = 0;
    for row in table.rows.iter_mut() {
        if row.get(&update.key_column) == Some(&key) {
            for (column, value) in &assignments {
                row.insert(column.clone(), value.clone());
            }
            affected += 1;
        }
    }
    Ok(QueryResult::affected(affected))
}

fn delete_rows(state: &mut MemoryState, delete: &Delete) -> Result<QueryResult, BackendError> {
    let table = table_mut(state, &delete.table)?;
    let key_column = table.column(&delete.table, &delete.key_column)?.clone();
    let key = coerce(&key_column, &delete.key_value)?;
    if key.is_null() {
        return Ok(QueryResult::affected(0));
    }

    let before = table.rows.len();
    table
        .rows
        .retain(|row| row.get(&delete.key_column) != Some(&key));
    Ok(QueryResult::affected((before - table.rows.len()) as u64))
}

type Binding<'a> = HashMap<&'a str, Option<&'a StoredRow>>;

fn lookup(binding: &Binding<'_>, column: &ColumnRef) -> SqlValue {
    match binding.get(column.alias.as_str()) {
        Some(Some(row)) => row.get(&column.column).cloned().unwrap_or(SqlValue::Null),
        _ => SqlValue::Null,
    }
}

fn compare_values(a: &SqlValue, b: &SqlValue) -> Ordering {
    match (a, b) {
        (SqlValue::Null, SqlValue::Null) => Ordering::Equal,
        // NULLS LAST, as PostgreSQL does for ascending order
        (SqlValue::Null, _) => Ordering::Greater,
        (_, SqlValue::Null) => Ordering::Less,
        (SqlValue::Integer(x), SqlValue::Integer(y)) => x.cmp(y),
        (SqlValue::Text(x), SqlValue::Text(y)) => x.cmp(y),
        (SqlValue::Boolean(x), SqlValue::Boolean(y)) => x.cmp(y),
        (SqlValue::Uuid(x), SqlValue::Uuid(y)) => x.cmp(y),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

fn select_rows(state: &MemoryState, select: &Select) -> Result<QueryResult, BackendError> {
    let base = table_ref(state, &select.from.table)?;

    // alias -> (table name, table) for column validation
    let mut scope: HashMap<&str, (&str, &MemTable)> = HashMap::new();
    scope.insert(select.from.alias.as_str(), (select.from.table.as_str(), base));

    let mut bindings: Vec<Binding<'_>> = base
        .rows
        .iter()
        .map(|row| HashMap::from([(select.from.alias.as_str(), Some(row))]))
        .collect();

    for join in &select.joins {
        let joined = table_ref(state, &join.table.table)?;
        scope.insert(join.table.alias.as_str(), (join.table.table.as_str(), joined));
        validate_ref(&scope, &join.left)?;
        validate_ref(&scope, &join.right)?;

        let mut next = Vec::with_capacity(bindings.len());
        for binding in bindings {
            let key = lookup(&binding, &join.right);
            let matches: Vec<&StoredRow> = if key.is_null() {
                Vec::new()
            } else {
                joined
                    .rows
                    .iter()
                    .filter(|row| row.get(&join.left.column) == Some(&key))
                    .collect()
            };

            if matches.is_empty() {
                let mut extended = binding.clone();
                extended.insert(join.table.alias.as_str(), None);
                next.push(extended);
            } else {
                for row in matches {
                    let mut extended = binding.clone();
                    extended.insert(join.table.alias.as_str(), Some(row));
                    next.push(extended);
                }
            }
        }
        bindings = next;
    }

    for item in &select.items {
        validate_ref(&scope, &item.column)?;
    }

    if let Some(filter) = &select.filter {
        let (table_name, table) = validate_ref(&scope, &filter.column)?;
        let value = coerce(table.column(table_name, &filter.column.column)?, &filter.value)?;
        bindings.retain(|b| {
            let cell = lookup(b, &filter.column);
            !cell.is_null() && cell == value
        });
    }

    for column in &select.order_by {
        validate_ref(&scope, column)?;
    }
    if !select.order_by.is_empty() {
        bindings.sort_by(|a, b| {
            select
                .order_by
                .iter()
                .map(|c| compare_values(&lookup(a, c), &lookup(b, c)))
                .find(|o| *o != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });
    }

    let names: Vec<String> = select.items.iter().map(|i| i.alias.clone()).collect();
    let rows = bindings
        .iter()
        .map(|b| {
            let values = select.items.iter().map(|i| lookup(b, &i.column)).collect();
            Row::new(names.clone(), values)
        })
        .collect();

    Ok(QueryResult::with_rows(rows))
}

fn validate_ref<'a>(
    scope: &HashMap<&str, (&'a str, &'a MemTable)>,
    column: &ColumnRef,
) -> Result<(&'a str, &'a MemTable), BackendError> {
    let (table_name, table) =
        scope
            .get(column.alias.as_str())
            .copied()
            .ok_or_else(|| BackendError::UnknownTable(column.alias.clone()))?;
    table.column(table_name, &column.column)?;
    Ok((table_name, table))
}
