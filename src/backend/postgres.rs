//! PostgreSQL executor built on `sqlx`
//!
//! Only compiled with the `postgres` feature. The executor wraps a [`PgPool`]; hosts either
//! hand over a pool they already manage or let [`PostgresExecutor::connect`] open one from a
//! connection string. All SQL is runtime-checked (`sqlx::query`, never `sqlx::query!`).

use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{Column, PgPool, Postgres, Row as _, TypeInfo};
use uuid::Uuid;

use super::{BackendError, QueryResult, Row, SqlExecutor};
use crate::sql_generator::{SqlValue, Statement};

/// Upper bound on pooled connections opened by [`PostgresExecutor::connect`]
const MAX_CONNECTIONS: u32 = 8;

pub struct PostgresExecutor {
    pool: PgPool,
}

impl PostgresExecutor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, BackendError> {
        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect(database_url)
            .await
            .map_err(|e| BackendError::Connection(e.to_string()))?;

        log::info!("Connected to PostgreSQL (pool size {})", MAX_CONNECTIONS);
        Ok(Self::new(pool))
    }
}

/// Integer properties map to the `integer` column type, so values are bound as `int4`.
fn bind<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &SqlValue,
) -> Result<Query<'q, Postgres, PgArguments>, BackendError> {
    Ok(match value {
        // NULL is rendered inline and never bound
        SqlValue::Null => query.bind(Option::<String>::None),
        SqlValue::Text(s) => query.bind(s.clone()),
        SqlValue::Integer(i) => {
            let narrowed = i32::try_from(*i).map_err(|_| BackendError::Conversion {
                column: "<parameter>".to_string(),
                message: format!("{} does not fit an integer column", i),
            })?;
            query.bind(narrowed)
        }
        SqlValue::Boolean(b) => query.bind(*b),
        SqlValue::Uuid(u) => query.bind(*u),
    })
}

fn decode_cell(row: &PgRow, idx: usize) -> Result<SqlValue, sqlx::Error> {
    let type_name = row.columns()[idx].type_info().name().to_string();
    let value = match type_name.as_str() {
        "BOOL" => row.try_get::<Option<bool>, _>(idx)?.map(SqlValue::Boolean),
        "INT2" => row
            .try_get::<Option<i16>, _>(idx)?
            .map(|v| SqlValue::Integer(v.into())),
        "INT4" => row
            .try_get::<Option<i32>, _>(idx)?
            .map(|v| SqlValue::Integer(v.into())),
        "INT8" => row.try_get::<Option<i64>, _>(idx)?.map(SqlValue::Integer),
        "UUID" => row.try_get::<Option<Uuid>, _>(idx)?.map(SqlValue::Uuid),
        _ => row.try_get::<Option<String>, _>(idx)?.map(SqlValue::Text),
    };
    Ok(value.unwrap_or(SqlValue::Null))
}

fn decode_row(row: &PgRow) -> Result<Row, sqlx::Error> {
    let names: Vec<String> = row.columns().iter().map(|c| c.name().to_string()).collect();
    let values = (0..names.len())
        .map(|idx| decode_cell(row, idx))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Row::new(names, values))
}

#[async_trait]
impl SqlExecutor for PostgresExecutor {
    async fn execute(&self, statement: &Statement) -> Result<QueryResult, BackendError> {
        let rendered = statement.render();
        log::debug!("postgres: {}", rendered);

        let query_error = |e: sqlx::Error| BackendError::Query {
            sql: rendered.sql.clone(),
            message: e.to_string(),
        };

        let mut query = sqlx::query(rendered.sql.as_str());
        for value in &rendered.params {
            query = bind(query, value)?;
        }

        let returns_rows = match statement {
            Statement::Select(_) | Statement::DescribeColumns { .. } => true,
            Statement::Insert(insert) => !insert.returning.is_empty(),
            _ => false,
        };

        if !returns_rows {
            let done = query.execute(&self.pool).await.map_err(query_error)?;
            return Ok(QueryResult::affected(done.rows_affected()));
        }

        let pg_rows = query.fetch_all(&self.pool).await.map_err(query_error)?;
        let rows = pg_rows
            .iter()
            .map(decode_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(query_error)?;

        let rows_affected = match statement {
            Statement::Insert(_) => rows.len() as u64,
            _ => 0,
        };
        Ok(QueryResult {
            rows,
            rows_affected,
        })
    }
}
