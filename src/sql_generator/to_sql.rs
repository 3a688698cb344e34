use super::statement::{
    ColumnDef, ColumnRef, CreateTable, Delete, Insert, Join, Predicate, Select, SqlValue,
    Statement, Update,
};
use std::fmt;

/// SQL text plus its positional parameters (`$1`, `$2`, ...)
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedStatement {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl fmt::Display for RenderedStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)?;
        if !self.params.is_empty() {
            let params: Vec<String> = self.params.iter().map(|p| p.to_string()).collect();
            write!(f, "  -- [{}]", params.join(", "))?;
        }
        Ok(())
    }
}

/// Parameters collected while rendering one statement
#[derive(Debug, Default)]
pub struct ParamList {
    values: Vec<SqlValue>,
}

impl ParamList {
    /// Bind a value and return its placeholder.
    ///
    /// NULL is written as the keyword instead of a parameter so that drivers never have to
    /// infer a type for an untyped null.
    pub fn bind(&mut self, value: &SqlValue) -> String {
        if value.is_null() {
            return "NULL".to_string();
        }
        self.values.push(value.clone());
        format!("${}", self.values.len())
    }

    pub fn into_values(self) -> Vec<SqlValue> {
        self.values
    }
}

/// Convert a statement node to SQL, binding values into `params`
pub trait ToSql {
    fn to_sql(&self, params: &mut ParamList) -> String;
}

/// Quote an identifier, doubling any embedded quote
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

impl Statement {
    pub fn render(&self) -> RenderedStatement {
        let mut params = ParamList::default();
        let sql = self.to_sql(&mut params);
        RenderedStatement {
            sql,
            params: params.into_values(),
        }
    }
}

impl ToSql for Statement {
    fn to_sql(&self, params: &mut ParamList) -> String {
        match self {
            Statement::CreateTable(create) => create.to_sql(params),
            Statement::DescribeColumns { table } => format!(
                "SELECT column_name::text AS column_name, data_type::text AS data_type \
                 FROM information_schema.columns \
                 WHERE table_schema = current_schema() AND table_name = {} \
                 ORDER BY ordinal_position",
                params.bind(&SqlValue::Text(table.clone()))
            ),
            Statement::AddColumn {
                table,
                column,
                sql_type,
            } => format!(
                "ALTER TABLE {} ADD COLUMN {} {}",
                quote_ident(table),
                quote_ident(column),
                sql_type.ddl_name()
            ),
            Statement::DropColumn { table, column } => format!(
                "ALTER TABLE {} DROP COLUMN {}",
                quote_ident(table),
                quote_ident(column)
            ),
            Statement::Insert(insert) => insert.to_sql(params),
            Statement::Update(update) => update.to_sql(params),
            Statement::Delete(delete) => delete.to_sql(params),
            Statement::Select(select) => select.to_sql(params),
        }
    }
}

impl ToSql for ColumnDef {
    fn to_sql(&self, _params: &mut ParamList) -> String {
        let mut sql = format!("{} {}", quote_ident(&self.name), self.sql_type.ddl_name());
        if self.not_null {
            sql.push_str(" NOT NULL");
        }
        if self.unique {
            sql.push_str(" UNIQUE");
        }
        sql
    }
}

impl ToSql for CreateTable {
    fn to_sql(&self, params: &mut ParamList) -> String {
        let mut parts: Vec<String> = self.columns.iter().map(|c| c.to_sql(params)).collect();
        if !self.primary_key.is_empty() {
            let keys: Vec<String> = self.primary_key.iter().map(|k| quote_ident(k)).collect();
            parts.push(format!("PRIMARY KEY ({})", keys.join(", ")));
        }
        format!(
            "CREATE TABLE {}{} ({})",
            if self.if_not_exists {
                "IF NOT EXISTS "
            } else {
                ""
            },
            quote_ident(&self.table),
            parts.join(", ")
        )
    }
}

impl ToSql for ColumnRef {
    fn to_sql(&self, _params: &mut ParamList) -> String {
        format!("{}.{}", quote_ident(&self.alias), quote_ident(&self.column))
    }
}

impl ToSql for Join {
    fn to_sql(&self, params: &mut ParamList) -> String {
        format!(
            "LEFT OUTER JOIN {} AS {} ON {} = {}",
            quote_ident(&self.table.table),
            quote_ident(&self.table.alias),
            self.left.to_sql(params),
            self.right.to_sql(params)
        )
    }
}

impl ToSql for Predicate {
    fn to_sql(&self, params: &mut ParamList) -> String {
        if self.value.is_null() {
            return format!("{} IS NULL", self.column.to_sql(params));
        }
        format!("{} = {}", self.column.to_sql(params), params.bind(&self.value))
    }
}

impl ToSql for Select {
    fn to_sql(&self, params: &mut ParamList) -> String {
        let items: Vec<String> = self
            .items
            .iter()
            .map(|item| format!("{} AS {}", item.column.to_sql(params), quote_ident(&item.alias)))
            .collect();

        let mut sql = format!(
            "SELECT {} FROM {} AS {}",
            items.join(", "),
            quote_ident(&self.from.table),
            quote_ident(&self.from.alias)
        );

        for join in &self.joins {
            sql.push(' ');
            sql.push_str(&join.to_sql(params));
        }

        if let Some(filter) = &self.filter {
            sql.push_str(" WHERE ");
            sql.push_str(&filter.to_sql(params));
        }

        if !self.order_by.is_empty() {
            let order: Vec<String> = self.order_by.iter().map(|c| c.to_sql(params)).collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&order.join(", "));
        }

        sql
    }
}

impl ToSql for Insert {
    fn to_sql(&self, params: &mut ParamList) -> String {
        let mut sql = if self.columns.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", quote_ident(&self.table))
        } else {
            let columns: Vec<String> = self.columns.iter().map(|c| quote_ident(c)).collect();
            let values: Vec<String> = self.values.iter().map(|v| params.bind(v)).collect();
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                quote_ident(&self.table),
                columns.join(", "),
                values.join(", ")
            )
        };

        if self.on_conflict_do_nothing {
            sql.push_str(" ON CONFLICT DO NOTHING");
        }

        if !self.returning.is_empty() {
            let returning: Vec<String> = self.returning.iter().map(|c| quote_ident(c)).collect();
            sql.push_str(" RETURNING ");
            sql.push_str(&returning.join(", "));
        }

        sql
    }
}

impl ToSql for Update {
    fn to_sql(&self, params: &mut ParamList) -> String {
        let assignments: Vec<String> = self
            .assignments
            .iter()
            .map(|(column, value)| format!("{} = {}", quote_ident(column), params.bind(value)))
            .collect();
        format!(
            "UPDATE {} SET {} WHERE {} = {}",
            quote_ident(&self.table),
            assignments.join(", "),
            quote_ident(&self.key_column),
            params.bind(&self.key_value)
        )
    }
}

impl ToSql for Delete {
    fn to_sql(&self, params: &mut ParamList) -> String {
        format!(
            "DELETE FROM {} WHERE {} = {}",
            quote_ident(&self.table),
            quote_ident(&self.key_column),
            params.bind(&self.key_value)
        )
    }
}
