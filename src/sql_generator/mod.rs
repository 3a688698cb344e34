//! Statement construction and SQL rendering.
//!
//! The write coordinator, the schema synchronizer, the catalog and the query compiler all
//! describe their work as [`Statement`] values. Rendering to PostgreSQL-dialect text with
//! numbered placeholders happens in [`to_sql`].

mod statement;
mod to_sql;

pub use statement::{
    ColumnDef, ColumnRef, CreateTable, Delete, Insert, Join, Predicate, Select, SelectItem,
    SqlType, SqlValue, Statement, TableRef, Update,
};
pub use to_sql::{quote_ident, ParamList, RenderedStatement, ToSql};
