//! Type graph to single SELECT.
//!
//! The walk starts at the type's property relation (`a0`) and hands out a fresh alias to
//! every relation it visits:
//!
//! - per composed part: `LEFT JOIN p_<part> ON part.surrogate = owner.<accessor>`
//! - per ancestor: `LEFT JOIN p_<ancestor> ON ancestor.surrogate = current.surrogate`
//!
//! Every visited relation contributes its `id`, its `surrogate` and its scalar columns,
//! each selected under a path-encoded name (see [`crate::utils::column_naming`]).

use std::sync::Arc;

use super::errors::CompileError;
use crate::model_catalog::{TypeGraph, ID_COLUMN, SURROGATE_COLUMN};
use crate::sql_generator::{
    ColumnRef, Join, Predicate, RenderedStatement, Select, SelectItem, SqlValue, Statement,
    TableRef,
};
use crate::utils::column_naming::{child_path, column_alias, MAX_IDENTIFIER_LEN};

pub const ROOT_ALIAS: &str = "a0";

#[derive(Debug, Clone)]
pub struct CompiledQuery {
    root: Arc<TypeGraph>,
    select: Select,
}

impl CompiledQuery {
    pub fn root(&self) -> &Arc<TypeGraph> {
        &self.root
    }

    /// Path of the root relation; every other path extends it
    pub fn root_path(&self) -> &str {
        self.root.key()
    }

    pub fn join_count(&self) -> usize {
        self.select.joins.len()
    }

    pub fn select(&self) -> &Select {
        &self.select
    }

    /// Lookup of one object by its public identifier
    pub fn for_id(&self, id: i64) -> Statement {
        let mut select = self.select.clone();
        select.filter = Some(Predicate {
            column: ColumnRef::new(ROOT_ALIAS, ID_COLUMN),
            value: SqlValue::Integer(id),
        });
        Statement::Select(select)
    }

    /// Every object of the type, in public identifier order
    pub fn for_all(&self) -> Statement {
        let mut select = self.select.clone();
        select.order_by = vec![ColumnRef::new(ROOT_ALIAS, ID_COLUMN)];
        Statement::Select(select)
    }

    pub fn render(&self) -> RenderedStatement {
        self.for_all().render()
    }
}

struct Walk {
    next_alias: usize,
    select: Select,
}

impl Walk {
    fn fresh_alias(&mut self) -> String {
        self.next_alias += 1;
        format!("a{}", self.next_alias)
    }

    fn project(&mut self, alias: &str, path: &str, column: &str) -> Result<(), CompileError> {
        let name = column_alias(path, column);
        if name.len() > MAX_IDENTIFIER_LEN {
            return Err(CompileError::AliasTooLong {
                alias: name,
                max: MAX_IDENTIFIER_LEN,
            });
        }
        self.select.items.push(SelectItem {
            column: ColumnRef::new(alias, column),
            alias: name,
        });
        Ok(())
    }

    fn visit(&mut self, graph: &TypeGraph, alias: &str, path: &str) -> Result<(), CompileError> {
        self.project(alias, path, ID_COLUMN)?;
        self.project(alias, path, SURROGATE_COLUMN)?;
        for property in graph.properties() {
            self.project(alias, path, &property.name)?;
        }

        for part in graph.parts() {
            let part_alias = self.fresh_alias();
            self.select.joins.push(Join {
                table: TableRef::new(part.graph.property_relation(), part_alias.clone()),
                left: ColumnRef::new(part_alias.clone(), SURROGATE_COLUMN),
                right: ColumnRef::new(alias, part.accessor.clone()),
            });
            self.visit(&part.graph, &part_alias, &child_path(path, &part.accessor))?;
        }

        for ancestor in graph.ancestors() {
            let ancestor_alias = self.fresh_alias();
            self.select.joins.push(Join {
                table: TableRef::new(ancestor.graph.property_relation(), ancestor_alias.clone()),
                left: ColumnRef::new(ancestor_alias.clone(), SURROGATE_COLUMN),
                right: ColumnRef::new(alias, SURROGATE_COLUMN),
            });
            self.visit(
                &ancestor.graph,
                &ancestor_alias,
                &child_path(path, ancestor.graph.key()),
            )?;
        }
        Ok(())
    }
}

/// Build the read query for `graph`
pub fn compile(graph: &Arc<TypeGraph>) -> Result<CompiledQuery, CompileError> {
    let mut walk = Walk {
        next_alias: 0,
        select: Select {
            from: TableRef::new(graph.property_relation(), ROOT_ALIAS),
            joins: Vec::new(),
            items: Vec::new(),
            filter: None,
            order_by: Vec::new(),
        },
    };
    walk.visit(graph, ROOT_ALIAS, graph.key())?;

    log::debug!(
        "Compiled read query for {}: {} join(s), {} column(s)",
        graph.name(),
        walk.select.joins.len(),
        walk.select.items.len()
    );

    Ok(CompiledQuery {
        root: Arc::clone(graph),
        select: walk.select,
    })
}
