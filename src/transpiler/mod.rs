//! SQL Transpiler for the relational model.
//!
//! Renders normalized queries and reduced actions into dialect SQL plus the
//! ordered parameter list.

pub mod dialect;
pub mod dml;
pub mod expr;
pub mod sql;
pub mod statement;
pub mod traits;

#[cfg(test)]
mod tests;

use serde::Serialize;

use crate::ast::{Action, Binding, Expr, Renameable};
use crate::config::RenderOptions;
use crate::error::IrResult;
use crate::sql::SqlQuery;

pub use dialect::Dialect;
pub use dml::ReturnShape;
pub use dml::select::SelectParts;
pub use expr::Renderer;
pub use statement::{Fragment, Param, ParamDescriptor};
pub use traits::{RESERVED_WORDS, SqlGenerator, needs_quoting};

/// Final SQL text with its parameters in marker order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rendered {
    pub sql: String,
    pub params: Vec<ParamDescriptor>,
    pub return_shape: ReturnShape,
}

/// Trait for converting relational nodes to SQL.
pub trait ToSql {
    fn to_sql(&self, options: &RenderOptions, bindings: &[Binding]) -> IrResult<Rendered>;
}

impl ToSql for SqlQuery {
    fn to_sql(&self, options: &RenderOptions, bindings: &[Binding]) -> IrResult<Rendered> {
        let generator = options.dialect.generator();
        let mut renderer = Renderer::new(generator.as_ref(), options, bindings);
        let fragment = renderer.query(self)?;
        let (sql, params) = fragment.finish(generator.as_ref());
        Ok(Rendered {
            sql,
            params,
            return_shape: ReturnShape::Rows(output_columns(self, options)),
        })
    }
}

impl ToSql for Action {
    fn to_sql(&self, options: &RenderOptions, bindings: &[Binding]) -> IrResult<Rendered> {
        let generator = options.dialect.generator();
        let mut renderer = Renderer::new(generator.as_ref(), options, bindings);
        let (fragment, return_shape) = renderer.action(self)?;
        let (sql, params) = fragment.finish(generator.as_ref());
        Ok(Rendered {
            sql,
            params,
            return_shape,
        })
    }
}

/// Column names of the result set, `*` where a whole row is selected.
pub fn output_columns(query: &SqlQuery, options: &RenderOptions) -> Vec<String> {
    match query {
        SqlQuery::Flatten(f) => f
            .select
            .iter()
            .map(|v| match (&v.alias, &v.expr) {
                (Some(alias), _) => alias.clone(),
                (None, Expr::Ident(_)) => "*".to_string(),
                (None, Expr::Property { name, renameable, .. }) => match renameable {
                    Renameable::Fixed => name.clone(),
                    Renameable::ByStrategy => options.naming.apply(name),
                },
                (None, e) => e.to_string(),
            })
            .collect(),
        SqlQuery::SetOperation { left, .. } => output_columns(left, options),
        SqlQuery::Exists { .. } => vec!["exists".to_string()],
    }
}
