//! # qail-ir — Query IR to dialect SQL
//!
//! Compiles query and action trees into SQL for Postgres, MySQL, SQL Server,
//! SQLite and H2.
//!
//! ## Quick Example
//!
//! ```rust
//! use qail_ir::prelude::*;
//! use qail_ir::ast::builders::*;
//!
//! let people = Query::entity("Person", TypeTag::values(["name", "age"]))
//!     .filter("p", gt(col("p", "age"), int(18)))
//!     .map("p", col("p", "name"));
//!
//! let rendered = Compiler::new(RenderOptions::new(Dialect::Postgres))
//!     .compile_query(&people, &[])
//!     .unwrap();
//! assert_eq!(rendered.sql, "SELECT p.name FROM Person p WHERE p.age > 18");
//! ```
//!
//! ## Pipeline
//!
//! | Stage       | Module                   |
//! |-------------|--------------------------|
//! | substitute  | [`norm::beta`]           |
//! | reduce      | [`norm::beta`]           |
//! | scope check | [`analysis::free_vars`]  |
//! | normalize   | [`sql::normalizer`]      |
//! | verify      | [`analysis::verify`]     |
//! | elide       | [`sql::alias`]           |
//! | render      | [`transpiler`]           |

pub mod analysis;
pub mod ast;
pub mod config;
pub mod error;
pub mod naming;
pub mod norm;
pub mod sql;
pub mod transpiler;

use std::collections::BTreeSet;
use std::fmt::Display;

use crate::analysis::{Clause, HygieneReport};
use crate::ast::{Action, Binding, Expr, Ident, Query};
use crate::sql::SqlQuery;

pub use config::RenderOptions;
pub use error::{IrError, IrResult};
pub use transpiler::{Dialect, Rendered, ReturnShape, ToSql};

pub mod prelude {
    pub use crate::Compiler;
    pub use crate::ast::*;
    pub use crate::config::RenderOptions;
    pub use crate::error::*;
    pub use crate::naming::{Case, NamingStrategy};
    pub use crate::transpiler::{Dialect, Rendered, ReturnShape, ToSql};
}

/// The full pipeline, configured once and applied to any number of trees.
#[derive(Debug, Clone, Default)]
pub struct Compiler {
    options: RenderOptions,
    definitions: Vec<(Ident, Expr)>,
}

impl Compiler {
    pub fn new(options: RenderOptions) -> Self {
        Self {
            options,
            definitions: Vec::new(),
        }
    }

    /// Named expressions substituted for free identifiers before reduction.
    pub fn with_definitions(mut self, definitions: Vec<(Ident, Expr)>) -> Self {
        self.definitions = definitions;
        self
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// Substitute, reduce and scope-check a query.
    fn prepare_query(&self, query: &Query) -> IrResult<Query> {
        let query = if self.definitions.is_empty() {
            query.clone()
        } else {
            norm::substitute_query(query, &self.definitions)
        };
        self.dump("substitute", &query);
        let query = norm::reduce_query(&query);
        self.dump("reduce", &query);
        closed(analysis::of_query(&query), &query)?;
        Ok(query)
    }

    /// Normalized, verified and alias-elided model of a query.
    pub fn normalize(&self, query: &Query) -> IrResult<SqlQuery> {
        let query = self.prepare_query(query)?;
        let model = sql::normalize(&query)?;
        tracing::debug!(dialect = %self.options.dialect, "normalized query");
        analysis::verify(&model).map_err(IrError::Hygiene)?;
        let model = sql::remove_extra_alias(model, &self.options.naming);
        if self.options.trace {
            tracing::trace!(model = ?model, "relational model");
        }
        Ok(model)
    }

    /// Run every stage up to rendering and report the first failure.
    pub fn verify(&self, query: &Query) -> IrResult<()> {
        self.normalize(query).map(|_| ())
    }

    pub fn compile_query(&self, query: &Query, bindings: &[Binding]) -> IrResult<Rendered> {
        let model = self.normalize(query)?;
        let rendered = model.to_sql(&self.options, bindings)?;
        tracing::debug!(
            dialect = %self.options.dialect,
            params = rendered.params.len(),
            "rendered query"
        );
        Ok(rendered)
    }

    pub fn compile_action(&self, action: &Action, bindings: &[Binding]) -> IrResult<Rendered> {
        let action = if self.definitions.is_empty() {
            action.clone()
        } else {
            norm::substitute_action(action, &self.definitions)
        };
        self.dump("substitute", &action);
        let action = norm::reduce_action(&action);
        self.dump("reduce", &action);
        closed(analysis::of_action(&action), &action)?;

        let rendered = action.to_sql(&self.options, bindings)?;
        tracing::debug!(
            dialect = %self.options.dialect,
            kind = %action.kind(),
            params = rendered.params.len(),
            "rendered action"
        );
        Ok(rendered)
    }

    fn dump(&self, stage: &str, tree: &dyn Display) {
        if self.options.trace {
            tracing::trace!(stage, tree = %tree, "intermediate tree");
        }
    }
}

/// Hygiene error unless the whole tree is self-contained.
fn closed(free: BTreeSet<String>, tree: &dyn Display) -> IrResult<()> {
    if free.is_empty() {
        return Ok(());
    }
    let mut report = HygieneReport::default();
    report.push(Clause::Tree, free, tree);
    Err(IrError::Hygiene(report))
}
