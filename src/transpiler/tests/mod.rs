//! Transpiler tests.
//!
//! | Module     | Covers                                                  |
//! |------------|---------------------------------------------------------|
//! | `core`     | projection, filters, joins, grouping, set operations    |
//! | `dialects` | limit/offset, null ordering, booleans, dialect gaps     |
//! | `actions`  | insert/update/delete, returning, conflict handling      |

mod actions;
mod dialects;

use crate::Compiler;
use crate::ast::{Action, Binding, Query, TypeTag};
use crate::config::RenderOptions;
use crate::error::IrResult;
use crate::transpiler::{Dialect, Rendered};

pub(super) fn compile(dialect: Dialect, q: &Query, bindings: &[Binding]) -> IrResult<Rendered> {
    Compiler::new(RenderOptions::new(dialect)).compile_query(q, bindings)
}

pub(super) fn render(dialect: Dialect, q: &Query) -> String {
    match compile(dialect, q, &[]) {
        Ok(r) => r.sql,
        Err(e) => panic!("{} failed to render {}: {}", dialect, q, e),
    }
}

pub(super) fn render_action(dialect: Dialect, a: &Action) -> IrResult<Rendered> {
    Compiler::new(RenderOptions::new(dialect)).compile_action(a, &[])
}

/// `Person` with no row type: selections render as `p.*`.
pub(super) fn people() -> Query {
    Query::entity("Person", TypeTag::Unknown)
}

/// `Person` with a known row shape.
pub(super) fn person() -> Query {
    Query::entity("Person", TypeTag::values(["id", "name", "age"]))
}
