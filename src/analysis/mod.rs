//! Scope analysis and hygiene verification.

pub mod free_vars;
pub mod verify;

pub use free_vars::{of_action, of_expr, of_query};
pub use verify::{Clause, HygieneReport, Violation, verify};
