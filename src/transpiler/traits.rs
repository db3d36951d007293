//! Transpiler traits and utilities.

use crate::ast::{ActionKind, Primitive, PropertyOrdering};
use crate::error::{IrError, IrResult};
use crate::transpiler::Dialect;
use crate::transpiler::dml::select::SelectParts;
use crate::transpiler::statement::Fragment;

/// SQL reserved words that must be quoted when used as identifiers.
pub const RESERVED_WORDS: &[&str] = &[
    "order",
    "group",
    "user",
    "table",
    "select",
    "from",
    "where",
    "join",
    "left",
    "right",
    "inner",
    "outer",
    "full",
    "on",
    "and",
    "or",
    "not",
    "null",
    "true",
    "false",
    "limit",
    "offset",
    "as",
    "in",
    "is",
    "like",
    "between",
    "having",
    "union",
    "all",
    "distinct",
    "case",
    "when",
    "then",
    "else",
    "end",
    "create",
    "alter",
    "drop",
    "insert",
    "update",
    "delete",
    "index",
    "key",
    "primary",
    "foreign",
    "references",
    "default",
    "constraint",
    "check",
    "values",
    "set",
    "exists",
];

/// Whether an identifier is a reserved word or contains special chars.
pub fn needs_quoting(name: &str) -> bool {
    let lower = name.to_lowercase();
    RESERVED_WORDS.contains(&lower.as_str())
        || name.chars().any(|c| !c.is_alphanumeric() && c != '_')
        || name.chars().next().map(|c| c.is_numeric()).unwrap_or(true)
}

/// How an action hands rows back in the statement text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturningStyle {
    /// Trailing `RETURNING ...`
    Returning,
    /// `OUTPUT <pseudo-table>.col`, placed before the values or the filter
    Output(&'static str),
}

/// How generated keys come back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStyle {
    /// The statement returns them as rows
    Clause(ReturningStyle),
    /// The driver fetches them after execution
    Driver,
    /// Accepted, but nothing is returned
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictStyle {
    /// `ON CONFLICT (...) DO NOTHING | DO UPDATE SET ...`
    OnConflict,
    /// `INSERT IGNORE` / `ON DUPLICATE KEY UPDATE`
    DuplicateKey,
    Unsupported,
}

/// `CASE WHEN x = 'true' THEN 1 ELSE 0 END`
pub fn bool_from_string(expr: Fragment) -> Fragment {
    expr.after("CASE WHEN ").then(" = 'true' THEN 1 ELSE 0 END")
}

/// Trait for dialect-specific SQL generation.
pub trait SqlGenerator {
    fn dialect(&self) -> Dialect;

    /// Quote an identifier (table or column name) unconditionally.
    fn quote_identifier(&self, name: &str) -> String;

    /// Quote an identifier only if it's a reserved word or has special chars.
    fn escape_identifier(&self, name: &str) -> String {
        if needs_quoting(name) {
            self.quote_identifier(name)
        } else {
            name.to_string()
        }
    }

    /// Generate the parameter placeholder (e.g., $1, ?, @p1) for a given index.
    fn placeholder(&self, index: usize) -> String;

    /// Get the boolean literal (true/false vs 1/0).
    fn bool_literal(&self, val: bool) -> String;

    /// Whether boolean columns and literals can stand where a predicate is
    /// expected, and predicates where a value is expected.
    fn native_booleans(&self) -> bool {
        true
    }

    /// Generate string concatenation expression (e.g. 'a' || 'b' vs CONCAT('a', 'b')).
    fn string_concat(&self, parts: Vec<Fragment>) -> Fragment {
        Fragment::join(parts, " || ")
    }

    fn length_function(&self) -> &str {
        "LENGTH"
    }

    /// Type name used by `CAST(x AS type)`.
    fn cast_type(&self, to: Primitive) -> &str;

    fn cast(&self, expr: Fragment, to: Primitive) -> Fragment {
        match to {
            Primitive::Boolean => bool_from_string(expr),
            _ => expr.after("CAST(").then(&format!(" AS {})", self.cast_type(to))),
        }
    }

    /// Sort key(s) for one ordering. Default: native `NULLS FIRST|LAST`.
    fn order_key(&self, key: Fragment, ordering: PropertyOrdering) -> Vec<Fragment> {
        let suffix = match ordering {
            PropertyOrdering::Asc => " ASC",
            PropertyOrdering::Desc => " DESC",
            PropertyOrdering::AscNullsFirst => " ASC NULLS FIRST",
            PropertyOrdering::AscNullsLast => " ASC NULLS LAST",
            PropertyOrdering::DescNullsFirst => " DESC NULLS FIRST",
            PropertyOrdering::DescNullsLast => " DESC NULLS LAST",
        };
        vec![key.then(suffix)]
    }

    /// Place limit and offset. Default: trailing `LIMIT n OFFSET m`.
    fn limit_offset(
        &self,
        parts: &mut SelectParts,
        limit: Option<Fragment>,
        offset: Option<Fragment>,
    ) -> IrResult<()> {
        if let Some(n) = limit {
            parts.tail.push_str(" LIMIT ");
            parts.tail.append(n);
        }
        if let Some(m) = offset {
            parts.tail.push_str(" OFFSET ");
            parts.tail.append(m);
        }
        Ok(())
    }

    /// One side of a set operation. `plain` means no ordering or limit.
    fn set_operand(&self, query: Fragment, _plain: bool) -> Fragment {
        query.parens()
    }

    /// Statement-level emptiness check.
    fn exists(&self, query: Fragment, negated: bool) -> Fragment {
        let keyword = if negated { "SELECT NOT EXISTS (" } else { "SELECT EXISTS (" };
        query.after(keyword).then(")")
    }

    fn distinct_on(&self, _keys: Vec<Fragment>) -> IrResult<Fragment> {
        Err(IrError::unsupported(self.dialect(), "DISTINCT ON"))
    }

    /// Flatten a collection-valued column into rows.
    fn unnest(&self, _expr: Fragment) -> IrResult<Fragment> {
        Err(IrError::unsupported(self.dialect(), "UNNEST (concat-map)"))
    }

    /// Whether action statements declare and use the action alias.
    fn qualify_action_columns(&self) -> bool {
        false
    }

    /// Tail of an insert with no columns.
    fn empty_insert(&self) -> &str {
        " DEFAULT VALUES"
    }

    fn returning(&self, kind: ActionKind) -> IrResult<ReturningStyle> {
        Err(IrError::unsupported(
            self.dialect(),
            format!("returning rows from {}", kind),
        ))
    }

    fn generated_keys(&self, kind: ActionKind) -> IrResult<KeyStyle> {
        Err(IrError::unsupported(
            self.dialect(),
            format!("returning generated keys from {}", kind),
        ))
    }

    fn on_conflict(&self) -> ConflictStyle {
        ConflictStyle::Unsupported
    }
}
