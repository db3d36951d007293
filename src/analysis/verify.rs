//! Hygiene verification of the relational model.
//!
//! Every clause of a level may only mention the aliases the level declares
//! (plus the aliases of enclosing levels, for correlated sub-queries). A join
//! condition is stricter: it may only see the contexts declared up to and
//! including its own join.

use std::collections::BTreeSet;
use std::fmt;

use crate::analysis::free_vars;
use crate::ast::Expr;
use crate::sql::model::{Distinct, FlattenSqlQuery, FromContext, SqlQuery};

/// Clause in which a free identifier was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clause {
    JoinCondition,
    Filter,
    Projection,
    GroupBy,
    Having,
    OrderBy,
    Limit,
    Offset,
    DistinctKey,
    /// Whole tree before normalization (query or action)
    Tree,
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Clause::JoinCondition => "join condition",
            Clause::Filter => "filter",
            Clause::Projection => "projection",
            Clause::GroupBy => "group by",
            Clause::Having => "having",
            Clause::OrderBy => "order by",
            Clause::Limit => "limit",
            Clause::Offset => "offset",
            Clause::DistinctKey => "distinct key",
            Clause::Tree => "tree",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub clause: Clause,
    pub free: BTreeSet<String>,
    /// Text form of the offending sub-tree
    pub subtree: String,
}

/// All hygiene violations found in one tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HygieneReport {
    pub violations: Vec<Violation>,
}

impl HygieneReport {
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    /// Union of every offending identifier.
    pub fn free_idents(&self) -> BTreeSet<String> {
        self.violations
            .iter()
            .flat_map(|v| v.free.iter().cloned())
            .collect()
    }

    pub fn push(&mut self, clause: Clause, free: BTreeSet<String>, subtree: impl fmt::Display) {
        self.violations.push(Violation {
            clause,
            free,
            subtree: subtree.to_string(),
        });
    }
}

impl fmt::Display for HygieneReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let idents: Vec<String> = self.free_idents().into_iter().collect();
        write!(f, "free identifiers [{}]", idents.join(", "))?;
        for v in &self.violations {
            let names: Vec<&str> = v.free.iter().map(String::as_str).collect();
            write!(f, "; {} `{}` uses [{}]", v.clause, v.subtree, names.join(", "))?;
        }
        Ok(())
    }
}

impl std::error::Error for HygieneReport {}

/// Verify a normalized query. Collects every violation before failing.
pub fn verify(query: &SqlQuery) -> Result<(), HygieneReport> {
    let mut report = HygieneReport::default();
    check_query(query, &BTreeSet::new(), &mut report);
    if report.is_empty() {
        Ok(())
    } else {
        Err(report)
    }
}

fn check_query(query: &SqlQuery, outer: &BTreeSet<String>, report: &mut HygieneReport) {
    match query {
        SqlQuery::Flatten(f) => check_flatten(f, outer, report),
        SqlQuery::SetOperation { left, right, .. } => {
            check_query(left, outer, report);
            check_query(right, outer, report);
        }
        SqlQuery::Exists { query, .. } => check_query(query, outer, report),
    }
}

/// Declare the alias of `context`, verifying derived tables on the way.
fn declare(
    context: &FromContext,
    outer: &BTreeSet<String>,
    declared: &mut BTreeSet<String>,
    report: &mut HygieneReport,
) {
    match context {
        FromContext::Table { alias, .. } => {
            declared.insert(alias.clone());
        }
        FromContext::Query { query, alias } => {
            check_query(query, outer, report);
            declared.insert(alias.clone());
        }
        FromContext::Join { context, on, .. } => {
            declare(context, outer, declared, report);
            let visible: BTreeSet<String> = declared.union(outer).cloned().collect();
            check(Clause::JoinCondition, on, &visible, report);
        }
    }
}

fn check(clause: Clause, e: &Expr, visible: &BTreeSet<String>, report: &mut HygieneReport) {
    let free: BTreeSet<String> = free_vars::of_expr(e)
        .into_iter()
        .filter(|name| !visible.contains(name))
        .collect();
    if !free.is_empty() {
        report.push(clause, free, e);
    }
}

fn check_flatten(f: &FlattenSqlQuery, outer: &BTreeSet<String>, report: &mut HygieneReport) {
    let mut declared = BTreeSet::new();
    for context in &f.from {
        declare(context, outer, &mut declared, report);
    }
    let visible: BTreeSet<String> = declared.union(outer).cloned().collect();

    if let Some(filter) = &f.filter {
        check(Clause::Filter, filter, &visible, report);
    }
    for value in &f.select {
        check(Clause::Projection, &value.expr, &visible, report);
    }
    for key in &f.group_by {
        check(Clause::GroupBy, key, &visible, report);
    }
    if let Some(having) = &f.having {
        check(Clause::Having, having, &visible, report);
    }
    for key in &f.order_by {
        check(Clause::OrderBy, &key.expr, &visible, report);
    }
    if let Some(limit) = &f.limit {
        check(Clause::Limit, limit, &visible, report);
    }
    if let Some(offset) = &f.offset {
        check(Clause::Offset, offset, &visible, report);
    }
    if let Distinct::On(keys) = &f.distinct {
        for key in keys {
            check(Clause::DistinctKey, key, &visible, report);
        }
    }
}
