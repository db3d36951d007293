//! Relational query model produced by the normalizer.

use serde::Serialize;

use crate::ast::{Entity, Expr, JoinKind, PropertyOrdering, SetOp};

/// One entry of a `FROM` clause.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum FromContext {
    Table {
        entity: Entity,
        alias: String,
    },
    /// Derived table: `(SELECT ...) AS alias`
    Query {
        query: Box<SqlQuery>,
        alias: String,
    },
    /// Joined against every context before it
    Join {
        kind: JoinKind,
        context: Box<FromContext>,
        on: Expr,
    },
}

impl FromContext {
    /// Alias introduced by this context.
    pub fn alias(&self) -> &str {
        match self {
            FromContext::Table { alias, .. } | FromContext::Query { alias, .. } => alias,
            FromContext::Join { context, .. } => context.alias(),
        }
    }

    pub(crate) fn set_alias(&mut self, name: String) {
        match self {
            FromContext::Table { alias, .. } | FromContext::Query { alias, .. } => *alias = name,
            FromContext::Join { context, .. } => context.set_alias(name),
        }
    }
}

/// A projected value with its output alias.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectValue {
    pub expr: Expr,
    pub alias: Option<String>,
    /// Value is a collection flattened into rows (`UNNEST`)
    pub concat: bool,
}

impl SelectValue {
    pub fn new(expr: Expr, alias: Option<String>) -> Self {
        Self {
            expr,
            alias,
            concat: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderKey {
    pub expr: Expr,
    pub ordering: PropertyOrdering,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub enum Distinct {
    #[default]
    None,
    All,
    On(Vec<Expr>),
}

impl Distinct {
    pub fn is_none(&self) -> bool {
        matches!(self, Distinct::None)
    }
}

/// A single `SELECT` level.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FlattenSqlQuery {
    pub from: Vec<FromContext>,
    pub filter: Option<Expr>,
    pub group_by: Vec<Expr>,
    pub having: Option<Expr>,
    pub order_by: Vec<OrderKey>,
    pub limit: Option<Expr>,
    pub offset: Option<Expr>,
    pub select: Vec<SelectValue>,
    pub distinct: Distinct,
}

impl FlattenSqlQuery {
    /// Aliases declared by the from-contexts, in declaration order.
    pub fn aliases(&self) -> Vec<&str> {
        self.from.iter().map(FromContext::alias).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SqlQuery {
    Flatten(FlattenSqlQuery),
    SetOperation {
        op: SetOp,
        left: Box<SqlQuery>,
        right: Box<SqlQuery>,
    },
    /// `EXISTS (query)`, or `NOT EXISTS` when negated
    Exists {
        query: Box<SqlQuery>,
        negated: bool,
    },
}

impl SqlQuery {
    pub fn as_flatten(&self) -> Option<&FlattenSqlQuery> {
        match self {
            SqlQuery::Flatten(f) => Some(f),
            _ => None,
        }
    }
}
