use serde::{Deserialize, Serialize};

use crate::ast::{AggregateOp, Expr, Ident, JoinKind, Ordering, Renameable, SetOp, TypeTag};

/// Schema override of a single property (`name` is stored as `full_name`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyAlias {
    pub property: String,
    pub column: String,
}

/// A table reference with its row type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    #[serde(default)]
    pub row: TypeTag,
    #[serde(default)]
    pub properties: Vec<PropertyAlias>,
    #[serde(default)]
    pub renameable: Renameable,
}

impl Entity {
    pub fn new(name: impl Into<String>, row: TypeTag) -> Self {
        Self {
            name: name.into(),
            row,
            properties: Vec::new(),
            renameable: Renameable::ByStrategy,
        }
    }

    /// Entity whose name is the exact schema name.
    pub fn fixed(name: impl Into<String>, row: TypeTag) -> Self {
        Self {
            renameable: Renameable::Fixed,
            ..Self::new(name, row)
        }
    }

    /// Map `property` to a differently named column.
    pub fn with_alias(mut self, property: impl Into<String>, column: impl Into<String>) -> Self {
        self.properties.push(PropertyAlias {
            property: property.into(),
            column: column.into(),
        });
        self
    }

    pub fn column_of(&self, property: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|a| a.property == property)
            .map(|a| a.column.as_str())
    }
}

/// Relational query tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Query {
    Entity(Entity),
    Filter {
        source: Box<Query>,
        alias: Ident,
        body: Expr,
    },
    Map {
        source: Box<Query>,
        alias: Ident,
        body: Expr,
    },
    FlatMap {
        source: Box<Query>,
        alias: Ident,
        body: Box<Query>,
    },
    /// Flattens a collection-valued expression into rows (UNNEST)
    ConcatMap {
        source: Box<Query>,
        alias: Ident,
        body: Expr,
    },
    SortBy {
        source: Box<Query>,
        alias: Ident,
        criteria: Expr,
        ordering: Ordering,
    },
    /// Group rows by `by`, then project each group with `select`
    GroupByMap {
        source: Box<Query>,
        by_alias: Ident,
        by: Expr,
        map_alias: Ident,
        select: Expr,
    },
    Aggregate {
        op: AggregateOp,
        source: Box<Query>,
    },
    Distinct(Box<Query>),
    DistinctOn {
        source: Box<Query>,
        alias: Ident,
        key: Expr,
    },
    Take {
        source: Box<Query>,
        count: Expr,
    },
    Drop {
        source: Box<Query>,
        count: Expr,
    },
    SetOperation {
        op: SetOp,
        left: Box<Query>,
        right: Box<Query>,
    },
    /// Join `source` under `alias` against the rows of the enclosing flat-map
    Join {
        kind: JoinKind,
        source: Box<Query>,
        alias: Ident,
        on: Expr,
    },
    /// Forces sub-query materialization
    Nested(Box<Query>),
    IsEmpty(Box<Query>),
    NonEmpty(Box<Query>),
}

impl Query {
    pub fn entity(name: impl Into<String>, row: TypeTag) -> Self {
        Query::Entity(Entity::new(name, row))
    }

    pub fn filter(self, alias: impl Into<Ident>, body: Expr) -> Self {
        Query::Filter {
            source: Box::new(self),
            alias: alias.into(),
            body,
        }
    }

    pub fn map(self, alias: impl Into<Ident>, body: Expr) -> Self {
        Query::Map {
            source: Box::new(self),
            alias: alias.into(),
            body,
        }
    }

    pub fn flat_map(self, alias: impl Into<Ident>, body: Query) -> Self {
        Query::FlatMap {
            source: Box::new(self),
            alias: alias.into(),
            body: Box::new(body),
        }
    }

    pub fn concat_map(self, alias: impl Into<Ident>, body: Expr) -> Self {
        Query::ConcatMap {
            source: Box::new(self),
            alias: alias.into(),
            body,
        }
    }

    pub fn sort_by(self, alias: impl Into<Ident>, criteria: Expr, ordering: impl Into<Ordering>) -> Self {
        Query::SortBy {
            source: Box::new(self),
            alias: alias.into(),
            criteria,
            ordering: ordering.into(),
        }
    }

    pub fn group_by_map(
        self,
        by_alias: impl Into<Ident>,
        by: Expr,
        map_alias: impl Into<Ident>,
        select: Expr,
    ) -> Self {
        Query::GroupByMap {
            source: Box::new(self),
            by_alias: by_alias.into(),
            by,
            map_alias: map_alias.into(),
            select,
        }
    }

    pub fn aggregate(self, op: AggregateOp) -> Self {
        Query::Aggregate {
            op,
            source: Box::new(self),
        }
    }

    pub fn distinct(self) -> Self {
        Query::Distinct(Box::new(self))
    }

    pub fn distinct_on(self, alias: impl Into<Ident>, key: Expr) -> Self {
        Query::DistinctOn {
            source: Box::new(self),
            alias: alias.into(),
            key,
        }
    }

    pub fn take(self, count: Expr) -> Self {
        Query::Take {
            source: Box::new(self),
            count,
        }
    }

    pub fn drop(self, count: Expr) -> Self {
        Query::Drop {
            source: Box::new(self),
            count,
        }
    }

    pub fn union(self, other: Query) -> Self {
        Query::SetOperation {
            op: SetOp::Union,
            left: Box::new(self),
            right: Box::new(other),
        }
    }

    pub fn union_all(self, other: Query) -> Self {
        Query::SetOperation {
            op: SetOp::UnionAll,
            left: Box::new(self),
            right: Box::new(other),
        }
    }

    /// Join this query under `alias`; only meaningful as the body of a flat-map.
    pub fn join(self, kind: JoinKind, alias: impl Into<Ident>, on: Expr) -> Self {
        Query::Join {
            kind,
            source: Box::new(self),
            alias: alias.into(),
            on,
        }
    }

    pub fn nested(self) -> Self {
        Query::Nested(Box::new(self))
    }

    pub fn is_empty(self) -> Self {
        Query::IsEmpty(Box::new(self))
    }

    pub fn non_empty(self) -> Self {
        Query::NonEmpty(Box::new(self))
    }
}

impl From<&str> for Ident {
    fn from(value: &str) -> Self {
        Ident::new(value)
    }
}

impl From<String> for Ident {
    fn from(value: String) -> Self {
        Ident::new(value)
    }
}
