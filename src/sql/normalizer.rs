//! Relational normalizer.
//!
//! Collapses chains of query operations into [`FlattenSqlQuery`] levels.
//! Each operation is folded into the level built so far unless doing so
//! would change the meaning of a clause already present, in which case the
//! level is closed and wrapped as a derived table (`nest`).
//!
//! The row of a level is an expression over its from-aliases. Operation
//! bodies are bound to it by substitution, so `filter(x => x.age > 18)` over
//! `Person p` contributes `p.age > 18`.

use std::collections::BTreeSet;

use crate::analysis::free_vars;
use crate::ast::{
    Expr, Ident, Ordering, PropertyOrdering, Query, TypeTag,
};
use crate::error::{IrError, IrResult};
use crate::norm::beta::{fresh_name, substitute, Substitution};
use crate::sql::model::{
    Distinct, FlattenSqlQuery, FromContext, OrderKey, SelectValue, SqlQuery,
};

/// Alias given to a source nobody names.
pub const DEFAULT_ALIAS: &str = "x";

/// Where a level's projection ends up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    /// The statement's own projection: a lone value needs no alias
    Top,
    /// A derived table: every value needs a name the outer level can use
    Nested,
}

/// Normalize a query tree into the relational model.
pub fn normalize(query: &Query) -> IrResult<SqlQuery> {
    normalize_at(query, Level::Top)
}

fn normalize_at(query: &Query, level: Level) -> IrResult<SqlQuery> {
    match query {
        Query::SetOperation { op, left, right } => Ok(SqlQuery::SetOperation {
            op: *op,
            left: Box::new(normalize_at(left, level)?),
            right: Box::new(normalize_at(right, level)?),
        }),
        Query::IsEmpty(q) => Ok(SqlQuery::Exists {
            query: Box::new(normalize_at(q, Level::Nested)?),
            negated: true,
        }),
        Query::NonEmpty(q) => Ok(SqlQuery::Exists {
            query: Box::new(normalize_at(q, Level::Nested)?),
            negated: false,
        }),
        q => Ok(SqlQuery::Flatten(flatten(q, DEFAULT_ALIAS)?.finish(level))),
    }
}

/// A level under construction.
#[derive(Debug, Clone)]
struct Flat {
    query: FlattenSqlQuery,
    row: Expr,
    grouped: bool,
    unnest: bool,
    aggregated: bool,
}

impl Flat {
    fn new(context: FromContext, row: Expr) -> Self {
        Self {
            query: FlattenSqlQuery {
                from: vec![context],
                ..Default::default()
            },
            row,
            grouped: false,
            unnest: false,
            aggregated: false,
        }
    }

    /// Limit, offset or distinct already constrain the rows.
    fn limited(&self) -> bool {
        self.query.limit.is_some() || self.query.offset.is_some() || !self.query.distinct.is_none()
    }

    /// Nothing can be folded after a concat-map or an aggregation.
    fn terminal(&self) -> bool {
        self.unnest || self.aggregated
    }

    fn mergeable(&self) -> bool {
        !self.limited() && !self.terminal() && !self.grouped
    }

    fn finish(self, level: Level) -> FlattenSqlQuery {
        let concat = self.unnest;
        let mut query = self.query;
        query.select = select_values(&self.row, level)
            .into_iter()
            .map(|(expr, alias)| SelectValue {
                expr,
                alias,
                concat,
            })
            .collect();
        query
    }

    /// Close this level as a derived table named `alias`.
    fn into_context(self, alias: &str) -> (FromContext, Expr) {
        let row = reproject(&self.row, &mut Vec::new(), alias, Level::Nested);
        let query = self.finish(Level::Nested);
        (
            FromContext::Query {
                query: Box::new(SqlQuery::Flatten(query)),
                alias: alias.to_string(),
            },
            row,
        )
    }

    fn nest(self, alias: &str) -> Flat {
        let (context, row) = self.into_context(alias);
        Flat::new(context, row)
    }

    fn aliases(&self) -> BTreeSet<String> {
        self.query.from.iter().map(|c| c.alias().to_string()).collect()
    }

    /// Append the contexts and clauses of a flat-map body.
    fn merge(mut self, body: Flat) -> Flat {
        let mut used = self.aliases();
        let mut body = if body.mergeable() {
            body
        } else {
            let alias = fresh_name(DEFAULT_ALIAS, &used);
            body.nest(&alias)
        };

        let mut renames = Vec::new();
        for context in body.query.from.iter_mut() {
            let alias = context.alias().to_string();
            if used.contains(&alias) {
                let fresh = fresh_name(&alias, &used);
                renames.push((
                    Ident::typed(alias, context_tag(context)),
                    Expr::Ident(Ident::typed(fresh.clone(), context_tag(context))),
                ));
                context.set_alias(fresh.clone());
                used.insert(fresh);
            } else {
                used.insert(alias);
            }
        }
        if !renames.is_empty() {
            body = body.rename(&Substitution::new(&renames));
        }

        let Flat { query, row, .. } = body;
        self.query.from.extend(query.from);
        if let Some(filter) = query.filter {
            self.query.filter = Some(Expr::and_opt(self.query.filter.take(), filter));
        }
        self.query.order_by.extend(query.order_by);
        self.row = row;
        self
    }

    /// Apply an alias renaming to every expression of the level.
    fn rename(mut self, s: &Substitution) -> Flat {
        for context in self.query.from.iter_mut() {
            if let FromContext::Join { on, .. } = context {
                *on = s.expr(on);
            }
        }
        self.query.filter = self.query.filter.as_ref().map(|e| s.expr(e));
        for key in self.query.order_by.iter_mut() {
            key.expr = s.expr(&key.expr);
        }
        self.row = s.expr(&self.row);
        self
    }
}

fn context_tag(context: &FromContext) -> TypeTag {
    match context {
        FromContext::Table { entity, .. } => entity.row.clone(),
        FromContext::Query { .. } => TypeTag::Unknown,
        FromContext::Join { context, .. } => context_tag(context),
    }
}

fn bind(body: &Expr, alias: &Ident, row: &Expr) -> Expr {
    substitute(body, &[(alias.clone(), row.clone())])
}

fn flatten(query: &Query, alias: &str) -> IrResult<Flat> {
    match query {
        Query::Entity(entity) => Ok(Flat::new(
            FromContext::Table {
                entity: entity.clone(),
                alias: alias.to_string(),
            },
            Expr::Ident(Ident::typed(alias, entity.row.clone())),
        )),

        Query::Filter {
            source,
            alias: a,
            body,
        } => {
            let mut f = flatten(source, &a.name)?;
            if f.limited() || f.terminal() || (!f.grouped && !f.row.is_simple()) {
                f = f.nest(&a.name);
            }
            let body = bind(body, a, &f.row);
            if f.grouped {
                f.query.having = Some(Expr::and_opt(f.query.having.take(), body));
            } else {
                f.query.filter = Some(Expr::and_opt(f.query.filter.take(), body));
            }
            Ok(f)
        }

        Query::Map {
            source,
            alias: a,
            body,
        } => {
            let mut f = flatten(source, &a.name)?;
            if !f.query.distinct.is_none() || f.terminal() {
                f = f.nest(&a.name);
            }
            f.row = bind(body, a, &f.row);
            Ok(f)
        }

        Query::FlatMap {
            source,
            alias: a,
            body,
        } => {
            let mut f = flatten(source, &a.name)?;
            if !f.mergeable() {
                f = f.nest(&a.name);
            }
            let body = Substitution::new(&[(a.clone(), f.row.clone())]).query(body);
            let mut avoid = f.aliases();
            avoid.extend(free_vars::of_query(&body));
            let g = flatten(&avoid_alias_conflicts(&body, &avoid), DEFAULT_ALIAS)?;
            Ok(f.merge(g))
        }

        Query::ConcatMap {
            source,
            alias: a,
            body,
        } => {
            let mut f = flatten(source, &a.name)?;
            if f.limited() || f.terminal() || f.grouped {
                f = f.nest(&a.name);
            }
            f.row = bind(body, a, &f.row);
            f.unnest = true;
            Ok(f)
        }

        Query::SortBy {
            source,
            alias: a,
            criteria,
            ordering,
        } => {
            let mut f = flatten(source, &a.name)?;
            if f.limited() || f.terminal() || (!f.grouped && !f.row.is_simple()) {
                f = f.nest(&a.name);
            }
            let criteria = bind(criteria, a, &f.row);
            let mut keys = Vec::new();
            order_keys(&criteria, ordering, &mut keys);
            keys.append(&mut f.query.order_by);
            f.query.order_by = keys;
            Ok(f)
        }

        Query::GroupByMap {
            source,
            by_alias,
            by,
            map_alias,
            select,
        } => {
            let mut f = flatten(source, &by_alias.name)?;
            if f.grouped
                || f.limited()
                || f.terminal()
                || !f.row.is_simple()
                || !f.query.order_by.is_empty()
            {
                f = f.nest(&by_alias.name);
            }
            let by = bind(by, by_alias, &f.row);
            let mut keys = Vec::new();
            leaves(&by, &mut Vec::new(), &mut keys);
            f.query.group_by = keys.into_iter().map(|(_, e)| e).collect();
            f.row = bind(select, map_alias, &f.row);
            f.grouped = true;
            Ok(f)
        }

        Query::Aggregate { op, source } => {
            let mut f = flatten(source, alias)?;
            if f.limited() || f.terminal() || f.grouped {
                f = f.nest(alias);
            }
            // Ordering has no effect on an aggregate.
            f.query.order_by.clear();
            f.row = Expr::Aggregation {
                op: *op,
                expr: Box::new(f.row),
            };
            f.aggregated = true;
            Ok(f)
        }

        Query::Distinct(source) => {
            let mut f = flatten(source, alias)?;
            if f.query.distinct == Distinct::All && f.query.limit.is_none() && f.query.offset.is_none() {
                return Ok(f);
            }
            if f.limited() || f.terminal() {
                f = f.nest(alias);
            }
            f.query.distinct = Distinct::All;
            Ok(f)
        }

        Query::DistinctOn {
            source,
            alias: a,
            key,
        } => {
            let mut f = flatten(source, &a.name)?;
            if f.limited() || f.terminal() || f.grouped {
                f = f.nest(&a.name);
            }
            let key = bind(key, a, &f.row);
            let mut keys = Vec::new();
            leaves(&key, &mut Vec::new(), &mut keys);
            f.query.distinct = Distinct::On(keys.into_iter().map(|(_, e)| e).collect());
            Ok(f)
        }

        Query::Take { source, count } => {
            let mut f = flatten(source, alias)?;
            if f.query.limit.is_some() || f.terminal() {
                f = f.nest(alias);
            }
            f.query.limit = Some(count.clone());
            Ok(f)
        }

        Query::Drop { source, count } => {
            let mut f = flatten(source, alias)?;
            if f.query.limit.is_some() || f.query.offset.is_some() || f.terminal() {
                f = f.nest(alias);
            }
            f.query.offset = Some(count.clone());
            Ok(f)
        }

        Query::Join {
            kind,
            source,
            alias: j,
            on,
        } => {
            let (context, row) = source_context(source, &j.name)?;
            let on = bind(on, j, &row);
            Ok(Flat::new(
                FromContext::Join {
                    kind: *kind,
                    context: Box::new(context),
                    on,
                },
                row,
            ))
        }

        Query::Nested(source) => match source.as_ref() {
            Query::SetOperation { .. } => {
                let (context, row) = source_context(source, alias)?;
                Ok(Flat::new(context, row))
            }
            q => Ok(flatten(q, alias)?.nest(alias)),
        },

        Query::SetOperation { .. } => {
            let (context, row) = source_context(query, alias)?;
            Ok(Flat::new(context, row))
        }

        Query::IsEmpty(_) | Query::NonEmpty(_) => Err(IrError::malformed(format!(
            "emptiness check used as a row source: {}",
            query
        ))),
    }
}

/// Rename every binder of `query` whose name is in `avoid`.
///
/// Binders name the from-contexts of the level they are flattened into, and
/// a from-alias is visible to the whole level. An inner binder reusing the
/// name of an outer alias the query still refers to would capture it.
pub fn avoid_alias_conflicts(query: &Query, avoid: &BTreeSet<String>) -> Query {
    let mut taken = avoid.clone();
    taken.extend(free_vars::of_query(query));
    BinderRenamer { avoid, taken }.query(query)
}

struct BinderRenamer<'a> {
    avoid: &'a BTreeSet<String>,
    taken: BTreeSet<String>,
}

impl BinderRenamer<'_> {
    /// The binder to keep and the renaming its scope needs, if any.
    fn binder(&mut self, binder: &Ident) -> (Ident, Option<Substitution>) {
        if !self.avoid.contains(&binder.name) {
            return (binder.clone(), None);
        }
        let fresh = binder.renamed(fresh_name(&binder.name, &self.taken));
        self.taken.insert(fresh.name.clone());
        let renaming = Substitution::new(&[(binder.clone(), Expr::Ident(fresh.clone()))]);
        (fresh, Some(renaming))
    }

    fn scoped(&mut self, binder: &Ident, body: &Expr) -> (Ident, Expr) {
        match self.binder(binder) {
            (binder, Some(renaming)) => (binder, renaming.expr(body)),
            (binder, None) => (binder, body.clone()),
        }
    }

    fn source(&mut self, q: &Query) -> Box<Query> {
        Box::new(self.query(q))
    }

    fn query(&mut self, q: &Query) -> Query {
        match q {
            Query::Entity(_) => q.clone(),
            Query::Filter {
                source,
                alias,
                body,
            } => {
                let source = self.source(source);
                let (alias, body) = self.scoped(alias, body);
                Query::Filter {
                    source,
                    alias,
                    body,
                }
            }
            Query::Map {
                source,
                alias,
                body,
            } => {
                let source = self.source(source);
                let (alias, body) = self.scoped(alias, body);
                Query::Map {
                    source,
                    alias,
                    body,
                }
            }
            Query::ConcatMap {
                source,
                alias,
                body,
            } => {
                let source = self.source(source);
                let (alias, body) = self.scoped(alias, body);
                Query::ConcatMap {
                    source,
                    alias,
                    body,
                }
            }
            Query::DistinctOn { source, alias, key } => {
                let source = self.source(source);
                let (alias, key) = self.scoped(alias, key);
                Query::DistinctOn { source, alias, key }
            }
            Query::SortBy {
                source,
                alias,
                criteria,
                ordering,
            } => {
                let source = self.source(source);
                let (alias, criteria) = self.scoped(alias, criteria);
                Query::SortBy {
                    source,
                    alias,
                    criteria,
                    ordering: ordering.clone(),
                }
            }
            Query::FlatMap {
                source,
                alias,
                body,
            } => {
                let source = self.source(source);
                let (alias, renaming) = self.binder(alias);
                let body = match renaming {
                    Some(renaming) => renaming.query(body),
                    None => body.as_ref().clone(),
                };
                Query::FlatMap {
                    source,
                    alias,
                    body: self.source(&body),
                }
            }
            Query::GroupByMap {
                source,
                by_alias,
                by,
                map_alias,
                select,
            } => {
                let source = self.source(source);
                let (by_alias, by) = self.scoped(by_alias, by);
                let (map_alias, select) = self.scoped(map_alias, select);
                Query::GroupByMap {
                    source,
                    by_alias,
                    by,
                    map_alias,
                    select,
                }
            }
            Query::Join {
                kind,
                source,
                alias,
                on,
            } => {
                let source = self.source(source);
                let (alias, on) = self.scoped(alias, on);
                Query::Join {
                    kind: *kind,
                    source,
                    alias,
                    on,
                }
            }
            Query::Aggregate { op, source } => Query::Aggregate {
                op: *op,
                source: self.source(source),
            },
            Query::Distinct(q) => Query::Distinct(self.source(q)),
            Query::Nested(q) => Query::Nested(self.source(q)),
            Query::IsEmpty(q) => Query::IsEmpty(self.source(q)),
            Query::NonEmpty(q) => Query::NonEmpty(self.source(q)),
            Query::Take { source, count } => Query::Take {
                source: self.source(source),
                count: count.clone(),
            },
            Query::Drop { source, count } => Query::Drop {
                source: self.source(source),
                count: count.clone(),
            },
            Query::SetOperation { op, left, right } => Query::SetOperation {
                op: *op,
                left: self.source(left),
                right: self.source(right),
            },
        }
    }
}

/// A from-context for `query` named `alias`, with the row it exposes.
fn source_context(query: &Query, alias: &str) -> IrResult<(FromContext, Expr)> {
    match query {
        Query::Entity(entity) => Ok((
            FromContext::Table {
                entity: entity.clone(),
                alias: alias.to_string(),
            },
            Expr::Ident(Ident::typed(alias, entity.row.clone())),
        )),
        Query::SetOperation { .. } => {
            let (model, row) = set_operation_branch(query, alias)?;
            Ok((
                FromContext::Query {
                    query: Box::new(model),
                    alias: alias.to_string(),
                },
                reproject(&row, &mut Vec::new(), alias, Level::Nested),
            ))
        }
        q => Ok(flatten(q, alias)?.into_context(alias)),
    }
}

/// Normalize one side of a set operation used as a derived table. The row
/// returned is the left-most branch's, which names the output columns.
fn set_operation_branch(query: &Query, alias: &str) -> IrResult<(SqlQuery, Expr)> {
    match query {
        Query::SetOperation { op, left, right } => {
            let (left, row) = set_operation_branch(left, alias)?;
            let (right, _) = set_operation_branch(right, alias)?;
            Ok((
                SqlQuery::SetOperation {
                    op: *op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                row,
            ))
        }
        q => {
            let f = flatten(q, alias)?;
            let row = f.row.clone();
            Ok((SqlQuery::Flatten(f.finish(Level::Nested)), row))
        }
    }
}

/// Fields of a product-typed alias or property path.
fn product_fields(e: &Expr) -> Option<Vec<String>> {
    match e {
        Expr::Ident(_) | Expr::Property { .. } => match e.type_tag() {
            TypeTag::Product(fields) if !fields.is_empty() => {
                Some(fields.into_iter().map(|(n, _)| n).collect())
            }
            _ => None,
        },
        _ => None,
    }
}

/// Leaf values of a row with the path of field names leading to each.
pub(crate) fn leaves(e: &Expr, path: &mut Vec<String>, out: &mut Vec<(Vec<String>, Expr)>) {
    if let Expr::Product { fields } = e {
        for (name, value) in fields {
            path.push(name.clone());
            leaves(value, path, out);
            path.pop();
        }
    } else if let Some(fields) = product_fields(e) {
        for name in fields {
            path.push(name.clone());
            leaves(&Expr::property(e.clone(), name), path, out);
            path.pop();
        }
    } else {
        out.push((path.clone(), e.clone()));
    }
}

fn leaf_alias(path: &[String], e: &Expr, level: Level) -> Option<String> {
    if matches!(e, Expr::Ident(_)) {
        return None;
    }
    if !path.is_empty() {
        return Some(path.join("_"));
    }
    match (e, level) {
        (Expr::Property { name, .. }, _) => Some(name.clone()),
        (_, Level::Top) => None,
        (_, Level::Nested) => Some("_1".to_string()),
    }
}

fn select_values(row: &Expr, level: Level) -> Vec<(Expr, Option<String>)> {
    let mut out = Vec::new();
    leaves(row, &mut Vec::new(), &mut out);
    out.into_iter()
        .map(|(path, e)| {
            let alias = leaf_alias(&path, &e, level);
            (e, alias)
        })
        .collect()
}

/// The row seen from outside once `row` is projected by a level named
/// `alias`. Mirrors the aliases chosen by [`select_values`].
fn reproject(row: &Expr, path: &mut Vec<String>, alias: &str, level: Level) -> Expr {
    if let Expr::Product { fields } = row {
        let fields = fields
            .iter()
            .map(|(name, value)| {
                path.push(name.clone());
                let value = reproject(value, path, alias, level);
                path.pop();
                (name.clone(), value)
            })
            .collect();
        return Expr::Product { fields };
    }
    if let Some(names) = product_fields(row) {
        let fields = names
            .into_iter()
            .map(|name| {
                path.push(name.clone());
                let value = reproject(&Expr::property(row.clone(), name.clone()), path, alias, level);
                path.pop();
                (name, value)
            })
            .collect();
        return Expr::Product { fields };
    }
    match (row, leaf_alias(path, row, level)) {
        (_, Some(column)) => Expr::fixed_property(Expr::ident(alias), column),
        (Expr::Ident(id), None) => Expr::Ident(Ident::typed(alias, id.tag.clone())),
        (_, None) => Expr::ident(alias),
    }
}

fn first_ordering(ordering: &Ordering) -> PropertyOrdering {
    match ordering {
        Ordering::Property(p) => *p,
        Ordering::Tuple(items) => items.first().map(first_ordering).unwrap_or_default(),
    }
}

/// Sort keys for `criteria`; tuple criteria pair up with tuple orderings.
fn order_keys(criteria: &Expr, ordering: &Ordering, out: &mut Vec<OrderKey>) {
    match (criteria, ordering) {
        (Expr::Product { fields }, Ordering::Tuple(items)) => {
            for (i, (_, value)) in fields.iter().enumerate() {
                let item = items
                    .get(i)
                    .cloned()
                    .unwrap_or(Ordering::Property(PropertyOrdering::default()));
                order_keys(value, &item, out);
            }
        }
        (Expr::Product { fields }, Ordering::Property(_)) => {
            for (_, value) in fields {
                order_keys(value, ordering, out);
            }
        }
        (e, _) if product_fields(e).is_some() => {
            let mut keys = Vec::new();
            leaves(e, &mut Vec::new(), &mut keys);
            let p = first_ordering(ordering);
            out.extend(keys.into_iter().map(|(_, expr)| OrderKey { expr, ordering: p }));
        }
        (e, _) => out.push(OrderKey {
            expr: e.clone(),
            ordering: first_ordering(ordering),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builders::*;
    use crate::ast::{AggregateOp, JoinKind, Renameable};
    use pretty_assertions::assert_eq;

    fn person() -> Query {
        Query::entity("Person", TypeTag::values(["id", "name", "age"]))
    }

    fn flat(q: &Query) -> FlattenSqlQuery {
        match normalize(q).unwrap() {
            SqlQuery::Flatten(f) => f,
            other => panic!("expected a flattened query, got {:?}", other),
        }
    }

    fn aliases(f: &FlattenSqlQuery) -> Vec<Option<String>> {
        f.select.iter().map(|s| s.alias.clone()).collect()
    }

    #[test]
    fn test_filter_and_map_collapse() {
        let q = person()
            .filter("p", eq(col("p", "name"), text("Joe")))
            .map("p", col("p", "name"));
        let f = flat(&q);
        assert_eq!(f.aliases(), vec!["p"]);
        assert_eq!(f.filter, Some(eq(col("p", "name"), text("Joe"))));
        assert_eq!(f.select.len(), 1);
        assert_eq!(f.select[0].expr, col("p", "name"));
        assert_eq!(f.select[0].alias.as_deref(), Some("name"));
    }

    #[test]
    fn test_consecutive_filters_conjoin() {
        let q = person()
            .filter("a", gt(col("a", "age"), int(18)))
            .filter("b", eq(col("b", "name"), text("Joe")));
        let f = flat(&q);
        assert_eq!(
            f.filter,
            Some(and(gt(col("a", "age"), int(18)), eq(col("a", "name"), text("Joe"))))
        );
    }

    #[test]
    fn test_typed_row_expands_to_columns() {
        let f = flat(&person());
        assert_eq!(f.aliases(), vec![DEFAULT_ALIAS]);
        assert_eq!(
            aliases(&f),
            vec![Some("id".into()), Some("name".into()), Some("age".into())]
        );
    }

    #[test]
    fn test_untyped_row_selects_star() {
        let f = flat(&Query::entity("Person", TypeTag::Unknown));
        assert_eq!(f.select[0].expr, ident("x"));
        assert_eq!(f.select[0].alias, None);
    }

    #[test]
    fn test_tuple_aliases_follow_path() {
        let q = Query::entity("Person", TypeTag::Unknown).map(
            "p",
            tuple(vec![
                add(col("p", "age"), int(1)),
                record(vec![("name", col("p", "name"))]),
            ]),
        );
        assert_eq!(
            aliases(&flat(&q)),
            vec![Some("_1".into()), Some("_2_name".into())]
        );
    }

    #[test]
    fn test_top_level_single_value_is_unaliased() {
        let q = person().map("p", add(col("p", "age"), int(1)));
        assert_eq!(aliases(&flat(&q)), vec![None]);
    }

    #[test]
    fn test_filter_after_computed_map_nests() {
        let q = person()
            .map("p", add(col("p", "age"), int(1)))
            .filter("a", gt(ident("a"), int(30)));
        let f = flat(&q);
        assert_eq!(f.aliases(), vec!["a"]);
        assert_eq!(
            f.filter,
            Some(gt(Expr::fixed_property(ident("a"), "_1"), int(30)))
        );
        match &f.from[0] {
            FromContext::Query { query, .. } => {
                let inner = query.as_flatten().unwrap();
                assert_eq!(inner.select[0].alias.as_deref(), Some("_1"));
            }
            other => panic!("expected derived table, got {:?}", other),
        }
    }

    #[test]
    fn test_sort_after_take_nests_and_take_after_drop_does_not() {
        let q = person()
            .drop(int(5))
            .take(int(10));
        let f = flat(&q);
        assert_eq!(f.limit, Some(int(10)));
        assert_eq!(f.offset, Some(int(5)));

        let q = person()
            .take(int(10))
            .sort_by("p", col("p", "name"), PropertyOrdering::Asc);
        let f = flat(&q);
        assert!(matches!(f.from[0], FromContext::Query { .. }));
        assert_eq!(f.limit, None);
        assert_eq!(
            f.order_by,
            vec![OrderKey {
                expr: Expr::fixed_property(ident("p"), "name"),
                ordering: PropertyOrdering::Asc,
            }]
        );
    }

    #[test]
    fn test_later_sort_keys_come_first() {
        let q = person()
            .sort_by("p", col("p", "age"), PropertyOrdering::Desc)
            .sort_by("p", col("p", "name"), PropertyOrdering::Asc);
        let keys: Vec<Expr> = flat(&q).order_by.into_iter().map(|k| k.expr).collect();
        assert_eq!(keys, vec![col("p", "name"), col("p", "age")]);
    }

    #[test]
    fn test_tuple_sort_pairs_orderings() {
        let q = person().sort_by(
            "p",
            tuple(vec![col("p", "name"), col("p", "age")]),
            Ordering::Tuple(vec![
                PropertyOrdering::Asc.into(),
                PropertyOrdering::DescNullsLast.into(),
            ]),
        );
        let orderings: Vec<PropertyOrdering> =
            flat(&q).order_by.into_iter().map(|k| k.ordering).collect();
        assert_eq!(
            orderings,
            vec![PropertyOrdering::Asc, PropertyOrdering::DescNullsLast]
        );
    }

    #[test]
    fn test_group_by_and_having() {
        let q = person()
            .group_by_map(
                "p",
                col("p", "age"),
                "g",
                tuple(vec![col("g", "age"), aggregate(AggregateOp::Count, ident("g"))]),
            )
            .filter("t", gt(prop(ident("t"), "_2"), int(1)));
        let f = flat(&q);
        assert_eq!(f.group_by, vec![col("p", "age")]);
        assert_eq!(
            f.having,
            Some(gt(aggregate(AggregateOp::Count, typed("p", TypeTag::values(["id", "name", "age"]))), int(1)))
        );
        assert_eq!(f.filter, None);
    }

    #[test]
    fn test_flat_map_merges_joins_in_order() {
        let address = Query::entity("Address", TypeTag::Unknown);
        let q = Query::entity("Person", TypeTag::Unknown).flat_map(
            "p",
            address
                .join(JoinKind::Left, "a", eq(col("a", "owner"), col("p", "id")))
                .map("a", tuple(vec![col("p", "name"), col("a", "street")])),
        );
        let f = flat(&q);
        assert_eq!(f.aliases(), vec!["p", "a"]);
        match &f.from[1] {
            FromContext::Join { kind, on, .. } => {
                assert_eq!(*kind, JoinKind::Left);
                assert_eq!(on, &eq(col("a", "owner"), col("p", "id")));
            }
            other => panic!("expected join, got {:?}", other),
        }
    }

    #[test]
    fn test_flat_map_renames_conflicting_alias() {
        let q = Query::entity("Person", TypeTag::Unknown).flat_map(
            "p",
            Query::entity("Person", TypeTag::Unknown)
                .filter("q", boolean(true))
                .flat_map(
                    "q",
                    Query::entity("Person", TypeTag::Unknown)
                        .map("p", tuple(vec![ident("q"), ident("p")])),
                ),
        );
        let f = flat(&q);
        assert_eq!(f.aliases(), vec!["p", "q", "p1"]);
        let row: Vec<Expr> = f.select.iter().map(|s| s.expr.clone()).collect();
        assert_eq!(row, vec![ident("q"), ident("p1")]);
    }

    #[test]
    fn test_flat_map_keeps_outer_reference_apart_from_inner_binder() {
        // the inner `p` names a new context; the map still reads the outer `p`
        let q = Query::entity("Person", TypeTag::Unknown).flat_map(
            "p",
            Query::entity("Person", TypeTag::Unknown)
                .filter("p", gt(col("p", "boss"), int(0)))
                .map("x", tuple(vec![col("x", "id"), col("p", "id")])),
        );
        let f = flat(&q);
        assert_eq!(f.aliases(), vec!["p", "p1"]);
        assert_eq!(f.filter, Some(gt(col("p1", "boss"), int(0))));
        let row: Vec<Expr> = f.select.iter().map(|s| s.expr.clone()).collect();
        assert_eq!(row, vec![col("p1", "id"), col("p", "id")]);
    }

    #[test]
    fn test_avoid_alias_conflicts_renames_only_listed_binders() {
        let q = Query::entity("Person", TypeTag::Unknown)
            .filter("p", gt(col("p", "age"), int(0)))
            .filter("x", eq(col("x", "boss"), col("p", "id")));
        let avoid: BTreeSet<String> = ["p".to_string()].into();
        let renamed = avoid_alias_conflicts(&q, &avoid);
        assert_eq!(
            renamed,
            Query::entity("Person", TypeTag::Unknown)
                .filter("p1", gt(col("p1", "age"), int(0)))
                .filter("x", eq(col("x", "boss"), col("p", "id")))
        );
        assert_eq!(avoid_alias_conflicts(&q, &BTreeSet::new()), q);
    }

    #[test]
    fn test_union_as_source_is_a_derived_table() {
        let q = person()
            .filter("p", gt(col("p", "age"), int(18)))
            .union(person().filter("p", lt(col("p", "age"), int(5))))
            .map("u", col("u", "name"));
        let f = flat(&q);
        match &f.from[0] {
            FromContext::Query { query, alias } => {
                assert_eq!(alias, "u");
                assert!(matches!(query.as_ref(), SqlQuery::SetOperation { .. }));
            }
            other => panic!("expected derived table, got {:?}", other),
        }
        assert_eq!(
            f.select[0].expr,
            Expr::Property {
                base: Box::new(ident("u")),
                name: "name".into(),
                renameable: Renameable::Fixed,
            }
        );
    }

    #[test]
    fn test_aggregate_is_terminal() {
        let q = person()
            .map("p", col("p", "age"))
            .aggregate(AggregateOp::Max)
            .map("m", add(ident("m"), int(1)));
        let f = flat(&q);
        assert!(matches!(f.from[0], FromContext::Query { .. }));
    }

    #[test]
    fn test_is_empty_normalizes_to_exists() {
        let q = person().filter("p", boolean(true)).is_empty();
        assert!(matches!(
            normalize(&q).unwrap(),
            SqlQuery::Exists { negated: true, .. }
        ));
        let bad = person().is_empty().map("x", ident("x"));
        assert!(matches!(normalize(&bad), Err(IrError::Malformed(_))));
    }
}
