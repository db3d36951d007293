//! Capture-avoiding substitution and beta reduction.
//!
//! Substitution replaces free occurrences of identifiers by expressions.
//! Binders shadow the names they redeclare, and a binder that would capture a
//! free name of a replacement is renamed first. While rebuilding the tree the
//! engine also reduces the redexes substitution tends to create:
//!
//! - `(x1, .., xn) => body` applied to `n` arguments becomes `body[xi := ai]`
//! - `(name: v, ..).name` becomes `v`
//! - with block inlining on, `{ val a = v; body }` becomes `body[a := v]`

use std::collections::BTreeSet;

use crate::analysis::free_vars;
use crate::ast::{
    Action, Assignment, ConflictResolution, Delete, Expr, Ident, Insert, OnConflict, Query,
    Returning, Update,
};

/// A single substitution pass. Values are inserted as-is: they are never
/// re-substituted, so chained mappings are not applied transitively.
#[derive(Debug, Clone, Default)]
pub struct Substitution {
    map: Vec<(String, Expr)>,
    inline_blocks: bool,
}

impl Substitution {
    pub fn new(bindings: &[(Ident, Expr)]) -> Self {
        Self {
            map: bindings
                .iter()
                .map(|(id, value)| (id.name.clone(), value.clone()))
                .collect(),
            inline_blocks: false,
        }
    }

    /// Pure reduction pass: no mappings, blocks are inlined.
    pub fn reduction() -> Self {
        Self {
            map: Vec::new(),
            inline_blocks: true,
        }
    }

    pub fn inlining_blocks(mut self, inline: bool) -> Self {
        self.inline_blocks = inline;
        self
    }

    fn lookup(&self, name: &str) -> Option<&Expr> {
        self.map.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    fn with(&self, map: Vec<(String, Expr)>) -> Self {
        Self {
            map,
            inline_blocks: self.inline_blocks,
        }
    }

    /// Free names of all replacement values.
    fn captures(&self) -> BTreeSet<String> {
        self.map
            .iter()
            .flat_map(|(_, v)| free_vars::of_expr(v))
            .collect()
    }

    /// Engine for the body of a scope introducing `binders`, and the binders
    /// to use for the rebuilt node (renamed where they would capture).
    fn enter(&self, binders: &[Ident], body_free: &BTreeSet<String>) -> (Self, Vec<Ident>) {
        let mut map: Vec<(String, Expr)> = self
            .map
            .iter()
            .filter(|(n, _)| !binders.iter().any(|b| &b.name == n))
            .cloned()
            .collect();

        let reaches_body = map.iter().any(|(n, _)| body_free.contains(n));
        if !reaches_body {
            return (self.with(map), binders.to_vec());
        }

        let captures = self.with(map.clone()).captures();
        let mut avoid: BTreeSet<String> = captures.clone();
        avoid.extend(body_free.iter().cloned());
        avoid.extend(map.iter().map(|(n, _)| n.clone()));
        avoid.extend(binders.iter().map(|b| b.name.clone()));

        let mut renamed = Vec::with_capacity(binders.len());
        for binder in binders {
            if captures.contains(&binder.name) {
                let fresh = fresh_name(&binder.name, &avoid);
                avoid.insert(fresh.clone());
                let replacement = binder.renamed(fresh);
                map.push((binder.name.clone(), Expr::Ident(replacement.clone())));
                renamed.push(replacement);
            } else {
                renamed.push(binder.clone());
            }
        }
        (self.with(map), renamed)
    }

    fn enter_one(&self, binder: &Ident, body_free: &BTreeSet<String>) -> (Self, Ident) {
        let (inner, mut binders) = self.enter(std::slice::from_ref(binder), body_free);
        let binder = binders.pop().unwrap_or_else(|| binder.clone());
        (inner, binder)
    }

    pub fn expr(&self, e: &Expr) -> Expr {
        match e {
            Expr::Ident(id) => match self.lookup(&id.name) {
                Some(value) => value.clone(),
                None => e.clone(),
            },
            Expr::Constant(_) | Expr::Tag { .. } => e.clone(),
            Expr::Unary { op, expr } => Expr::Unary {
                op: *op,
                expr: Box::new(self.expr(expr)),
            },
            Expr::Binary { left, op, right } => Expr::Binary {
                left: Box::new(self.expr(left)),
                op: *op,
                right: Box::new(self.expr(right)),
            },
            Expr::Aggregation { op, expr } => Expr::Aggregation {
                op: *op,
                expr: Box::new(self.expr(expr)),
            },
            Expr::Function { params, body } => {
                let (inner, params) = self.enter(params, &free_vars::of_expr(body));
                Expr::Function {
                    params,
                    body: Box::new(inner.expr(body)),
                }
            }
            Expr::Apply { function, args } => {
                let function = self.expr(function);
                let args: Vec<Expr> = args.iter().map(|a| self.expr(a)).collect();
                match function {
                    Expr::Function { params, body } if params.len() == args.len() => {
                        let map = params
                            .iter()
                            .map(|p| p.name.clone())
                            .zip(args)
                            .collect();
                        self.with(map).expr(&body)
                    }
                    function => Expr::Apply {
                        function: Box::new(function),
                        args,
                    },
                }
            }
            Expr::Call {
                name,
                kind,
                args,
                tag,
            } => Expr::Call {
                name: name.clone(),
                kind: *kind,
                args: args.iter().map(|a| self.expr(a)).collect(),
                tag: tag.clone(),
            },
            Expr::If { branches, default } => Expr::If {
                branches: branches
                    .iter()
                    .map(|(c, v)| (self.expr(c), self.expr(v)))
                    .collect(),
                default: Box::new(self.expr(default)),
            },
            Expr::Product { fields } => Expr::Product {
                fields: fields
                    .iter()
                    .map(|(n, v)| (n.clone(), self.expr(v)))
                    .collect(),
            },
            Expr::Property {
                base,
                name,
                renameable,
            } => match self.expr(base) {
                Expr::Product { fields } => match fields.iter().find(|(n, _)| n == name) {
                    Some((_, value)) => value.clone(),
                    None => Expr::Property {
                        base: Box::new(Expr::Product { fields }),
                        name: name.clone(),
                        renameable: *renameable,
                    },
                },
                base => Expr::Property {
                    base: Box::new(base),
                    name: name.clone(),
                    renameable: *renameable,
                },
            },
            Expr::Block { bindings, body } => {
                if self.inline_blocks {
                    self.inline_block(bindings, body)
                } else {
                    self.block(bindings, body)
                }
            }
            Expr::Query(q) => Expr::Query(Box::new(self.query(q))),
        }
    }

    fn inline_block(&self, bindings: &[(Ident, Expr)], body: &Expr) -> Expr {
        match bindings.split_first() {
            None => self.expr(body),
            Some(((id, value), rest)) => {
                let value = self.expr(value);
                let mut map: Vec<(String, Expr)> = self
                    .map
                    .iter()
                    .filter(|(n, _)| n != &id.name)
                    .cloned()
                    .collect();
                map.push((id.name.clone(), value));
                self.with(map).inline_block(rest, body)
            }
        }
    }

    fn block(&self, bindings: &[(Ident, Expr)], body: &Expr) -> Expr {
        let mut engine = self.clone();
        let mut out = Vec::with_capacity(bindings.len());
        for (i, (id, value)) in bindings.iter().enumerate() {
            let value = engine.expr(value);
            let rest_free = free_vars::of_expr(&Expr::Block {
                bindings: bindings[i + 1..].to_vec(),
                body: Box::new(body.clone()),
            });
            let (next, id) = engine.enter_one(id, &rest_free);
            out.push((id, value));
            engine = next;
        }
        Expr::Block {
            bindings: out,
            body: Box::new(engine.expr(body)),
        }
    }

    pub fn query(&self, q: &Query) -> Query {
        match q {
            Query::Entity(_) => q.clone(),
            Query::Filter {
                source,
                alias,
                body,
            } => {
                let source = Box::new(self.query(source));
                let (inner, alias) = self.enter_one(alias, &free_vars::of_expr(body));
                Query::Filter {
                    source,
                    alias,
                    body: inner.expr(body),
                }
            }
            Query::Map {
                source,
                alias,
                body,
            } => {
                let source = Box::new(self.query(source));
                let (inner, alias) = self.enter_one(alias, &free_vars::of_expr(body));
                Query::Map {
                    source,
                    alias,
                    body: inner.expr(body),
                }
            }
            Query::ConcatMap {
                source,
                alias,
                body,
            } => {
                let source = Box::new(self.query(source));
                let (inner, alias) = self.enter_one(alias, &free_vars::of_expr(body));
                Query::ConcatMap {
                    source,
                    alias,
                    body: inner.expr(body),
                }
            }
            Query::DistinctOn { source, alias, key } => {
                let source = Box::new(self.query(source));
                let (inner, alias) = self.enter_one(alias, &free_vars::of_expr(key));
                Query::DistinctOn {
                    source,
                    alias,
                    key: inner.expr(key),
                }
            }
            Query::SortBy {
                source,
                alias,
                criteria,
                ordering,
            } => {
                let source = Box::new(self.query(source));
                let (inner, alias) = self.enter_one(alias, &free_vars::of_expr(criteria));
                Query::SortBy {
                    source,
                    alias,
                    criteria: inner.expr(criteria),
                    ordering: ordering.clone(),
                }
            }
            Query::FlatMap {
                source,
                alias,
                body,
            } => {
                let source = Box::new(self.query(source));
                let (inner, alias) = self.enter_one(alias, &free_vars::of_query(body));
                Query::FlatMap {
                    source,
                    alias,
                    body: Box::new(inner.query(body)),
                }
            }
            Query::GroupByMap {
                source,
                by_alias,
                by,
                map_alias,
                select,
            } => {
                let source = Box::new(self.query(source));
                let (by_engine, by_alias) = self.enter_one(by_alias, &free_vars::of_expr(by));
                let (select_engine, map_alias) =
                    self.enter_one(map_alias, &free_vars::of_expr(select));
                Query::GroupByMap {
                    source,
                    by_alias,
                    by: by_engine.expr(by),
                    map_alias,
                    select: select_engine.expr(select),
                }
            }
            Query::Join {
                kind,
                source,
                alias,
                on,
            } => {
                let source = Box::new(self.query(source));
                let (inner, alias) = self.enter_one(alias, &free_vars::of_expr(on));
                Query::Join {
                    kind: *kind,
                    source,
                    alias,
                    on: inner.expr(on),
                }
            }
            Query::Aggregate { op, source } => Query::Aggregate {
                op: *op,
                source: Box::new(self.query(source)),
            },
            Query::Distinct(q) => Query::Distinct(Box::new(self.query(q))),
            Query::Nested(q) => Query::Nested(Box::new(self.query(q))),
            Query::IsEmpty(q) => Query::IsEmpty(Box::new(self.query(q))),
            Query::NonEmpty(q) => Query::NonEmpty(Box::new(self.query(q))),
            Query::Take { source, count } => Query::Take {
                source: Box::new(self.query(source)),
                count: self.expr(count),
            },
            Query::Drop { source, count } => Query::Drop {
                source: Box::new(self.query(source)),
                count: self.expr(count),
            },
            Query::SetOperation { op, left, right } => Query::SetOperation {
                op: *op,
                left: Box::new(self.query(left)),
                right: Box::new(self.query(right)),
            },
        }
    }

    fn assignments(&self, list: &[Assignment]) -> Vec<Assignment> {
        list.iter()
            .map(|a| Assignment {
                property: self.expr(&a.property),
                value: self.expr(&a.value),
            })
            .collect()
    }

    fn returning(&self, r: &Option<Returning>) -> Option<Returning> {
        r.as_ref().map(|r| {
            let (inner, alias) = self.enter_one(r.alias(), &free_vars::of_expr(r.body()));
            let body = inner.expr(r.body());
            match r {
                Returning::Rows { .. } => Returning::Rows { alias, body },
                Returning::GeneratedKeys { .. } => Returning::GeneratedKeys { alias, body },
            }
        })
    }

    pub fn action(&self, a: &Action) -> Action {
        match a {
            Action::Insert(insert) => {
                let target = self.query(&insert.target);
                let scope = free_vars::of_action(&Action::Insert(Insert {
                    target: Query::Entity(crate::ast::Entity::new("", Default::default())),
                    returning: None,
                    ..insert.clone()
                }));
                let body_free = with_name(scope, &insert.alias.name);
                let (inner, alias) = self.enter_one(&insert.alias, &body_free);
                let on_conflict = insert.on_conflict.as_ref().map(|c| OnConflict {
                    target: c.target.iter().map(|t| inner.expr(t)).collect(),
                    resolution: match &c.resolution {
                        ConflictResolution::Ignore => ConflictResolution::Ignore,
                        ConflictResolution::Update {
                            existing,
                            excluded,
                            assignments,
                        } => {
                            let free: BTreeSet<String> = assignments
                                .iter()
                                .flat_map(|a| {
                                    free_vars::of_expr(&a.property)
                                        .into_iter()
                                        .chain(free_vars::of_expr(&a.value))
                                })
                                .collect();
                            let (engine, binders) =
                                inner.enter(&[existing.clone(), excluded.clone()], &free);
                            let mut binders = binders.into_iter();
                            ConflictResolution::Update {
                                existing: binders.next().unwrap_or_else(|| existing.clone()),
                                excluded: binders.next().unwrap_or_else(|| excluded.clone()),
                                assignments: engine.assignments(assignments),
                            }
                        }
                    },
                });
                Action::Insert(Insert {
                    target,
                    assignments: inner.assignments(&insert.assignments),
                    alias,
                    on_conflict,
                    returning: self.returning(&insert.returning),
                })
            }
            Action::Update(update) => {
                let target = self.query(&update.target);
                let mut body_free: BTreeSet<String> = update
                    .assignments
                    .iter()
                    .flat_map(|a| {
                        free_vars::of_expr(&a.property)
                            .into_iter()
                            .chain(free_vars::of_expr(&a.value))
                    })
                    .collect();
                if let Some(f) = &update.filter {
                    body_free.extend(free_vars::of_expr(f));
                }
                let (inner, alias) = self.enter_one(&update.alias, &body_free);
                Action::Update(Update {
                    target,
                    assignments: inner.assignments(&update.assignments),
                    filter: update.filter.as_ref().map(|f| inner.expr(f)),
                    alias,
                    returning: self.returning(&update.returning),
                })
            }
            Action::Delete(delete) => {
                let target = self.query(&delete.target);
                let body_free = delete
                    .filter
                    .as_ref()
                    .map(free_vars::of_expr)
                    .unwrap_or_default();
                let (inner, alias) = self.enter_one(&delete.alias, &body_free);
                Action::Delete(Delete {
                    target,
                    filter: delete.filter.as_ref().map(|f| inner.expr(f)),
                    alias,
                    returning: self.returning(&delete.returning),
                })
            }
        }
    }
}

/// Free names of an insert body as if its alias were unbound.
fn with_name(mut free: BTreeSet<String>, alias: &str) -> BTreeSet<String> {
    free.insert(alias.to_string());
    free
}

/// `base` with a numeric suffix that is not in `avoid`.
pub(crate) fn fresh_name(base: &str, avoid: &BTreeSet<String>) -> String {
    let stem = base.trim_end_matches(|c: char| c.is_ascii_digit());
    let stem = if stem.is_empty() { base } else { stem };
    (1..)
        .map(|n| format!("{}{}", stem, n))
        .find(|candidate| !avoid.contains(candidate))
        .unwrap_or_else(|| format!("{}_", base))
}

/// Replace free occurrences of the bound identifiers in `e`.
pub fn substitute(e: &Expr, bindings: &[(Ident, Expr)]) -> Expr {
    Substitution::new(bindings).expr(e)
}

/// Replace free occurrences of the bound identifiers in `q`.
pub fn substitute_query(q: &Query, bindings: &[(Ident, Expr)]) -> Query {
    Substitution::new(bindings).query(q)
}

/// Replace free occurrences of the bound identifiers in `a`.
pub fn substitute_action(a: &Action, bindings: &[(Ident, Expr)]) -> Action {
    Substitution::new(bindings).action(a)
}

/// Beta-normal form of an expression.
pub fn reduce(e: &Expr) -> Expr {
    Substitution::reduction().expr(e)
}

/// Beta-normal form of every expression in a query.
pub fn reduce_query(q: &Query) -> Query {
    Substitution::reduction().query(q)
}

/// Beta-normal form of every expression in an action.
pub fn reduce_action(a: &Action) -> Action {
    Substitution::reduction().action(a)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builders::*;
    use crate::ast::TypeTag;
    use pretty_assertions::assert_eq;

    fn x_to(value: Expr) -> Vec<(Ident, Expr)> {
        vec![(Ident::new("x"), value)]
    }

    #[test]
    fn test_replaces_free_occurrences() {
        let e = add(ident("x"), ident("y"));
        assert_eq!(substitute(&e, &x_to(int(1))), add(int(1), ident("y")));
    }

    #[test]
    fn test_shadowing_binder_blocks_substitution() {
        let f = lambda(&["x"], add(ident("x"), int(1)));
        assert_eq!(substitute(&f, &x_to(int(9))), f);
    }

    #[test]
    fn test_mappings_are_not_transitive() {
        let bindings = vec![(Ident::new("a"), ident("b")), (Ident::new("b"), ident("c"))];
        assert_eq!(substitute(&ident("a"), &bindings), ident("b"));
    }

    #[test]
    fn test_binder_capturing_replacement_is_renamed() {
        // (y => x + y)[x := y] must not capture the replacement `y`.
        let f = lambda(&["y"], add(ident("x"), ident("y")));
        let out = substitute(&f, &x_to(ident("y")));
        assert_eq!(out, lambda(&["y1"], add(ident("y"), ident("y1"))));
    }

    #[test]
    fn test_property_of_product_reduces() {
        let e = col("x", "name");
        let row = record(vec![("name", col("p", "full_name")), ("age", int(3))]);
        assert_eq!(substitute(&e, &x_to(row)), col("p", "full_name"));
    }

    #[test]
    fn test_nested_property_of_product_reduces() {
        let e = prop(col("x", "_1"), "name");
        let row = tuple(vec![record(vec![("name", text("Joe"))]), int(2)]);
        assert_eq!(substitute(&e, &x_to(row)), text("Joe"));
    }

    #[test]
    fn test_apply_of_function_reduces_in_argument_order() {
        let f = lambda(&["a", "b"], binary(ident("a"), crate::ast::BinaryOp::Sub, ident("b")));
        let e = apply(f, vec![ident("b"), int(1)]);
        // Simultaneous: the `b` passed as first argument is not replaced by `1`.
        assert_eq!(
            reduce(&e),
            binary(ident("b"), crate::ast::BinaryOp::Sub, int(1))
        );
    }

    #[test]
    fn test_apply_of_substituted_function() {
        let e = apply(ident("isAdult"), vec![ident("p")]);
        let defs = vec![(
            Ident::new("isAdult"),
            lambda(&["x"], gt(col("x", "age"), int(18))),
        )];
        assert_eq!(substitute(&e, &defs), gt(col("p", "age"), int(18)));
    }

    #[test]
    fn test_block_inlining() {
        let e = block(vec![("a", int(1)), ("b", add(ident("a"), int(2)))], ident("b"));
        assert_eq!(reduce(&e), add(int(1), int(2)));
    }

    #[test]
    fn test_block_inlining_keeps_outer_names() {
        let e = block(vec![("y", int(1))], add(ident("x"), ident("y")));
        let out = Substitution::new(&x_to(ident("y")))
            .inlining_blocks(true)
            .expr(&e);
        assert_eq!(out, add(ident("y"), int(1)));
    }

    #[test]
    fn test_block_binder_renamed_when_capturing() {
        let e = block(vec![("y", int(1))], add(ident("x"), ident("y")));
        let out = substitute(&e, &x_to(ident("y")));
        assert_eq!(out, block(vec![("y1", int(1))], add(ident("y"), ident("y1"))));
    }

    #[test]
    fn test_query_alias_shadowing() {
        let q = Query::entity("Person", TypeTag::Unknown)
            .filter("x", eq(col("x", "id"), ident("x")));
        assert_eq!(substitute_query(&q, &x_to(int(1))), q);
    }

    #[test]
    fn test_query_alias_capture_avoidance() {
        let q = Query::entity("Person", TypeTag::Unknown)
            .filter("p", eq(col("p", "id"), ident("x")));
        let out = substitute_query(&q, &x_to(col("p", "owner")));
        let expected = Query::entity("Person", TypeTag::Unknown)
            .filter("p1", eq(col("p1", "id"), col("p", "owner")));
        assert_eq!(out, expected);
    }

    #[test]
    fn test_substitution_is_scope_safe() {
        // free(t[x := r]) == (free(t) - {x}) + free(r) whenever x is free in t
        let r = add(ident("y"), ident("z"));
        let fixtures = vec![
            lambda(&["y"], add(ident("x"), ident("y"))),
            lambda(&["z"], lambda(&["y"], add(ident("x"), add(ident("y"), ident("z"))))),
            block(vec![("z", ident("x")), ("y", ident("z"))], add(ident("x"), ident("y"))),
            subquery(
                Query::entity("T", TypeTag::Unknown)
                    .filter("y", eq(col("y", "a"), ident("x")))
                    .map("z", tuple(vec![ident("z"), ident("x")])),
            ),
        ];
        for t in fixtures {
            let before = free_vars::of_expr(&t);
            assert!(before.contains("x"), "fixture must mention x: {}", t);
            let out = substitute(&t, &x_to(r.clone()));
            let mut expected: BTreeSet<String> =
                before.into_iter().filter(|n| n != "x").collect();
            expected.extend(free_vars::of_expr(&r));
            assert_eq!(free_vars::of_expr(&out), expected, "fixture {}", t);
        }
    }
}
