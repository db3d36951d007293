//! Free-variable analysis.
//!
//! A fold over the tree threading a [`State`] of `seen` (bound in an
//! enclosing scope) and `free` (escaping) identifier names. Binders extend
//! `seen` for their scope only; `free` accumulates outward.

use std::collections::BTreeSet;

use crate::ast::{Action, Assignment, ConflictResolution, Expr, Ident, Query, Returning};

/// Accumulated scope state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct State {
    pub seen: BTreeSet<String>,
    pub free: BTreeSet<String>,
}

impl State {
    /// State whose `seen` set starts with the given names.
    pub fn with_seen<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            seen: names.into_iter().map(str::to_string).collect(),
            free: BTreeSet::new(),
        }
    }

    fn visit_ident(mut self, id: &Ident) -> Self {
        if !self.seen.contains(&id.name) {
            self.free.insert(id.name.clone());
        }
        self
    }

    /// Run `f` with `binders` added to `seen`, then restore the outer `seen`
    /// while keeping whatever `f` found free.
    fn scoped<'a>(
        self,
        binders: impl IntoIterator<Item = &'a Ident>,
        f: impl FnOnce(State) -> State,
    ) -> State {
        let outer = self.seen.clone();
        let mut inner = self;
        inner.seen.extend(binders.into_iter().map(|b| b.name.clone()));
        let State { free, .. } = f(inner);
        State { seen: outer, free }
    }
}

/// Free identifier names of an expression.
pub fn of_expr(e: &Expr) -> BTreeSet<String> {
    expr(State::default(), e).free
}

/// Free identifier names of a query.
pub fn of_query(q: &Query) -> BTreeSet<String> {
    query(State::default(), q).free
}

/// Free identifier names of an action.
pub fn of_action(a: &Action) -> BTreeSet<String> {
    action(State::default(), a).free
}

pub fn expr(state: State, e: &Expr) -> State {
    match e {
        Expr::Ident(id) => state.visit_ident(id),
        Expr::Constant(_) | Expr::Tag { .. } => state,
        Expr::Unary { expr: inner, .. } => expr(state, inner),
        Expr::Aggregation { expr: inner, .. } => expr(state, inner),
        Expr::Binary { left, right, .. } => {
            let state = expr(state, left);
            expr(state, right)
        }
        Expr::Function { params, body } => state.scoped(params, |s| expr(s, body)),
        Expr::Apply { function, args } => {
            let state = expr(state, function);
            args.iter().fold(state, expr)
        }
        Expr::Call { args, .. } => args.iter().fold(state, expr),
        Expr::If { branches, default } => {
            let state = branches.iter().fold(state, |s, (cond, value)| {
                let s = expr(s, cond);
                expr(s, value)
            });
            expr(state, default)
        }
        Expr::Product { fields } => fields.iter().fold(state, |s, (_, v)| expr(s, v)),
        Expr::Property { base, .. } => expr(state, base),
        Expr::Block { bindings, body } => block(state, bindings, body),
        Expr::Query(q) => query(state, q),
    }
}

/// Each binding sees the ones before it; the body sees all of them.
fn block(state: State, bindings: &[(Ident, Expr)], body: &Expr) -> State {
    let outer = state.seen.clone();
    let mut state = state;
    for (id, value) in bindings {
        state = expr(state, value);
        state.seen.insert(id.name.clone());
    }
    let State { free, .. } = expr(state, body);
    State { seen: outer, free }
}

pub fn query(state: State, q: &Query) -> State {
    match q {
        Query::Entity(_) => state,
        Query::Filter {
            source,
            alias,
            body,
        }
        | Query::Map {
            source,
            alias,
            body,
        }
        | Query::ConcatMap {
            source,
            alias,
            body,
        }
        | Query::DistinctOn {
            source,
            alias,
            key: body,
        } => {
            let state = query(state, source);
            state.scoped([alias], |s| expr(s, body))
        }
        Query::SortBy {
            source,
            alias,
            criteria,
            ..
        } => {
            let state = query(state, source);
            state.scoped([alias], |s| expr(s, criteria))
        }
        Query::FlatMap {
            source,
            alias,
            body,
        } => {
            let state = query(state, source);
            state.scoped([alias], |s| query(s, body))
        }
        Query::GroupByMap {
            source,
            by_alias,
            by,
            map_alias,
            select,
        } => {
            let state = query(state, source);
            let state = state.scoped([by_alias], |s| expr(s, by));
            state.scoped([map_alias], |s| expr(s, select))
        }
        Query::Join {
            source, alias, on, ..
        } => {
            let state = query(state, source);
            state.scoped([alias], |s| expr(s, on))
        }
        Query::Take { source, count } | Query::Drop { source, count } => {
            let state = query(state, source);
            expr(state, count)
        }
        Query::SetOperation { left, right, .. } => {
            let state = query(state, left);
            query(state, right)
        }
        Query::Aggregate { source, .. } => query(state, source),
        Query::Distinct(q) | Query::Nested(q) | Query::IsEmpty(q) | Query::NonEmpty(q) => {
            query(state, q)
        }
    }
}

fn assignments(state: State, list: &[Assignment]) -> State {
    list.iter().fold(state, |s, a| {
        let s = expr(s, &a.property);
        expr(s, &a.value)
    })
}

fn returning(state: State, r: Option<&Returning>) -> State {
    match r {
        Some(r) => state.scoped([r.alias()], |s| expr(s, r.body())),
        None => state,
    }
}

pub fn action(state: State, a: &Action) -> State {
    match a {
        Action::Insert(insert) => {
            let state = query(state, &insert.target);
            let state = state.scoped([&insert.alias], |s| {
                let s = assignments(s, &insert.assignments);
                match &insert.on_conflict {
                    Some(c) => {
                        let s = c.target.iter().fold(s, expr);
                        match &c.resolution {
                            ConflictResolution::Ignore => s,
                            ConflictResolution::Update {
                                existing,
                                excluded,
                                assignments: list,
                            } => s.scoped([existing, excluded], |s| assignments(s, list)),
                        }
                    }
                    None => s,
                }
            });
            returning(state, insert.returning.as_ref())
        }
        Action::Update(update) => {
            let state = query(state, &update.target);
            let state = state.scoped([&update.alias], |s| {
                let s = assignments(s, &update.assignments);
                match &update.filter {
                    Some(f) => expr(s, f),
                    None => s,
                }
            });
            returning(state, update.returning.as_ref())
        }
        Action::Delete(delete) => {
            let state = query(state, &delete.target);
            let state = state.scoped([&delete.alias], |s| match &delete.filter {
                Some(f) => expr(s, f),
                None => s,
            });
            returning(state, delete.returning.as_ref())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builders::*;
    use crate::ast::builders::block;
    use crate::ast::{JoinKind, TypeTag};

    fn names(set: BTreeSet<String>) -> Vec<String> {
        set.into_iter().collect()
    }

    #[test]
    fn test_lambda_binds_its_params() {
        let f = lambda(&["x"], add(ident("x"), ident("y")));
        assert_eq!(names(of_expr(&f)), vec!["y"]);
    }

    #[test]
    fn test_block_bindings_are_sequential() {
        let b = block(
            vec![("a", ident("z")), ("b", ident("a"))],
            add(ident("a"), ident("b")),
        );
        assert_eq!(names(of_expr(&b)), vec!["z"]);
    }

    #[test]
    fn test_block_binding_does_not_see_itself() {
        let b = block(vec![("a", ident("a"))], ident("a"));
        assert_eq!(names(of_expr(&b)), vec!["a"]);
    }

    #[test]
    fn test_filter_alias_is_bound() {
        let q = Query::entity("Person", TypeTag::Unknown)
            .filter("p", eq(col("p", "name"), col("q", "name")));
        assert_eq!(names(of_query(&q)), vec!["q"]);
    }

    #[test]
    fn test_join_condition_referencing_later_alias_is_free() {
        let q = Query::entity("A", TypeTag::Unknown).flat_map(
            "a",
            Query::entity("B", TypeTag::Unknown)
                .join(JoinKind::Inner, "b", eq(col("b", "x"), col("c", "x")))
                .flat_map(
                    "b",
                    Query::entity("C", TypeTag::Unknown)
                        .join(JoinKind::Inner, "c", eq(col("c", "y"), col("b", "y")))
                        .map("c", tuple(vec![ident("a"), ident("b"), ident("c")])),
                ),
        );
        assert_eq!(names(of_query(&q)), vec!["c"]);
    }

    #[test]
    fn test_seen_is_restored_after_scope() {
        // `p` is bound only inside the filter; the outer map body sees it free.
        let q = Query::entity("Person", TypeTag::Unknown)
            .filter("p", boolean(true))
            .map("x", col("p", "name"));
        assert_eq!(names(of_query(&q)), vec!["p"]);
    }

    #[test]
    fn test_action_scopes() {
        let a = Action::update(
            Query::entity("Person", TypeTag::Unknown),
            "p",
            vec![Assignment::new(col("p", "age"), add(col("p", "age"), int(1)))],
        )
        .filter(eq(col("p", "id"), tag("id")))
        .returning_rows("r", col("r", "id"));
        assert!(of_action(&a).is_empty());

        let leaky = Action::delete(Query::entity("Person", TypeTag::Unknown), "p")
            .filter(eq(col("o", "id"), int(1)));
        assert_eq!(names(of_action(&leaky)), vec!["o"]);
    }
}
