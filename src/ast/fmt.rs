//! Debug-friendly text form of IR trees, used in hygiene reports and trace dumps.

use std::fmt::{Display, Formatter, Result};

use crate::ast::{
    Action, CallKind, ConflictResolution, Constant, Expr, Ordering, Query, Returning,
};

fn join<T: Display>(f: &mut Formatter<'_>, items: impl IntoIterator<Item = T>, sep: &str) -> Result {
    for (i, item) in items.into_iter().enumerate() {
        if i > 0 {
            write!(f, "{}", sep)?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl Display for Constant {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            Constant::Null => write!(f, "null"),
            Constant::Bool(b) => write!(f, "{}", b),
            Constant::Int(n) => write!(f, "{}", n),
            Constant::Float(n) => write!(f, "{}", n),
            Constant::Str(s) => write!(f, "\"{}\"", s),
        }
    }
}

impl Display for Expr {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            Expr::Ident(id) => write!(f, "{}", id.name),
            Expr::Constant(c) => write!(f, "{}", c),
            Expr::Unary { op, expr } => write!(f, "{}({})", op, expr),
            Expr::Binary { left, op, right } => write!(f, "({} {} {})", left, op, right),
            Expr::Function { params, body } => {
                write!(f, "(")?;
                join(f, params.iter().map(|p| &p.name), ", ")?;
                write!(f, ") => {}", body)
            }
            Expr::Apply { function, args } => {
                write!(f, "{}(", function)?;
                join(f, args, ", ")?;
                write!(f, ")")
            }
            Expr::Call {
                name, kind, args, ..
            } => match (kind, args.split_first()) {
                (CallKind::Method, Some((receiver, rest))) => {
                    write!(f, "{}.{}(", receiver, name)?;
                    join(f, rest, ", ")?;
                    write!(f, ")")
                }
                _ => {
                    write!(f, "{}(", name)?;
                    join(f, args, ", ")?;
                    write!(f, ")")
                }
            },
            Expr::If { branches, default } => {
                for (cond, value) in branches {
                    write!(f, "if ({}) {} else ", cond, value)?;
                }
                write!(f, "{}", default)
            }
            Expr::Product { fields } => {
                write!(f, "(")?;
                join(
                    f,
                    fields.iter().map(|(n, v)| format!("{}: {}", n, v)),
                    ", ",
                )?;
                write!(f, ")")
            }
            Expr::Property { base, name, .. } => write!(f, "{}.{}", base, name),
            Expr::Tag { id } => write!(f, "lift({})", id),
            Expr::Block { bindings, body } => {
                write!(f, "{{ ")?;
                for (id, value) in bindings {
                    write!(f, "val {} = {}; ", id.name, value)?;
                }
                write!(f, "{} }}", body)
            }
            Expr::Aggregation { op, expr } => write!(f, "{}({})", op, expr),
            Expr::Query(q) => write!(f, "{}", q),
        }
    }
}

impl Display for Ordering {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            Ordering::Property(p) => write!(f, "{:?}", p),
            Ordering::Tuple(items) => {
                write!(f, "(")?;
                join(f, items, ", ")?;
                write!(f, ")")
            }
        }
    }
}

impl Display for Query {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            Query::Entity(e) => write!(f, "query[{}]", e.name),
            Query::Filter {
                source,
                alias,
                body,
            } => write!(f, "{}.filter({} => {})", source, alias.name, body),
            Query::Map {
                source,
                alias,
                body,
            } => write!(f, "{}.map({} => {})", source, alias.name, body),
            Query::FlatMap {
                source,
                alias,
                body,
            } => write!(f, "{}.flatMap({} => {})", source, alias.name, body),
            Query::ConcatMap {
                source,
                alias,
                body,
            } => write!(f, "{}.concatMap({} => {})", source, alias.name, body),
            Query::SortBy {
                source,
                alias,
                criteria,
                ordering,
            } => write!(
                f,
                "{}.sortBy({} => {})({})",
                source, alias.name, criteria, ordering
            ),
            Query::GroupByMap {
                source,
                by_alias,
                by,
                map_alias,
                select,
            } => write!(
                f,
                "{}.groupByMap({} => {})({} => {})",
                source, by_alias.name, by, map_alias.name, select
            ),
            Query::Aggregate { op, source } => write!(f, "{}.{}", source, op),
            Query::Distinct(q) => write!(f, "{}.distinct", q),
            Query::DistinctOn { source, alias, key } => {
                write!(f, "{}.distinctOn({} => {})", source, alias.name, key)
            }
            Query::Take { source, count } => write!(f, "{}.take({})", source, count),
            Query::Drop { source, count } => write!(f, "{}.drop({})", source, count),
            Query::SetOperation { op, left, right } => {
                write!(f, "{}.{}({})", left, op, right)
            }
            Query::Join {
                kind,
                source,
                alias,
                on,
            } => write!(f, "{}.{}({} => {})", source, kind, alias.name, on),
            Query::Nested(q) => write!(f, "{}.nested", q),
            Query::IsEmpty(q) => write!(f, "{}.isEmpty", q),
            Query::NonEmpty(q) => write!(f, "{}.nonEmpty", q),
        }
    }
}

impl Display for Returning {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            Returning::Rows { alias, body } => write!(f, ".returning({} => {})", alias.name, body),
            Returning::GeneratedKeys { alias, body } => {
                write!(f, ".returningGenerated({} => {})", alias.name, body)
            }
        }
    }
}

impl Display for Action {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        let assignments = |f: &mut Formatter<'_>, list: &[crate::ast::Assignment]| {
            join(
                f,
                list.iter().map(|a| format!("{} -> {}", a.property, a.value)),
                ", ",
            )
        };
        match self {
            Action::Insert(i) => {
                write!(f, "{}.insert({} => ", i.target, i.alias.name)?;
                assignments(f, &i.assignments)?;
                write!(f, ")")?;
                if let Some(c) = &i.on_conflict {
                    write!(f, ".onConflict(")?;
                    join(f, &c.target, ", ")?;
                    match &c.resolution {
                        ConflictResolution::Ignore => write!(f, ")(ignore)")?,
                        ConflictResolution::Update {
                            existing,
                            excluded,
                            assignments: list,
                        } => {
                            write!(f, ")(({}, {}) => ", existing.name, excluded.name)?;
                            assignments(f, list)?;
                            write!(f, ")")?;
                        }
                    }
                }
                if let Some(r) = &i.returning {
                    write!(f, "{}", r)?;
                }
                Ok(())
            }
            Action::Update(u) => {
                write!(f, "{}", u.target)?;
                if let Some(w) = &u.filter {
                    write!(f, ".filter({} => {})", u.alias.name, w)?;
                }
                write!(f, ".update({} => ", u.alias.name)?;
                assignments(f, &u.assignments)?;
                write!(f, ")")?;
                if let Some(r) = &u.returning {
                    write!(f, "{}", r)?;
                }
                Ok(())
            }
            Action::Delete(d) => {
                write!(f, "{}", d.target)?;
                if let Some(w) = &d.filter {
                    write!(f, ".filter({} => {})", d.alias.name, w)?;
                }
                write!(f, ".delete")?;
                if let Some(r) = &d.returning {
                    write!(f, "{}", r)?;
                }
                Ok(())
            }
        }
    }
}
