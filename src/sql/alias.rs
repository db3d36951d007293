//! Removal of redundant select aliases (`p.name AS name`).

use crate::ast::{Expr, Renameable};
use crate::naming::NamingStrategy;
use crate::sql::model::{FlattenSqlQuery, FromContext, SqlQuery};

/// Drop every select alias that only repeats the projected property name.
///
/// An alias is kept when the rendered column differs from the property name:
/// the naming strategy rewrites it, or the entity maps the property to a
/// differently named column.
pub fn remove_extra_alias(query: SqlQuery, naming: &NamingStrategy) -> SqlQuery {
    match query {
        SqlQuery::Flatten(f) => SqlQuery::Flatten(flatten(f, naming)),
        SqlQuery::SetOperation { op, left, right } => SqlQuery::SetOperation {
            op,
            left: Box::new(remove_extra_alias(*left, naming)),
            right: Box::new(remove_extra_alias(*right, naming)),
        },
        SqlQuery::Exists { query, negated } => SqlQuery::Exists {
            query: Box::new(remove_extra_alias(*query, naming)),
            negated,
        },
    }
}

fn flatten(mut f: FlattenSqlQuery, naming: &NamingStrategy) -> FlattenSqlQuery {
    f.from = f.from.into_iter().map(|c| context(c, naming)).collect();
    let from = f.from.clone();
    for value in f.select.iter_mut() {
        let redundant = match (&value.expr, &value.alias) {
            (
                Expr::Property {
                    base,
                    name,
                    renameable,
                },
                Some(alias),
            ) => {
                name == alias
                    && (*renameable == Renameable::Fixed || !naming.diverges(name))
                    && !mapped_column(&from, base, name)
            }
            _ => false,
        };
        if redundant {
            value.alias = None;
        }
    }
    f
}

fn context(c: FromContext, naming: &NamingStrategy) -> FromContext {
    match c {
        FromContext::Query { query, alias } => FromContext::Query {
            query: Box::new(remove_extra_alias(*query, naming)),
            alias,
        },
        FromContext::Join { kind, context: inner, on } => FromContext::Join {
            kind,
            context: Box::new(context(*inner, naming)),
            on,
        },
        table => table,
    }
}

/// `base.name` reads a table whose entity renames `name`.
fn mapped_column(from: &[FromContext], base: &Expr, name: &str) -> bool {
    let Expr::Ident(id) = base else {
        return false;
    };
    from.iter().any(|c| table_renames(c, &id.name, name))
}

fn table_renames(c: &FromContext, alias: &str, name: &str) -> bool {
    match c {
        FromContext::Table { entity, alias: a } => a == alias && entity.column_of(name).is_some(),
        FromContext::Join { context, .. } => table_renames(context, alias, name),
        FromContext::Query { .. } => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builders::*;
    use crate::ast::{Entity, Query, TypeTag};
    use crate::naming::Case;
    use crate::sql::normalizer::normalize;

    fn select_aliases(q: &SqlQuery) -> Vec<Option<String>> {
        q.as_flatten()
            .unwrap()
            .select
            .iter()
            .map(|s| s.alias.clone())
            .collect()
    }

    #[test]
    fn test_removes_repeated_name() {
        let q = Query::entity("Person", TypeTag::values(["name", "age"]));
        let out = remove_extra_alias(normalize(&q).unwrap(), &NamingStrategy::default());
        assert_eq!(select_aliases(&out), vec![None, None]);
    }

    #[test]
    fn test_keeps_alias_when_strategy_diverges() {
        let q = Query::entity("Person", TypeTag::values(["firstName", "age"]));
        let out = remove_extra_alias(normalize(&q).unwrap(), &NamingStrategy::new(Case::SnakeCase));
        assert_eq!(select_aliases(&out), vec![Some("firstName".into()), None]);
    }

    #[test]
    fn test_keeps_alias_for_mapped_column() {
        let entity = Entity::new("Person", TypeTag::values(["name"])).with_alias("name", "full_name");
        let out = remove_extra_alias(
            normalize(&Query::Entity(entity)).unwrap(),
            &NamingStrategy::default(),
        );
        assert_eq!(select_aliases(&out), vec![Some("name".into())]);
    }

    #[test]
    fn test_elision_is_idempotent() {
        let naming = NamingStrategy::new(Case::SnakeCase);
        let fixtures = vec![
            Query::entity("Person", TypeTag::values(["firstName", "age"])),
            Query::entity("Person", TypeTag::values(["name"]))
                .map("p", tuple(vec![col("p", "name"), add(col("p", "age"), int(1))]))
                .filter("t", eq(prop(ident("t"), "_2"), int(3))),
            Query::entity("Person", TypeTag::Unknown)
                .map("p", col("p", "name"))
                .union(Query::entity("Person", TypeTag::Unknown).map("p", col("p", "name"))),
        ];
        for q in fixtures {
            let once = remove_extra_alias(normalize(&q).unwrap(), &naming);
            let twice = remove_extra_alias(once.clone(), &naming);
            assert_eq!(once, twice);
        }
    }
}
