//! SQL Dialect tests.

use pretty_assertions::assert_eq;

use super::{compile, people, render};
use crate::ast::builders::*;
use crate::ast::{Binding, Primitive, PropertyOrdering, Query, UnaryOp};
use crate::error::IrError;
use crate::transpiler::Dialect;

fn names() -> Query {
    people().map("p", col("p", "name"))
}

/// A limit on its own is plain `LIMIT n` everywhere, MySQL included: the
/// row-count sentinel is only written where MySQL's grammar needs a count.
#[test]
fn test_limit_only() {
    let q = names().take(int(10));
    for dialect in [Dialect::Postgres, Dialect::MySQL, Dialect::SQLite, Dialect::H2] {
        assert_eq!(render(dialect, &q), "SELECT p.name FROM Person p LIMIT 10");
    }
    assert_eq!(
        render(Dialect::SqlServer, &q),
        "SELECT TOP (10) p.name FROM Person p"
    );
}

#[test]
fn test_limit_and_offset() {
    let q = names().drop(int(5)).take(int(10));
    assert_eq!(
        render(Dialect::Postgres, &q),
        "SELECT p.name FROM Person p LIMIT 10 OFFSET 5"
    );
    assert_eq!(
        render(Dialect::H2, &q),
        "SELECT p.name FROM Person p LIMIT 10 OFFSET 5"
    );
    assert_eq!(
        render(Dialect::SQLite, &q),
        "SELECT p.name FROM Person p LIMIT 10 OFFSET 5"
    );
    assert_eq!(
        render(Dialect::MySQL, &q),
        "SELECT p.name FROM Person p LIMIT 5, 10"
    );
    assert_eq!(
        render(Dialect::SqlServer, &q),
        "SELECT p.name FROM Person p ORDER BY (SELECT NULL) OFFSET 5 ROWS FETCH FIRST 10 ROWS ONLY"
    );
}

#[test]
fn test_offset_only_mysql_sentinel_stands_in_for_absent_row_count() {
    let q = names().drop(int(5));
    assert_eq!(
        render(Dialect::Postgres, &q),
        "SELECT p.name FROM Person p OFFSET 5"
    );
    assert_eq!(
        render(Dialect::MySQL, &q),
        "SELECT p.name FROM Person p LIMIT 5, 18446744073709551615"
    );
    assert_eq!(
        render(Dialect::SQLite, &q),
        "SELECT p.name FROM Person p LIMIT -1 OFFSET 5"
    );
    assert_eq!(
        render(Dialect::SqlServer, &q),
        "SELECT p.name FROM Person p ORDER BY (SELECT NULL) OFFSET 5 ROWS"
    );
}

#[test]
fn test_sqlserver_offset_keeps_existing_order() {
    let q = people()
        .sort_by("p", col("p", "name"), PropertyOrdering::Asc)
        .drop(int(5));
    assert_eq!(
        render(Dialect::SqlServer, &q),
        "SELECT p.* FROM Person p ORDER BY p.name ASC OFFSET 5 ROWS"
    );
}

#[test]
fn test_limit_markers_follow_text_order() {
    let q = names().drop(tag("skip")).take(tag("count"));
    let bindings = [Binding::new("count", 10i64), Binding::new("skip", 5i64)];

    let my = compile(Dialect::MySQL, &q, &bindings).unwrap();
    assert_eq!(my.sql, "SELECT p.name FROM Person p LIMIT ?, ?");
    let ids: Vec<_> = my.params.iter().map(|p| p.id.as_deref()).collect();
    assert_eq!(ids, vec![Some("skip"), Some("count")]);

    let pg = compile(Dialect::Postgres, &q, &bindings).unwrap();
    assert_eq!(pg.sql, "SELECT p.name FROM Person p LIMIT $1 OFFSET $2");
    let ids: Vec<_> = pg.params.iter().map(|p| p.id.as_deref()).collect();
    assert_eq!(ids, vec![Some("count"), Some("skip")]);

    let ms = compile(Dialect::SqlServer, &q, &bindings).unwrap();
    assert_eq!(
        ms.sql,
        "SELECT p.name FROM Person p ORDER BY (SELECT NULL) OFFSET @p1 ROWS FETCH FIRST @p2 ROWS ONLY"
    );
}

#[test]
fn test_null_ordering() {
    let q = people().sort_by("p", col("p", "age"), PropertyOrdering::AscNullsLast);
    assert_eq!(
        render(Dialect::Postgres, &q),
        "SELECT p.* FROM Person p ORDER BY p.age ASC NULLS LAST"
    );
    assert_eq!(
        render(Dialect::MySQL, &q),
        "SELECT p.* FROM Person p ORDER BY ISNULL(p.age) ASC, p.age ASC"
    );
    assert_eq!(
        render(Dialect::SqlServer, &q),
        "SELECT p.* FROM Person p ORDER BY CASE WHEN p.age IS NULL THEN 1 ELSE 0 END, p.age ASC"
    );

    // the engine default already matches
    let q = people().sort_by("p", col("p", "age"), PropertyOrdering::DescNullsLast);
    assert_eq!(
        render(Dialect::MySQL, &q),
        "SELECT p.* FROM Person p ORDER BY p.age DESC"
    );
}

#[test]
fn test_string_concat() {
    let q = people().map(
        "p",
        concat(col("p", "first"), concat(text(" "), col("p", "last"))),
    );
    assert_eq!(
        render(Dialect::Postgres, &q),
        "SELECT p.first || ' ' || p.last FROM Person p"
    );
    assert_eq!(
        render(Dialect::MySQL, &q),
        "SELECT CONCAT(p.first, ' ', p.last) FROM Person p"
    );
    assert_eq!(
        render(Dialect::SqlServer, &q),
        "SELECT p.first + ' ' + p.last FROM Person p"
    );
}

#[test]
fn test_casts() {
    let q = people().map("p", unary(UnaryOp::Cast(Primitive::Int), col("p", "age")));
    assert_eq!(render(Dialect::Postgres, &q), "SELECT p.age::integer FROM Person p");
    assert_eq!(
        render(Dialect::MySQL, &q),
        "SELECT CAST(p.age AS SIGNED) FROM Person p"
    );
    assert_eq!(
        render(Dialect::SQLite, &q),
        "SELECT CAST(p.age AS INTEGER) FROM Person p"
    );
}

#[test]
fn test_sqlserver_boolean_positions() {
    let q = people().filter("p", col("p", "active"));
    assert_eq!(
        render(Dialect::Postgres, &q),
        "SELECT p.* FROM Person p WHERE p.active"
    );
    assert_eq!(
        render(Dialect::SqlServer, &q),
        "SELECT p.* FROM Person p WHERE p.active = 1"
    );

    let q = people().map("p", gt(col("p", "age"), int(18)));
    assert_eq!(
        render(Dialect::Postgres, &q),
        "SELECT p.age > 18 FROM Person p"
    );
    assert_eq!(
        render(Dialect::SqlServer, &q),
        "SELECT CASE WHEN p.age > 18 THEN 1 ELSE 0 END FROM Person p"
    );
}

#[test]
fn test_emptiness_checks() {
    let q = people().filter("p", gt(col("p", "age"), int(18))).is_empty();
    assert_eq!(
        render(Dialect::MySQL, &q),
        "SELECT NOT EXISTS (SELECT p.* FROM Person p WHERE p.age > 18)"
    );
    assert_eq!(
        render(Dialect::SqlServer, &q),
        "SELECT CASE WHEN NOT EXISTS (SELECT p.* FROM Person p WHERE p.age > 18) THEN 1 ELSE 0 END"
    );
}

#[test]
fn test_sqlite_set_operands() {
    let q = people()
        .filter("p", eq(col("p", "name"), text("Joe")))
        .union(people().filter("p", eq(col("p", "name"), text("Bob"))));
    assert_eq!(
        render(Dialect::SQLite, &q),
        "SELECT p.* FROM Person p WHERE p.name = 'Joe' UNION SELECT p.* FROM Person p WHERE p.name = 'Bob'"
    );

    let q = names().take(int(1)).union_all(names());
    assert_eq!(
        render(Dialect::SQLite, &q),
        "SELECT * FROM (SELECT p.name FROM Person p LIMIT 1) UNION ALL SELECT p.name FROM Person p"
    );
    assert_eq!(
        render(Dialect::Postgres, &q),
        "(SELECT p.name FROM Person p LIMIT 1) UNION ALL (SELECT p.name FROM Person p)"
    );
}

#[test]
fn test_distinct_on() {
    let q = people().distinct_on("p", col("p", "name"));
    assert_eq!(
        render(Dialect::Postgres, &q),
        "SELECT DISTINCT ON (p.name) p.* FROM Person p"
    );
    for dialect in [Dialect::MySQL, Dialect::SqlServer, Dialect::SQLite, Dialect::H2] {
        match compile(dialect, &q, &[]) {
            Err(IrError::Unsupported { dialect: d, feature }) => {
                assert_eq!(d, dialect);
                assert_eq!(feature, "DISTINCT ON");
            }
            other => panic!("expected unsupported on {}, got {:?}", dialect, other),
        }
    }
}

#[test]
fn test_unnest() {
    let q = people().concat_map("p", col("p", "tags"));
    assert_eq!(render(Dialect::Postgres, &q), "SELECT UNNEST(p.tags) FROM Person p");
    assert!(matches!(
        compile(Dialect::MySQL, &q, &[]),
        Err(IrError::Unsupported { .. })
    ));
}
