//! INSERT / UPDATE / DELETE rendering, returning clauses and conflict handling.

use pretty_assertions::assert_eq;

use super::{people, render_action};
use crate::Compiler;
use crate::ast::builders::*;
use crate::ast::{
    Action, Assignment, Binding, ConflictResolution, Entity, OnConflict, Query, TypeTag,
};
use crate::config::RenderOptions;
use crate::error::IrError;
use crate::transpiler::{Dialect, ReturnShape};

fn sql(dialect: Dialect, a: &Action) -> String {
    match render_action(dialect, a) {
        Ok(r) => r.sql,
        Err(e) => panic!("{} failed to render action: {}", dialect, e),
    }
}

fn insert_joe() -> Action {
    Action::insert(
        people(),
        "p",
        vec![
            Assignment::new(col("p", "id"), int(1)),
            Assignment::new(col("p", "name"), text("Joe")),
        ],
    )
}

fn rename_joe() -> Action {
    Action::update(
        people(),
        "p",
        vec![Assignment::new(col("p", "name"), text("Joe"))],
    )
    .filter(eq(col("p", "id"), int(1)))
}

fn remove_joe() -> Action {
    Action::delete(people(), "p").filter(eq(col("p", "id"), int(1)))
}

fn upsert(target: Vec<&str>) -> Action {
    insert_joe().on_conflict(OnConflict {
        target: target.into_iter().map(|c| col("p", c)).collect(),
        resolution: ConflictResolution::Update {
            existing: "t".into(),
            excluded: "e".into(),
            assignments: vec![Assignment::new(col("t", "name"), col("e", "name"))],
        },
    })
}

fn ignore_duplicates(target: Vec<&str>) -> Action {
    insert_joe().on_conflict(OnConflict {
        target: target.into_iter().map(|c| col("p", c)).collect(),
        resolution: ConflictResolution::Ignore,
    })
}

#[test]
fn test_insert() {
    let rendered = render_action(Dialect::Postgres, &insert_joe()).unwrap();
    assert_eq!(
        rendered.sql,
        "INSERT INTO Person AS p (id, name) VALUES (1, 'Joe')"
    );
    assert_eq!(rendered.return_shape, ReturnShape::AffectedRows);

    for dialect in [Dialect::MySQL, Dialect::SqlServer, Dialect::SQLite, Dialect::H2] {
        assert_eq!(
            sql(dialect, &insert_joe()),
            "INSERT INTO Person (id, name) VALUES (1, 'Joe')"
        );
    }
}

#[test]
fn test_insert_without_columns() {
    let empty = Action::insert(people(), "p", vec![]);
    assert_eq!(
        sql(Dialect::Postgres, &empty),
        "INSERT INTO Person AS p DEFAULT VALUES"
    );
    assert_eq!(sql(Dialect::MySQL, &empty), "INSERT INTO Person () VALUES ()");
}

#[test]
fn test_update_and_delete() {
    assert_eq!(
        sql(Dialect::Postgres, &rename_joe()),
        "UPDATE Person AS p SET name = 'Joe' WHERE p.id = 1"
    );
    assert_eq!(
        sql(Dialect::MySQL, &rename_joe()),
        "UPDATE Person SET name = 'Joe' WHERE id = 1"
    );
    assert_eq!(
        sql(Dialect::Postgres, &remove_joe()),
        "DELETE FROM Person AS p WHERE p.id = 1"
    );
    assert_eq!(
        sql(Dialect::SqlServer, &remove_joe()),
        "DELETE FROM Person WHERE id = 1"
    );
}

#[test]
fn test_update_without_assignments_is_malformed() {
    let a = Action::update(people(), "p", vec![]);
    assert!(matches!(
        render_action(Dialect::Postgres, &a),
        Err(IrError::Malformed(_))
    ));
}

#[test]
fn test_action_target_must_be_an_entity() {
    let a = Action::delete(people().filter("q", boolean(true)), "p");
    assert!(matches!(
        render_action(Dialect::Postgres, &a),
        Err(IrError::Malformed(_))
    ));
}

#[test]
fn test_renamed_column_is_written() {
    let target = Query::Entity(Entity::new("Person", TypeTag::Unknown).with_alias("name", "full_name"));
    let a = Action::update(
        target,
        "p",
        vec![Assignment::new(col("p", "name"), text("Joe"))],
    )
    .filter(eq(col("p", "id"), int(1)))
    .returning_rows("r", col("r", "name"));
    let rendered = render_action(Dialect::Postgres, &a).unwrap();
    assert_eq!(
        rendered.sql,
        "UPDATE Person AS p SET full_name = 'Joe' WHERE p.id = 1 RETURNING full_name"
    );
    assert_eq!(
        rendered.return_shape,
        ReturnShape::Rows(vec!["full_name".into()])
    );
}

#[test]
fn test_returning_rows() {
    let a = remove_joe().returning_rows("r", ident("r"));
    let pg = render_action(Dialect::Postgres, &a).unwrap();
    assert_eq!(pg.sql, "DELETE FROM Person AS p WHERE p.id = 1 RETURNING *");
    assert_eq!(pg.return_shape, ReturnShape::Rows(vec!["*".into()]));

    let ms = render_action(Dialect::SqlServer, &a).unwrap();
    assert_eq!(ms.sql, "DELETE FROM Person OUTPUT DELETED.* WHERE id = 1");

    let a = rename_joe().returning_rows("r", tuple(vec![col("r", "id"), col("r", "name")]));
    assert_eq!(
        sql(Dialect::SqlServer, &a),
        "UPDATE Person SET name = 'Joe' OUTPUT INSERTED.id, INSERTED.name WHERE id = 1"
    );
    assert_eq!(
        sql(Dialect::SQLite, &a),
        "UPDATE Person SET name = 'Joe' WHERE id = 1 RETURNING id, name"
    );
}

#[test]
fn test_returning_rows_unsupported() {
    let a = insert_joe().returning_rows("r", ident("r"));
    match render_action(Dialect::H2, &a) {
        Err(e @ IrError::Unsupported { .. }) => {
            assert_eq!(e.to_string(), "H2 does not support returning rows from INSERT");
        }
        other => panic!("expected unsupported, got {:?}", other),
    }
    assert!(matches!(
        render_action(Dialect::MySQL, &a),
        Err(IrError::Unsupported { dialect: Dialect::MySQL, .. })
    ));
}

#[test]
fn test_generated_keys() {
    let a = insert_joe().returning_generated("r", col("r", "id"));

    let pg = render_action(Dialect::Postgres, &a).unwrap();
    assert_eq!(
        pg.sql,
        "INSERT INTO Person AS p (name) VALUES ('Joe') RETURNING id"
    );
    assert_eq!(pg.return_shape, ReturnShape::Rows(vec!["id".into()]));

    let ms = render_action(Dialect::SqlServer, &a).unwrap();
    assert_eq!(
        ms.sql,
        "INSERT INTO Person (name) OUTPUT INSERTED.id VALUES ('Joe')"
    );

    for dialect in [Dialect::MySQL, Dialect::SQLite, Dialect::H2] {
        let rendered = render_action(dialect, &a).unwrap();
        assert_eq!(rendered.sql, "INSERT INTO Person (name) VALUES ('Joe')");
        assert_eq!(
            rendered.return_shape,
            ReturnShape::GeneratedKeys(vec!["id".into()])
        );
    }
}

#[test]
fn test_generated_keys_on_update() {
    let a = rename_joe().returning_generated("r", col("r", "id"));
    let my = render_action(Dialect::MySQL, &a).unwrap();
    assert_eq!(my.sql, "UPDATE Person SET name = 'Joe' WHERE id = 1");
    assert_eq!(my.return_shape, ReturnShape::GeneratedKeys(vec![]));

    assert!(matches!(
        render_action(Dialect::SqlServer, &a),
        Err(IrError::Unsupported { .. })
    ));
}

#[test]
fn test_conflict_update() {
    assert_eq!(
        sql(Dialect::Postgres, &upsert(vec!["id"])),
        "INSERT INTO Person AS p (id, name) VALUES (1, 'Joe') ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name"
    );
    assert_eq!(
        sql(Dialect::SQLite, &upsert(vec!["id"])),
        "INSERT INTO Person (id, name) VALUES (1, 'Joe') ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name"
    );
    assert_eq!(
        sql(Dialect::MySQL, &upsert(vec![])),
        "INSERT INTO Person (id, name) VALUES (1, 'Joe') AS x ON DUPLICATE KEY UPDATE name = x.name"
    );
}

#[test]
fn test_conflict_update_reads_stored_row() {
    let a = insert_joe().on_conflict(OnConflict {
        target: vec![col("p", "id")],
        resolution: ConflictResolution::Update {
            existing: "t".into(),
            excluded: "e".into(),
            assignments: vec![Assignment::new(
                col("t", "visits"),
                add(col("t", "visits"), col("e", "visits")),
            )],
        },
    });
    assert_eq!(
        sql(Dialect::Postgres, &a),
        "INSERT INTO Person AS p (id, name) VALUES (1, 'Joe') ON CONFLICT (id) DO UPDATE SET visits = p.visits + EXCLUDED.visits"
    );
    assert_eq!(
        sql(Dialect::SQLite, &a),
        "INSERT INTO Person (id, name) VALUES (1, 'Joe') ON CONFLICT (id) DO UPDATE SET visits = Person.visits + EXCLUDED.visits"
    );
}

#[test]
fn test_conflict_ignore() {
    assert_eq!(
        sql(Dialect::Postgres, &ignore_duplicates(vec!["id"])),
        "INSERT INTO Person AS p (id, name) VALUES (1, 'Joe') ON CONFLICT (id) DO NOTHING"
    );
    assert_eq!(
        sql(Dialect::SQLite, &ignore_duplicates(vec![])),
        "INSERT INTO Person (id, name) VALUES (1, 'Joe') ON CONFLICT DO NOTHING"
    );
    assert_eq!(
        sql(Dialect::MySQL, &ignore_duplicates(vec![])),
        "INSERT IGNORE INTO Person (id, name) VALUES (1, 'Joe')"
    );
}

#[test]
fn test_conflict_unsupported() {
    for dialect in [Dialect::SqlServer, Dialect::H2] {
        assert!(matches!(
            render_action(dialect, &upsert(vec!["id"])),
            Err(IrError::Unsupported { .. })
        ));
    }
    // MySQL resolves against every unique key
    assert!(matches!(
        render_action(Dialect::MySQL, &upsert(vec!["id"])),
        Err(IrError::Unsupported { .. })
    ));
    // Postgres needs a target to know which row to update
    assert!(matches!(
        render_action(Dialect::Postgres, &upsert(vec![])),
        Err(IrError::Unsupported { .. })
    ));
}

#[test]
fn test_action_with_lifted_values() {
    let a = Action::update(
        people(),
        "p",
        vec![Assignment::new(col("p", "name"), tag("name"))],
    )
    .filter(eq(col("p", "id"), tag("id")));
    let bindings = [
        Binding::new("id", 7i64),
        Binding::new("name", "Ann"),
    ];
    let rendered = Compiler::new(RenderOptions::new(Dialect::SqlServer))
        .compile_action(&a, &bindings)
        .unwrap();
    assert_eq!(rendered.sql, "UPDATE Person SET name = @p1 WHERE id = @p2");
    let ids: Vec<_> = rendered.params.iter().map(|p| p.id.as_deref()).collect();
    assert_eq!(ids, vec![Some("name"), Some("id")]);
}
