//! INSERT SQL generation.

use crate::ast::{ActionKind, ConflictResolution, Insert, OnConflict};
use crate::error::{IrError, IrResult};
use crate::transpiler::dml::{ReturnShape, target_entity};
use crate::transpiler::expr::{Qualifier, Renderer};
use crate::transpiler::statement::Fragment;
use crate::transpiler::traits::ConflictStyle;

/// Row alias for the rejected row in `ON DUPLICATE KEY UPDATE`.
const EXCLUDED_ROW: &str = "x";

impl Renderer<'_> {
    pub(crate) fn insert(&mut self, insert: &Insert) -> IrResult<(Fragment, ReturnShape)> {
        let entity = target_entity(&insert.target)?;
        let table = self.table(entity);
        self.action_scope(&insert.alias, entity);
        let plan = self.returning_plan(ActionKind::Insert, entity, insert.returning.as_ref())?;

        let mut columns = Vec::with_capacity(insert.assignments.len());
        let mut values = Vec::with_capacity(insert.assignments.len());
        for a in &insert.assignments {
            let column = self.target_column(&a.property)?;
            if plan.generated.contains(&column) {
                continue;
            }
            columns.push(self.identifier(&column));
            values.push(self.value(&a.value)?);
        }

        let style = self.generator.on_conflict();
        let ignore = matches!(
            insert.on_conflict,
            Some(OnConflict {
                resolution: ConflictResolution::Ignore,
                ..
            })
        );
        let mut sql = if ignore && style == ConflictStyle::DuplicateKey {
            Fragment::text("INSERT IGNORE INTO ")
        } else {
            Fragment::text("INSERT INTO ")
        };
        sql.push_str(&table);
        sql.push_str(&self.action_alias(&insert.alias));
        if !columns.is_empty() {
            sql.push_str(&format!(" ({})", columns.join(", ")));
        }
        if let Some(output) = plan.output() {
            sql.push_str(" ");
            sql.append(output.clone());
        }
        if values.is_empty() {
            sql.push_str(self.generator.empty_insert());
        } else {
            sql.push_str(" VALUES ");
            sql.append(Fragment::join(values, ", ").parens());
        }
        if let Some(conflict) = &insert.on_conflict {
            let clause = self.on_conflict(insert, conflict, style, &table)?;
            sql.append(clause);
        }
        if let Some(returning) = plan.trailing() {
            sql.push_str(" ");
            sql.append(returning.clone());
        }
        Ok((sql, plan.shape))
    }

    fn on_conflict(
        &mut self,
        insert: &Insert,
        conflict: &OnConflict,
        style: ConflictStyle,
        table: &str,
    ) -> IrResult<Fragment> {
        let dialect = self.generator.dialect();
        let entity = target_entity(&insert.target)?;
        let target = conflict
            .target
            .iter()
            .map(|t| self.target_column(t).map(|c| self.identifier(&c)))
            .collect::<IrResult<Vec<_>>>()?;

        match (style, &conflict.resolution) {
            (ConflictStyle::Unsupported, _) => Err(IrError::unsupported(dialect, "ON CONFLICT")),
            (ConflictStyle::OnConflict, ConflictResolution::Ignore) => {
                let mut sql = String::from(" ON CONFLICT");
                if !target.is_empty() {
                    sql.push_str(&format!(" ({})", target.join(", ")));
                }
                sql.push_str(" DO NOTHING");
                Ok(Fragment::text(sql))
            }
            (
                ConflictStyle::OnConflict,
                ConflictResolution::Update {
                    existing,
                    excluded,
                    assignments,
                },
            ) => {
                if target.is_empty() {
                    return Err(IrError::unsupported(
                        dialect,
                        "ON CONFLICT DO UPDATE without a conflict target",
                    ));
                }
                // the stored row is reachable through the insert alias where it is declared
                let stored = if self.generator.qualify_action_columns() {
                    self.identifier(&insert.alias.name)
                } else {
                    table.to_string()
                };
                self.push_scope(&existing.name, Some(entity), Qualifier::Named(stored));
                self.push_scope(
                    &excluded.name,
                    Some(entity),
                    Qualifier::Named("EXCLUDED".to_string()),
                );
                let set = self.set_list(assignments)?;
                Ok(set.after(&format!(
                    " ON CONFLICT ({}) DO UPDATE SET ",
                    target.join(", ")
                )))
            }
            (ConflictStyle::DuplicateKey, resolution) => {
                if !target.is_empty() {
                    return Err(IrError::unsupported(
                        dialect,
                        "a conflict target on INSERT IGNORE / ON DUPLICATE KEY UPDATE",
                    ));
                }
                match resolution {
                    // rendered as INSERT IGNORE
                    ConflictResolution::Ignore => Ok(Fragment::new()),
                    ConflictResolution::Update {
                        existing,
                        excluded,
                        assignments,
                    } => {
                        self.push_scope(
                            &existing.name,
                            Some(entity),
                            Qualifier::Named(table.to_string()),
                        );
                        self.push_scope(
                            &excluded.name,
                            Some(entity),
                            Qualifier::Named(EXCLUDED_ROW.to_string()),
                        );
                        let set = self.set_list(assignments)?;
                        Ok(set.after(&format!(" AS {} ON DUPLICATE KEY UPDATE ", EXCLUDED_ROW)))
                    }
                }
            }
        }
    }
}
