//! DML (Data Manipulation Language) SQL generation.
//!
//! This module contains the SELECT, INSERT, UPDATE and DELETE renderers and
//! the returning-clause handling they share.

pub mod delete;
pub mod insert;
pub mod select;
pub mod update;

use serde::Serialize;

use crate::ast::{Action, ActionKind, Assignment, Entity, Expr, Ident, Query, Returning};
use crate::error::{IrError, IrResult};
use crate::sql::normalizer::leaves;
use crate::transpiler::expr::{Qualifier, Renderer};
use crate::transpiler::statement::Fragment;
use crate::transpiler::traits::{KeyStyle, ReturningStyle};

/// What executing a statement hands back, so the execution layer knows how
/// to decode the result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ReturnShape {
    /// Only the affected-row count
    AffectedRows,
    /// Keys fetched by the driver after execution
    GeneratedKeys(Vec<String>),
    /// The statement itself returns rows with these columns
    Rows(Vec<String>),
}

/// Returning clause resolved against the dialect.
pub(crate) struct ReturningPlan {
    /// Clause text and where it goes
    pub clause: Option<(ReturningStyle, Fragment)>,
    pub shape: ReturnShape,
    /// Columns the database generates; left out of the insert column list
    pub generated: Vec<String>,
}

impl ReturningPlan {
    /// `OUTPUT ...` fragment, placed inside the statement.
    pub fn output(&self) -> Option<&Fragment> {
        match &self.clause {
            Some((ReturningStyle::Output(_), sql)) => Some(sql),
            _ => None,
        }
    }

    /// Trailing `RETURNING ...` fragment.
    pub fn trailing(&self) -> Option<&Fragment> {
        match &self.clause {
            Some((ReturningStyle::Returning, sql)) => Some(sql),
            _ => None,
        }
    }
}

/// Action targets must be plain entity references.
pub(crate) fn target_entity(target: &Query) -> IrResult<&Entity> {
    match target {
        Query::Entity(entity) => Ok(entity),
        other => Err(IrError::malformed(format!(
            "action target is not an entity: {}",
            other
        ))),
    }
}

impl Renderer<'_> {
    /// Render an action, returning its text and return shape.
    pub fn action(&mut self, action: &Action) -> IrResult<(Fragment, ReturnShape)> {
        let mark = self.mark();
        let result = match action {
            Action::Insert(insert) => self.insert(insert),
            Action::Update(update) => self.update(update),
            Action::Delete(delete) => self.delete(delete),
        };
        self.restore(mark);
        result
    }

    /// Declare the action alias over its target table.
    pub(crate) fn action_scope(&mut self, alias: &Ident, entity: &Entity) {
        let qualifier = if self.generator.qualify_action_columns() {
            Qualifier::Alias
        } else {
            Qualifier::Unqualified
        };
        self.push_scope(&alias.name, Some(entity), qualifier);
    }

    /// `AS alias` after the table name, where the dialect uses the alias.
    pub(crate) fn action_alias(&self, alias: &Ident) -> String {
        if self.generator.qualify_action_columns() {
            format!(" AS {}", self.identifier(&alias.name))
        } else {
            String::new()
        }
    }

    /// Unquoted column written by an assignment or named by a conflict target.
    pub(crate) fn target_column(&self, property: &Expr) -> IrResult<String> {
        self.column(property)
            .map(|(_, column)| column)
            .ok_or_else(|| {
                IrError::malformed(format!("assignment target is not a property path: {}", property))
            })
    }

    /// `col = value, ...` with unqualified targets.
    pub(crate) fn set_list(&mut self, assignments: &[Assignment]) -> IrResult<Fragment> {
        let mut items = Vec::with_capacity(assignments.len());
        for a in assignments {
            let column = self.identifier(&self.target_column(&a.property)?);
            let value = self.value(&a.value)?;
            items.push(value.after(&format!("{} = ", column)));
        }
        Ok(Fragment::join(items, ", "))
    }

    pub(crate) fn returning_plan(
        &mut self,
        kind: ActionKind,
        entity: &Entity,
        returning: Option<&Returning>,
    ) -> IrResult<ReturningPlan> {
        let Some(returning) = returning else {
            return Ok(ReturningPlan {
                clause: None,
                shape: ReturnShape::AffectedRows,
                generated: Vec::new(),
            });
        };
        match returning {
            Returning::Rows { alias, body } => {
                let style = self.generator.returning(kind)?;
                let (sql, columns) = self.returning_list(style, alias, entity, body)?;
                Ok(ReturningPlan {
                    clause: Some((style, sql)),
                    shape: ReturnShape::Rows(columns),
                    generated: Vec::new(),
                })
            }
            Returning::GeneratedKeys { alias, body } => match self.generator.generated_keys(kind)? {
                KeyStyle::Clause(style) => {
                    let (sql, columns) = self.returning_list(style, alias, entity, body)?;
                    Ok(ReturningPlan {
                        clause: Some((style, sql)),
                        shape: ReturnShape::Rows(columns.clone()),
                        generated: columns,
                    })
                }
                KeyStyle::Driver => {
                    let columns = self.key_columns(alias, entity, body)?;
                    Ok(ReturningPlan {
                        clause: None,
                        shape: ReturnShape::GeneratedKeys(columns.clone()),
                        generated: columns,
                    })
                }
                KeyStyle::Empty => Ok(ReturningPlan {
                    clause: None,
                    shape: ReturnShape::GeneratedKeys(Vec::new()),
                    generated: Vec::new(),
                }),
            },
        }
    }

    /// `RETURNING a, b` or `OUTPUT INSERTED.a, INSERTED.b`, and the names of
    /// the returned columns.
    fn returning_list(
        &mut self,
        style: ReturningStyle,
        alias: &Ident,
        entity: &Entity,
        body: &Expr,
    ) -> IrResult<(Fragment, Vec<String>)> {
        let (keyword, qualifier) = match style {
            ReturningStyle::Returning => ("RETURNING ", Qualifier::Unqualified),
            ReturningStyle::Output(pseudo) => ("OUTPUT ", Qualifier::Named(pseudo.to_string())),
        };
        let mark = self.mark();
        self.push_scope(&alias.name, Some(entity), qualifier);

        let mut fields = Vec::new();
        leaves(body, &mut Vec::new(), &mut fields);
        let mut items = Vec::with_capacity(fields.len());
        let mut columns = Vec::with_capacity(fields.len());
        for (_, e) in &fields {
            match e {
                Expr::Ident(id) => {
                    items.push(self.star(&id.name));
                    columns.push("*".to_string());
                }
                e => {
                    // the caller restores the scope stack on error
                    items.push(self.value(e)?);
                    columns.push(
                        self.column(e)
                            .map(|(_, c)| c)
                            .unwrap_or_else(|| e.to_string()),
                    );
                }
            }
        }
        self.restore(mark);
        Ok((Fragment::join(items, ", ").after(keyword), columns))
    }

    /// Plain column names of a generated-keys projection.
    fn key_columns(&mut self, alias: &Ident, entity: &Entity, body: &Expr) -> IrResult<Vec<String>> {
        let mark = self.mark();
        self.push_scope(&alias.name, Some(entity), Qualifier::Unqualified);
        let mut fields = Vec::new();
        leaves(body, &mut Vec::new(), &mut fields);
        let columns = fields
            .iter()
            .map(|(_, e)| {
                self.column(e).map(|(_, c)| c).ok_or_else(|| {
                    IrError::malformed(format!("generated key is not a column: {}", e))
                })
            })
            .collect();
        self.restore(mark);
        columns
    }
}
