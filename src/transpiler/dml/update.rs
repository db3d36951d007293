//! UPDATE SQL generation.

use crate::ast::{ActionKind, Update};
use crate::error::{IrError, IrResult};
use crate::transpiler::dml::{ReturnShape, target_entity};
use crate::transpiler::expr::Renderer;
use crate::transpiler::statement::Fragment;

impl Renderer<'_> {
    pub(crate) fn update(&mut self, update: &Update) -> IrResult<(Fragment, ReturnShape)> {
        let entity = target_entity(&update.target)?;
        if update.assignments.is_empty() {
            return Err(IrError::malformed("update without assignments"));
        }
        self.action_scope(&update.alias, entity);
        let plan = self.returning_plan(ActionKind::Update, entity, update.returning.as_ref())?;

        let mut sql = Fragment::text(format!(
            "UPDATE {}{} SET ",
            self.table(entity),
            self.action_alias(&update.alias)
        ));
        let set = self.set_list(&update.assignments)?;
        sql.append(set);
        if let Some(output) = plan.output() {
            sql.push_str(" ");
            sql.append(output.clone());
        }
        if let Some(filter) = &update.filter {
            sql.push_str(" WHERE ");
            let filter = self.predicate(filter)?;
            sql.append(filter);
        }
        if let Some(returning) = plan.trailing() {
            sql.push_str(" ");
            sql.append(returning.clone());
        }
        Ok((sql, plan.shape))
    }
}
