//! DELETE SQL generation.

use crate::ast::{ActionKind, Delete};
use crate::error::IrResult;
use crate::transpiler::dml::{ReturnShape, target_entity};
use crate::transpiler::expr::Renderer;
use crate::transpiler::statement::Fragment;

impl Renderer<'_> {
    pub(crate) fn delete(&mut self, delete: &Delete) -> IrResult<(Fragment, ReturnShape)> {
        let entity = target_entity(&delete.target)?;
        self.action_scope(&delete.alias, entity);
        let plan = self.returning_plan(ActionKind::Delete, entity, delete.returning.as_ref())?;

        let mut sql = Fragment::text(format!(
            "DELETE FROM {}{}",
            self.table(entity),
            self.action_alias(&delete.alias)
        ));
        if let Some(output) = plan.output() {
            sql.push_str(" ");
            sql.append(output.clone());
        }
        if let Some(filter) = &delete.filter {
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
