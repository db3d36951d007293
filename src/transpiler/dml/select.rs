//! SELECT SQL generation.

use crate::ast::Expr;
use crate::error::{IrError, IrResult};
use crate::sql::{Distinct, FlattenSqlQuery, FromContext, SelectValue, SqlQuery};
use crate::transpiler::expr::{Qualifier, Renderer};
use crate::transpiler::statement::Fragment;

/// Clauses of one `SELECT` level before assembly. Dialects may splice into
/// `head` (`TOP (n)`), `order_by` or `tail` from `limit_offset`.
#[derive(Debug, Default)]
pub struct SelectParts {
    /// `SELECT [DISTINCT ...]`
    pub head: Fragment,
    pub projection: Fragment,
    pub from: Fragment,
    pub filter: Option<Fragment>,
    pub group_by: Option<Fragment>,
    pub having: Option<Fragment>,
    pub order_by: Option<Fragment>,
    /// Trailing limit/offset text
    pub tail: Fragment,
}

impl SelectParts {
    pub fn assemble(self) -> Fragment {
        let mut sql = self.head;
        sql.push_str(" ");
        sql.append(self.projection);
        if !self.from.is_empty() {
            sql.push_str(" FROM ");
            sql.append(self.from);
        }
        for (keyword, clause) in [
            (" WHERE ", self.filter),
            (" GROUP BY ", self.group_by),
            (" HAVING ", self.having),
            (" ORDER BY ", self.order_by),
        ] {
            if let Some(clause) = clause {
                sql.push_str(keyword);
                sql.append(clause);
            }
        }
        sql.append(self.tail);
        sql
    }
}

impl Renderer<'_> {
    /// Render a normalized query as a statement.
    pub fn query(&mut self, q: &SqlQuery) -> IrResult<Fragment> {
        match q {
            SqlQuery::Flatten(f) => {
                let mark = self.mark();
                let result = self.flatten(f);
                self.restore(mark);
                result
            }
            SqlQuery::SetOperation { op, left, right } => {
                let left = self.set_operand(left)?;
                let right = self.set_operand(right)?;
                Ok(Fragment::join([left, right], &format!(" {} ", op)))
            }
            SqlQuery::Exists { query, negated } => {
                let inner = self.query(query)?;
                Ok(self.generator.exists(inner, *negated))
            }
        }
    }

    fn set_operand(&mut self, q: &SqlQuery) -> IrResult<Fragment> {
        let plain = match q {
            SqlQuery::Flatten(f) => f.order_by.is_empty() && f.limit.is_none() && f.offset.is_none(),
            _ => false,
        };
        let sql = self.query(q)?;
        Ok(self.generator.set_operand(sql, plain))
    }

    fn declare(&mut self, context: &FromContext) {
        match context {
            FromContext::Table { entity, alias } => {
                self.push_scope(alias, Some(entity), Qualifier::Alias)
            }
            FromContext::Query { alias, .. } => self.push_scope(alias, None, Qualifier::Alias),
            FromContext::Join { context, .. } => self.declare(context),
        }
    }

    fn flatten(&mut self, f: &FlattenSqlQuery) -> IrResult<Fragment> {
        for context in &f.from {
            self.declare(context);
        }

        let mut parts = SelectParts {
            head: Fragment::text("SELECT"),
            ..Default::default()
        };
        match &f.distinct {
            Distinct::None => {}
            Distinct::All => parts.head.push_str(" DISTINCT"),
            Distinct::On(keys) => {
                let keys = keys
                    .iter()
                    .map(|k| self.value(k))
                    .collect::<IrResult<Vec<_>>>()?;
                parts.head.push_str(" ");
                parts.head.append(self.generator.distinct_on(keys)?);
            }
        }

        let projection = f
            .select
            .iter()
            .map(|v| self.select_value(v))
            .collect::<IrResult<Vec<_>>>()?;
        parts.projection = if projection.is_empty() {
            Fragment::text("*")
        } else {
            Fragment::join(projection, ", ")
        };

        for (i, context) in f.from.iter().enumerate() {
            match context {
                FromContext::Join { kind, context, on } => {
                    if i == 0 {
                        return Err(IrError::malformed(format!(
                            "{} without a preceding from-context",
                            kind
                        )));
                    }
                    parts.from.push_str(&format!(" {} ", kind));
                    let joined = self.context(context)?;
                    parts.from.append(joined);
                    parts.from.push_str(" ON ");
                    let on = self.predicate(on)?;
                    parts.from.append(on);
                }
                other => {
                    if i > 0 {
                        parts.from.push_str(", ");
                    }
                    let sql = self.context(other)?;
                    parts.from.append(sql);
                }
            }
        }

        if let Some(filter) = &f.filter {
            parts.filter = Some(self.predicate(filter)?);
        }
        if !f.group_by.is_empty() {
            let keys = f
                .group_by
                .iter()
                .map(|k| self.value(k))
                .collect::<IrResult<Vec<_>>>()?;
            parts.group_by = Some(Fragment::join(keys, ", "));
        }
        if let Some(having) = &f.having {
            parts.having = Some(self.predicate(having)?);
        }
        if !f.order_by.is_empty() {
            let mut keys = Vec::new();
            for key in &f.order_by {
                let sql = self.value(&key.expr)?;
                keys.extend(self.generator.order_key(sql, key.ordering));
            }
            parts.order_by = Some(Fragment::join(keys, ", "));
        }

        let limit = f.limit.as_ref().map(|l| self.value(l)).transpose()?;
        let offset = f.offset.as_ref().map(|o| self.value(o)).transpose()?;
        self.generator.limit_offset(&mut parts, limit, offset)?;

        Ok(parts.assemble())
    }

    fn context(&mut self, context: &FromContext) -> IrResult<Fragment> {
        match context {
            FromContext::Table { entity, alias } => Ok(Fragment::text(format!(
                "{} {}",
                self.table(entity),
                self.identifier(alias)
            ))),
            FromContext::Query { query, alias } => {
                let alias = self.identifier(alias);
                Ok(self.query(query)?.parens().then(&format!(" AS {}", alias)))
            }
            FromContext::Join { kind, .. } => Err(IrError::malformed(format!(
                "nested {} inside a join",
                kind
            ))),
        }
    }

    fn select_value(&mut self, v: &SelectValue) -> IrResult<Fragment> {
        let mut sql = match &v.expr {
            Expr::Ident(id) => self.star(&id.name),
            e => self.value(e)?,
        };
        if v.concat {
            sql = self.generator.unnest(sql)?;
        }
        if let Some(alias) = &v.alias {
            sql.push_str(" AS ");
            sql.push_str(&self.identifier(alias));
        }
        Ok(sql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assemble_skips_missing_clauses() {
        let parts = SelectParts {
            head: Fragment::text("SELECT"),
            projection: Fragment::text("p.name"),
            from: Fragment::text("Person p"),
            order_by: Some(Fragment::text("p.name ASC")),
            tail: Fragment::text(" LIMIT 1"),
            ..Default::default()
        };
        assert_eq!(
            parts.assemble().tokens(),
            Fragment::text("SELECT p.name FROM Person p ORDER BY p.name ASC LIMIT 1").tokens()
        );
    }
}
