use crate::ast::{ActionKind, Primitive, PropertyOrdering};
use crate::error::{IrError, IrResult};
use crate::transpiler::Dialect;
use crate::transpiler::dml::select::SelectParts;
use crate::transpiler::statement::Fragment;
use crate::transpiler::traits::{KeyStyle, ReturningStyle, SqlGenerator, bool_from_string};

pub struct SqlServerGenerator;

impl SqlGenerator for SqlServerGenerator {
    fn dialect(&self) -> Dialect {
        Dialect::SqlServer
    }

    fn quote_identifier(&self, id: &str) -> String {
        format!("[{}]", id.replace(']', "]]"))
    }

    fn placeholder(&self, index: usize) -> String {
        format!("@p{}", index)
    }

    fn bool_literal(&self, val: bool) -> String {
        if val { "1".to_string() } else { "0".to_string() }
    }

    fn native_booleans(&self) -> bool {
        false
    }

    fn string_concat(&self, parts: Vec<Fragment>) -> Fragment {
        Fragment::join(parts, " + ")
    }

    fn length_function(&self) -> &str {
        "LEN"
    }

    fn cast_type(&self, to: Primitive) -> &str {
        match to {
            Primitive::Byte => "TINYINT",
            Primitive::Short => "SMALLINT",
            Primitive::Int => "INT",
            Primitive::Long => "BIGINT",
            Primitive::Float => "REAL",
            Primitive::Double => "FLOAT",
            Primitive::Decimal => "DECIMAL",
            Primitive::Boolean => "BIT",
            Primitive::String => "VARCHAR(MAX)",
        }
    }

    fn cast(&self, expr: Fragment, to: Primitive) -> Fragment {
        let expr = match to {
            Primitive::Boolean => bool_from_string(expr),
            _ => expr,
        };
        expr.after("CAST(").then(&format!(" AS {})", self.cast_type(to)))
    }

    // Nulls sort first ascending: a leading CASE key moves them.
    fn order_key(&self, key: Fragment, ordering: PropertyOrdering) -> Vec<Fragment> {
        match ordering {
            PropertyOrdering::Asc | PropertyOrdering::AscNullsFirst => vec![key.then(" ASC")],
            PropertyOrdering::Desc | PropertyOrdering::DescNullsLast => vec![key.then(" DESC")],
            PropertyOrdering::AscNullsLast => vec![null_rank(&key, 1), key.then(" ASC")],
            PropertyOrdering::DescNullsFirst => vec![null_rank(&key, 0), key.then(" DESC")],
        }
    }

    fn limit_offset(
        &self,
        parts: &mut SelectParts,
        limit: Option<Fragment>,
        offset: Option<Fragment>,
    ) -> IrResult<()> {
        match (limit, offset) {
            (Some(n), None) => {
                parts.head.push_str(" TOP (");
                parts.head.append(n);
                parts.head.push_str(")");
            }
            (limit, Some(m)) => {
                if parts.order_by.is_none() {
                    parts.order_by = Some(Fragment::text("(SELECT NULL)"));
                }
                parts.tail.push_str(" OFFSET ");
                parts.tail.append(m);
                parts.tail.push_str(" ROWS");
                if let Some(n) = limit {
                    parts.tail.push_str(" FETCH FIRST ");
                    parts.tail.append(n);
                    parts.tail.push_str(" ROWS ONLY");
                }
            }
            (None, None) => {}
        }
        Ok(())
    }

    fn exists(&self, query: Fragment, negated: bool) -> Fragment {
        let open = if negated {
            "SELECT CASE WHEN NOT EXISTS ("
        } else {
            "SELECT CASE WHEN EXISTS ("
        };
        query.wrap(open, ") THEN 1 ELSE 0 END")
    }

    fn returning(&self, kind: ActionKind) -> IrResult<ReturningStyle> {
        Ok(match kind {
            ActionKind::Insert | ActionKind::Update => ReturningStyle::Output("INSERTED"),
            ActionKind::Delete => ReturningStyle::Output("DELETED"),
        })
    }

    fn generated_keys(&self, kind: ActionKind) -> IrResult<KeyStyle> {
        match kind {
            ActionKind::Insert => Ok(KeyStyle::Clause(ReturningStyle::Output("INSERTED"))),
            other => Err(IrError::unsupported(
                self.dialect(),
                format!("returning generated keys from {}", other),
            )),
        }
    }
}

/// `CASE WHEN key IS NULL THEN rank ELSE 1 - rank END`
fn null_rank(key: &Fragment, rank: u8) -> Fragment {
    key.clone().wrap(
        "CASE WHEN ",
        &format!(" IS NULL THEN {} ELSE {} END", rank, 1 - rank),
    )
}
