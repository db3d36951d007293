use crate::ast::{ActionKind, Primitive, PropertyOrdering};
use crate::error::IrResult;
use crate::transpiler::Dialect;
use crate::transpiler::dml::select::SelectParts;
use crate::transpiler::statement::Fragment;
use crate::transpiler::traits::{ConflictStyle, KeyStyle, SqlGenerator};

/// Row count standing in for "all remaining rows" in `LIMIT offset, count`.
/// Only written for an offset without a limit; a lone limit stays `LIMIT n`.
const ALL_ROWS: &str = "18446744073709551615";

/// MySQL Generator.
pub struct MysqlGenerator;

impl SqlGenerator for MysqlGenerator {
    fn dialect(&self) -> Dialect {
        Dialect::MySQL
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
    }

    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn bool_literal(&self, val: bool) -> String {
        if val { "1".to_string() } else { "0".to_string() }
    }

    fn string_concat(&self, parts: Vec<Fragment>) -> Fragment {
        Fragment::join(parts, ", ").wrap("CONCAT(", ")")
    }

    fn cast_type(&self, to: Primitive) -> &str {
        match to {
            Primitive::Byte | Primitive::Short | Primitive::Int | Primitive::Long => "SIGNED",
            Primitive::Float => "FLOAT",
            Primitive::Double => "DOUBLE",
            Primitive::Decimal => "DECIMAL",
            Primitive::Boolean => "UNSIGNED",
            Primitive::String => "CHAR",
        }
    }

    // No NULLS FIRST/LAST: sort on ISNULL(x) first. MySQL puts nulls first
    // ascending and last descending.
    fn order_key(&self, key: Fragment, ordering: PropertyOrdering) -> Vec<Fragment> {
        let is_null = key.clone().wrap("ISNULL(", ")");
        match ordering {
            PropertyOrdering::Asc => vec![key.then(" ASC")],
            PropertyOrdering::Desc => vec![key.then(" DESC")],
            PropertyOrdering::AscNullsFirst => vec![key.then(" ASC")],
            PropertyOrdering::DescNullsLast => vec![key.then(" DESC")],
            PropertyOrdering::AscNullsLast => vec![is_null.then(" ASC"), key.then(" ASC")],
            PropertyOrdering::DescNullsFirst => vec![is_null.then(" DESC"), key.then(" DESC")],
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
                parts.tail.push_str(" LIMIT ");
                parts.tail.append(n);
            }
            (Some(n), Some(m)) => {
                parts.tail.push_str(" LIMIT ");
                parts.tail.append(m);
                parts.tail.push_str(", ");
                parts.tail.append(n);
            }
            (None, Some(m)) => {
                parts.tail.push_str(" LIMIT ");
                parts.tail.append(m);
                parts.tail.push_str(&format!(", {}", ALL_ROWS));
            }
            (None, None) => {}
        }
        Ok(())
    }

    fn empty_insert(&self) -> &str {
        " () VALUES ()"
    }

    fn generated_keys(&self, kind: ActionKind) -> IrResult<KeyStyle> {
        match kind {
            ActionKind::Insert => Ok(KeyStyle::Driver),
            ActionKind::Update | ActionKind::Delete => Ok(KeyStyle::Empty),
        }
    }

    fn on_conflict(&self) -> ConflictStyle {
        ConflictStyle::DuplicateKey
    }
}
