use crate::ast::{ActionKind, Primitive};
use crate::error::{IrError, IrResult};
use crate::transpiler::Dialect;
use crate::transpiler::dml::select::SelectParts;
use crate::transpiler::statement::Fragment;
use crate::transpiler::traits::{ConflictStyle, KeyStyle, ReturningStyle, SqlGenerator};

pub struct SqliteGenerator;

impl SqlGenerator for SqliteGenerator {
    fn dialect(&self) -> Dialect {
        Dialect::SQLite
    }

    fn quote_identifier(&self, id: &str) -> String {
        format!("\"{}\"", id.replace('"', "\"\""))
    }

    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn bool_literal(&self, val: bool) -> String {
        if val {
            "1".to_string()
        } else {
            "0".to_string()
        }
    }

    fn cast_type(&self, to: Primitive) -> &str {
        match to {
            Primitive::Byte | Primitive::Short | Primitive::Int | Primitive::Long => "INTEGER",
            Primitive::Float | Primitive::Double => "REAL",
            Primitive::Decimal => "NUMERIC",
            Primitive::Boolean => "INTEGER",
            Primitive::String => "TEXT",
        }
    }

    fn limit_offset(
        &self,
        parts: &mut SelectParts,
        limit: Option<Fragment>,
        offset: Option<Fragment>,
    ) -> IrResult<()> {
        // OFFSET is only valid after LIMIT; -1 means no limit
        let limit = match (limit, &offset) {
            (None, Some(_)) => Some(Fragment::text("-1")),
            (limit, _) => limit,
        };
        if let Some(n) = limit {
            parts.tail.push_str(" LIMIT ");
            parts.tail.append(n);
        }
        if let Some(m) = offset {
            parts.tail.push_str(" OFFSET ");
            parts.tail.append(m);
        }
        Ok(())
    }

    // Compound-select members cannot be parenthesized.
    fn set_operand(&self, query: Fragment, plain: bool) -> Fragment {
        if plain {
            query
        } else {
            query.wrap("SELECT * FROM (", ")")
        }
    }

    fn returning(&self, _kind: ActionKind) -> IrResult<ReturningStyle> {
        Ok(ReturningStyle::Returning)
    }

    fn generated_keys(&self, kind: ActionKind) -> IrResult<KeyStyle> {
        match kind {
            ActionKind::Insert => Ok(KeyStyle::Driver),
            other => Err(IrError::unsupported(
                self.dialect(),
                format!("returning generated keys from {}", other),
            )),
        }
    }

    fn on_conflict(&self) -> ConflictStyle {
        ConflictStyle::OnConflict
    }
}
