use crate::ast::{ActionKind, Primitive};
use crate::error::IrResult;
use crate::transpiler::Dialect;
use crate::transpiler::statement::Fragment;
use crate::transpiler::traits::{ConflictStyle, KeyStyle, ReturningStyle, SqlGenerator};

pub struct PostgresGenerator;

impl SqlGenerator for PostgresGenerator {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    fn placeholder(&self, index: usize) -> String {
        format!("${}", index)
    }

    fn bool_literal(&self, val: bool) -> String {
        if val {
            "true".to_string()
        } else {
            "false".to_string()
        }
    }

    fn cast_type(&self, to: Primitive) -> &str {
        match to {
            Primitive::Byte | Primitive::Short => "smallint",
            Primitive::Int => "integer",
            Primitive::Long => "bigint",
            Primitive::Float => "real",
            Primitive::Double => "double precision",
            Primitive::Decimal => "numeric",
            Primitive::Boolean => "boolean",
            Primitive::String => "varchar",
        }
    }

    fn cast(&self, expr: Fragment, to: Primitive) -> Fragment {
        expr.then(&format!("::{}", self.cast_type(to)))
    }

    fn distinct_on(&self, keys: Vec<Fragment>) -> IrResult<Fragment> {
        Ok(Fragment::join(keys, ", ").wrap("DISTINCT ON (", ")"))
    }

    fn unnest(&self, expr: Fragment) -> IrResult<Fragment> {
        Ok(expr.wrap("UNNEST(", ")"))
    }

    fn qualify_action_columns(&self) -> bool {
        true
    }

    fn returning(&self, _kind: ActionKind) -> IrResult<ReturningStyle> {
        Ok(ReturningStyle::Returning)
    }

    fn generated_keys(&self, _kind: ActionKind) -> IrResult<KeyStyle> {
        Ok(KeyStyle::Clause(ReturningStyle::Returning))
    }

    fn on_conflict(&self) -> ConflictStyle {
        ConflictStyle::OnConflict
    }
}
