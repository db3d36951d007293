use crate::ast::{ActionKind, Primitive};
use crate::error::{IrError, IrResult};
use crate::transpiler::Dialect;
use crate::transpiler::statement::Fragment;
use crate::transpiler::traits::{KeyStyle, SqlGenerator};

pub struct H2Generator;

impl SqlGenerator for H2Generator {
    fn dialect(&self) -> Dialect {
        Dialect::H2
    }

    fn quote_identifier(&self, id: &str) -> String {
        format!("\"{}\"", id.replace('"', "\"\""))
    }

    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
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
            Primitive::Byte => "TINYINT",
            Primitive::Short => "SMALLINT",
            Primitive::Int => "INT",
            Primitive::Long => "BIGINT",
            Primitive::Float => "REAL",
            Primitive::Double => "DOUBLE",
            Primitive::Decimal => "DECIMAL",
            Primitive::Boolean => "BOOLEAN",
            Primitive::String => "VARCHAR",
        }
    }

    fn cast(&self, expr: Fragment, to: Primitive) -> Fragment {
        expr.after("CAST(").then(&format!(" AS {})", self.cast_type(to)))
    }

    fn generated_keys(&self, kind: ActionKind) -> IrResult<KeyStyle> {
        match kind {
            ActionKind::Insert | ActionKind::Update => Ok(KeyStyle::Driver),
            ActionKind::Delete => Err(IrError::unsupported(
                self.dialect(),
                "returning generated keys from DELETE",
            )),
        }
    }
}
