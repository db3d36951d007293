//! Token buffer for rendered SQL.
//!
//! Fragments hold SQL text interleaved with parameters. Placeholder markers
//! are only numbered by [`Fragment::finish`], so fragments can be built in
//! any order and spliced where the dialect wants them while the text and the
//! parameter list stay in lock-step.

use serde::Serialize;

use crate::ast::{ParamType, ParamValue};
use crate::transpiler::SqlGenerator;

/// A parameter waiting for its marker number.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    /// Binding id for lifted values, `None` for parameterized constants
    pub id: Option<String>,
    pub value: ParamValue,
    pub codec: String,
    pub ty: ParamType,
}

impl Param {
    pub fn constant(value: ParamValue) -> Self {
        let ty = value.param_type();
        Self {
            id: None,
            codec: ty.default_codec().to_string(),
            value,
            ty,
        }
    }
}

/// Parameter as handed to the execution layer, in marker order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamDescriptor {
    /// 1-based marker number
    pub index: usize,
    pub id: Option<String>,
    pub value: ParamValue,
    pub codec: String,
    pub ty: ParamType,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Sql(String),
    Param(Param),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fragment {
    tokens: Vec<Token>,
}

impl Fragment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(s: impl AsRef<str>) -> Self {
        let mut f = Self::new();
        f.push_str(s.as_ref());
        f
    }

    pub fn param(p: Param) -> Self {
        Self {
            tokens: vec![Token::Param(p)],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn push_str(&mut self, s: &str) {
        if s.is_empty() {
            return;
        }
        if let Some(Token::Sql(last)) = self.tokens.last_mut() {
            last.push_str(s);
        } else {
            self.tokens.push(Token::Sql(s.to_string()));
        }
    }

    pub fn push_param(&mut self, p: Param) {
        self.tokens.push(Token::Param(p));
    }

    pub fn append(&mut self, other: Fragment) {
        for token in other.tokens {
            match token {
                Token::Sql(s) => self.push_str(&s),
                Token::Param(p) => self.push_param(p),
            }
        }
    }

    /// `self` followed by `s`.
    pub fn then(mut self, s: &str) -> Self {
        self.push_str(s);
        self
    }

    pub fn then_fragment(mut self, other: Fragment) -> Self {
        self.append(other);
        self
    }

    /// `s` followed by `self`.
    pub fn after(self, s: &str) -> Self {
        let mut f = Fragment::text(s);
        f.append(self);
        f
    }

    /// `open` + self + `close`
    pub fn wrap(self, open: &str, close: &str) -> Self {
        self.after(open).then(close)
    }

    pub fn parens(self) -> Self {
        self.wrap("(", ")")
    }

    pub fn join(parts: impl IntoIterator<Item = Fragment>, sep: &str) -> Fragment {
        let mut out = Fragment::new();
        for (i, part) in parts.into_iter().enumerate() {
            if i > 0 {
                out.push_str(sep);
            }
            out.append(part);
        }
        out
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Number the markers in text order and collect the parameters.
    pub fn finish(self, generator: &dyn SqlGenerator) -> (String, Vec<ParamDescriptor>) {
        let mut sql = String::new();
        let mut params = Vec::new();
        for token in self.tokens {
            match token {
                Token::Sql(s) => sql.push_str(&s),
                Token::Param(p) => {
                    let index = params.len() + 1;
                    sql.push_str(&generator.placeholder(index));
                    params.push(ParamDescriptor {
                        index,
                        id: p.id,
                        value: p.value,
                        codec: p.codec,
                        ty: p.ty,
                    });
                }
            }
        }
        (sql, params)
    }
}

impl From<&str> for Fragment {
    fn from(value: &str) -> Self {
        Fragment::text(value)
    }
}

impl From<String> for Fragment {
    fn from(value: String) -> Self {
        Fragment::text(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transpiler::Dialect;

    fn p(n: i64) -> Param {
        Param::constant(ParamValue::Int(n))
    }

    #[test]
    fn test_markers_follow_final_text_order() {
        // Built out of order: the offset is spliced before the count.
        let count = Fragment::param(p(10));
        let offset = Fragment::param(p(5));
        let mut f = Fragment::text("SELECT x.* FROM T x LIMIT ");
        f.append(offset);
        f.push_str(", ");
        f.append(count);

        let (sql, params) = f.clone().finish(Dialect::Postgres.generator().as_ref());
        assert_eq!(sql, "SELECT x.* FROM T x LIMIT $1, $2");
        assert_eq!(params[0].value, ParamValue::Int(5));
        assert_eq!(params[1].value, ParamValue::Int(10));

        let (sql, _) = f.finish(Dialect::SqlServer.generator().as_ref());
        assert_eq!(sql, "SELECT x.* FROM T x LIMIT @p1, @p2");
    }

    #[test]
    fn test_adjacent_text_merges() {
        let f = Fragment::text("a").then(" b").after("(").then(")");
        assert_eq!(f.tokens(), &[Token::Sql("(a b)".to_string())]);
    }
}
