//! Expression rendering.
//!
//! [`Renderer`] carries the dialect, the render options, the bindings and a
//! stack of the aliases in scope. Statement-level rendering (`SELECT`,
//! `INSERT`, ...) lives in `dml/` as further `impl Renderer` blocks.

use crate::analysis::free_vars;
use crate::ast::{
    AggregateOp, BinaryOp, Binding, Constant, Entity, Expr, ParamValue, Query, Renameable, UnaryOp,
};
use crate::config::RenderOptions;
use crate::error::{IrError, IrResult};
use crate::sql::normalizer::avoid_alias_conflicts;
use crate::sql::{SqlQuery, normalize, remove_extra_alias};
use crate::transpiler::statement::{Fragment, Param, Token};
use crate::transpiler::traits::SqlGenerator;

/// How the columns of an alias are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Qualifier {
    /// `alias.column`
    Alias,
    /// `column`
    Unqualified,
    /// `NAME.column`, the alias is replaced by `NAME`
    Named(String),
}

#[derive(Debug, Clone)]
pub(crate) struct Scope {
    alias: String,
    entity: Option<Entity>,
    qualifier: Qualifier,
}

pub struct Renderer<'a> {
    pub(crate) generator: &'a dyn SqlGenerator,
    pub(crate) options: &'a RenderOptions,
    bindings: &'a [Binding],
    scopes: Vec<Scope>,
}

impl<'a> Renderer<'a> {
    pub fn new(
        generator: &'a dyn SqlGenerator,
        options: &'a RenderOptions,
        bindings: &'a [Binding],
    ) -> Self {
        Self {
            generator,
            options,
            bindings,
            scopes: Vec::new(),
        }
    }

    /// Identifier as written in the text, quoted when needed (or always, with
    /// an escaping naming strategy).
    pub(crate) fn identifier(&self, name: &str) -> String {
        if self.options.naming.escape {
            self.generator.quote_identifier(name)
        } else {
            self.generator.escape_identifier(name)
        }
    }

    /// Schema name of an entity.
    pub(crate) fn table(&self, entity: &Entity) -> String {
        let name = match entity.renameable {
            Renameable::Fixed => entity.name.clone(),
            Renameable::ByStrategy => self.options.naming.apply(&entity.name),
        };
        self.identifier(&name)
    }

    pub(crate) fn push_scope(&mut self, alias: &str, entity: Option<&Entity>, qualifier: Qualifier) {
        self.scopes.push(Scope {
            alias: alias.to_string(),
            entity: entity.cloned(),
            qualifier,
        });
    }

    pub(crate) fn mark(&self) -> usize {
        self.scopes.len()
    }

    pub(crate) fn restore(&mut self, mark: usize) {
        self.scopes.truncate(mark);
    }

    fn lookup(&self, alias: &str) -> Option<&Scope> {
        self.scopes.iter().rev().find(|s| s.alias == alias)
    }

    /// Text standing before `.column` for `alias`, `None` when unqualified.
    pub(crate) fn qualifier(&self, alias: &str) -> Option<String> {
        match self.lookup(alias).map(|s| &s.qualifier) {
            None | Some(Qualifier::Alias) => Some(self.identifier(alias)),
            Some(Qualifier::Unqualified) => None,
            Some(Qualifier::Named(name)) => Some(name.clone()),
        }
    }

    /// Root alias and unquoted schema column of a property path. Embedded
    /// paths (`p.address.street`) read their leaf column.
    pub(crate) fn column<'e>(&self, e: &'e Expr) -> Option<(&'e str, String)> {
        let Expr::Property {
            base,
            name,
            renameable,
        } = e
        else {
            return None;
        };
        let root = e.root_ident()?;
        let mapped = match base.as_ref() {
            Expr::Ident(_) => self
                .lookup(&root.name)
                .and_then(|s| s.entity.as_ref())
                .and_then(|entity| entity.column_of(name))
                .map(str::to_string),
            _ => None,
        };
        let column = match (mapped, renameable) {
            (Some(column), _) => column,
            (None, Renameable::Fixed) => name.clone(),
            (None, Renameable::ByStrategy) => self.options.naming.apply(name),
        };
        Some((root.name.as_str(), column))
    }

    /// `alias.*`, or `*` for an unqualified alias.
    pub(crate) fn star(&self, alias: &str) -> Fragment {
        match self.qualifier(alias) {
            Some(q) => Fragment::text(format!("{}.*", q)),
            None => Fragment::text("*"),
        }
    }

    fn binding(&self, id: &str) -> IrResult<&'a Binding> {
        let bindings = self.bindings;
        bindings
            .iter()
            .find(|b| b.id == id)
            .ok_or_else(|| IrError::malformed(format!("no binding for placeholder '{}'", id)))
    }

    /// Render `e` where the dialect expects a value.
    pub fn value(&mut self, e: &Expr) -> IrResult<Fragment> {
        if !self.generator.native_booleans() && e.is_predicate() {
            return Ok(self.render(e)?.wrap("CASE WHEN ", " THEN 1 ELSE 0 END"));
        }
        self.render(e)
    }

    /// Render `e` where the dialect expects a predicate.
    pub fn predicate(&mut self, e: &Expr) -> IrResult<Fragment> {
        if self.generator.native_booleans() || e.is_predicate() {
            return self.render(e);
        }
        match e {
            Expr::Constant(Constant::Bool(b)) if self.options.inline_literals => {
                Ok(Fragment::text(if *b { "1 = 1" } else { "1 = 0" }))
            }
            _ => Ok(self.grouped_value(e)?.then(" = 1")),
        }
    }

    fn value_precedence(&self, e: &Expr) -> Option<u8> {
        if !self.generator.native_booleans() && e.is_predicate() {
            None
        } else {
            precedence(e)
        }
    }

    fn predicate_precedence(&self, e: &Expr) -> Option<u8> {
        if self.generator.native_booleans() || e.is_predicate() {
            precedence(e)
        } else {
            Some(BinaryOp::Eq.precedence())
        }
    }

    /// Value wrapped in parentheses unless it is atomic.
    fn grouped_value(&mut self, e: &Expr) -> IrResult<Fragment> {
        let grouped = self.value_precedence(e).is_some();
        let sql = self.value(e)?;
        Ok(if grouped { sql.parens() } else { sql })
    }

    fn operand(
        &mut self,
        e: &Expr,
        parent: BinaryOp,
        right: bool,
        as_predicate: bool,
    ) -> IrResult<Fragment> {
        let (sql, prec) = if as_predicate {
            (self.predicate(e)?, self.predicate_precedence(e))
        } else {
            (self.value(e)?, self.value_precedence(e))
        };
        let child = match e {
            Expr::Binary { op, .. } => Some(*op),
            _ => None,
        };
        Ok(if needs_parens(prec, child, parent, right) {
            sql.parens()
        } else {
            sql
        })
    }

    fn render(&mut self, e: &Expr) -> IrResult<Fragment> {
        match e {
            Expr::Ident(id) => Ok(Fragment::text(
                self.qualifier(&id.name)
                    .unwrap_or_else(|| self.identifier(&id.name)),
            )),
            Expr::Constant(c) => Ok(self.constant(c)),
            Expr::Tag { id } => self.tag(id),
            Expr::Property { .. } => self.property(e),
            Expr::Unary { op, expr } => self.unary(*op, expr),
            Expr::Binary { left, op, right } => self.binary(left, *op, right),
            Expr::Call { name, args, .. } => {
                let args = args
                    .iter()
                    .map(|a| self.value(a))
                    .collect::<IrResult<Vec<_>>>()?;
                Ok(Fragment::join(args, ", ").wrap(&format!("{}(", name), ")"))
            }
            Expr::If { branches, default } => {
                if branches.is_empty() {
                    return self.value(default);
                }
                let mut out = Fragment::text("CASE");
                for (cond, value) in branches {
                    out.push_str(" WHEN ");
                    out.append(self.predicate(cond)?);
                    out.push_str(" THEN ");
                    out.append(self.value(value)?);
                }
                out.push_str(" ELSE ");
                out.append(self.value(default)?);
                Ok(out.then(" END"))
            }
            Expr::Product { fields } => {
                let values = fields
                    .iter()
                    .map(|(_, v)| self.value(v))
                    .collect::<IrResult<Vec<_>>>()?;
                Ok(Fragment::join(values, ", ").parens())
            }
            Expr::Aggregation { op, expr } => self.aggregation(*op, expr),
            Expr::Query(q) => self.subquery(q),
            Expr::Function { .. } => Err(IrError::malformed(format!(
                "unreduced lambda reached the renderer: {}",
                e
            ))),
            Expr::Apply { .. } => Err(IrError::malformed(format!(
                "unreduced application reached the renderer: {}",
                e
            ))),
            Expr::Block { .. } => Err(IrError::malformed(format!(
                "unreduced block reached the renderer: {}",
                e
            ))),
        }
    }

    fn constant(&self, c: &Constant) -> Fragment {
        if !self.options.inline_literals {
            let value = match c {
                Constant::Null => return Fragment::text("NULL"),
                Constant::Bool(b) => ParamValue::Bool(*b),
                Constant::Int(n) => ParamValue::Int(*n),
                Constant::Float(f) => ParamValue::Float(*f),
                Constant::Str(s) => ParamValue::Text(s.clone()),
            };
            return Fragment::param(Param::constant(value));
        }
        match c {
            Constant::Null => Fragment::text("NULL"),
            Constant::Bool(b) => Fragment::text(self.generator.bool_literal(*b)),
            Constant::Int(n) => Fragment::text(n.to_string()),
            Constant::Float(f) => Fragment::text(format!("{:?}", f)),
            Constant::Str(s) => Fragment::text(format!("'{}'", s.replace('\'', "''"))),
        }
    }

    fn tag(&self, id: &str) -> IrResult<Fragment> {
        let binding = self.binding(id)?;
        Ok(Fragment::param(Param {
            id: Some(binding.id.clone()),
            value: binding.value.clone(),
            codec: binding.codec.clone(),
            ty: binding.ty,
        }))
    }

    fn property(&self, e: &Expr) -> IrResult<Fragment> {
        let (alias, column) = self
            .column(e)
            .ok_or_else(|| IrError::malformed(format!("property of a non-row value: {}", e)))?;
        let column = self.identifier(&column);
        Ok(Fragment::text(match self.qualifier(alias) {
            Some(q) => format!("{}.{}", q, column),
            None => column,
        }))
    }

    fn unary(&mut self, op: UnaryOp, e: &Expr) -> IrResult<Fragment> {
        match op {
            UnaryOp::Not => {
                let grouped = self.predicate_precedence(e).is_some();
                let inner = self.predicate(e)?;
                Ok(if grouped { inner.parens() } else { inner }.after("NOT "))
            }
            UnaryOp::Neg => {
                let inner = self.grouped_value(e)?;
                let negative = matches!(inner.tokens().first(), Some(Token::Sql(s)) if s.starts_with('-'));
                Ok(if negative { inner.parens() } else { inner }.after("-"))
            }
            UnaryOp::Upper => Ok(self.value(e)?.wrap("UPPER(", ")")),
            UnaryOp::Lower => Ok(self.value(e)?.wrap("LOWER(", ")")),
            UnaryOp::Length => {
                let open = format!("{}(", self.generator.length_function());
                Ok(self.value(e)?.wrap(&open, ")"))
            }
            UnaryOp::IsNull => Ok(self.grouped_value(e)?.then(" IS NULL")),
            UnaryOp::IsNotNull => Ok(self.grouped_value(e)?.then(" IS NOT NULL")),
            UnaryOp::Cast(to) => {
                let inner = self.grouped_value(e)?;
                Ok(self.generator.cast(inner, to))
            }
        }
    }

    fn binary(&mut self, left: &Expr, op: BinaryOp, right: &Expr) -> IrResult<Fragment> {
        match op {
            BinaryOp::Eq | BinaryOp::Ne if left.is_null_constant() || right.is_null_constant() => {
                let subject = if right.is_null_constant() { left } else { right };
                let suffix = if op == BinaryOp::Eq {
                    " IS NULL"
                } else {
                    " IS NOT NULL"
                };
                Ok(self.grouped_value(subject)?.then(suffix))
            }
            BinaryOp::And | BinaryOp::Or => {
                let l = self.operand(left, op, false, true)?;
                let r = self.operand(right, op, true, true)?;
                Ok(Fragment::join([l, r], &format!(" {} ", sql_operator(op))))
            }
            BinaryOp::Concat => {
                let mut parts = Vec::new();
                self.concat_parts(left, &mut parts)?;
                self.concat_parts(right, &mut parts)?;
                Ok(self.generator.string_concat(parts))
            }
            BinaryOp::In => self.in_list(left, right),
            _ => {
                let l = self.operand(left, op, false, false)?;
                let r = self.operand(right, op, true, false)?;
                Ok(Fragment::join([l, r], &format!(" {} ", sql_operator(op))))
            }
        }
    }

    // Flattens `a ++ (b ++ c)` so CONCAT-style dialects get one call.
    fn concat_parts(&mut self, e: &Expr, parts: &mut Vec<Fragment>) -> IrResult<()> {
        match e {
            Expr::Binary {
                left,
                op: BinaryOp::Concat,
                right,
            } => {
                self.concat_parts(left, parts)?;
                self.concat_parts(right, parts)
            }
            _ => {
                parts.push(self.operand(e, BinaryOp::Concat, true, false)?);
                Ok(())
            }
        }
    }

    fn in_list(&mut self, left: &Expr, right: &Expr) -> IrResult<Fragment> {
        let subject = self.operand(left, BinaryOp::In, false, false)?;
        let items = match right {
            Expr::Query(q) => {
                let sub = self.subquery(q)?;
                return Ok(subject.then(" IN ").then_fragment(sub));
            }
            Expr::Tag { id } => {
                let binding = self.binding(id)?;
                match &binding.value {
                    ParamValue::List(values) => values
                        .iter()
                        .map(|v| {
                            Fragment::param(Param {
                                id: Some(binding.id.clone()),
                                value: v.clone(),
                                codec: binding.codec.clone(),
                                ty: binding.ty,
                            })
                        })
                        .collect(),
                    _ => vec![self.tag(id)?],
                }
            }
            Expr::Product { fields } => fields
                .iter()
                .map(|(_, v)| self.value(v))
                .collect::<IrResult<Vec<_>>>()?,
            other => vec![self.value(other)?],
        };
        if items.is_empty() {
            return Ok(Fragment::text("1 = 0"));
        }
        Ok(subject.then(" IN ").then_fragment(Fragment::join(items, ", ").parens()))
    }

    fn aggregation(&mut self, op: AggregateOp, e: &Expr) -> IrResult<Fragment> {
        match e {
            Expr::Ident(_) | Expr::Product { .. } if op == AggregateOp::Count => {
                Ok(Fragment::text("COUNT(*)"))
            }
            Expr::Ident(_) | Expr::Product { .. } => Err(IrError::malformed(format!(
                "{} over a whole row: {}",
                op, e
            ))),
            _ => Ok(self.value(e)?.wrap(&format!("{}(", op), ")")),
        }
    }

    /// Sub-query embedded in an expression, rendered with the enclosing
    /// aliases still in scope. Inner binders are kept clear of the outer
    /// names the sub-query refers to.
    pub(crate) fn subquery(&mut self, q: &Query) -> IrResult<Fragment> {
        let q = avoid_alias_conflicts(q, &free_vars::of_query(q));
        let model = remove_extra_alias(normalize(&q)?, &self.options.naming);
        match &model {
            SqlQuery::Exists { query, negated } => {
                let open = if *negated { "NOT EXISTS (" } else { "EXISTS (" };
                Ok(self.query(query)?.wrap(open, ")"))
            }
            other => Ok(self.query(other)?.parens()),
        }
    }
}

/// Binding strength of the rendered form, `None` for atomic expressions.
fn precedence(e: &Expr) -> Option<u8> {
    match e {
        Expr::Binary { op, .. } => Some(op.precedence()),
        Expr::Unary {
            op: UnaryOp::Not, ..
        } => Some(3),
        Expr::Unary {
            op: UnaryOp::IsNull | UnaryOp::IsNotNull,
            ..
        } => Some(BinaryOp::Eq.precedence()),
        _ => None,
    }
}

fn needs_parens(child: Option<u8>, child_op: Option<BinaryOp>, parent: BinaryOp, right: bool) -> bool {
    let Some(c) = child else {
        return false;
    };
    let p = parent.precedence();
    if c != p {
        return c < p;
    }
    if right {
        !(child_op == Some(parent) && parent.is_associative())
    } else {
        // comparisons do not chain
        parent.is_predicate()
    }
}

fn sql_operator(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Eq => "=",
        BinaryOp::Ne => "<>",
        BinaryOp::Lt => "<",
        BinaryOp::Le => "<=",
        BinaryOp::Gt => ">",
        BinaryOp::Ge => ">=",
        BinaryOp::And => "AND",
        BinaryOp::Or => "OR",
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
        BinaryOp::Rem => "%",
        BinaryOp::Concat => "||",
        BinaryOp::Like => "LIKE",
        BinaryOp::In => "IN",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builders::*;
    use crate::transpiler::Dialect;

    fn render_with(dialect: Dialect, e: &Expr, predicate: bool) -> String {
        let options = RenderOptions::new(dialect);
        let generator = dialect.generator();
        let mut r = Renderer::new(generator.as_ref(), &options, &[]);
        let sql = if predicate {
            r.predicate(e).unwrap()
        } else {
            r.value(e).unwrap()
        };
        sql.finish(generator.as_ref()).0
    }

    fn pg(e: &Expr) -> String {
        render_with(Dialect::Postgres, e, false)
    }

    #[test]
    fn test_parenthesizes_by_precedence() {
        let a = col("p", "a");
        let b = col("p", "b");
        let c = col("p", "c");
        assert_eq!(pg(&add(a.clone(), binary(b.clone(), BinaryOp::Mul, c.clone()))), "p.a + p.b * p.c");
        assert_eq!(
            pg(&binary(add(a.clone(), b.clone()), BinaryOp::Mul, c.clone())),
            "(p.a + p.b) * p.c"
        );
        assert_eq!(
            pg(&binary(a.clone(), BinaryOp::Sub, binary(b.clone(), BinaryOp::Sub, c.clone()))),
            "p.a - (p.b - p.c)"
        );
        assert_eq!(
            pg(&and(or(eq(a.clone(), int(1)), eq(b.clone(), int(2))), eq(c.clone(), int(3)))),
            "(p.a = 1 OR p.b = 2) AND p.c = 3"
        );
        assert_eq!(pg(&or(and(a.clone(), b.clone()), c.clone())), "p.a AND p.b OR p.c");
    }

    #[test]
    fn test_null_comparison() {
        assert_eq!(pg(&eq(col("p", "name"), null())), "p.name IS NULL");
        assert_eq!(pg(&ne(null(), col("p", "name"))), "p.name IS NOT NULL");
    }

    #[test]
    fn test_string_literal_escaping() {
        assert_eq!(pg(&text("O'Brien")), "'O''Brien'");
    }

    #[test]
    fn test_unreduced_lambda_is_malformed() {
        let options = RenderOptions::default();
        let generator = Dialect::Postgres.generator();
        let mut r = Renderer::new(generator.as_ref(), &options, &[]);
        let err = r.value(&lambda(&["x"], ident("x"))).unwrap_err();
        assert!(matches!(err, IrError::Malformed(_)));
    }

    #[test]
    fn test_sqlserver_boolean_positions() {
        let active = col("p", "active");
        assert_eq!(render_with(Dialect::SqlServer, &active, true), "p.active = 1");
        assert_eq!(render_with(Dialect::SqlServer, &boolean(true), true), "1 = 1");
        assert_eq!(
            render_with(Dialect::SqlServer, &gt(col("p", "age"), int(18)), false),
            "CASE WHEN p.age > 18 THEN 1 ELSE 0 END"
        );
        assert_eq!(render_with(Dialect::SqlServer, &not(active.clone()), true), "NOT (p.active = 1)");
        assert_eq!(render_with(Dialect::Postgres, &not(active), true), "NOT p.active");
    }

    #[test]
    fn test_unary_functions() {
        assert_eq!(pg(&unary(UnaryOp::Upper, col("p", "name"))), "UPPER(p.name)");
        assert_eq!(render_with(Dialect::SqlServer, &unary(UnaryOp::Length, col("p", "name")), false), "LEN(p.name)");
        assert_eq!(pg(&unary(UnaryOp::Neg, unary(UnaryOp::Neg, col("p", "n")))), "-(-p.n)");
    }

    #[test]
    fn test_count_of_row() {
        assert_eq!(pg(&aggregate(AggregateOp::Count, ident("p"))), "COUNT(*)");
        assert_eq!(pg(&aggregate(AggregateOp::Max, col("p", "age"))), "MAX(p.age)");
    }
}
