//! Expression builders.
//!
//! Free functions for assembling IR trees by hand, mostly used by tests and
//! by producers that are not the macro layer.

use crate::ast::{
    AggregateOp, BinaryOp, CallKind, Constant, Expr, Ident, Query, TypeTag, UnaryOp,
};

/// Untyped identifier
pub fn ident(name: &str) -> Expr {
    Expr::ident(name)
}

/// Identifier with a type tag
pub fn typed(name: &str, tag: TypeTag) -> Expr {
    Expr::Ident(Ident::typed(name, tag))
}

/// Property access `base.name`
pub fn prop(base: Expr, name: &str) -> Expr {
    Expr::property(base, name)
}

/// Shorthand for `alias.field`
pub fn col(alias: &str, field: &str) -> Expr {
    Expr::property(Expr::ident(alias), field)
}

pub fn text(s: &str) -> Expr {
    Expr::Constant(Constant::Str(s.to_string()))
}

pub fn int(n: i64) -> Expr {
    Expr::Constant(Constant::Int(n))
}

pub fn float(n: f64) -> Expr {
    Expr::Constant(Constant::Float(n))
}

pub fn boolean(b: bool) -> Expr {
    Expr::Constant(Constant::Bool(b))
}

pub fn null() -> Expr {
    Expr::Constant(Constant::Null)
}

/// Placeholder bound at render time
pub fn tag(id: &str) -> Expr {
    Expr::Tag { id: id.to_string() }
}

pub fn binary(left: Expr, op: BinaryOp, right: Expr) -> Expr {
    Expr::binary(left, op, right)
}

pub fn eq(left: Expr, right: Expr) -> Expr {
    Expr::binary(left, BinaryOp::Eq, right)
}

pub fn ne(left: Expr, right: Expr) -> Expr {
    Expr::binary(left, BinaryOp::Ne, right)
}

pub fn gt(left: Expr, right: Expr) -> Expr {
    Expr::binary(left, BinaryOp::Gt, right)
}

pub fn lt(left: Expr, right: Expr) -> Expr {
    Expr::binary(left, BinaryOp::Lt, right)
}

pub fn and(left: Expr, right: Expr) -> Expr {
    Expr::binary(left, BinaryOp::And, right)
}

pub fn or(left: Expr, right: Expr) -> Expr {
    Expr::binary(left, BinaryOp::Or, right)
}

pub fn add(left: Expr, right: Expr) -> Expr {
    Expr::binary(left, BinaryOp::Add, right)
}

pub fn concat(left: Expr, right: Expr) -> Expr {
    Expr::binary(left, BinaryOp::Concat, right)
}

pub fn not(expr: Expr) -> Expr {
    Expr::unary(UnaryOp::Not, expr)
}

pub fn unary(op: UnaryOp, expr: Expr) -> Expr {
    Expr::unary(op, expr)
}

/// `x => body` style lambda
pub fn lambda(params: &[&str], body: Expr) -> Expr {
    Expr::Function {
        params: params.iter().map(|p| Ident::new(*p)).collect(),
        body: Box::new(body),
    }
}

pub fn apply(function: Expr, args: Vec<Expr>) -> Expr {
    Expr::Apply {
        function: Box::new(function),
        args,
    }
}

/// Global function call `NAME(args)`
pub fn call(name: &str, args: Vec<Expr>) -> Expr {
    Expr::Call {
        name: name.to_string(),
        kind: CallKind::Global,
        args,
        tag: TypeTag::Value,
    }
}

pub fn tuple(values: Vec<Expr>) -> Expr {
    Expr::tuple(values)
}

/// Record with named fields
pub fn record(fields: Vec<(&str, Expr)>) -> Expr {
    Expr::Product {
        fields: fields.into_iter().map(|(n, v)| (n.to_string(), v)).collect(),
    }
}

/// `CASE WHEN cond THEN then ELSE otherwise END`
pub fn if_else(cond: Expr, then: Expr, otherwise: Expr) -> Expr {
    Expr::If {
        branches: vec![(cond, then)],
        default: Box::new(otherwise),
    }
}

pub fn block(bindings: Vec<(&str, Expr)>, body: Expr) -> Expr {
    Expr::Block {
        bindings: bindings
            .into_iter()
            .map(|(n, v)| (Ident::new(n), v))
            .collect(),
        body: Box::new(body),
    }
}

pub fn aggregate(op: AggregateOp, expr: Expr) -> Expr {
    Expr::Aggregation {
        op,
        expr: Box::new(expr),
    }
}

pub fn subquery(query: Query) -> Expr {
    Expr::Query(Box::new(query))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tuple_names_are_positional() {
        match tuple(vec![int(1), int(2)]) {
            Expr::Product { fields } => {
                assert_eq!(fields[0].0, "_1");
                assert_eq!(fields[1].0, "_2");
            }
            other => panic!("expected product, got {:?}", other),
        }
    }
}
