use serde::{Deserialize, Serialize};

use crate::ast::{AggregateOp, BinaryOp, CallKind, Query, UnaryOp};

/// Type tag carried by identifiers. Products describe row shapes and are
/// what lets the normalizer expand `p` into its columns.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TypeTag {
    #[default]
    Unknown,
    /// A scalar value
    Value,
    /// A scalar known to be boolean
    Bool,
    /// A record with ordered, named fields
    Product(Vec<(String, TypeTag)>),
}

impl TypeTag {
    /// Build a product tag from `(name, tag)` pairs.
    pub fn product<S: Into<String>>(fields: impl IntoIterator<Item = (S, TypeTag)>) -> Self {
        TypeTag::Product(fields.into_iter().map(|(n, t)| (n.into(), t)).collect())
    }

    /// Product tag whose fields are all plain values.
    pub fn values<S: Into<String>>(fields: impl IntoIterator<Item = S>) -> Self {
        TypeTag::Product(fields.into_iter().map(|n| (n.into(), TypeTag::Value)).collect())
    }

    pub fn field(&self, name: &str) -> Option<&TypeTag> {
        match self {
            TypeTag::Product(fields) => fields.iter().find(|(n, _)| n == name).map(|(_, t)| t),
            _ => None,
        }
    }

    pub fn is_product(&self) -> bool {
        matches!(self, TypeTag::Product(_))
    }
}

/// A named identifier with its type tag. Identity is by name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ident {
    pub name: String,
    #[serde(default)]
    pub tag: TypeTag,
}

impl Ident {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tag: TypeTag::Unknown,
        }
    }

    pub fn typed(name: impl Into<String>, tag: TypeTag) -> Self {
        Self {
            name: name.into(),
            tag,
        }
    }

    /// Same type tag, different name.
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tag: self.tag.clone(),
        }
    }
}

impl PartialEq for Ident {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Ident {}

/// Literal constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Constant {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

/// Whether the naming strategy may rewrite a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Renameable {
    #[default]
    ByStrategy,
    /// The name is already the schema name (explicit schema alias or an
    /// output alias of a nested query).
    Fixed,
}

/// Expression tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Ident(Ident),
    Constant(Constant),
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },
    /// Fixed-arity lambda
    Function {
        params: Vec<Ident>,
        body: Box<Expr>,
    },
    Apply {
        function: Box<Expr>,
        args: Vec<Expr>,
    },
    /// Method or global function call
    Call {
        name: String,
        kind: CallKind,
        args: Vec<Expr>,
        #[serde(default)]
        tag: TypeTag,
    },
    /// Guarded branches evaluated in order, then the default
    If {
        branches: Vec<(Expr, Expr)>,
        default: Box<Expr>,
    },
    /// Tuple or record: ordered name to field pairs
    Product {
        fields: Vec<(String, Expr)>,
    },
    Property {
        base: Box<Expr>,
        name: String,
        #[serde(default)]
        renameable: Renameable,
    },
    /// Placeholder for a value bound at render time
    Tag {
        id: String,
    },
    /// `let` sequence: bindings are visible to later bindings and the body
    Block {
        bindings: Vec<(Ident, Expr)>,
        body: Box<Expr>,
    },
    Aggregation {
        op: AggregateOp,
        expr: Box<Expr>,
    },
    /// Sub-query used as a value (IN, EXISTS, scalar sub-select)
    Query(Box<Query>),
}

impl Expr {
    pub fn ident(name: impl Into<String>) -> Self {
        Expr::Ident(Ident::new(name))
    }

    pub fn property(base: Expr, name: impl Into<String>) -> Self {
        Expr::Property {
            base: Box::new(base),
            name: name.into(),
            renameable: Renameable::ByStrategy,
        }
    }

    pub fn fixed_property(base: Expr, name: impl Into<String>) -> Self {
        Expr::Property {
            base: Box::new(base),
            name: name.into(),
            renameable: Renameable::Fixed,
        }
    }

    pub fn binary(left: Expr, op: BinaryOp, right: Expr) -> Self {
        Expr::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    pub fn unary(op: UnaryOp, expr: Expr) -> Self {
        Expr::Unary {
            op,
            expr: Box::new(expr),
        }
    }

    /// Tuple with positional names `_1`, `_2`, ...
    pub fn tuple(values: impl IntoIterator<Item = Expr>) -> Self {
        Expr::Product {
            fields: values
                .into_iter()
                .enumerate()
                .map(|(i, v)| (format!("_{}", i + 1), v))
                .collect(),
        }
    }

    /// Conjunction of `a` and `b`, absorbing a missing side.
    pub fn and_opt(a: Option<Expr>, b: Expr) -> Expr {
        match a {
            Some(a) => Expr::binary(a, BinaryOp::And, b),
            None => b,
        }
    }

    pub fn is_null_constant(&self) -> bool {
        matches!(self, Expr::Constant(Constant::Null))
    }

    /// Alias, property path on an alias, or a tuple of those.
    pub fn is_simple(&self) -> bool {
        match self {
            Expr::Ident(_) => true,
            Expr::Property { base, .. } => base.is_simple_path(),
            Expr::Product { fields } => fields.iter().all(|(_, v)| v.is_simple()),
            _ => false,
        }
    }

    fn is_simple_path(&self) -> bool {
        match self {
            Expr::Ident(_) => true,
            Expr::Property { base, .. } => base.is_simple_path(),
            _ => false,
        }
    }

    /// Whether the expression evaluates to a boolean predicate (as opposed to
    /// a boolean value).
    pub fn is_predicate(&self) -> bool {
        match self {
            Expr::Binary { op, .. } => op.is_predicate(),
            Expr::Unary { op, .. } => {
                matches!(op, UnaryOp::Not | UnaryOp::IsNull | UnaryOp::IsNotNull)
            }
            Expr::Query(q) => matches!(**q, Query::IsEmpty(_) | Query::NonEmpty(_)),
            _ => false,
        }
    }

    /// Whether an aggregation occurs outside of nested sub-queries.
    pub fn contains_aggregation(&self) -> bool {
        match self {
            Expr::Aggregation { .. } => true,
            Expr::Ident(_) | Expr::Constant(_) | Expr::Tag { .. } | Expr::Query(_) => false,
            Expr::Unary { expr, .. } => expr.contains_aggregation(),
            Expr::Binary { left, right, .. } => {
                left.contains_aggregation() || right.contains_aggregation()
            }
            Expr::Function { body, .. } => body.contains_aggregation(),
            Expr::Apply { function, args } => {
                function.contains_aggregation() || args.iter().any(Expr::contains_aggregation)
            }
            Expr::Call { args, .. } => args.iter().any(Expr::contains_aggregation),
            Expr::If { branches, default } => {
                branches
                    .iter()
                    .any(|(c, v)| c.contains_aggregation() || v.contains_aggregation())
                    || default.contains_aggregation()
            }
            Expr::Product { fields } => fields.iter().any(|(_, v)| v.contains_aggregation()),
            Expr::Property { base, .. } => base.contains_aggregation(),
            Expr::Block { bindings, body } => {
                bindings.iter().any(|(_, v)| v.contains_aggregation()) || body.contains_aggregation()
            }
        }
    }

    /// Static type of an alias or property path, `Unknown` otherwise.
    pub fn type_tag(&self) -> TypeTag {
        match self {
            Expr::Ident(id) => id.tag.clone(),
            Expr::Property { base, name, .. } => {
                base.type_tag().field(name).cloned().unwrap_or_default()
            }
            Expr::Product { fields } => TypeTag::Product(
                fields.iter().map(|(n, v)| (n.clone(), v.type_tag())).collect(),
            ),
            Expr::Constant(Constant::Bool(_)) => TypeTag::Bool,
            Expr::Constant(_) => TypeTag::Value,
            e if e.is_predicate() => TypeTag::Bool,
            _ => TypeTag::Unknown,
        }
    }

    /// The innermost alias of a property chain (`p` for `p.address.street`).
    pub fn root_ident(&self) -> Option<&Ident> {
        match self {
            Expr::Ident(id) => Some(id),
            Expr::Property { base, .. } => base.root_ident(),
            _ => None,
        }
    }
}

impl From<Ident> for Expr {
    fn from(value: Ident) -> Self {
        Expr::Ident(value)
    }
}

impl From<Constant> for Expr {
    fn from(value: Constant) -> Self {
        Expr::Constant(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_rows() {
        let p = Expr::ident("p");
        assert!(p.is_simple());
        assert!(Expr::property(p.clone(), "name").is_simple());
        assert!(Expr::tuple([p.clone(), Expr::property(p.clone(), "age")]).is_simple());
        let plus = Expr::binary(
            Expr::property(p, "age"),
            BinaryOp::Add,
            Expr::Constant(Constant::Int(1)),
        );
        assert!(!plus.is_simple());
    }

    #[test]
    fn test_type_tag_of_property_path() {
        let tag = TypeTag::product([
            ("name", TypeTag::Value),
            ("address", TypeTag::values(["street", "zip"])),
        ]);
        let p = Expr::Ident(Ident::typed("p", tag));
        let address = Expr::property(p, "address");
        assert_eq!(address.type_tag(), TypeTag::values(["street", "zip"]));
        assert_eq!(
            Expr::property(address, "zip").type_tag(),
            TypeTag::Value
        );
    }
}
