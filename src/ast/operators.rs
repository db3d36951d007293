use serde::{Deserialize, Serialize};

/// Unary operators over a single expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    /// Boolean negation (NOT)
    Not,
    /// Numeric negation (-)
    Neg,
    /// UPPER(x)
    Upper,
    /// LOWER(x)
    Lower,
    /// String length (LENGTH / LEN)
    Length,
    /// x IS NULL
    IsNull,
    /// x IS NOT NULL
    IsNotNull,
    /// Conversion to a primitive type
    Cast(Primitive),
}

impl std::fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnaryOp::Not => write!(f, "!"),
            UnaryOp::Neg => write!(f, "-"),
            UnaryOp::Upper => write!(f, "upper"),
            UnaryOp::Lower => write!(f, "lower"),
            UnaryOp::Length => write!(f, "length"),
            UnaryOp::IsNull => write!(f, "isNull"),
            UnaryOp::IsNotNull => write!(f, "isNotNull"),
            UnaryOp::Cast(p) => write!(f, "to{}", p),
        }
    }
}

/// Binary operators for expressions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    /// Equality (=)
    Eq,
    /// Inequality (<>)
    Ne,
    /// Less than (<)
    Lt,
    /// Less than or equal (<=)
    Le,
    /// Greater than (>)
    Gt,
    /// Greater than or equal (>=)
    Ge,
    /// Logical AND
    And,
    /// Logical OR
    Or,
    /// Addition (+)
    Add,
    /// Subtraction (-)
    Sub,
    /// Multiplication (*)
    Mul,
    /// Division (/)
    Div,
    /// Modulo (%)
    Rem,
    /// String concatenation (dialect specific)
    Concat,
    /// Pattern match (LIKE)
    Like,
    /// Membership in a sub-query or a list parameter (IN)
    In,
}

impl BinaryOp {
    /// Binding strength used to decide where parentheses are required.
    pub fn precedence(&self) -> u8 {
        match self {
            BinaryOp::Or => 1,
            BinaryOp::And => 2,
            BinaryOp::Eq
            | BinaryOp::Ne
            | BinaryOp::Lt
            | BinaryOp::Le
            | BinaryOp::Gt
            | BinaryOp::Ge
            | BinaryOp::Like
            | BinaryOp::In => 4,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Concat => 5,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => 6,
        }
    }

    /// Whether the operator produces a boolean predicate.
    pub fn is_predicate(&self) -> bool {
        self.precedence() <= 4
    }

    /// Whether `a op (b op c)` equals `(a op b) op c`.
    pub fn is_associative(&self) -> bool {
        matches!(
            self,
            BinaryOp::And | BinaryOp::Or | BinaryOp::Add | BinaryOp::Mul
        )
    }
}

impl std::fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BinaryOp::Eq => write!(f, "=="),
            BinaryOp::Ne => write!(f, "!="),
            BinaryOp::Lt => write!(f, "<"),
            BinaryOp::Le => write!(f, "<="),
            BinaryOp::Gt => write!(f, ">"),
            BinaryOp::Ge => write!(f, ">="),
            BinaryOp::And => write!(f, "&&"),
            BinaryOp::Or => write!(f, "||"),
            BinaryOp::Add => write!(f, "+"),
            BinaryOp::Sub => write!(f, "-"),
            BinaryOp::Mul => write!(f, "*"),
            BinaryOp::Div => write!(f, "/"),
            BinaryOp::Rem => write!(f, "%"),
            BinaryOp::Concat => write!(f, "++"),
            BinaryOp::Like => write!(f, "like"),
            BinaryOp::In => write!(f, "in"),
        }
    }
}

/// Target primitive of a type conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Primitive {
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    Decimal,
    Boolean,
    String,
}

impl std::fmt::Display for Primitive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Primitive::Byte => "Byte",
            Primitive::Short => "Short",
            Primitive::Int => "Int",
            Primitive::Long => "Long",
            Primitive::Float => "Float",
            Primitive::Double => "Double",
            Primitive::Decimal => "Decimal",
            Primitive::Boolean => "Boolean",
            Primitive::String => "String",
        };
        write!(f, "{}", name)
    }
}

/// Aggregate functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggregateOp {
    Min,
    Max,
    Avg,
    Sum,
    Count,
}

impl std::fmt::Display for AggregateOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AggregateOp::Min => write!(f, "MIN"),
            AggregateOp::Max => write!(f, "MAX"),
            AggregateOp::Avg => write!(f, "AVG"),
            AggregateOp::Sum => write!(f, "SUM"),
            AggregateOp::Count => write!(f, "COUNT"),
        }
    }
}

/// How a call node was written by the producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallKind {
    /// `receiver.name(args)`, first argument is the receiver
    Method,
    /// `name(args)`
    Global,
}

/// Join types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum JoinKind {
    #[default]
    Inner,
    Left,
    Right,
    Full,
}

impl std::fmt::Display for JoinKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JoinKind::Inner => write!(f, "INNER JOIN"),
            JoinKind::Left => write!(f, "LEFT JOIN"),
            JoinKind::Right => write!(f, "RIGHT JOIN"),
            JoinKind::Full => write!(f, "FULL JOIN"),
        }
    }
}

/// Set operations combining two queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SetOp {
    Union,
    UnionAll,
}

impl std::fmt::Display for SetOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SetOp::Union => write!(f, "UNION"),
            SetOp::UnionAll => write!(f, "UNION ALL"),
        }
    }
}

/// Sort direction with its null-ordering policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PropertyOrdering {
    #[default]
    Asc,
    Desc,
    AscNullsFirst,
    AscNullsLast,
    DescNullsFirst,
    DescNullsLast,
}

impl PropertyOrdering {
    pub fn is_descending(&self) -> bool {
        matches!(
            self,
            PropertyOrdering::Desc | PropertyOrdering::DescNullsFirst | PropertyOrdering::DescNullsLast
        )
    }
}

/// Ordering attached to a sort clause. Tuple criteria take a tuple ordering
/// with one entry per tuple field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Ordering {
    Property(PropertyOrdering),
    Tuple(Vec<Ordering>),
}

impl Default for Ordering {
    fn default() -> Self {
        Ordering::Property(PropertyOrdering::Asc)
    }
}

impl From<PropertyOrdering> for Ordering {
    fn from(value: PropertyOrdering) -> Self {
        Ordering::Property(value)
    }
}
