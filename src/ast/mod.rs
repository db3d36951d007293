pub mod action;
pub mod builders;
pub mod expr;
pub mod fmt;
pub mod operators;
pub mod query;
pub mod values;

pub use self::action::{
    Action, ActionKind, Assignment, ConflictResolution, Delete, Insert, OnConflict, Returning,
    Update,
};
pub use self::expr::{Constant, Expr, Ident, Renameable, TypeTag};
pub use self::operators::{
    AggregateOp, BinaryOp, CallKind, JoinKind, Ordering, Primitive, PropertyOrdering, SetOp,
    UnaryOp,
};
pub use self::query::{Entity, PropertyAlias, Query};
pub use self::values::{Binding, ParamType, ParamValue};
