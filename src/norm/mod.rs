//! Tree rewrites that run before normalization.

pub mod beta;

pub use beta::{
    Substitution, reduce, reduce_action, reduce_query, substitute, substitute_action,
    substitute_query,
};
