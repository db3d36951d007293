//! Relational query model and the passes that produce it.

pub mod alias;
pub mod model;
pub mod normalizer;

pub use alias::remove_extra_alias;
pub use model::{Distinct, FlattenSqlQuery, FromContext, OrderKey, SelectValue, SqlQuery};
pub use normalizer::normalize;
