//! Concrete dialect generators.

pub mod h2;
pub mod mysql;
pub mod postgres;
pub mod sqlite;
pub mod sqlserver;
