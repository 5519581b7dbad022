//! Typed query construction and SQL generation.
//!
//! A [`Query`] is built fluently against a [`schema::DatabaseMap`]: column
//! identifiers such as `Book.Title` resolve to schema-backed
//! [`query::ColumnExpression`]s, filters accumulate into a clause tree, and
//! the [`transform`] builders render the whole thing into a
//! [`sql::Statement`] with positional `:p<n>` parameters. The
//! [`QueryExecutor`] runs built statements over `tokio-postgres`.

#[macro_use]
pub mod sql;

pub mod error;
pub mod query;
pub mod schema;
pub mod transform;

mod executor;

pub use error::QueryError;
pub use executor::QueryExecutor;
pub use query::Query;
pub use transform::Dialect;
