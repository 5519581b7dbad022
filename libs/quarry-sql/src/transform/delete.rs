use maybe_owned::MaybeOwned;
use tracing::debug;

use crate::error::QueryError;
use crate::query::{ClauseList, Query};
use crate::sql::{ExpressionBuilder, SqlBuilder, Statement};

use super::select::validate_having;
use super::Dialect;

/// Build a filtered `DELETE FROM "table" ... WHERE ...`. An aliased query
/// keeps its alias only when the dialect supports aliased deletes;
/// otherwise the alias is dropped and the WHERE clause is rewritten
/// against the real table name.
pub fn build_delete(query: &Query, dialect: &Dialect) -> Result<Statement, QueryError> {
    let table_name = require_table(query)?;
    if query.filters().is_empty() {
        return Err(QueryError::Malformed(format!(
            "Refusing to DELETE from '{table_name}' without a filter"
        )));
    }
    validate_having(query)?;

    let mut builder = SqlBuilder::new();
    builder.push_str("DELETE FROM ");
    builder.push_identifier(table_name);

    let filters: MaybeOwned<ClauseList> = match query.model_alias() {
        Some(alias) if dialect.supports_aliased_delete => {
            builder.push_str(" AS ");
            builder.push_identifier(alias);
            MaybeOwned::Borrowed(query.filters())
        }
        Some(alias) => MaybeOwned::Owned(query.filters().rename_alias(alias, table_name)),
        None => MaybeOwned::Borrowed(query.filters()),
    };

    builder.push_str(" WHERE ");
    filters.build(&mut builder);

    let statement = builder.into_statement();
    debug!(sql = %statement.sql, "built DELETE statement");
    Ok(statement)
}

/// Build an unconditional `DELETE FROM "table"`.
pub fn build_delete_all(query: &Query, dialect: &Dialect) -> Result<Statement, QueryError> {
    let table_name = require_table(query)?;

    let mut builder = SqlBuilder::new();
    builder.push_str("DELETE FROM ");
    builder.push_identifier(table_name);
    if let Some(alias) = query.model_alias() {
        if dialect.supports_aliased_delete {
            builder.push_str(" AS ");
            builder.push_identifier(alias);
        }
    }

    let statement = builder.into_statement();
    debug!(sql = %statement.sql, "built DELETE statement");
    Ok(statement)
}

fn require_table(query: &Query) -> Result<&str, QueryError> {
    query.table_name().ok_or_else(|| {
        QueryError::Malformed("Cannot build a DELETE without a target table".to_string())
    })
}
