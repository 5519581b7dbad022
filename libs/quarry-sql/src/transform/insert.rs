use tracing::debug;

use crate::error::QueryError;
use crate::query::Query;
use crate::sql::{ExpressionBuilder, SqlBuilder, Statement};

/// Build `INSERT INTO "table" ("c1", ...) VALUES (:p1, ...)` from the
/// query's collected update values, in insertion order.
pub fn build_insert(query: &Query) -> Result<Statement, QueryError> {
    let table_name = query.table_name().ok_or_else(|| {
        QueryError::Malformed("Cannot build an INSERT without a target table".to_string())
    })?;

    let values = query.update_values();
    if values.is_empty() {
        return Err(QueryError::InvalidArgument(format!(
            "No values to insert into '{table_name}'"
        )));
    }
    ensure_single_table(query, "INSERT")?;

    let mut builder = SqlBuilder::new();
    builder.push_str("INSERT INTO ");
    builder.push_identifier(table_name);
    builder.push_str(" (");
    builder.push_iter(values.iter(), ", ", |builder, (_, value)| {
        builder.with_plain(|builder| value.column().build(builder));
    });
    builder.push_str(") VALUES (");
    builder.push_iter(values.iter(), ", ", |builder, (_, value)| {
        value.build_value(builder);
    });
    builder.push(')');

    let statement = builder.into_statement();
    debug!(sql = %statement.sql, "built INSERT statement");
    Ok(statement)
}

/// Every assignment of the query must target its base table; a value keyed
/// under another table cannot be folded into a single-table statement.
/// An unresolved assignment column keeps the caller's spelling, so it is
/// reported as an unknown column rather than as a stray table.
pub(super) fn ensure_single_table(query: &Query, verb: &str) -> Result<(), QueryError> {
    let base = query.sql_alias().unwrap_or_default();
    if let Some((_, value)) = query
        .update_values()
        .iter()
        .find(|(_, value)| value.column().is_unresolved())
    {
        let column = value.column();
        return Err(QueryError::UnknownColumn {
            column: column.name().to_string(),
            table: column.table_alias().unwrap_or(base).to_string(),
        });
    }
    let groups = query.update_values().group_by_table();
    match groups
        .keys()
        .find(|table| !table.is_empty() && table.as_str() != base)
    {
        Some(stray) => Err(QueryError::Malformed(format!(
            "{verb} on '{base}' cannot set columns of '{stray}'"
        ))),
        None => Ok(()),
    }
}
