use once_cell::sync::Lazy;
use regex::Regex;
use tokio_postgres::types::ToSql;
use tokio_postgres::GenericClient;
use tracing::{debug, instrument};

use crate::error::{QueryError, WithContext};
use crate::sql::Statement;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r":p(\d+)").unwrap());

/// Runs built statements against a Postgres connection. Stateless: the
/// caller owns the connection or pool and hands in a client per call.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryExecutor;

impl QueryExecutor {
    /// Execute a DML statement and return the affected-row count. The
    /// `:p<n>` placeholders are rewritten to the `$<n>` form the wire
    /// protocol expects; parameters bind in list order.
    #[instrument(skip_all, fields(sql = %statement.sql))]
    pub async fn execute(
        &self,
        client: &impl GenericClient,
        statement: &Statement,
    ) -> Result<u64, QueryError> {
        let sql = to_native_placeholders(&statement.sql);
        let params: Vec<&(dyn ToSql + Sync)> = statement
            .params
            .iter()
            .map(|param| &param.value as &(dyn ToSql + Sync))
            .collect();

        debug!(param_count = params.len(), "executing statement");
        client
            .execute(sql.as_str(), &params)
            .await
            .map_err(QueryError::Delegate)
            .with_context("Failed to execute statement".into())
    }
}

fn to_native_placeholders(sql: &str) -> String {
    PLACEHOLDER.replace_all(sql, "$$$1").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_become_dollar_numbered() {
        assert_eq!(
            to_native_placeholders("UPDATE t SET a = :p1 WHERE b = :p2"),
            "UPDATE t SET a = $1 WHERE b = $2"
        );
    }

    #[test]
    fn two_digit_placeholders_are_not_truncated() {
        assert_eq!(
            to_native_placeholders("a = :p1 AND k = :p10"),
            "a = $1 AND k = $10"
        );
    }
}
