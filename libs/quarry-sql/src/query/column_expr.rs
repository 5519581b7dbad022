use crate::schema::{BindType, ColumnId, ColumnType};
use crate::sql::{BindParam, ExpressionBuilder, SqlBuilder, Value};

use super::Query;

/// A column reference as understood inside one specific query context.
///
/// The variant set is closed: a column is either backed by a schema column
/// map in the current scope (`Local`), comes from a subquery or outer query
/// (`Remote`, with `RemoteTyped` carrying a bind type when the subquery's
/// own table map is known), or could not be located yet (`Unresolved`).
/// All fields are fixed at construction; [`resolve_again`](Self::resolve_again)
/// returns a fresh expression instead of mutating.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnExpression {
    Local {
        /// The alias or real table name as it appears in the emitted SQL.
        alias: String,
        /// Canonical column name, taken from the schema map.
        name: String,
        field_name: String,
        table_name: String,
        typ: ColumnType,
        column_id: ColumnId,
    },
    Remote {
        alias: Option<String>,
        name: String,
    },
    RemoteTyped {
        alias: Option<String>,
        name: String,
        bind_type: BindType,
        column_id: Option<ColumnId>,
    },
    Unresolved {
        alias: Option<String>,
        name: String,
        /// The identifier exactly as the caller wrote it, kept for retrying
        /// resolution and for rendering.
        identifier: String,
    },
}

impl ColumnExpression {
    pub fn table_alias(&self) -> Option<&str> {
        match self {
            ColumnExpression::Local { alias, .. } => Some(alias),
            ColumnExpression::Remote { alias, .. }
            | ColumnExpression::RemoteTyped { alias, .. }
            | ColumnExpression::Unresolved { alias, .. } => alias.as_deref(),
        }
    }

    /// The unaliased column name in query-surface syntax.
    pub fn name(&self) -> &str {
        match self {
            ColumnExpression::Local { name, .. }
            | ColumnExpression::Remote { name, .. }
            | ColumnExpression::RemoteTyped { name, .. }
            | ColumnExpression::Unresolved { name, .. } => name,
        }
    }

    /// The `alias.column` form this expression is keyed by; bare when there
    /// is no table qualifier. An unresolved expression keeps the caller's
    /// original spelling.
    pub fn qualified_name(&self) -> String {
        match self {
            ColumnExpression::Unresolved { identifier, .. } => identifier.clone(),
            _ => match self.table_alias() {
                Some(alias) => format!("{}.{}", alias, self.name()),
                None => self.name().to_string(),
            },
        }
    }

    /// Whether schema metadata is available for this column.
    pub fn has_column_map(&self) -> bool {
        self.column_id().is_some()
    }

    pub fn column_id(&self) -> Option<ColumnId> {
        match self {
            ColumnExpression::Local { column_id, .. } => Some(*column_id),
            ColumnExpression::RemoteTyped { column_id, .. } => *column_id,
            _ => None,
        }
    }

    pub fn bind_type(&self) -> Option<BindType> {
        match self {
            ColumnExpression::Local { typ, .. } => Some(typ.bind_type()),
            ColumnExpression::RemoteTyped { bind_type, .. } => Some(*bind_type),
            _ => None,
        }
    }

    pub fn is_unresolved(&self) -> bool {
        matches!(self, ColumnExpression::Unresolved { .. })
    }

    /// Wrap a bind value for this column, carrying the column's metadata for
    /// diagnostics. The bind type falls back to the value's own when no
    /// schema type is known.
    pub fn bind_param(&self, value: Value) -> BindParam {
        let typ = self.bind_type().unwrap_or_else(|| value.bind_type());
        BindParam {
            table: self.table_alias().map(|a| a.to_string()),
            column: Some(self.name().to_string()),
            typ,
            value,
        }
    }

    /// A copy with the table qualifier `from` replaced by `to`; any other
    /// expression is returned unchanged.
    pub fn rename_alias(&self, from: &str, to: &str) -> ColumnExpression {
        let mut renamed = self.clone();
        match &mut renamed {
            ColumnExpression::Local { alias, .. } if alias.as_str() == from => {
                *alias = to.to_string();
            }
            ColumnExpression::Remote { alias: Some(alias), .. }
            | ColumnExpression::RemoteTyped { alias: Some(alias), .. }
                if alias.as_str() == from =>
            {
                *alias = to.to_string();
            }
            _ => {}
        }
        renamed
    }

    /// Retry resolution of an `Unresolved` expression against the (possibly
    /// grown) query. Returns the fresh expression on success, and `None`
    /// when the column is still unresolved or this expression is not
    /// retryable, so callers cannot loop on the result.
    pub fn resolve_again(&self, query: &Query) -> Option<ColumnExpression> {
        match self {
            ColumnExpression::Unresolved { identifier, .. } => {
                match query.resolve_column(identifier, false, true) {
                    Ok(resolved) if !resolved.is_unresolved() => Some(resolved),
                    _ => None,
                }
            }
            _ => None,
        }
    }
}

impl ExpressionBuilder for ColumnExpression {
    /// A schema-backed column renders quoted (`"alias"."name"`, or `"name"`
    /// in plain mode). Columns without schema metadata render the caller's
    /// text as-is since nothing vouches for them being plain identifiers.
    fn build(&self, builder: &mut SqlBuilder) {
        match self {
            ColumnExpression::Local { alias, name, .. } => {
                if !builder.in_plain_mode() {
                    builder.push_identifier(alias);
                    builder.push('.');
                }
                builder.push_identifier(name);
            }
            ColumnExpression::Remote { alias, name }
            | ColumnExpression::RemoteTyped { alias, name, .. } => {
                if let Some(alias) = alias {
                    if !builder.in_plain_mode() {
                        builder.push_str(alias);
                        builder.push('.');
                    }
                }
                builder.push_str(name);
            }
            ColumnExpression::Unresolved { identifier, .. } => {
                builder.push_str(identifier);
            }
        }
    }
}

impl std::fmt::Display for ColumnExpression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.qualified_name())
    }
}
