use serde::{Deserialize, Serialize};

use crate::error::QueryError;

/// Metadata for one column of a mapped table: the canonical SQL name, the
/// model-facing field name, and the type used to pick bind codes.
#[derive(Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct ColumnMap {
    pub name: String,
    pub field_name: String,
    pub table_name: String,
    pub typ: ColumnType,
}

impl std::fmt::Debug for ColumnMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&format!("Column: {}.{}", &self.table_name, &self.name))
    }
}

impl ColumnMap {
    pub fn bind_type(&self) -> BindType {
        self.typ.bind_type()
    }

    /// The `table.column` form under which this column is keyed in
    /// collectors and filter maps.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.table_name, self.name)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    BigInt,
    Double,
    Varchar { length: Option<usize> },
    Boolean,
    Date,
    Timestamp,
    Blob,
    Numeric { precision: Option<usize>, scale: Option<usize> },
}

impl ColumnType {
    /// Create a column type given an SQL type string such as `VARCHAR(255)`.
    pub fn from_sql_type(s: &str) -> Result<ColumnType, QueryError> {
        let s = s.trim().to_uppercase();

        let get_num = |s: &str| {
            s.chars()
                .filter(|c| c.is_numeric())
                .collect::<String>()
                .parse::<usize>()
                .ok()
        };

        match s.as_str() {
            "SMALLINT" | "INT" | "INTEGER" | "SERIAL" => Ok(ColumnType::Integer),
            "BIGINT" | "BIGSERIAL" => Ok(ColumnType::BigInt),
            "REAL" | "DOUBLE PRECISION" | "FLOAT" | "DOUBLE" => Ok(ColumnType::Double),
            "TEXT" | "LONGVARCHAR" => Ok(ColumnType::Varchar { length: None }),
            "BOOLEAN" => Ok(ColumnType::Boolean),
            "DATE" => Ok(ColumnType::Date),
            "BLOB" | "BYTEA" => Ok(ColumnType::Blob),
            s => {
                if s.starts_with("CHARACTER VARYING")
                    || s.starts_with("VARCHAR")
                    || s.starts_with("CHAR")
                {
                    Ok(ColumnType::Varchar { length: get_num(s) })
                } else if s.starts_with("TIMESTAMP") {
                    Ok(ColumnType::Timestamp)
                } else if s.starts_with("NUMERIC") || s.starts_with("DECIMAL") {
                    // NUMERIC(precision[, scale])
                    let args: Vec<Option<usize>> = s
                        .trim_end_matches(')')
                        .split('(')
                        .nth(1)
                        .map(|args| args.split(',').map(get_num).collect())
                        .unwrap_or_default();

                    Ok(ColumnType::Numeric {
                        precision: args.first().copied().flatten(),
                        scale: args.get(1).copied().flatten(),
                    })
                } else {
                    Err(QueryError::InvalidArgument(format!("unknown type {s}")))
                }
            }
        }
    }

    pub fn bind_type(&self) -> BindType {
        match self {
            ColumnType::Integer | ColumnType::BigInt => BindType::Integer,
            ColumnType::Boolean => BindType::Boolean,
            ColumnType::Blob => BindType::Lob,
            ColumnType::Double
            | ColumnType::Varchar { .. }
            | ColumnType::Date
            | ColumnType::Timestamp
            | ColumnType::Numeric { .. } => BindType::Text,
        }
    }
}

/// How a parameter value is marshalled to the database driver. The
/// discriminants are the wire-level codes reported in diagnostics.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum BindType {
    Null = 0,
    Integer = 1,
    Text = 2,
    Lob = 3,
    Boolean = 5,
}
