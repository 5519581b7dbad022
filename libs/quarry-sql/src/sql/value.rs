use bytes::BytesMut;
use chrono::{NaiveDate, NaiveDateTime};
use tokio_postgres::types::{to_sql_checked, IsNull, ToSql, Type};

use crate::schema::BindType;

/// A bind value as supplied through the fluent query API. One closed set of
/// variants rather than an open trait object: the adapter seam needs
/// equality and Debug for statement comparison, and the set of marshallable
/// types is fixed.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    Text(String),
    Blob(Vec<u8>),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn bind_type(&self) -> BindType {
        match self {
            Value::Null => BindType::Null,
            Value::Bool(_) => BindType::Boolean,
            Value::Int(_) => BindType::Integer,
            Value::Blob(_) => BindType::Lob,
            Value::Double(_) | Value::Text(_) | Value::Date(_) | Value::Timestamp(_) => {
                BindType::Text
            }
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::Text(v) => write!(f, "'{v}'"),
            Value::Blob(v) => write!(f, "<{} bytes>", v.len()),
            Value::Date(v) => write!(f, "'{v}'"),
            Value::Timestamp(v) => write!(f, "'{v}'"),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::Timestamp(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

impl ToSql for Value {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match self {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(v) => v.to_sql(ty, out),
            Value::Int(v) => v.to_sql(ty, out),
            Value::Double(v) => v.to_sql(ty, out),
            Value::Text(v) => v.to_sql(ty, out),
            Value::Blob(v) => (&v[..]).to_sql(ty, out),
            Value::Date(v) => v.to_sql(ty, out),
            Value::Timestamp(v) => v.to_sql(ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

/// One positional parameter of a built statement: the value plus the
/// table/column/bind-type metadata used for diagnostics and adapter-level
/// coercion.
#[derive(Debug, Clone, PartialEq)]
pub struct BindParam {
    pub value: Value,
    pub table: Option<String>,
    pub column: Option<String>,
    pub typ: BindType,
}

impl BindParam {
    /// A parameter with no column metadata; the bind type is inferred from
    /// the value.
    pub fn bare(value: Value) -> Self {
        let typ = value.bind_type();
        Self {
            value,
            table: None,
            column: None,
            typ,
        }
    }

    pub fn typed(value: Value, typ: BindType) -> Self {
        Self {
            value,
            table: None,
            column: None,
            typ,
        }
    }
}

/// An executable statement descriptor: the SQL text with `:p<n>`
/// placeholders and the same-order parameter list.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<BindParam>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_conversions() {
        assert_eq!(Value::from(5), Value::Int(5));
        assert_eq!(Value::from("x"), Value::Text("x".to_string()));
        assert_eq!(Value::from(Option::<i32>::None), Value::Null);
        assert_eq!(Value::from(Some(true)), Value::Bool(true));
    }

    #[test]
    fn inferred_bind_types() {
        assert_eq!(Value::Null.bind_type(), BindType::Null);
        assert_eq!(Value::Int(1).bind_type(), BindType::Integer);
        assert_eq!(Value::Text("a".into()).bind_type(), BindType::Text);
        assert_eq!(Value::Blob(vec![1]).bind_type(), BindType::Lob);
    }
}
