//! Builders that turn a [`Query`](crate::query::Query) into a concrete
//! DML [`Statement`](crate::sql::Statement).

pub mod delete;
pub mod insert;
pub mod select;
pub mod update;

/// Backend capabilities the DML builders vary on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialect {
    /// Whether `DELETE FROM "table" AS "alias"` is accepted. Backends
    /// without it get the alias stripped and an unqualified WHERE clause.
    pub supports_aliased_delete: bool,
}

impl Dialect {
    pub fn postgres() -> Self {
        Self {
            supports_aliased_delete: true,
        }
    }
}

impl Default for Dialect {
    fn default() -> Self {
        Self::postgres()
    }
}
