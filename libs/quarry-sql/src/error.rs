use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Unknown model or alias '{0}'")]
    UnknownModel(String),

    #[error("Unknown column '{column}' on table '{table}'")]
    UnknownColumn { column: String, table: String },

    #[error("{0}")]
    InvalidArgument(String),

    #[error("{0}")]
    Malformed(String),

    #[error("{0}")]
    Delegate(#[from] tokio_postgres::Error),

    #[error("{0} {1}")]
    WithContext(String, #[source] Box<QueryError>),
}

impl QueryError {
    pub fn with_context(self, context: String) -> QueryError {
        QueryError::WithContext(context, Box::new(self))
    }
}

pub trait WithContext {
    fn with_context(self, context: String) -> Self;
}

impl<T> WithContext for Result<T, QueryError> {
    fn with_context(self, context: String) -> Result<T, QueryError> {
        self.map_err(|e| e.with_context(context))
    }
}
