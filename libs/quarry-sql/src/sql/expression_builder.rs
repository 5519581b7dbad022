use maybe_owned::MaybeOwned;

use super::{sql_builder::SqlBuilder, value::Statement};

/// A trait for types that can build themselves into an SQL expression.
///
/// Each constituent of an SQL expression (column, criterion, assignment,
/// select, etc.) implements this trait, which is then used to hierarchically
/// build an SQL string and the parameter list supplied to it.
pub trait ExpressionBuilder {
    /// Build the SQL expression into the given builder
    fn build(&self, builder: &mut SqlBuilder);

    /// Build the expression into a standalone statement. Useful for
    /// testing/debugging, where we want to assert on the generated SQL
    /// without setting up a builder at the call site.
    fn to_statement(&self) -> Statement
    where
        Self: Sized,
    {
        let mut builder = SqlBuilder::new();
        self.build(&mut builder);
        builder.into_statement()
    }
}

impl<T> ExpressionBuilder for Box<T>
where
    T: ExpressionBuilder,
{
    fn build(&self, builder: &mut SqlBuilder) {
        self.as_ref().build(builder)
    }
}

impl<T> ExpressionBuilder for &T
where
    T: ExpressionBuilder,
{
    fn build(&self, builder: &mut SqlBuilder) {
        (*self).build(builder)
    }
}

impl<'a, T> ExpressionBuilder for MaybeOwned<'a, T>
where
    T: ExpressionBuilder,
{
    fn build(&self, builder: &mut SqlBuilder) {
        self.as_ref().build(builder)
    }
}
