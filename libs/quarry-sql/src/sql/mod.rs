#[macro_use]
#[cfg(test)]
pub(crate) mod test_util;

mod expression_builder;
mod sql_builder;
mod value;

pub use expression_builder::ExpressionBuilder;
pub use sql_builder::SqlBuilder;
pub use value::{BindParam, Statement, Value};
