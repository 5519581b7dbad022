#![cfg(test)]

//! Test assertions to check built SQL statements and their parameters.

/// Assert that the parameter values of a [`Statement`](crate::sql::Statement)
/// match the expected ones, in order. Expected values are anything
/// convertible into [`Value`](crate::sql::Value).
///
/// ```ignore
/// assert_params!(stmt.params, 1, "hello");
/// assert_params!(stmt.params); // asserts there are none
/// ```
macro_rules! assert_params {
    ($actual_params:expr) => {
        assert!($actual_params.is_empty(), "Extra actual parameters");
    };
    ($actual_params:expr, $($expected:expr),+ $(,)?) => {
        let expected: Vec<$crate::sql::Value> = vec![$($expected.into()),+];
        let actual: Vec<$crate::sql::Value> =
            $actual_params.iter().map(|p| p.value.clone()).collect();
        assert_eq!(actual, expected, "Parameter mismatch");
    };
}

/// Assert that a built [`Statement`](crate::sql::Statement) has the expected
/// SQL text and parameters.
macro_rules! assert_stmt {
    ($actual:expr, $expected_sql:expr) => {
        let stmt = $actual;
        assert_eq!(stmt.sql, $expected_sql);
        assert_params!(stmt.params);
    };
    ($actual:expr, $expected_sql:expr, $($rest:expr),+ $(,)?) => {
        let stmt = $actual;
        assert_eq!(stmt.sql, $expected_sql);
        assert_params!(stmt.params, $($rest),+);
    };
}
