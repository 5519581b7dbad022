use tracing::debug;

use crate::error::QueryError;
use crate::query::Query;
use crate::sql::{ExpressionBuilder, SqlBuilder, Statement};

use super::insert::ensure_single_table;
use super::select::validate_having;

/// Build `UPDATE "table" [AS "alias"] SET col = :p1, ... [WHERE ...]`.
/// Parameter numbering is continuous from the SET list into the WHERE
/// clause.
pub fn build_update(query: &Query) -> Result<Statement, QueryError> {
    let table_name = query.table_name().ok_or_else(|| {
        QueryError::Malformed("Cannot build an UPDATE without a target table".to_string())
    })?;

    let values = query.update_values();
    if values.is_empty() {
        return Err(QueryError::InvalidArgument(format!(
            "No values to update in '{table_name}'"
        )));
    }
    ensure_single_table(query, "UPDATE")?;
    validate_having(query)?;

    let mut builder = SqlBuilder::new();
    builder.push_str("UPDATE ");
    if let Some(comment) = query.comment() {
        builder.push_str("/* ");
        builder.push_str(comment);
        builder.push_str(" */ ");
    }
    builder.push_identifier(table_name);
    if let Some(alias) = query.model_alias() {
        builder.push_str(" AS ");
        builder.push_identifier(alias);
    }

    builder.push_str(" SET ");
    builder.push_iter(values.iter(), ", ", |builder, (_, value)| {
        value.build_assignment(builder);
    });

    if !query.filters().is_empty() {
        builder.push_str(" WHERE ");
        query.filters().build(&mut builder);
    }

    let statement = builder.into_statement();
    debug!(sql = %statement.sql, "built UPDATE statement");
    Ok(statement)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::fixtures::library_schema;
    use crate::schema::BindType;
    use crate::sql::Value;

    #[test]
    fn set_then_where_numbering_is_continuous() {
        let mut query = Query::model(library_schema(), "Book").unwrap();
        query
            .set_update_column("Book.Title", "Dune")
            .set_update_column("Book.Price", 9.99)
            .add_filter("Book.Id", 7)
            .add_or("Book.AuthorId", 42);

        assert_stmt!(
            query.to_update_statement().unwrap(),
            r#"UPDATE "book" SET "title" = :p1, "price" = :p2 WHERE ("book"."id" = :p3 OR "book"."author_id" = :p4)"#,
            "Dune",
            9.99,
            7,
            42
        );
    }

    #[test]
    fn expression_assignment_binds_inside_the_set_list() {
        let mut query = Query::model(library_schema(), "Book").unwrap();
        query
            .set_update_expression(
                "Book.Price",
                "price * ? + ?",
                vec![Value::Double(1.1), Value::Double(0.5)],
                None,
            )
            .unwrap();
        query.add_filter("Book.Id", 7);

        assert_stmt!(
            query.to_update_statement().unwrap(),
            r#"UPDATE "book" SET "price" = price * :p1 + :p2 WHERE "book"."id" = :p3"#,
            1.1,
            0.5,
            7
        );
    }

    #[test]
    fn aliased_update_qualifies_the_where_clause() {
        let mut query = Query::model(library_schema(), "Book").unwrap();
        query.set_alias("b");
        query
            .set_update_column("b.Title", "Dune")
            .add_filter("b.Id", 7);

        assert_stmt!(
            query.to_update_statement().unwrap(),
            r#"UPDATE "book" AS "b" SET "title" = :p1 WHERE "b"."id" = :p2"#,
            "Dune",
            7
        );
    }

    #[test]
    fn comment_is_emitted_after_the_keyword() {
        let mut query = Query::model(library_schema(), "Book").unwrap();
        query.set_comment("bulk reprice");
        query.set_update_column("Book.Price", 1.0);

        let statement = query.to_update_statement().unwrap();
        assert!(statement
            .sql
            .starts_with(r#"UPDATE /* bulk reprice */ "book" SET"#));
    }

    #[test]
    fn explicit_bind_types_travel_with_the_parameters() {
        let mut query = Query::raw(library_schema(), "audit_log");
        query
            .set_update_expression(
                "audit_log.payload",
                "? || '?'",
                vec![Value::Text("entry".to_string())],
                Some(vec![BindType::Lob]),
            )
            .unwrap();
        query.add_filter_op(
            "audit_log.id",
            crate::query::Comparison::Equal,
            crate::query::FilterValue::Single(Value::Int(3)),
        );

        let statement = query.to_update_statement().unwrap();
        assert_eq!(
            statement.sql,
            r#"UPDATE "audit_log" SET payload = :p1 || '?' WHERE audit_log.id = :p2"#
        );
        assert_eq!(statement.params[0].typ, BindType::Lob);
    }

    #[test]
    fn update_without_values_is_rejected() {
        let mut query = Query::model(library_schema(), "Book").unwrap();
        query.add_filter("Book.Id", 7);
        assert!(matches!(
            query.to_update_statement(),
            Err(QueryError::InvalidArgument(_))
        ));
    }
}
