use tracing::debug;

use crate::error::QueryError;
use crate::query::update::placeholder_count;
use crate::query::{ClauseList, Criterion, FilterValue, Having, JoinCondition, Query};
use crate::sql::{BindParam, ExpressionBuilder, SqlBuilder, Statement};

/// Render a full SELECT into an existing builder. Used both for top-level
/// SELECT statements and for sub-selects embedded in a filter or a FROM
/// clause; parameter numbering continues in the enclosing statement.
pub fn build_select(query: &Query, builder: &mut SqlBuilder) {
    builder.push_str("SELECT ");
    let columns = query.output_columns();
    if columns.is_empty() {
        builder.push('*');
    } else {
        builder.push_iter(columns.iter(), ", ", |builder, column| {
            builder.push_str(&column.clause);
            if let Some(alias) = &column.alias {
                builder.push_str(" AS ");
                builder.push_identifier(alias);
            }
        });
    }

    let from_tables = usize::from(query.table_name().is_some()) + query.subqueries().len();
    if from_tables > 0 {
        builder.push_str(" FROM ");
    }
    if let Some(table_name) = query.table_name() {
        builder.push_identifier(table_name);
        if let Some(alias) = query.model_alias() {
            builder.push_str(" AS ");
            builder.push_identifier(alias);
        }
        if !query.subqueries().is_empty() {
            builder.push_str(", ");
        }
    }
    builder.push_iter(query.subqueries().iter(), ", ", |builder, (alias, sub)| {
        builder.push('(');
        build_select(sub, builder);
        builder.push_str(") AS ");
        builder.push_identifier(alias);
    });

    for join in query.joins() {
        builder.push(' ');
        builder.push_str(join.kind().keyword());
        builder.push(' ');
        builder.push_identifier(join.table_name());
        if join.sql_alias() != join.table_name() {
            builder.push_str(" AS ");
            builder.push_identifier(join.sql_alias());
        }
        if let Some(condition) = join.condition() {
            builder.push_str(" ON ");
            match condition {
                JoinCondition::Eq(left, right) => {
                    left.build(builder);
                    builder.push_str(" = ");
                    right.build(builder);
                }
                JoinCondition::Raw(clause) => builder.push_str(clause),
            }
        }
    }

    if !query.filters().is_empty() {
        builder.push_str(" WHERE ");
        query.filters().build(builder);
    }

    if !query.group_by().is_empty() {
        builder.push_str(" GROUP BY ");
        builder.push_iter(query.group_by().iter(), ", ", |builder, clause| {
            builder.push_str(clause);
        });
    }

    if let Some(having) = query.having() {
        builder.push_str(" HAVING ");
        build_having(having, builder);
    }

    if !query.order_by().is_empty() {
        builder.push_str(" ORDER BY ");
        builder.push_iter(query.order_by().iter(), ", ", |builder, clause| {
            builder.push_str(clause);
        });
    }

    if let Some(limit) = query.limit() {
        builder.push_str(format!(" LIMIT {limit}"));
    }
    if let Some(offset) = query.offset() {
        builder.push_str(format!(" OFFSET {offset}"));
    }
}

fn build_having(having: &Having, builder: &mut SqlBuilder) {
    match having {
        Having::Literal(clause) => builder.push_str(clause),
        Having::Typed {
            clause,
            values,
            bind_types,
        } => {
            // bind each unquoted `?` to the next value/bind-type pair
            let mut next = 0;
            let mut in_quote: Option<char> = None;
            let mut escaped = false;
            for c in clause.chars() {
                match in_quote {
                    Some(quote) => {
                        builder.push(c);
                        if escaped {
                            escaped = false;
                        } else if c == '\\' {
                            escaped = true;
                        } else if c == quote {
                            in_quote = None;
                        }
                    }
                    None => match c {
                        '\'' | '"' => {
                            builder.push(c);
                            in_quote = Some(c);
                        }
                        '?' if next < values.len() => {
                            builder
                                .push_param(BindParam::typed(values[next].clone(), bind_types[next]));
                            next += 1;
                        }
                        _ => builder.push(c),
                    },
                }
            }
        }
        Having::Mapped(criterion) => criterion.build(builder),
    }
}

/// Check typed-HAVING arity for `query` and for every sub-select reachable
/// from it, through both the FROM list and subquery-valued filter criteria.
/// Embedded queries render via [`build_select`] without their own entry-point
/// validation, so the check has to walk the whole tree.
pub(super) fn validate_having(query: &Query) -> Result<(), QueryError> {
    match query.having() {
        Some(Having::Typed {
            clause,
            values,
            bind_types,
        }) => {
            let placeholders = placeholder_count(clause);
            if placeholders != values.len() || bind_types.len() != values.len() {
                return Err(QueryError::InvalidArgument(format!(
                    "HAVING clause '{}' has {} placeholder(s) but {} value(s) and {} bind type(s)",
                    clause,
                    placeholders,
                    values.len(),
                    bind_types.len()
                )));
            }
        }
        Some(Having::Mapped(criterion)) => validate_criterion(criterion)?,
        Some(Having::Literal(_)) | None => {}
    }
    for sub in query.subqueries().values() {
        validate_having(sub)?;
    }
    validate_clauses(query.filters())
}

fn validate_clauses(clauses: &ClauseList) -> Result<(), QueryError> {
    clauses.clauses().iter().try_for_each(validate_criterion)
}

fn validate_criterion(criterion: &Criterion) -> Result<(), QueryError> {
    if let FilterValue::Subquery(sub) = criterion.value() {
        validate_having(sub)?;
    }
    validate_clauses(criterion.clauses())
}

/// Validate and build a standalone SELECT statement.
pub fn build_select_statement(query: &Query) -> Result<Statement, QueryError> {
    if query.table_name().is_none() && query.subqueries().is_empty() {
        return Err(QueryError::Malformed(
            "Cannot build a SELECT without a table or a sub-select".to_string(),
        ));
    }
    validate_having(query)?;

    let mut builder = SqlBuilder::new();
    build_select(query, &mut builder);
    let statement = builder.into_statement();
    debug!(sql = %statement.sql, "built SELECT statement");
    Ok(statement)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{Comparison, Criterion, FilterValue, JoinKind};
    use crate::schema::fixtures::library_schema;
    use crate::schema::BindType;
    use crate::sql::Value;

    #[test]
    fn plain_select_with_filter() {
        let mut query = Query::model(library_schema(), "Book").unwrap();
        query
            .add_select_column("book.id")
            .add_select_column("book.title")
            .add_filter("Book.Title", "Dune");

        assert_stmt!(
            query.to_select_statement().unwrap(),
            r#"SELECT book.id, book.title FROM "book" WHERE "book"."title" = :p1"#,
            "Dune"
        );
    }

    #[test]
    fn empty_output_list_selects_star() {
        let query = Query::model(library_schema(), "Book").unwrap();
        assert_stmt!(
            query.to_select_statement().unwrap(),
            r#"SELECT * FROM "book""#
        );
    }

    #[test]
    fn joined_select_with_on_condition() {
        let mut query = Query::model(library_schema(), "Book").unwrap();
        query
            .add_select_column("book.title")
            .add_join_on("Author", Some("a"), JoinKind::Inner, "Book.AuthorId", "a.Id")
            .add_filter("a.LastName", "Herbert");

        assert_stmt!(
            query.to_select_statement().unwrap(),
            r#"SELECT book.title FROM "book" INNER JOIN "author" AS "a" ON "book"."author_id" = "a"."id" WHERE "a"."last_name" = :p1"#,
            "Herbert"
        );
    }

    #[test]
    fn group_by_with_mapped_having() {
        let mut query = Query::model(library_schema(), "Book").unwrap();
        query
            .add_select_column("book.author_id")
            .add_as_column("BookCount", "COUNT(book.id)")
            .add_group_by("book.author_id");

        let count = query.resolve_column("BookCount", true, false).unwrap();
        query.set_having(Having::Mapped(Criterion::new(
            count,
            Comparison::GreaterThan,
            FilterValue::Single(Value::Int(3)),
        )));

        assert_stmt!(
            query.to_select_statement().unwrap(),
            r#"SELECT book.author_id, COUNT(book.id) AS "BookCount" FROM "book" GROUP BY book.author_id HAVING BookCount > :p1"#,
            3
        );
    }

    #[test]
    fn typed_having_numbers_after_where_parameters() {
        let mut query = Query::model(library_schema(), "Book").unwrap();
        query
            .add_select_column("book.author_id")
            .add_filter("Book.Price", 5.0)
            .add_group_by("book.author_id")
            .set_having(Having::Typed {
                clause: "COUNT(book.id) > ?".to_string(),
                values: vec![Value::Int(10)],
                bind_types: vec![BindType::Integer],
            });

        assert_stmt!(
            query.to_select_statement().unwrap(),
            r#"SELECT book.author_id FROM "book" WHERE "book"."price" = :p1 GROUP BY book.author_id HAVING COUNT(book.id) > :p2"#,
            5.0,
            10
        );
    }

    #[test]
    fn typed_having_with_wrong_arity_is_rejected() {
        let mut query = Query::model(library_schema(), "Book").unwrap();
        query.set_having(Having::Typed {
            clause: "COUNT(book.id) > ? AND SUM(book.price) > ?".to_string(),
            values: vec![Value::Int(10)],
            bind_types: vec![BindType::Integer],
        });

        assert!(matches!(
            query.to_select_statement(),
            Err(QueryError::InvalidArgument(_))
        ));
    }

    #[test]
    fn typed_having_arity_is_checked_inside_a_from_subquery() {
        let schema = library_schema();
        let mut inner = Query::model(schema.clone(), "Author").unwrap();
        inner
            .add_select_column("author.id")
            .add_group_by("author.id")
            .set_having(Having::Typed {
                clause: "COUNT(author.id) > ?".to_string(),
                values: vec![Value::Int(1), Value::Int(2)],
                bind_types: vec![BindType::Integer],
            });

        let mut outer = Query::model(schema, "Book").unwrap();
        outer
            .add_select_column("book.title")
            .add_subquery("prolific", inner);

        assert!(matches!(
            outer.to_select_statement(),
            Err(QueryError::InvalidArgument(_))
        ));
    }

    #[test]
    fn typed_having_arity_is_checked_inside_an_in_subquery() {
        let schema = library_schema();
        let mut inner = Query::model(schema.clone(), "Author").unwrap();
        inner
            .add_select_column("author.id")
            .add_group_by("author.id")
            .set_having(Having::Typed {
                clause: "COUNT(author.id) > ? AND SUM(author.id) > ?".to_string(),
                values: vec![Value::Int(1)],
                bind_types: vec![BindType::Integer],
            });

        let mut outer = Query::model(schema, "Book").unwrap();
        outer.add_select_column("book.title").add_filter_op(
            "Book.AuthorId",
            Comparison::In,
            FilterValue::Subquery(Box::new(inner)),
        );

        assert!(matches!(
            outer.to_select_statement(),
            Err(QueryError::InvalidArgument(_))
        ));
    }

    #[test]
    fn from_subquery_parameters_number_before_the_outer_where() {
        let schema = library_schema();
        let mut inner = Query::model(schema.clone(), "Author").unwrap();
        inner
            .add_select_column("author.id")
            .add_filter("Author.LastName", "Herbert");

        let mut outer = Query::model(schema, "Book").unwrap();
        outer
            .add_select_column("book.title")
            .add_subquery("herberts", inner)
            .add_raw_filter("book.author_id = herberts.id")
            .unwrap()
            .add_filter("Book.Price", 9.99);

        assert_stmt!(
            outer.to_select_statement().unwrap(),
            r#"SELECT book.title FROM "book", (SELECT author.id FROM "author" WHERE "author"."last_name" = :p1) AS "herberts" WHERE "book"."author_id" = herberts.id AND "book"."price" = :p2"#,
            "Herbert",
            9.99
        );
    }

    #[test]
    fn order_limit_offset_render_literally() {
        let mut query = Query::model(library_schema(), "Book").unwrap();
        query
            .add_select_column("book.title")
            .add_order_by("book.title ASC")
            .set_limit(10)
            .set_offset(20);

        assert_stmt!(
            query.to_select_statement().unwrap(),
            r#"SELECT book.title FROM "book" ORDER BY book.title ASC LIMIT 10 OFFSET 20"#
        );
    }

    #[test]
    fn select_without_any_source_is_rejected() {
        let query = Query::bare(library_schema());
        assert!(matches!(
            query.to_select_statement(),
            Err(QueryError::Malformed(_))
        ));
    }
}
