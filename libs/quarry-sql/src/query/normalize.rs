use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::QueryError;

use super::column_expr::ColumnExpression;

/// `Table.Column`-shaped literals inside a pseudo-SQL clause. The left
/// segment may carry namespace-style backslashes.
static COLUMN_LITERAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\w\\]+(?:\.\w+)+").expect("column literal pattern"));

/// A single bare word or a one/two dot-qualified column reference, nothing
/// else.
static SINGLE_COLUMN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\w\\]+(?:\.\w+){0,2}$").expect("single column pattern"));

/// The result of rewriting a raw clause: the normalized SQL plus the
/// column expressions substituted into it, in match order.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedFilterExpression {
    sql: String,
    replaced_columns: Vec<ColumnExpression>,
}

impl NormalizedFilterExpression {
    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn replaced_columns(&self) -> &[ColumnExpression] {
        &self.replaced_columns
    }
}

/// Rewrite every `Table.Column` literal in `clause` through `processor`,
/// which returns the column expression for the literal and the text to
/// splice in its place. Content inside single- or double-quoted spans is
/// copied verbatim; a quote preceded by `\` neither opens nor closes a
/// span.
///
/// One left-to-right scan: resolved output accumulates in one buffer while
/// a second buffer holds the text still pending transformation. The
/// pending buffer is flushed through the literal pattern at each quote
/// boundary and at end of input.
pub fn normalize_expression<F>(
    clause: &str,
    mut processor: F,
) -> Result<NormalizedFilterExpression, QueryError>
where
    F: FnMut(&str) -> Result<(ColumnExpression, String), QueryError>,
{
    let mut out = String::with_capacity(clause.len());
    let mut pending = String::new();
    let mut replaced_columns = Vec::new();

    let mut in_quote: Option<char> = None;
    let mut escaped = false;

    for c in clause.chars() {
        match in_quote {
            Some(quote) => {
                out.push(c);
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == quote {
                    in_quote = None;
                }
            }
            None => {
                if escaped {
                    pending.push(c);
                    escaped = false;
                } else if c == '\\' {
                    pending.push(c);
                    escaped = true;
                } else if c == '\'' || c == '"' {
                    flush_pending(&mut pending, &mut out, &mut replaced_columns, &mut processor)?;
                    out.push(c);
                    in_quote = Some(c);
                } else {
                    pending.push(c);
                }
            }
        }
    }
    flush_pending(&mut pending, &mut out, &mut replaced_columns, &mut processor)?;

    Ok(NormalizedFilterExpression {
        sql: out,
        replaced_columns,
    })
}

fn flush_pending<F>(
    pending: &mut String,
    out: &mut String,
    replaced_columns: &mut Vec<ColumnExpression>,
    processor: &mut F,
) -> Result<(), QueryError>
where
    F: FnMut(&str) -> Result<(ColumnExpression, String), QueryError>,
{
    let mut last_end = 0;
    for found in COLUMN_LITERAL.find_iter(pending) {
        out.push_str(&pending[last_end..found.start()]);
        let (column, replacement) = processor(found.as_str())?;
        out.push_str(&replacement);
        replaced_columns.push(column);
        last_end = found.end();
    }
    out.push_str(&pending[last_end..]);
    pending.clear();
    Ok(())
}

/// Whether the entire trimmed (and optionally quoted) string is exactly one
/// column reference — the fast path that skips the full normalization scan.
pub fn is_column_literal(s: &str) -> bool {
    let mut s = s.trim();
    for quote in ['\'', '"'] {
        if s.len() >= 2 && s.starts_with(quote) && s.ends_with(quote) {
            s = &s[1..s.len() - 1];
            break;
        }
    }
    SINGLE_COLUMN.is_match(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upcase_processor(literal: &str) -> Result<(ColumnExpression, String), QueryError> {
        let (alias, name) = match literal.rsplit_once('.') {
            Some((alias, name)) => (Some(alias.to_string()), name.to_string()),
            None => (None, literal.to_string()),
        };
        Ok((
            ColumnExpression::Remote { alias, name },
            format!("[{literal}]"),
        ))
    }

    #[test]
    fn substitutes_literals_in_match_order() {
        let normalized = normalize_expression(
            "CONCAT(Book.AuthorId, Author.LastName) = ?",
            upcase_processor,
        )
        .unwrap();

        assert_eq!(normalized.sql(), "CONCAT([Book.AuthorId], [Author.LastName]) = ?");
        assert_eq!(normalized.replaced_columns().len(), 2);
        assert_eq!(normalized.replaced_columns()[0].name(), "AuthorId");
        assert_eq!(normalized.replaced_columns()[1].name(), "LastName");
    }

    #[test]
    fn skips_quoted_spans() {
        let normalized =
            normalize_expression("Book.Title = 'a.b' AND Book.Id = \"c.d\"", upcase_processor)
                .unwrap();

        assert_eq!(
            normalized.sql(),
            "[Book.Title] = 'a.b' AND [Book.Id] = \"c.d\""
        );
        assert_eq!(normalized.replaced_columns().len(), 2);
    }

    #[test]
    fn escaped_quote_does_not_close_a_span() {
        let normalized =
            normalize_expression(r"Book.Title = 'it\'s x.y' AND Book.Id = ?", upcase_processor)
                .unwrap();

        assert_eq!(
            normalized.sql(),
            r"[Book.Title] = 'it\'s x.y' AND [Book.Id] = ?"
        );
        assert_eq!(normalized.replaced_columns().len(), 2);
    }

    #[test]
    fn namespaced_prefix() {
        let normalized =
            normalize_expression(r"App\Model\Book.Title = ?", upcase_processor).unwrap();
        assert_eq!(normalized.sql(), r"[App\Model\Book.Title] = ?");
    }

    #[test]
    fn single_column_predicate() {
        assert!(is_column_literal("column"));
        assert!(is_column_literal("table.column"));
        assert!(is_column_literal("schema.table.column"));
        assert!(is_column_literal("  table.column  "));
        assert!(is_column_literal("'table.column'"));

        assert!(!is_column_literal("table.column = ?"));
        assert!(!is_column_literal("a.b.c.d"));
        assert!(!is_column_literal(""));
    }
}
