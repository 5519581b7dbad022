use indexmap::IndexMap;

use crate::error::QueryError;
use crate::schema::BindType;
use crate::sql::{BindParam, ExpressionBuilder, SqlBuilder, Value};

use super::column_expr::ColumnExpression;

/// One column with one scalar-or-null bind value, for an INSERT/UPDATE
/// target list.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateColumn {
    column: ColumnExpression,
    value: Value,
}

impl UpdateColumn {
    pub fn new(column: ColumnExpression, value: Value) -> Self {
        Self { column, value }
    }

    pub fn column(&self) -> &ColumnExpression {
        &self.column
    }

    pub fn value(&self) -> &Value {
        &self.value
    }
}

/// One column assigned from a literal SQL fragment containing `?`
/// placeholders, each backed by a value and, when no schema column map is
/// available, an explicit bind type.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateExpression {
    column: ColumnExpression,
    expression: String,
    values: Vec<Value>,
    bind_types: Option<Vec<BindType>>,
}

impl UpdateExpression {
    pub fn new(
        column: ColumnExpression,
        expression: impl Into<String>,
        values: Vec<Value>,
        bind_types: Option<Vec<BindType>>,
    ) -> Result<Self, QueryError> {
        let expression = expression.into();
        let placeholders = placeholder_count(&expression);

        if placeholders != values.len() {
            return Err(QueryError::InvalidArgument(format!(
                "Expression '{}' has {} placeholder(s) but {} value(s) were supplied",
                expression,
                placeholders,
                values.len()
            )));
        }

        if let Some(bind_types) = &bind_types {
            if bind_types.len() != values.len() {
                return Err(QueryError::InvalidArgument(format!(
                    "Expression '{}' has {} value(s) but {} bind type(s) were supplied",
                    expression,
                    values.len(),
                    bind_types.len()
                )));
            }
        } else if !column.has_column_map() && !values.is_empty() {
            return Err(QueryError::InvalidArgument(format!(
                "Expression '{}' needs explicit bind types: column '{}' has no schema map",
                expression,
                column.qualified_name()
            )));
        }

        Ok(Self {
            column,
            expression,
            values,
            bind_types,
        })
    }

    pub fn column(&self) -> &ColumnExpression {
        &self.column
    }

    fn bind_param(&self, index: usize) -> BindParam {
        let value = self.values[index].clone();
        match &self.bind_types {
            Some(bind_types) => BindParam {
                table: self.column.table_alias().map(|a| a.to_string()),
                column: Some(self.column.name().to_string()),
                typ: bind_types[index],
                value,
            },
            None => self.column.bind_param(value),
        }
    }
}

/// The number of `?` placeholders in an expression, skipping quoted spans.
pub(crate) fn placeholder_count(expression: &str) -> usize {
    let mut count = 0;
    let mut in_quote: Option<char> = None;
    let mut escaped = false;

    for c in expression.chars() {
        match in_quote {
            Some(quote) => {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == quote {
                    in_quote = None;
                }
            }
            None => match c {
                '\'' | '"' => in_quote = Some(c),
                '?' => count += 1,
                _ => {}
            },
        }
    }
    count
}

/// An assignment target: a plain column-value pair or an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateValue {
    Column(UpdateColumn),
    Expression(UpdateExpression),
}

impl UpdateValue {
    pub fn column(&self) -> &ColumnExpression {
        match self {
            UpdateValue::Column(c) => c.column(),
            UpdateValue::Expression(e) => e.column(),
        }
    }

    /// The collector key: the column's canonical `table.column` (or bare)
    /// form.
    pub fn key(&self) -> String {
        self.column().qualified_name()
    }

    /// Emit `column = <expression>`, advancing the shared positional
    /// counter and collecting the bind parameter(s).
    pub fn build_assignment(&self, builder: &mut SqlBuilder) {
        builder.with_plain(|builder| {
            self.column().build(builder);
        });
        builder.push_str(" = ");
        self.build_value(builder);
    }

    /// Emit just the right-hand side: a positional parameter for a plain
    /// value, or the expression with its `?` placeholders bound.
    pub fn build_value(&self, builder: &mut SqlBuilder) {
        match self {
            UpdateValue::Column(update) => {
                builder.push_param(update.column.bind_param(update.value.clone()));
            }
            UpdateValue::Expression(update) => {
                let mut next = 0;
                let mut in_quote: Option<char> = None;
                let mut escaped = false;

                for c in update.expression.chars() {
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
                            '?' => {
                                builder.push_param(update.bind_param(next));
                                next += 1;
                            }
                            _ => builder.push(c),
                        },
                    }
                }
            }
        }
    }
}

/// The ordered, keyed bag of assignment targets for one INSERT/UPDATE.
/// Keys are unique; insertion order is preserved for SQL emission; setting
/// an existing key replaces its value.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UpdateColumnCollector {
    values: IndexMap<String, UpdateValue>,
}

impl UpdateColumnCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, value: UpdateValue) {
        self.values.insert(value.key(), value);
    }

    pub fn get(&self, key: &str) -> Option<&UpdateValue> {
        self.values.get(key)
    }

    /// Key presence, not value truthiness: a column set to `Null` is
    /// present.
    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Remove and return the value for `key`, preserving the order of the
    /// remaining entries.
    pub fn remove(&mut self, key: &str) -> Option<UpdateValue> {
        self.values.shift_remove(key)
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Union of `other` into self; on conflicting keys, `other` wins.
    pub fn merge(&mut self, other: UpdateColumnCollector) {
        for (key, value) in other.values {
            self.values.insert(key, value);
        }
    }

    /// Every key of self exists in `other` with an equal value.
    pub fn equals(&self, other: &UpdateColumnCollector) -> bool {
        self.values
            .iter()
            .all(|(key, value)| other.get(key) == Some(value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> indexmap::map::Iter<'_, String, UpdateValue> {
        self.values.iter()
    }

    /// Split the collector by the table-name prefix of each key (everything
    /// left of the last `.`; bare keys group under the empty string).
    pub fn group_by_table(&self) -> IndexMap<String, UpdateColumnCollector> {
        let mut groups: IndexMap<String, UpdateColumnCollector> = IndexMap::new();
        for (key, value) in &self.values {
            let table = match key.rsplit_once('.') {
                Some((table, _)) => table.to_string(),
                None => String::new(),
            };
            groups
                .entry(table)
                .or_default()
                .values
                .insert(key.clone(), value.clone());
        }
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::fixtures::library_schema;
    use crate::schema::ColumnType;

    fn title_column() -> ColumnExpression {
        let schema = library_schema();
        let book = schema.table_id("Book").unwrap();
        ColumnExpression::Local {
            alias: "book".to_string(),
            name: "title".to_string(),
            field_name: "Title".to_string(),
            table_name: "book".to_string(),
            typ: ColumnType::Varchar { length: Some(255) },
            column_id: schema.column_id(book, "title").unwrap(),
        }
    }

    fn unmapped_column() -> ColumnExpression {
        ColumnExpression::Remote {
            alias: Some("book".to_string()),
            name: "score".to_string(),
        }
    }

    fn set_title(collector: &mut UpdateColumnCollector, value: Value) {
        collector.set(UpdateValue::Column(UpdateColumn::new(
            title_column(),
            value,
        )));
    }

    #[test]
    fn null_value_is_present() {
        let mut collector = UpdateColumnCollector::new();
        set_title(&mut collector, Value::Null);

        assert!(collector.has("book.title"));
        assert!(!collector.has("book.isbn"));
        assert_eq!(collector.len(), 1);
    }

    #[test]
    fn remove_returns_value() {
        let mut collector = UpdateColumnCollector::new();
        set_title(&mut collector, Value::Text("dune".to_string()));

        let removed = collector.remove("book.title").unwrap();
        assert_eq!(removed.key(), "book.title");
        assert!(!collector.has("book.title"));
        assert!(collector.remove("book.title").is_none());
    }

    #[test]
    fn merge_is_right_biased() {
        let mut left = UpdateColumnCollector::new();
        set_title(&mut left, Value::Text("old".to_string()));

        let mut right = UpdateColumnCollector::new();
        set_title(&mut right, Value::Text("new".to_string()));

        left.merge(right);
        assert_eq!(left.len(), 1);
        match left.get("book.title").unwrap() {
            UpdateValue::Column(c) => assert_eq!(c.value(), &Value::Text("new".to_string())),
            _ => panic!("expected plain column"),
        }
    }

    #[test]
    fn equality_is_per_key() {
        let mut a = UpdateColumnCollector::new();
        set_title(&mut a, Value::Int(1));
        let mut b = UpdateColumnCollector::new();
        set_title(&mut b, Value::Int(1));
        assert!(a.equals(&b));

        set_title(&mut b, Value::Int(2));
        assert!(!a.equals(&b));
    }

    #[test]
    fn group_by_table_splits_on_last_dot() {
        let mut collector = UpdateColumnCollector::new();
        set_title(&mut collector, Value::Int(1));
        collector.set(UpdateValue::Column(UpdateColumn::new(
            ColumnExpression::Remote {
                alias: Some("author".to_string()),
                name: "last_name".to_string(),
            },
            Value::Int(2),
        )));
        collector.set(UpdateValue::Column(UpdateColumn::new(
            ColumnExpression::Remote {
                alias: None,
                name: "bare".to_string(),
            },
            Value::Int(3),
        )));

        let groups = collector.group_by_table();
        assert_eq!(groups.len(), 3);
        assert!(groups["book"].has("book.title"));
        assert!(groups["author"].has("author.last_name"));
        assert!(groups[""].has("bare"));
    }

    #[test]
    fn expression_placeholder_count_must_match() {
        let err = UpdateExpression::new(
            title_column(),
            "CONCAT(?, ?)",
            vec![Value::Int(1)],
            None,
        );
        assert!(matches!(err, Err(QueryError::InvalidArgument(_))));

        // a ? inside a quoted span is not a placeholder
        let ok = UpdateExpression::new(
            title_column(),
            "CONCAT('?', ?)",
            vec![Value::Int(1)],
            None,
        );
        assert!(ok.is_ok());
    }

    #[test]
    fn expression_without_map_needs_bind_types() {
        let err = UpdateExpression::new(unmapped_column(), "? + 1", vec![Value::Int(1)], None);
        assert!(matches!(err, Err(QueryError::InvalidArgument(_))));

        let ok = UpdateExpression::new(
            unmapped_column(),
            "? + 1",
            vec![Value::Int(1)],
            Some(vec![BindType::Integer]),
        );
        assert!(ok.is_ok());

        // zero placeholders never need bind types
        let ok = UpdateExpression::new(unmapped_column(), "now()", vec![], None);
        assert!(ok.is_ok());
    }

    #[test]
    fn mismatched_bind_type_count_is_rejected() {
        let err = UpdateExpression::new(
            title_column(),
            "? + ?",
            vec![Value::Int(1), Value::Int(2)],
            Some(vec![BindType::Integer]),
        );
        assert!(matches!(err, Err(QueryError::InvalidArgument(_))));
    }

    #[test]
    fn assignment_emission() {
        let mut builder = SqlBuilder::new();
        UpdateValue::Column(UpdateColumn::new(
            title_column(),
            Value::Text("dune".to_string()),
        ))
        .build_assignment(&mut builder);

        assert_stmt!(builder.into_statement(), r#""title" = :p1"#, "dune");
    }

    #[test]
    fn expression_assignment_emission() {
        let schema = library_schema();
        let book = schema.table_id("Book").unwrap();
        let price = ColumnExpression::Local {
            alias: "book".to_string(),
            name: "price".to_string(),
            field_name: "Price".to_string(),
            table_name: "book".to_string(),
            typ: ColumnType::Double,
            column_id: schema.column_id(book, "price").unwrap(),
        };

        let mut builder = SqlBuilder::new();
        UpdateValue::Expression(
            UpdateExpression::new(price, "price * ?", vec![Value::Double(1.1)], None).unwrap(),
        )
        .build_assignment(&mut builder);

        assert_stmt!(builder.into_statement(), r#""price" = price * :p1"#, 1.1f64);
    }
}
