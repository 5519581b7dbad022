use crate::sql::{ExpressionBuilder, SqlBuilder, Value};
use crate::transform::select::build_select;

use super::column_expr::ColumnExpression;
use super::Query;

/// How a clause is joined to its left siblings when rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conjunction {
    And,
    Or,
}

impl Conjunction {
    pub fn keyword(&self) -> &'static str {
        match self {
            Conjunction::And => "AND",
            Conjunction::Or => "OR",
        }
    }
}

/// Comparison operators a criterion can carry.
#[derive(Debug, Clone, PartialEq)]
pub enum Comparison {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterEqual,
    LessThan,
    LessEqual,
    Like,
    NotLike,
    ILike,
    NotILike,
    In,
    NotIn,
    IsNull,
    IsNotNull,
    /// `column & value = value` — every bit of the value is set.
    BinaryAll,
    /// `column & value = 0` — no bit of the value is set.
    BinaryNone,
    /// A raw clause rendered verbatim; the column and value are unused.
    Custom(String),
}

impl Comparison {
    fn operator(&self) -> &str {
        match self {
            Comparison::Equal => "=",
            Comparison::NotEqual => "<>",
            Comparison::GreaterThan => ">",
            Comparison::GreaterEqual => ">=",
            Comparison::LessThan => "<",
            Comparison::LessEqual => "<=",
            Comparison::Like => "LIKE",
            Comparison::NotLike => "NOT LIKE",
            Comparison::ILike => "ILIKE",
            Comparison::NotILike => "NOT ILIKE",
            Comparison::In => "IN",
            Comparison::NotIn => "NOT IN",
            Comparison::IsNull => "IS NULL",
            Comparison::IsNotNull => "IS NOT NULL",
            Comparison::BinaryAll | Comparison::BinaryNone => "&",
            Comparison::Custom(_) => "",
        }
    }

    /// Word-shaped operators need surrounding spaces in the compact
    /// diagnostic rendering; symbol operators do not.
    fn is_word(&self) -> bool {
        matches!(
            self,
            Comparison::Like
                | Comparison::NotLike
                | Comparison::ILike
                | Comparison::NotILike
                | Comparison::In
                | Comparison::NotIn
        )
    }
}

/// The right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    None,
    Single(Value),
    List(Vec<Value>),
    /// A registered sub-select; embedded in parentheses with parameter
    /// numbering continuing in the enclosing statement.
    Subquery(Box<Query>),
}

/// An ordered list of criteria with a parallel list of conjunctions, one
/// per clause. Used both for a query's top-level filters and for the
/// children of a criterion.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClauseList {
    clauses: Vec<Criterion>,
    conjunctions: Vec<Conjunction>,
}

impl ClauseList {
    pub fn new() -> Self {
        Self::default()
    }

    /// The only mutator, so `clauses` and `conjunctions` always have equal
    /// length.
    pub fn add(&mut self, criterion: Criterion, conjunction: Conjunction) {
        self.clauses.push(criterion);
        self.conjunctions.push(conjunction);
    }

    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Total number of criteria in the list, descendants included.
    pub fn count(&self) -> usize {
        self.clauses.iter().map(|c| c.count()).sum()
    }

    pub fn clauses(&self) -> &[Criterion] {
        &self.clauses
    }

    pub fn conjunctions(&self) -> &[Conjunction] {
        &self.conjunctions
    }

    pub fn last_mut(&mut self) -> Option<&mut Criterion> {
        self.clauses.last_mut()
    }

    pub(crate) fn into_parts(self) -> (Vec<Criterion>, Vec<Conjunction>) {
        (self.clauses, self.conjunctions)
    }

    /// A copy of the whole tree with the table qualifier `from` renamed to
    /// `to` on every column.
    pub fn rename_alias(&self, from: &str, to: &str) -> ClauseList {
        ClauseList {
            clauses: self
                .clauses
                .iter()
                .map(|c| c.rename_alias(from, to))
                .collect(),
            conjunctions: self.conjunctions.clone(),
        }
    }
}

impl ExpressionBuilder for ClauseList {
    /// Clauses joined by their recorded conjunction keywords; the first
    /// clause's conjunction is not rendered.
    fn build(&self, builder: &mut SqlBuilder) {
        for (i, clause) in self.clauses.iter().enumerate() {
            if i > 0 {
                builder.push(' ');
                builder.push_str(self.conjunctions[i].keyword());
                builder.push(' ');
            }
            clause.build(builder);
        }
    }
}

impl std::fmt::Display for ClauseList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, clause) in self.clauses.iter().enumerate() {
            if i > 0 {
                write!(f, " {} ", self.conjunctions[i].keyword())?;
            }
            write!(f, "{clause}")?;
        }
        Ok(())
    }
}

/// One comparison plus an ordered list of attached sub-clauses.
///
/// Rendering is left-associative and fully parenthesized: with `n` attached
/// clauses the output carries `n` leading open parens before the node's own
/// comparison, and each clause appends ` <CONJ> <clause>)`. So a node `A`
/// with children `AND B`, `OR C` renders `((A AND B) OR C)` — grouping
/// associates strictly with attachment order, not operator precedence.
#[derive(Debug, Clone, PartialEq)]
pub struct Criterion {
    column: ColumnExpression,
    comparison: Comparison,
    value: FilterValue,
    clauses: ClauseList,
}

impl Criterion {
    pub fn new(column: ColumnExpression, comparison: Comparison, value: FilterValue) -> Self {
        Self {
            column,
            comparison,
            value,
            clauses: ClauseList::new(),
        }
    }

    /// A raw clause criterion, rendered verbatim.
    pub fn custom(clause: impl Into<String>) -> Self {
        Self::new(
            ColumnExpression::Remote {
                alias: None,
                name: String::new(),
            },
            Comparison::Custom(clause.into()),
            FilterValue::None,
        )
    }

    pub fn column(&self) -> &ColumnExpression {
        &self.column
    }

    pub fn comparison(&self) -> &Comparison {
        &self.comparison
    }

    pub fn value(&self) -> &FilterValue {
        &self.value
    }

    pub fn clauses(&self) -> &ClauseList {
        &self.clauses
    }

    pub fn add_and(&mut self, criterion: Criterion) -> &mut Self {
        self.clauses.add(criterion, Conjunction::And);
        self
    }

    pub fn add_or(&mut self, criterion: Criterion) -> &mut Self {
        self.clauses.add(criterion, Conjunction::Or);
        self
    }

    pub fn attach(&mut self, criterion: Criterion, conjunction: Conjunction) {
        self.clauses.add(criterion, conjunction);
    }

    /// This criterion plus every descendant.
    pub fn count(&self) -> usize {
        1 + self.clauses.count()
    }

    fn rename_alias(&self, from: &str, to: &str) -> Criterion {
        Criterion {
            column: self.column.rename_alias(from, to),
            comparison: self.comparison.clone(),
            value: self.value.clone(),
            clauses: self.clauses.rename_alias(from, to),
        }
    }

    fn build_comparison(&self, builder: &mut SqlBuilder) {
        match (&self.comparison, &self.value) {
            (Comparison::Custom(clause), _) => builder.push_str(clause),

            (Comparison::IsNull, _) | (Comparison::Equal, FilterValue::Single(Value::Null)) => {
                self.column.build(builder);
                builder.push_str(" IS NULL");
            }
            (Comparison::IsNotNull, _)
            | (Comparison::NotEqual, FilterValue::Single(Value::Null)) => {
                self.column.build(builder);
                builder.push_str(" IS NOT NULL");
            }

            // An empty IN list can match nothing; an empty NOT IN excludes
            // nothing. Rendered as constant truth values instead of invalid
            // `IN ()` SQL.
            (Comparison::In, FilterValue::List(values)) if values.is_empty() => {
                builder.push_str("1<>1");
            }
            (Comparison::NotIn, FilterValue::List(values)) if values.is_empty() => {
                builder.push_str("1=1");
            }

            (Comparison::In | Comparison::NotIn, value) => {
                self.column.build(builder);
                builder.push(' ');
                builder.push_str(self.comparison.operator());
                builder.push_str(" (");
                match value {
                    FilterValue::Single(v) => {
                        builder.push_param(self.column.bind_param(v.clone()));
                    }
                    FilterValue::List(values) => {
                        builder.push_iter(values.iter(), ", ", |builder, v| {
                            builder.push_param(self.column.bind_param(v.clone()));
                        });
                    }
                    FilterValue::Subquery(query) => {
                        build_select(query, builder);
                    }
                    FilterValue::None => {}
                }
                builder.push(')');
            }

            (Comparison::BinaryAll, FilterValue::Single(v)) => {
                self.column.build(builder);
                builder.push_str(" & ");
                builder.push_param(self.column.bind_param(v.clone()));
                builder.push_str(" = ");
                builder.push_last_placeholder();
            }
            (Comparison::BinaryNone, FilterValue::Single(v)) => {
                self.column.build(builder);
                builder.push_str(" & ");
                builder.push_param(self.column.bind_param(v.clone()));
                builder.push_str(" = 0");
            }

            (comparison, FilterValue::Single(v)) => {
                self.column.build(builder);
                builder.push(' ');
                builder.push_str(comparison.operator());
                builder.push(' ');
                builder.push_param(self.column.bind_param(v.clone()));
            }

            // No right-hand side: render the column and operator only
            // (e.g. a comparison against a value supplied later).
            (comparison, _) => {
                self.column.build(builder);
                builder.push(' ');
                builder.push_str(comparison.operator());
            }
        }
    }

    fn fmt_comparison(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.comparison, &self.value) {
            (Comparison::Custom(clause), _) => f.write_str(clause),
            (Comparison::IsNull, _) | (Comparison::Equal, FilterValue::Single(Value::Null)) => {
                write!(f, "{} IS NULL", self.column)
            }
            (Comparison::IsNotNull, _)
            | (Comparison::NotEqual, FilterValue::Single(Value::Null)) => {
                write!(f, "{} IS NOT NULL", self.column)
            }
            (Comparison::In, FilterValue::List(values)) if values.is_empty() => {
                f.write_str("1<>1")
            }
            (Comparison::NotIn, FilterValue::List(values)) if values.is_empty() => {
                f.write_str("1=1")
            }
            (Comparison::In | Comparison::NotIn, value) => {
                write!(f, "{} {} (", self.column, self.comparison.operator())?;
                match value {
                    FilterValue::Single(v) => write!(f, "{v}")?,
                    FilterValue::List(values) => {
                        for (i, v) in values.iter().enumerate() {
                            if i > 0 {
                                f.write_str(", ")?;
                            }
                            write!(f, "{v}")?;
                        }
                    }
                    FilterValue::Subquery(_) => f.write_str("<subquery>")?,
                    FilterValue::None => {}
                }
                f.write_str(")")
            }
            (Comparison::BinaryAll, FilterValue::Single(v)) => {
                write!(f, "{}&{v}={v}", self.column)
            }
            (Comparison::BinaryNone, FilterValue::Single(v)) => {
                write!(f, "{}&{v}=0", self.column)
            }
            (comparison, FilterValue::Single(v)) => {
                if comparison.is_word() {
                    write!(f, "{} {} {v}", self.column, comparison.operator())
                } else {
                    write!(f, "{}{}{v}", self.column, comparison.operator())
                }
            }
            (comparison, _) => write!(f, "{}{}", self.column, comparison.operator()),
        }
    }
}

impl ExpressionBuilder for Criterion {
    fn build(&self, builder: &mut SqlBuilder) {
        for _ in 0..self.clauses.len() {
            builder.push('(');
        }
        self.build_comparison(builder);
        for (clause, conjunction) in self
            .clauses
            .clauses()
            .iter()
            .zip(self.clauses.conjunctions())
        {
            builder.push(' ');
            builder.push_str(conjunction.keyword());
            builder.push(' ');
            clause.build(builder);
            builder.push(')');
        }
    }
}

impl std::fmt::Display for Criterion {
    /// The same shape as the SQL rendering, with literal values inlined.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for _ in 0..self.clauses.len() {
            f.write_str("(")?;
        }
        self.fmt_comparison(f)?;
        for (clause, conjunction) in self
            .clauses
            .clauses()
            .iter()
            .zip(self.clauses.conjunctions())
        {
            write!(f, " {} {clause})", conjunction.keyword())?;
        }
        Ok(())
    }
}
