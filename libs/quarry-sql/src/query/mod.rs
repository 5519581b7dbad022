use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::QueryError;
use crate::schema::{BindType, DatabaseMap, TableId};
use crate::sql::{ExpressionBuilder, SqlBuilder, Statement, Value};
use crate::transform::{self, Dialect};

pub mod clause;
pub mod column_expr;
pub mod normalize;
pub mod update;

pub use clause::{ClauseList, Comparison, Conjunction, Criterion, FilterValue};
pub use column_expr::ColumnExpression;
pub use normalize::{is_column_literal, normalize_expression, NormalizedFilterExpression};
pub use update::{UpdateColumn, UpdateColumnCollector, UpdateExpression, UpdateValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
}

impl JoinKind {
    pub fn keyword(&self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::Left => "LEFT JOIN",
            JoinKind::Right => "RIGHT JOIN",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum JoinCondition {
    /// Equality between two resolved columns.
    Eq(ColumnExpression, ColumnExpression),
    /// A raw ON clause, rendered verbatim.
    Raw(String),
}

/// One join target of a query. A join to a table the schema does not map is
/// registered with `table_id: None`; columns resolved against it stay
/// schema-less.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    identifier: String,
    table_id: Option<TableId>,
    table_name: String,
    alias: Option<String>,
    kind: JoinKind,
    condition: Option<JoinCondition>,
}

impl Join {
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn sql_alias(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.table_name)
    }

    pub fn kind(&self) -> JoinKind {
        self.kind
    }

    pub fn condition(&self) -> Option<&JoinCondition> {
        self.condition.as_ref()
    }

    fn answers_to(&self, prefix: &str) -> bool {
        self.identifier == prefix || self.table_name == prefix
    }
}

/// An entry of the SELECT list: either a plain column reference or an
/// `AS`-aliased clause. Output aliases are what `hasAccessToOutputColumns`
/// resolution sees.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputColumn {
    pub clause: String,
    pub alias: Option<String>,
}

/// A HAVING filter. The three forms bind their parameters with different
/// metadata: a literal clause binds nothing, a typed clause binds values
/// with explicit bind codes and no column attribution, and a mapped
/// criterion carries full column metadata.
#[derive(Debug, Clone, PartialEq)]
pub enum Having {
    Literal(String),
    Typed {
        clause: String,
        values: Vec<Value>,
        bind_types: Vec<BindType>,
    },
    Mapped(Criterion),
}

/// The resolution scope a column-identifier prefix landed on: the query's
/// own table or one join target.
struct Scope {
    table_id: Option<TableId>,
    alias: String,
}

/// A fluent query under construction: the root model, joins, registered
/// subqueries, filters, and update values — everything column resolution
/// and the statement builders consume.
///
/// A query owns its whole tree; `Clone` is the supported way to fork one
/// as a template and mutate the copies independently.
#[derive(Debug, Clone)]
pub struct Query {
    schema: Arc<DatabaseMap>,
    table_id: Option<TableId>,
    table_name: Option<String>,
    model_name: Option<String>,
    model_alias: Option<String>,
    joins: Vec<Join>,
    subqueries: IndexMap<String, Query>,
    output_columns: Vec<OutputColumn>,
    /// The enclosing query, when this query is embedded as a correlated
    /// subquery. A clone snapshot: ancestors are walked, never mutated.
    primary: Option<Box<Query>>,
    filters: ClauseList,
    /// Open `combine_filters` scopes, innermost last.
    group_scopes: Vec<ClauseList>,
    having: Option<Having>,
    update_values: UpdateColumnCollector,
    comment: Option<String>,
    group_by: Vec<String>,
    order_by: Vec<String>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl PartialEq for Query {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.schema, &other.schema)
            && self.table_id == other.table_id
            && self.table_name == other.table_name
            && self.model_name == other.model_name
            && self.model_alias == other.model_alias
            && self.joins == other.joins
            && self.subqueries == other.subqueries
            && self.output_columns == other.output_columns
            && self.primary == other.primary
            && self.filters == other.filters
            && self.group_scopes == other.group_scopes
            && self.having == other.having
            && self.update_values == other.update_values
            && self.comment == other.comment
            && self.group_by == other.group_by
            && self.order_by == other.order_by
            && self.limit == other.limit
            && self.offset == other.offset
    }
}

impl Query {
    fn empty(schema: Arc<DatabaseMap>) -> Self {
        Self {
            schema,
            table_id: None,
            table_name: None,
            model_name: None,
            model_alias: None,
            joins: Vec::new(),
            subqueries: IndexMap::new(),
            output_columns: Vec::new(),
            primary: None,
            filters: ClauseList::new(),
            group_scopes: Vec::new(),
            having: None,
            update_values: UpdateColumnCollector::new(),
            comment: None,
            group_by: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    /// A query rooted at a mapped model, addressed by its model name or SQL
    /// table name.
    pub fn model(schema: Arc<DatabaseMap>, name: &str) -> Result<Self, QueryError> {
        let table_id = schema
            .table_id(name)
            .ok_or_else(|| QueryError::UnknownModel(name.to_string()))?;
        let table_name = schema.get_table(table_id).name.clone();
        let model_name = schema.get_table(table_id).model_name.clone();

        let mut query = Self::empty(schema);
        query.table_id = Some(table_id);
        query.table_name = Some(table_name);
        query.model_name = Some(model_name);
        Ok(query)
    }

    /// A query rooted at an unmapped table: no schema metadata, columns
    /// resolved against it stay remote.
    pub fn raw(schema: Arc<DatabaseMap>, table_name: &str) -> Self {
        let mut query = Self::empty(schema);
        query.table_name = Some(table_name.to_string());
        query.model_name = Some(table_name.to_string());
        query
    }

    /// A query with no root table at all, useful as a bag of raw filters.
    pub fn bare(schema: Arc<DatabaseMap>) -> Self {
        Self::empty(schema)
    }

    pub fn set_alias(&mut self, alias: &str) -> &mut Self {
        self.model_alias = Some(alias.to_string());
        self
    }

    pub fn schema(&self) -> &Arc<DatabaseMap> {
        &self.schema
    }

    pub fn table_name(&self) -> Option<&str> {
        self.table_name.as_deref()
    }

    pub fn model_alias(&self) -> Option<&str> {
        self.model_alias.as_deref()
    }

    /// The alias or real table name under which this query's rows appear in
    /// emitted SQL.
    pub fn sql_alias(&self) -> Option<&str> {
        self.model_alias.as_deref().or(self.table_name.as_deref())
    }

    /// The name a dot-less identifier is implicitly prefixed with.
    fn effective_name(&self) -> Option<&str> {
        self.model_alias.as_deref().or(self.model_name.as_deref())
    }

    pub fn joins(&self) -> &[Join] {
        &self.joins
    }

    pub fn subqueries(&self) -> &IndexMap<String, Query> {
        &self.subqueries
    }

    pub fn output_columns(&self) -> &[OutputColumn] {
        &self.output_columns
    }

    pub fn filters(&self) -> &ClauseList {
        &self.filters
    }

    pub fn having(&self) -> Option<&Having> {
        self.having.as_ref()
    }

    pub fn update_values(&self) -> &UpdateColumnCollector {
        &self.update_values
    }

    pub fn update_values_mut(&mut self) -> &mut UpdateColumnCollector {
        &mut self.update_values
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    pub fn group_by(&self) -> &[String] {
        &self.group_by
    }

    pub fn order_by(&self) -> &[String] {
        &self.order_by
    }

    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    pub fn offset(&self) -> Option<u64> {
        self.offset
    }

    // ---- structure -------------------------------------------------------

    /// Register a join. `target` is resolved against the schema by model or
    /// table name; an unknown target becomes a raw join without schema
    /// metadata.
    pub fn add_join(
        &mut self,
        target: &str,
        alias: Option<&str>,
        kind: JoinKind,
        condition: Option<JoinCondition>,
    ) -> &mut Self {
        let (table_id, table_name, identifier) = match self.schema.table_id(target) {
            Some(table_id) => {
                let table = self.schema.get_table(table_id);
                (
                    Some(table_id),
                    table.name.clone(),
                    alias.unwrap_or(&table.model_name).to_string(),
                )
            }
            None => (
                None,
                target.to_string(),
                alias.unwrap_or(target).to_string(),
            ),
        };

        self.joins.push(Join {
            identifier,
            table_id,
            table_name,
            alias: alias.map(|a| a.to_string()),
            kind,
            condition,
        });
        self
    }

    /// Register a join with an equality ON condition. Both sides are
    /// resolved after the join itself is in scope, so the right side may
    /// reference the join target.
    pub fn add_join_on(
        &mut self,
        target: &str,
        alias: Option<&str>,
        kind: JoinKind,
        left: &str,
        right: &str,
    ) -> &mut Self {
        self.add_join(target, alias, kind, None);
        let left = self.resolve_silently(left);
        let right = self.resolve_silently(right);
        if let Some(join) = self.joins.last_mut() {
            join.condition = Some(JoinCondition::Eq(left, right));
        }
        self
    }

    /// Register a sub-select addressable by `alias` from this query's
    /// filters and column identifiers.
    pub fn add_subquery(&mut self, alias: &str, subquery: Query) -> &mut Self {
        self.subqueries.insert(alias.to_string(), subquery);
        self
    }

    pub fn add_select_column(&mut self, clause: &str) -> &mut Self {
        self.output_columns.push(OutputColumn {
            clause: clause.to_string(),
            alias: None,
        });
        self
    }

    /// Add an `AS`-aliased output column. The alias is visible to column
    /// resolution only where output columns are in scope (HAVING, or when
    /// this query is used as a subquery).
    pub fn add_as_column(&mut self, alias: &str, clause: &str) -> &mut Self {
        self.output_columns.push(OutputColumn {
            clause: clause.to_string(),
            alias: Some(alias.to_string()),
        });
        self
    }

    pub fn has_output_alias(&self, name: &str) -> bool {
        self.output_columns
            .iter()
            .any(|c| c.alias.as_deref() == Some(name))
    }

    /// Mark this query as a correlated subquery of `outer`. A snapshot of
    /// the outer query is kept for ancestor resolution; register joins on
    /// the outer query before calling this.
    pub fn set_primary_query(&mut self, outer: &Query) -> &mut Self {
        self.primary = Some(Box::new(outer.clone()));
        self
    }

    pub fn set_comment(&mut self, comment: &str) -> &mut Self {
        self.comment = Some(comment.to_string());
        self
    }

    pub fn add_group_by(&mut self, clause: &str) -> &mut Self {
        self.group_by.push(clause.to_string());
        self
    }

    pub fn add_order_by(&mut self, clause: &str) -> &mut Self {
        self.order_by.push(clause.to_string());
        self
    }

    pub fn set_limit(&mut self, limit: u64) -> &mut Self {
        self.limit = Some(limit);
        self
    }

    pub fn set_offset(&mut self, offset: u64) -> &mut Self {
        self.offset = Some(offset);
        self
    }

    pub fn set_having(&mut self, having: Having) -> &mut Self {
        self.having = Some(having);
        self
    }

    // ---- column resolution ----------------------------------------------

    /// Resolve a textual column identifier (`Model.Field`, `alias.column`,
    /// or a bare column name) within this query's scope chain: output
    /// aliases (when in scope), the own table, join targets, registered
    /// subqueries, then ancestor queries.
    ///
    /// With `fail_silently` the failure paths return an
    /// [`ColumnExpression::Unresolved`] placeholder instead of erroring, so
    /// callers can retry via [`ColumnExpression::resolve_again`] once more
    /// scope (e.g. a join) has been registered.
    pub fn resolve_column(
        &self,
        identifier: &str,
        has_access_to_output_columns: bool,
        fail_silently: bool,
    ) -> Result<ColumnExpression, QueryError> {
        // Output aliases are visible only in HAVING or when this query is
        // itself used as a subquery.
        if has_access_to_output_columns && self.has_output_alias(identifier) {
            return Ok(ColumnExpression::Remote {
                alias: None,
                name: identifier.to_string(),
            });
        }

        // prefix := [schema.]table-or-alias, suffix := column. With no dot
        // the query's own name is the implicit prefix.
        let (prefix, column_name) = match identifier.rsplit_once('.') {
            Some((prefix, column)) => (Some(prefix.to_string()), column),
            None => (self.effective_name().map(str::to_string), identifier),
        };

        let prefix = match prefix {
            Some(prefix) => prefix,
            None => {
                return self.soft_fail(fail_silently, identifier, None, column_name, || {
                    QueryError::UnknownModel(identifier.to_string())
                });
            }
        };

        // own table or a join target
        if let Some(scope) = self.find_scope(&prefix) {
            return self.resolve_in_scope(&scope, identifier, column_name, fail_silently);
        }

        // a registered sub-select under this prefix
        if let Some(subquery) = self.subqueries.get(&prefix) {
            return self.resolve_subquery_column(
                subquery,
                &prefix,
                identifier,
                column_name,
                fail_silently,
            );
        }

        // ancestor (primary) queries, when this query is itself embedded
        let mut ancestor = self.primary.as_deref();
        while let Some(outer) = ancestor {
            if let Some(scope) = outer.find_scope(&prefix) {
                return outer.resolve_in_scope(&scope, identifier, column_name, fail_silently);
            }
            ancestor = outer.primary.as_deref();
        }

        self.soft_fail(
            fail_silently,
            identifier,
            Some(prefix.clone()),
            column_name,
            || QueryError::UnknownModel(prefix.clone()),
        )
    }

    fn find_scope(&self, prefix: &str) -> Option<Scope> {
        let own = self
            .effective_name()
            .map(|name| name == prefix)
            .unwrap_or(false)
            || self
                .table_name
                .as_deref()
                .map(|name| name == prefix)
                .unwrap_or(false);

        if own {
            return Some(Scope {
                table_id: self.table_id,
                alias: self.sql_alias().unwrap_or(prefix).to_string(),
            });
        }

        self.joins
            .iter()
            .find(|join| join.answers_to(prefix))
            .map(|join| Scope {
                table_id: join.table_id,
                alias: join.sql_alias().to_string(),
            })
    }

    fn resolve_in_scope(
        &self,
        scope: &Scope,
        identifier: &str,
        column_name: &str,
        fail_silently: bool,
    ) -> Result<ColumnExpression, QueryError> {
        let table_id = match scope.table_id {
            // A raw target: nothing further to look up.
            None => {
                return Ok(ColumnExpression::Remote {
                    alias: Some(scope.alias.clone()),
                    name: column_name.to_string(),
                });
            }
            Some(table_id) => table_id,
        };

        let table = self.schema.get_table(table_id);
        match table
            .find_column(column_name)
            .and_then(|column| {
                self.schema
                    .column_id(table_id, &column.name)
                    .map(|id| (column, id))
            }) {
            Some((column, column_id)) => Ok(ColumnExpression::Local {
                alias: scope.alias.clone(),
                name: column.name.clone(),
                field_name: column.field_name.clone(),
                table_name: column.table_name.clone(),
                typ: column.typ.clone(),
                column_id,
            }),
            None => self.soft_fail(
                fail_silently,
                identifier,
                Some(scope.alias.clone()),
                column_name,
                || QueryError::UnknownColumn {
                    column: column_name.to_string(),
                    table: table.name.clone(),
                },
            ),
        }
    }

    /// Resolution against a registered sub-select: its output aliases win;
    /// otherwise its own table map may know the column (then the bind type
    /// travels along); otherwise unresolved.
    fn resolve_subquery_column(
        &self,
        subquery: &Query,
        prefix: &str,
        identifier: &str,
        column_name: &str,
        fail_silently: bool,
    ) -> Result<ColumnExpression, QueryError> {
        if subquery.has_output_alias(column_name) {
            return Ok(ColumnExpression::Remote {
                alias: Some(prefix.to_string()),
                name: column_name.to_string(),
            });
        }

        if let Some(table_id) = subquery.table_id {
            let table = subquery.schema.get_table(table_id);
            if let Some(column) = table.find_column(column_name) {
                return Ok(ColumnExpression::RemoteTyped {
                    alias: Some(prefix.to_string()),
                    name: column.name.clone(),
                    bind_type: column.bind_type(),
                    column_id: subquery.schema.column_id(table_id, &column.name),
                });
            }
        }

        self.soft_fail(
            fail_silently,
            identifier,
            Some(prefix.to_string()),
            column_name,
            || QueryError::UnknownColumn {
                column: column_name.to_string(),
                table: prefix.to_string(),
            },
        )
    }

    fn soft_fail(
        &self,
        fail_silently: bool,
        identifier: &str,
        alias: Option<String>,
        column_name: &str,
        error: impl FnOnce() -> QueryError,
    ) -> Result<ColumnExpression, QueryError> {
        if fail_silently {
            Ok(ColumnExpression::Unresolved {
                alias,
                name: column_name.to_string(),
                identifier: identifier.to_string(),
            })
        } else {
            Err(error())
        }
    }

    /// Resolution that never errors: failure yields an `Unresolved`
    /// placeholder. Internal call sites that defer resolution use this.
    fn resolve_silently(&self, identifier: &str) -> ColumnExpression {
        self.resolve_column(identifier, false, true)
            .unwrap_or_else(|_| ColumnExpression::Unresolved {
                alias: None,
                name: identifier.to_string(),
                identifier: identifier.to_string(),
            })
    }

    // ---- filters ---------------------------------------------------------

    fn current_scope(&mut self) -> &mut ClauseList {
        self.group_scopes.last_mut().unwrap_or(&mut self.filters)
    }

    /// Add an equality filter, AND-joined to the current scope.
    pub fn add_filter(&mut self, identifier: &str, value: impl Into<Value>) -> &mut Self {
        self.add_filter_op(
            identifier,
            Comparison::Equal,
            FilterValue::Single(value.into()),
        )
    }

    pub fn add_filter_op(
        &mut self,
        identifier: &str,
        comparison: Comparison,
        value: FilterValue,
    ) -> &mut Self {
        let column = self.resolve_silently(identifier);
        let criterion = Criterion::new(column, comparison, value);
        self.current_scope().add(criterion, Conjunction::And);
        self
    }

    /// Alias of [`add_filter`](Self::add_filter): a new AND-joined clause.
    pub fn add_and(&mut self, identifier: &str, value: impl Into<Value>) -> &mut Self {
        self.add_filter(identifier, value)
    }

    /// Attach an OR comparison to the most recently added clause of the
    /// current scope. With no previous clause this behaves like
    /// [`add_filter`](Self::add_filter).
    pub fn add_or(&mut self, identifier: &str, value: impl Into<Value>) -> &mut Self {
        self.add_or_op(
            identifier,
            Comparison::Equal,
            FilterValue::Single(value.into()),
        )
    }

    pub fn add_or_op(
        &mut self,
        identifier: &str,
        comparison: Comparison,
        value: FilterValue,
    ) -> &mut Self {
        let column = self.resolve_silently(identifier);
        let criterion = Criterion::new(column, comparison, value);
        let scope = self.current_scope();
        if scope.is_empty() {
            scope.add(criterion, Conjunction::Or);
        } else if let Some(last) = scope.last_mut() {
            last.add_or(criterion);
        }
        self
    }

    /// Add an already-built criterion to the current scope.
    pub fn add_criterion(&mut self, criterion: Criterion, conjunction: Conjunction) -> &mut Self {
        self.current_scope().add(criterion, conjunction);
        self
    }

    /// Normalize a raw pseudo-SQL clause (resolving its `Table.Column`
    /// literals against this query) and add it as a verbatim filter.
    pub fn add_raw_filter(&mut self, clause: &str) -> Result<&mut Self, QueryError> {
        let normalized = self.normalize_filter(clause)?;
        self.current_scope()
            .add(Criterion::custom(normalized.sql()), Conjunction::And);
        Ok(self)
    }

    /// Rewrite every column literal of `clause` into its resolved, quoted
    /// form.
    pub fn normalize_filter(&self, clause: &str) -> Result<NormalizedFilterExpression, QueryError> {
        normalize_expression(clause, |literal| {
            let column = self.resolve_silently(literal);
            let mut builder = SqlBuilder::new();
            column.build(&mut builder);
            let text = builder.into_statement().sql;
            Ok((column, text))
        })
    }

    /// Open a filter group: clauses added until the matching
    /// [`end_combine_filters`](Self::end_combine_filters) are collected
    /// together and attached to the enclosing scope as one parenthesized
    /// criterion. Groups nest.
    pub fn combine_filters(&mut self) -> &mut Self {
        self.group_scopes.push(ClauseList::new());
        self
    }

    /// Close the innermost filter group, AND-joined to its parent scope.
    /// An unmatched or empty close is a no-op.
    pub fn end_combine_filters(&mut self) -> &mut Self {
        self.end_combine_filters_with(Conjunction::And)
    }

    /// Close the innermost filter group, joined to its parent scope with the
    /// given conjunction.
    pub fn end_combine_filters_with(&mut self, conjunction: Conjunction) -> &mut Self {
        let Some(group) = self.group_scopes.pop() else {
            return self;
        };
        let (clauses, conjunctions) = group.into_parts();
        let mut clauses = clauses.into_iter();
        let Some(mut base) = clauses.next() else {
            return self;
        };
        for (clause, child_conjunction) in clauses.zip(conjunctions.into_iter().skip(1)) {
            base.attach(clause, child_conjunction);
        }
        self.current_scope().add(base, conjunction);
        self
    }

    // ---- update values ---------------------------------------------------

    /// Set the target value for one column of an INSERT/UPDATE, keyed by the
    /// column's qualified form (last write wins).
    pub fn set_update_column(&mut self, identifier: &str, value: impl Into<Value>) -> &mut Self {
        let column = self.resolve_silently(identifier);
        self.update_values
            .set(UpdateValue::Column(UpdateColumn::new(column, value.into())));
        self
    }

    /// Set an expression assignment (`column = <fragment with ?>`). Fails
    /// if the placeholder, value, and bind-type counts do not line up.
    pub fn set_update_expression(
        &mut self,
        identifier: &str,
        expression: &str,
        values: Vec<Value>,
        bind_types: Option<Vec<BindType>>,
    ) -> Result<&mut Self, QueryError> {
        let column = self.resolve_silently(identifier);
        let update = UpdateExpression::new(column, expression, values, bind_types)?;
        self.update_values.set(UpdateValue::Expression(update));
        Ok(self)
    }

    // ---- statements ------------------------------------------------------

    pub fn to_insert_statement(&self) -> Result<Statement, QueryError> {
        transform::insert::build_insert(self)
    }

    pub fn to_update_statement(&self) -> Result<Statement, QueryError> {
        transform::update::build_update(self)
    }

    pub fn to_delete_statement(&self, dialect: &Dialect) -> Result<Statement, QueryError> {
        transform::delete::build_delete(self, dialect)
    }

    pub fn to_delete_all_statement(&self, dialect: &Dialect) -> Result<Statement, QueryError> {
        transform::delete::build_delete_all(self, dialect)
    }

    pub fn to_select_statement(&self) -> Result<Statement, QueryError> {
        transform::select::build_select_statement(self)
    }
}
