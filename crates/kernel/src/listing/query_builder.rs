//! Listing SQL assembly using SeaQuery.
//!
//! Turns a validated [`QueryOptions`] plus resolved joins into parameterized
//! PostgreSQL, for both the data query and the matching COUNT query. Request
//! values never appear in the SQL text: SeaQuery numbers the placeholders
//! and hands the bind values back alongside the statement.

use sea_query::extension::postgres::PgExpr;
use sea_query::{
    Alias, Asterisk, Cond, Expr, ExprTrait, Order, PostgresQueryBuilder, Query, SelectStatement,
    SimpleExpr, Value as SqlValue,
};
use sqlx::Arguments;
use sqlx::postgres::PgArguments;
use tracing::debug;

use super::error::BuildError;
use super::relations::{JoinConfig, RegistryManager, RelationshipRegistry};
use super::types::{CompareOp, DEFAULT_LIMIT, QueryOptions, Value};

/// Parameterized SQL plus its bind values, in placeholder order.
///
/// The engine never executes SQL; the owning repository runs the statement
/// and feeds the results into [`Paginated`](super::Paginated).
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltQuery {
    pub sql: String,
    pub args: Vec<Value>,
}

impl BuiltQuery {
    /// Bind values in execution order, ready for `sqlx::query_with` and
    /// friends.
    pub fn to_arguments(&self) -> Result<PgArguments, BuildError> {
        let mut arguments = PgArguments::default();
        for (index, value) in self.args.iter().enumerate() {
            let added = match value {
                Value::Str(s) => arguments.add(s.as_str()),
                Value::Int(i) => arguments.add(i),
                Value::Float(f) => arguments.add(f),
                Value::Bool(b) => arguments.add(b),
                Value::Null => arguments.add(Option::<String>::None),
                Value::StrArray(items) => arguments.add(items),
            };
            if added.is_err() {
                return Err(BuildError::UnsupportedBindValue { index });
            }
        }
        Ok(arguments)
    }
}

/// Builder for one listing query against a parent table.
pub struct ListQueryBuilder<'a> {
    table: String,
    options: &'a QueryOptions,
    joins: Vec<JoinConfig>,
}

impl<'a> ListQueryBuilder<'a> {
    /// Target `table` with the given description and no joins.
    pub fn new(table: impl Into<String>, options: &'a QueryOptions) -> Self {
        Self {
            table: table.into(),
            options,
            joins: Vec::new(),
        }
    }

    /// Use pre-resolved joins.
    #[must_use]
    pub fn with_joins(mut self, joins: Vec<JoinConfig>) -> Self {
        self.joins = joins;
        self
    }

    /// Resolve joins from a single table's registry.
    #[must_use]
    pub fn with_registry(self, registry: &RelationshipRegistry) -> Self {
        let joins = registry.generate_joins(self.options);
        self.with_joins(joins)
    }

    /// Resolve joins across a registry graph, multi-hop paths included.
    #[must_use]
    pub fn with_graph(self, manager: &RegistryManager) -> Self {
        let joins = manager.generate_joins(&self.table, self.options);
        self.with_joins(joins)
    }

    /// Build the data query: SELECT with joins, filters, search, ordering,
    /// and pagination.
    pub fn build(&self) -> Result<BuiltQuery, BuildError> {
        let mut query = Query::select();
        query.column((Alias::new(&self.table), Asterisk));
        query.from(Alias::new(&self.table));

        self.apply_joins(&mut query);
        self.apply_conditions(&mut query)?;
        self.apply_filters(&mut query);
        self.apply_or_filters(&mut query);
        self.apply_search(&mut query);
        self.apply_order(&mut query);
        self.apply_pagination(&mut query);

        finish(&query)
    }

    /// Build the COUNT query over the same filtered set: the WHERE-producing
    /// stages only, no ORDER BY and no pagination.
    pub fn build_count(&self) -> Result<BuiltQuery, BuildError> {
        let mut query = Query::select();
        query.expr(Expr::col(Asterisk).count());
        query.from(Alias::new(&self.table));

        self.apply_joins(&mut query);
        self.apply_conditions(&mut query)?;
        self.apply_filters(&mut query);
        self.apply_or_filters(&mut query);
        self.apply_search(&mut query);

        finish(&query)
    }

    fn apply_joins(&self, query: &mut SelectStatement) {
        for join in &self.joins {
            let condition = Expr::cust(join.condition.clone());
            match &join.alias {
                Some(alias) => {
                    query.join_as(
                        sea_query::JoinType::LeftJoin,
                        Alias::new(&join.table),
                        Alias::new(alias),
                        condition,
                    );
                }
                None => {
                    query.join(
                        sea_query::JoinType::LeftJoin,
                        Alias::new(&join.table),
                        condition,
                    );
                }
            }
        }
    }

    /// Operator-aware comparisons. Null rewrites to `IS NULL` under `eq`
    /// and `IS NOT NULL` under `ne`, matching the equality filters; range
    /// operators take neither null nor array values. Unknown operators
    /// fail the build: if one gets this far, validation was bypassed, and
    /// dropping the condition would silently widen the result set.
    fn apply_conditions(&self, query: &mut SelectStatement) -> Result<(), BuildError> {
        for condition in &self.options.filter_conditions {
            let Some(op) = CompareOp::parse(&condition.operator) else {
                return Err(BuildError::UnknownOperator {
                    column: condition.column.clone(),
                    operator: condition.operator.clone(),
                });
            };
            let column = self.column_expr(&condition.column);
            let expr = match (&condition.value, op) {
                (Value::StrArray(items), CompareOp::Eq) => column.is_in(items.iter().cloned()),
                (Value::Null, CompareOp::Eq) => column.is_null(),
                (Value::Null, CompareOp::Ne) => column.is_not_null(),
                (Value::StrArray(_), _) | (Value::Null, _) => {
                    return Err(BuildError::InvalidConditionValue {
                        column: condition.column.clone(),
                        operator: condition.operator.clone(),
                    });
                }
                (value, CompareOp::Eq) => column.eq(sql_value(value)),
                (value, CompareOp::Ne) => column.ne(sql_value(value)),
                (value, CompareOp::Gt) => column.gt(sql_value(value)),
                (value, CompareOp::Gte) => column.gte(sql_value(value)),
                (value, CompareOp::Lt) => column.lt(sql_value(value)),
                (value, CompareOp::Lte) => column.lte(sql_value(value)),
            };
            query.and_where(expr);
        }
        Ok(())
    }

    /// Legacy equality filters, AND-combined.
    fn apply_filters(&self, query: &mut SelectStatement) {
        for (column, value) in &self.options.filter {
            query.and_where(self.equality_expr(column, value));
        }
    }

    /// OR-combined equality filters as one group.
    fn apply_or_filters(&self, query: &mut SelectStatement) {
        if self.options.filter_or.is_empty() {
            return;
        }
        let mut group = Cond::any();
        for (column, value) in &self.options.filter_or {
            group = group.add(self.equality_expr(column, value));
        }
        query.and_where(group.into());
    }

    /// Case-insensitive substring search as one OR group. Wildcards in the
    /// term are escaped before wrapping, so `50%` matches literally.
    fn apply_search(&self, query: &mut SelectStatement) {
        if self.options.search.is_empty() {
            return;
        }
        let mut group = Cond::any();
        for (column, term) in &self.options.search {
            let pattern = format!("%{}%", escape_like_wildcards(&term.as_text()));
            group = group.add(self.column_expr(column).ilike(pattern));
        }
        query.and_where(group.into());
    }

    fn apply_order(&self, query: &mut SelectStatement) {
        if self.options.order.is_empty() {
            query.order_by_expr(self.order_column_expr("created_at"), Order::Desc);
            return;
        }
        for (column, direction) in &self.options.order {
            let order = if direction.eq_ignore_ascii_case("desc") {
                Order::Desc
            } else {
                Order::Asc
            };
            query.order_by_expr(self.order_column_expr(column), order);
        }
    }

    fn apply_pagination(&self, query: &mut SelectStatement) {
        let limit = if self.options.limit == 0 {
            DEFAULT_LIMIT
        } else {
            self.options.limit
        };
        let page = self.options.page.max(1);
        query.limit(u64::from(limit));
        query.offset(u64::from(page - 1) * u64::from(limit));
    }

    /// Equality expression shared by `filter` and `filter_or`: arrays become
    /// IN lists, null becomes IS NULL.
    fn equality_expr(&self, column: &str, value: &Value) -> SimpleExpr {
        let column = self.column_expr(column);
        match value {
            Value::StrArray(items) => column.is_in(items.iter().cloned()),
            Value::Null => column.is_null(),
            value => column.eq(sql_value(value)),
        }
    }

    /// Column expression with dotted-path resolution: references with three
    /// or more segments collapse to their last two (the joined table's
    /// name), two-segment references qualify as written, bare names stay
    /// bare.
    fn column_expr(&self, column: &str) -> SimpleExpr {
        let segments: Vec<&str> = column.split('.').collect();
        match segments.as_slice() {
            [.., table, column] => Expr::col((Alias::new(*table), Alias::new(*column))).into(),
            _ => Expr::col(Alias::new(column)).into(),
        }
    }

    /// As [`Self::column_expr`], but bare columns are qualified with the
    /// parent table whenever joins are present, keeping ORDER BY unambiguous
    /// once other tables share the column name.
    fn order_column_expr(&self, column: &str) -> SimpleExpr {
        if !column.contains('.') && !self.joins.is_empty() {
            return Expr::col((Alias::new(&self.table), Alias::new(column))).into();
        }
        self.column_expr(column)
    }
}

fn finish(query: &SelectStatement) -> Result<BuiltQuery, BuildError> {
    let (sql, values) = query.build(PostgresQueryBuilder);
    let mut args = Vec::with_capacity(values.0.len());
    for (index, value) in values.0.into_iter().enumerate() {
        match from_sql_value(value) {
            Some(value) => args.push(value),
            None => return Err(BuildError::UnsupportedBindValue { index }),
        }
    }
    debug!(params = args.len(), "built listing SQL");
    Ok(BuiltQuery { sql, args })
}

/// Map an engine value onto a SeaQuery bind value. Callers rewrite arrays
/// into IN lists and nulls into null checks first; a stray array binds as
/// its text form, a stray null as a NULL parameter.
fn sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Str(s) => s.clone().into(),
        Value::Int(i) => (*i).into(),
        Value::Float(f) => (*f).into(),
        Value::Bool(b) => (*b).into(),
        Value::Null => SqlValue::String(None),
        Value::StrArray(items) => items.join(",").into(),
    }
}

/// Map a SeaQuery bind value back onto the engine's value type. SeaQuery
/// also routes LIMIT/OFFSET and search patterns through here, so the
/// integer and string families must round-trip.
fn from_sql_value(value: SqlValue) -> Option<Value> {
    match value {
        SqlValue::Bool(Some(b)) => Some(Value::Bool(b)),
        SqlValue::Int(Some(i)) => Some(Value::Int(i64::from(i))),
        SqlValue::BigInt(Some(i)) => Some(Value::Int(i)),
        SqlValue::Unsigned(Some(u)) => Some(Value::Int(i64::from(u))),
        SqlValue::BigUnsigned(Some(u)) => i64::try_from(u).ok().map(Value::Int),
        SqlValue::Float(Some(f)) => Some(Value::Float(f64::from(f))),
        SqlValue::Double(Some(f)) => Some(Value::Float(f)),
        SqlValue::String(Some(s)) => Some(Value::Str(*s)),
        SqlValue::Bool(None)
        | SqlValue::Int(None)
        | SqlValue::BigInt(None)
        | SqlValue::Unsigned(None)
        | SqlValue::BigUnsigned(None)
        | SqlValue::Float(None)
        | SqlValue::Double(None)
        | SqlValue::String(None) => Some(Value::Null),
        _ => None,
    }
}

/// Escape SQL LIKE wildcard characters (`%`, `_`, `\`) in a search term.
fn escape_like_wildcards(term: &str) -> String {
    term.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
