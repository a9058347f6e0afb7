//! Listing query description types.
//!
//! The data model shared by the parser, validator, join resolver, and SQL
//! builder:
//! - `QueryOptions`: one parsed (not yet validated) listing request
//! - `FilterCondition`: a single column/operator/value comparison
//! - `Value`: the closed set of filter value kinds
//! - `PaginationMeta` / `Paginated`: the paged result envelope

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Page size applied when a request carries none (or zero).
pub const DEFAULT_LIMIT: u32 = 10;

/// A filter, search, or static-condition value.
///
/// The set is closed so SQL generation can match exhaustively; a new value
/// kind cannot slip through an open-ended fallback arm unnoticed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    StrArray(Vec<String>),
}

impl Value {
    /// Text form of the value, used to build search patterns.
    pub fn as_text(&self) -> String {
        match self {
            Value::Str(s) => s.clone(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Null => String::new(),
            Value::StrArray(items) => items.join(","),
        }
    }

    /// Render as a SQL literal. Only trusted wiring-time values (static join
    /// conditions) go through here; request values always bind as
    /// parameters.
    pub(crate) fn sql_literal(&self) -> String {
        match self {
            Value::Str(s) => format!("'{}'", s.replace('\'', "''")),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Bool(true) => "TRUE".to_string(),
            Value::Bool(false) => "FALSE".to_string(),
            Value::Null => "NULL".to_string(),
            Value::StrArray(items) => {
                let quoted: Vec<String> = items
                    .iter()
                    .map(|item| format!("'{}'", item.replace('\'', "''")))
                    .collect();
                format!("({})", quoted.join(", "))
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Vec<String>> for Value {
    fn from(items: Vec<String>) -> Self {
        Value::StrArray(items)
    }
}

/// One of the six comparison operators, parsed from its wire spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CompareOp {
    /// All operators in wire spelling.
    pub const NAMES: [&'static str; 6] = ["eq", "ne", "gt", "gte", "lt", "lte"];

    /// Parse a wire operator string. Operators are lowercase on the wire;
    /// anything else is unknown.
    pub fn parse(op: &str) -> Option<Self> {
        match op {
            "eq" => Some(CompareOp::Eq),
            "ne" => Some(CompareOp::Ne),
            "gt" => Some(CompareOp::Gt),
            "gte" => Some(CompareOp::Gte),
            "lt" => Some(CompareOp::Lt),
            "lte" => Some(CompareOp::Lte),
            _ => None,
        }
    }

    /// The wire spelling.
    pub fn as_str(self) -> &'static str {
        match self {
            CompareOp::Eq => "eq",
            CompareOp::Ne => "ne",
            CompareOp::Gt => "gt",
            CompareOp::Gte => "gte",
            CompareOp::Lt => "lt",
            CompareOp::Lte => "lte",
        }
    }
}

/// A single column comparison (`column operator value`).
///
/// The operator travels as its wire string rather than a [`CompareOp`] so a
/// hand-built description can carry an unknown operator to the validator,
/// which is the layer that rejects it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterCondition {
    pub column: String,
    pub operator: String,
    pub value: Value,
}

impl FilterCondition {
    pub fn new(
        column: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        Self {
            column: column.into(),
            operator: operator.into(),
            value: value.into(),
        }
    }
}

/// Parsed listing request: everything a list endpoint accepts beyond its
/// route parameters.
///
/// A `QueryOptions` is untrusted until it passes a
/// [`QueryRules`](super::QueryRules) check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryOptions {
    /// 1-based page number.
    #[serde(default = "default_page")]
    pub page: u32,
    /// Requested page size; each endpoint's rules cap it.
    #[serde(default = "default_limit")]
    pub limit: u32,
    /// AND-combined equality filters. Every `eq` entry of
    /// `filter_conditions` is mirrored here.
    #[serde(default)]
    pub filter: BTreeMap<String, Value>,
    /// Operator-aware comparisons, AND-combined, in wire order.
    #[serde(default)]
    pub filter_conditions: Vec<FilterCondition>,
    /// OR-combined equality filters.
    #[serde(default)]
    pub filter_or: BTreeMap<String, Value>,
    /// OR-combined case-insensitive substring searches.
    #[serde(default)]
    pub search: BTreeMap<String, Value>,
    /// Sort columns with `ASC`/`DESC` direction, applied in order.
    #[serde(default)]
    pub order: Vec<(String, String)>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_LIMIT,
            filter: BTreeMap::new(),
            filter_conditions: Vec::new(),
            filter_or: BTreeMap::new(),
            search: BTreeMap::new(),
            order: Vec::new(),
        }
    }
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set page and page size together.
    #[must_use]
    pub fn paged(mut self, page: u32, limit: u32) -> Self {
        self.page = page;
        self.limit = limit;
        self
    }

    /// Add an AND equality filter.
    #[must_use]
    pub fn with_filter(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter.insert(column.into(), value.into());
        self
    }

    /// Add an operator comparison. An `eq` comparison is mirrored into
    /// `filter` to keep the two shapes consistent.
    #[must_use]
    pub fn with_condition(
        mut self,
        column: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        let condition = FilterCondition::new(column, operator, value);
        if condition.operator == "eq" {
            self.filter
                .insert(condition.column.clone(), condition.value.clone());
        }
        self.filter_conditions.push(condition);
        self
    }

    /// Add an OR equality filter.
    #[must_use]
    pub fn with_or_filter(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter_or.insert(column.into(), value.into());
        self
    }

    /// Add a search term for a column.
    #[must_use]
    pub fn with_search(mut self, column: impl Into<String>, term: impl Into<Value>) -> Self {
        self.search.insert(column.into(), term.into());
        self
    }

    /// Append a sort column. The direction is normalized to uppercase.
    #[must_use]
    pub fn order_by(mut self, column: impl Into<String>, direction: impl Into<String>) -> Self {
        self.order
            .push((column.into(), direction.into().to_uppercase()));
        self
    }
}

/// Metadata describing one page of a listing.
///
/// `previous_page` and `next_page` serialize as the page number or literal
/// `false`, which is what the journal's API clients expect of the paging
/// envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationMeta {
    pub page: u32,
    pub limit: u32,
    /// Records on this page (0 past the last page).
    pub count: u32,
    #[serde(with = "page_link")]
    pub previous_page: Option<u32>,
    #[serde(with = "page_link")]
    pub next_page: Option<u32>,
    pub page_count: u64,
    pub total_records: u64,
}

impl PaginationMeta {
    /// Derive the metadata for page `page` of `total_records` rows.
    ///
    /// Out-of-range inputs are normalized the same way the SQL builder
    /// normalizes them: page 0 becomes 1, limit 0 becomes
    /// [`DEFAULT_LIMIT`].
    pub fn compute(page: u32, limit: u32, total_records: u64) -> Self {
        let page = page.max(1);
        let limit = if limit == 0 { DEFAULT_LIMIT } else { limit };
        let page_count = total_records.div_ceil(u64::from(limit));
        let offset = u64::from(page - 1) * u64::from(limit);
        let count = total_records
            .saturating_sub(offset)
            .min(u64::from(limit)) as u32;
        let previous_page = if page > 1 { Some(page - 1) } else { None };
        let next_page = if u64::from(page) < page_count {
            Some(page + 1)
        } else {
            None
        };
        Self {
            page,
            limit,
            count,
            previous_page,
            next_page,
            page_count,
            total_records,
        }
    }
}

/// Paged result envelope: `{ "data": [...], "meta": {...} }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub meta: PaginationMeta,
}

impl<T> Paginated<T> {
    /// Wrap one page of rows with computed metadata.
    pub fn new(data: Vec<T>, page: u32, limit: u32, total_records: u64) -> Self {
        Self {
            meta: PaginationMeta::compute(page, limit, total_records),
            data,
        }
    }

    /// An empty result for the given page window.
    pub fn empty(page: u32, limit: u32) -> Self {
        Self::new(Vec::new(), page, limit, 0)
    }
}

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    DEFAULT_LIMIT
}

/// Serialize optional page links as the page number or literal `false`.
mod page_link {
    use serde::Deserialize;
    use serde::de::{self, Deserializer, Unexpected};
    use serde::ser::Serializer;

    pub fn serialize<S: Serializer>(link: &Option<u32>, serializer: S) -> Result<S::Ok, S::Error> {
        match link {
            Some(page) => serializer.serialize_u32(*page),
            None => serializer.serialize_bool(false),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Page(u32),
            Flag(bool),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Page(page) => Ok(Some(page)),
            Raw::Flag(false) => Ok(None),
            Raw::Flag(true) => Err(de::Error::invalid_value(
                Unexpected::Bool(true),
                &"a page number or false",
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
