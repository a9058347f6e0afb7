//! Listing query engine module.
//!
//! This module provides:
//! - Parser: bracket-notation wire parameters into a `QueryOptions`
//! - QueryRules: per-endpoint whitelist validation
//! - RelationshipRegistry / RegistryManager: dotted-path join resolution
//! - ListQueryBuilder: SeaQuery-based parameterized SQL generation
//! - Types: QueryOptions, FilterCondition, Value, PaginationMeta, etc.

mod error;
mod parser;
mod query_builder;
mod relations;
pub mod types;
mod validator;

pub use error::{BuildError, ValidationError};
pub use parser::{parse_query, parse_query_str};
pub use query_builder::{BuiltQuery, ListQueryBuilder};
pub use relations::{
    JoinConfig, RegistryManager, Relationship, RelationshipRegistry, StaticCondition,
};
pub use types::{
    CompareOp, DEFAULT_LIMIT, FilterCondition, Paginated, PaginationMeta, QueryOptions, Value,
};
pub use validator::{MAX_LIMIT, QueryRules};
