//! Listing engine error types.

use thiserror::Error;

/// Rejection produced by [`QueryRules::check`](super::QueryRules::check).
///
/// Each variant names the offending column, operator, or bound so handlers
/// can turn it into a useful bad-request message without re-inspecting the
/// query.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("filtering on '{0}' is not allowed")]
    FilterColumnNotAllowed(String),

    #[error("searching on '{0}' is not allowed")]
    SearchColumnNotAllowed(String),

    #[error("ordering by '{0}' is not allowed")]
    OrderColumnNotAllowed(String),

    #[error("invalid order direction '{direction}' for column '{column}'")]
    InvalidOrderDirection { column: String, direction: String },

    #[error("invalid column identifier '{0}'")]
    InvalidIdentifier(String),

    #[error("page must be at least 1")]
    PageOutOfRange,

    #[error("limit must be between 1 and {max}, got {limit}")]
    LimitOutOfRange { limit: u32, max: u32 },

    #[error("missing required filter on '{0}'")]
    MissingScopeFilter(String),

    #[error("unknown filter operator '{operator}' on column '{column}'")]
    UnknownOperator { column: String, operator: String },

    #[error("operator '{operator}' is not allowed on column '{column}'")]
    OperatorNotAllowed { column: String, operator: String },
}

/// Failure while assembling SQL from a query description.
///
/// These indicate a description that bypassed validation (or a bug in the
/// wiring), not bad user input: a description that passed its rules cannot
/// trigger them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("unknown filter operator '{operator}' on column '{column}'")]
    UnknownOperator { column: String, operator: String },

    #[error("unsupported value for operator '{operator}' on column '{column}'")]
    InvalidConditionValue { column: String, operator: String },

    #[error("unsupported bind value at parameter {index}")]
    UnsupportedBindValue { index: usize },
}
