//! Whitelist validation for listing queries.
//!
//! Every list endpoint owns a [`QueryRules`] naming the columns that may be
//! filtered, searched, and ordered, the operators each column accepts, the
//! page-size ceiling, and whether a scope filter is mandatory. [`check`]
//! runs those rules against a parsed description and reports the first
//! violation. Rules are assembled once at startup and shared read-only.
//!
//! [`check`]: QueryRules::check

use std::collections::{HashMap, HashSet};

use super::error::ValidationError;
use super::types::{CompareOp, QueryOptions};

/// Page-size ceiling applied when a rule set does not override it.
pub const MAX_LIMIT: u32 = 100;

/// Longest accepted column reference, matching the PostgreSQL identifier
/// limit.
const MAX_IDENTIFIER_LEN: usize = 63;

/// Whitelists and bounds for one list endpoint.
///
/// Column matching is case-insensitive; whitelists are stored lowercase.
/// An empty rule set rejects every column, so a forgotten whitelist fails
/// closed.
#[derive(Debug, Clone)]
pub struct QueryRules {
    filterable: HashSet<String>,
    searchable: HashSet<String>,
    orderable: HashSet<String>,
    operators: HashMap<String, Vec<String>>,
    max_limit: u32,
    scope_column: Option<String>,
}

impl Default for QueryRules {
    fn default() -> Self {
        Self {
            filterable: HashSet::new(),
            searchable: HashSet::new(),
            orderable: HashSet::new(),
            operators: HashMap::new(),
            max_limit: MAX_LIMIT,
            scope_column: None,
        }
    }
}

impl QueryRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Columns accepted in `filter`, `filter_or`, and `filter_conditions`.
    #[must_use]
    pub fn filterable<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filterable = lowercase_set(columns);
        self
    }

    /// Columns accepted in `search`.
    #[must_use]
    pub fn searchable<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.searchable = lowercase_set(columns);
        self
    }

    /// Columns accepted in `order`.
    #[must_use]
    pub fn orderable<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.orderable = lowercase_set(columns);
        self
    }

    /// Restrict a column to a subset of the comparison operators. Columns
    /// without an entry accept all six.
    #[must_use]
    pub fn allow_operators<I, S>(mut self, column: impl Into<String>, operators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.operators.insert(
            column.into().to_lowercase(),
            operators.into_iter().map(Into::into).collect(),
        );
        self
    }

    /// Lower the page-size ceiling for this endpoint.
    #[must_use]
    pub fn max_limit(mut self, max: u32) -> Self {
        self.max_limit = max;
        self
    }

    /// Require an equality filter on `column`. Listings scoped to one user
    /// use this so a request can never widen itself to other users' rows.
    #[must_use]
    pub fn require_scope(mut self, column: impl Into<String>) -> Self {
        self.scope_column = Some(column.into());
        self
    }

    /// Check a parsed description against the rules, reporting the first
    /// violation. The description is not modified.
    pub fn check(&self, options: &QueryOptions) -> Result<(), ValidationError> {
        for column in options.filter.keys() {
            self.check_filter_column(column)?;
        }
        for column in options.filter_or.keys() {
            self.check_filter_column(column)?;
        }

        for column in options.search.keys() {
            check_identifier(column)?;
            if !self.searchable.contains(&column.to_lowercase()) {
                return Err(ValidationError::SearchColumnNotAllowed(column.clone()));
            }
        }

        for (column, direction) in &options.order {
            check_identifier(column)?;
            if !self.orderable.contains(&column.to_lowercase()) {
                return Err(ValidationError::OrderColumnNotAllowed(column.clone()));
            }
            if !direction.eq_ignore_ascii_case("asc") && !direction.eq_ignore_ascii_case("desc") {
                return Err(ValidationError::InvalidOrderDirection {
                    column: column.clone(),
                    direction: direction.clone(),
                });
            }
        }

        if options.page < 1 {
            return Err(ValidationError::PageOutOfRange);
        }
        if options.limit < 1 || options.limit > self.max_limit {
            return Err(ValidationError::LimitOutOfRange {
                limit: options.limit,
                max: self.max_limit,
            });
        }

        if let Some(scope) = &self.scope_column {
            let present = options
                .filter
                .keys()
                .any(|column| column.eq_ignore_ascii_case(scope));
            if !present {
                return Err(ValidationError::MissingScopeFilter(scope.clone()));
            }
        }

        for condition in &options.filter_conditions {
            self.check_filter_column(&condition.column)?;
            if CompareOp::parse(&condition.operator).is_none() {
                return Err(ValidationError::UnknownOperator {
                    column: condition.column.clone(),
                    operator: condition.operator.clone(),
                });
            }
            if let Some(allowed) = self.operators.get(&condition.column.to_lowercase()) {
                if !allowed.iter().any(|op| op == &condition.operator) {
                    return Err(ValidationError::OperatorNotAllowed {
                        column: condition.column.clone(),
                        operator: condition.operator.clone(),
                    });
                }
            }
        }

        Ok(())
    }

    fn check_filter_column(&self, column: &str) -> Result<(), ValidationError> {
        check_identifier(column)?;
        if !self.filterable.contains(&column.to_lowercase()) {
            return Err(ValidationError::FilterColumnNotAllowed(column.to_string()));
        }
        Ok(())
    }
}

fn lowercase_set<I, S>(columns: I) -> HashSet<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    columns
        .into_iter()
        .map(|column| column.into().to_lowercase())
        .collect()
}

/// Column-reference syntax gate, independent of the whitelists: an ASCII
/// letter followed by letters, digits, underscores, or dots, at most 63
/// bytes. Anything SQL-shaped fails here even if a whitelist somehow
/// contained it.
fn check_identifier(column: &str) -> Result<(), ValidationError> {
    let well_formed = column.len() <= MAX_IDENTIFIER_LEN
        && column.starts_with(|c: char| c.is_ascii_alphabetic())
        && column
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
    if well_formed {
        Ok(())
    } else {
        Err(ValidationError::InvalidIdentifier(column.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::listing::QueryOptions;

    fn rules() -> QueryRules {
        QueryRules::new()
            .filterable(["status", "distance", "tags.name"])
            .searchable(["title"])
            .orderable(["created_at", "distance"])
    }

    #[test]
    fn empty_options_pass_default_rules() {
        assert!(QueryRules::new().check(&QueryOptions::default()).is_ok());
    }

    #[test]
    fn unlisted_filter_column_is_rejected() {
        let options = QueryOptions::new().with_filter("password", "x");
        assert_eq!(
            rules().check(&options),
            Err(ValidationError::FilterColumnNotAllowed(
                "password".to_string()
            ))
        );
    }

    #[test]
    fn filter_or_uses_the_filter_whitelist() {
        let options = QueryOptions::new().with_or_filter("password", "x");
        assert!(matches!(
            rules().check(&options),
            Err(ValidationError::FilterColumnNotAllowed(_))
        ));
    }

    #[test]
    fn column_match_is_case_insensitive() {
        let options = QueryOptions::new().with_filter("STATUS", "active");
        assert!(rules().check(&options).is_ok());
    }

    #[test]
    fn search_and_order_have_their_own_whitelists() {
        let options = QueryOptions::new().with_search("status", "x");
        assert!(matches!(
            rules().check(&options),
            Err(ValidationError::SearchColumnNotAllowed(_))
        ));

        let options = QueryOptions::new().order_by("status", "asc");
        assert!(matches!(
            rules().check(&options),
            Err(ValidationError::OrderColumnNotAllowed(_))
        ));
    }

    #[test]
    fn bad_order_direction_is_rejected() {
        let options = QueryOptions::new().order_by("created_at", "sideways");
        assert_eq!(
            rules().check(&options),
            Err(ValidationError::InvalidOrderDirection {
                column: "created_at".to_string(),
                direction: "SIDEWAYS".to_string(),
            })
        );
    }

    #[test]
    fn limit_bounds_are_enforced() {
        let options = QueryOptions::new().paged(1, 101);
        assert_eq!(
            rules().check(&options),
            Err(ValidationError::LimitOutOfRange {
                limit: 101,
                max: 100
            })
        );

        let options = QueryOptions::new().paged(1, 0);
        assert!(matches!(
            rules().check(&options),
            Err(ValidationError::LimitOutOfRange { .. })
        ));

        let options = QueryOptions::new().paged(1, 20);
        assert!(rules().max_limit(10).check(&options).is_err());
    }

    #[test]
    fn page_zero_is_rejected() {
        let options = QueryOptions::new().paged(0, 10);
        assert_eq!(rules().check(&options), Err(ValidationError::PageOutOfRange));
    }

    #[test]
    fn scope_filter_is_required_when_configured() {
        let rules = QueryRules::new()
            .filterable(["user_id", "status"])
            .require_scope("user_id");

        let options = QueryOptions::new().with_filter("status", "active");
        assert_eq!(
            rules.check(&options),
            Err(ValidationError::MissingScopeFilter("user_id".to_string()))
        );

        let options = QueryOptions::new().with_filter("user_id", 42i64);
        assert!(rules.check(&options).is_ok());
    }

    #[test]
    fn unknown_operator_is_rejected() {
        let options = QueryOptions::new().with_condition("status", "like", "act");
        assert_eq!(
            rules().check(&options),
            Err(ValidationError::UnknownOperator {
                column: "status".to_string(),
                operator: "like".to_string(),
            })
        );
    }

    #[test]
    fn operator_whitelist_restricts_a_column() {
        let rules = rules().allow_operators("status", ["eq", "ne"]);

        let options = QueryOptions::new().with_condition("status", "gt", "a");
        assert_eq!(
            rules.check(&options),
            Err(ValidationError::OperatorNotAllowed {
                column: "status".to_string(),
                operator: "gt".to_string(),
            })
        );

        // Columns without an entry accept any known operator.
        let options = QueryOptions::new().with_condition("distance", "gt", 5i64);
        assert!(rules.check(&options).is_ok());
    }

    #[test]
    fn sql_shaped_references_fail_the_identifier_gate() {
        for column in [
            "drop table users",
            "status;--",
            "a'b",
            "1status",
            ".status",
            "",
        ] {
            let options = QueryOptions::new().with_filter(column, "x");
            assert_eq!(
                rules().check(&options),
                Err(ValidationError::InvalidIdentifier(column.to_string())),
                "expected identifier rejection for {column:?}"
            );
        }
    }

    #[test]
    fn overlong_identifier_is_rejected() {
        let column = "a".repeat(64);
        let options = QueryOptions::new().with_filter(column.as_str(), "x");
        assert!(matches!(
            rules().check(&options),
            Err(ValidationError::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn filter_errors_win_over_bound_errors() {
        // Rules run in a fixed order; the filter whitelist is consulted
        // before pagination bounds.
        let options = QueryOptions::new().with_filter("password", "x").paged(1, 500);
        assert!(matches!(
            rules().check(&options),
            Err(ValidationError::FilterColumnNotAllowed(_))
        ));
    }

    #[test]
    fn dotted_references_validate_like_plain_columns() {
        let options = QueryOptions::new().with_filter("tags.name", "fitness");
        assert!(rules().check(&options).is_ok());
    }
}
