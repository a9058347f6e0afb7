//! Wire-format parser for listing query parameters.
//!
//! Turns bracket-notation parameters (`filter[status]=active`,
//! `filter[distance][lt]=10`, `order[created_at]=desc`) into a
//! [`QueryOptions`]. The parser is deliberately permissive: malformed
//! parameters fall back to defaults or are dropped, never rejected.
//! Rejection is the validator's job, and only validated descriptions reach
//! the SQL builder.

use super::types::{FilterCondition, QueryOptions, Value};

/// Parse already-decoded key/value pairs into a query description.
///
/// Pair order matters only within one parameter family: repeated map keys
/// keep the last value, repeated conditions and sort columns accumulate.
pub fn parse_query<I, K, V>(pairs: I) -> QueryOptions
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut options = QueryOptions::default();
    for (key, value) in pairs {
        apply_pair(&mut options, key.as_ref(), value.as_ref());
    }
    options
}

/// Parse a raw query string (the part after `?`), percent-decoding keys and
/// values first. Pairs that fail to decode are dropped.
pub fn parse_query_str(query: &str) -> QueryOptions {
    let pairs = query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter_map(|pair| {
            let (key, value) = match pair.split_once('=') {
                Some((key, value)) => (key, value),
                None => (pair, ""),
            };
            let key = urlencoding::decode(key).ok()?;
            let value = urlencoding::decode(value).ok()?;
            Some((key.into_owned(), value.into_owned()))
        });
    parse_query(pairs)
}

fn apply_pair(options: &mut QueryOptions, key: &str, raw: &str) {
    let Some((root, segments)) = split_bracket_key(key) else {
        return;
    };
    match (root, segments.as_slice()) {
        ("page", []) => {
            if let Ok(page) = raw.trim().parse::<u32>() {
                if page >= 1 {
                    options.page = page;
                }
            }
        }
        ("limit", []) => {
            if let Ok(limit) = raw.trim().parse::<u32>() {
                if limit >= 1 {
                    options.limit = limit;
                }
            }
        }
        ("filter", [column]) => {
            let value = coerce(raw);
            options.filter.insert((*column).to_string(), value.clone());
            options
                .filter_conditions
                .push(FilterCondition::new(*column, "eq", value));
        }
        ("filter", [column, operator]) => {
            let value = coerce(raw);
            if *operator == "eq" {
                options.filter.insert((*column).to_string(), value.clone());
            }
            options
                .filter_conditions
                .push(FilterCondition::new(*column, *operator, value));
        }
        ("filterOr", [column]) => {
            options.filter_or.insert((*column).to_string(), coerce(raw));
        }
        ("search", [column]) => {
            options.search.insert((*column).to_string(), coerce(raw));
        }
        ("order", [column]) => {
            options
                .order
                .push(((*column).to_string(), raw.trim().to_uppercase()));
        }
        // Unknown roots and uninterpreted bracket depths carry no meaning.
        _ => {}
    }
}

/// Split `root[a][b]` into `("root", ["a", "b"])`.
///
/// Returns `None` for keys with no usable shape: an empty root, an
/// unmatched opening bracket, or stray text between bracket groups.
fn split_bracket_key(key: &str) -> Option<(&str, Vec<&str>)> {
    let Some(open) = key.find('[') else {
        if key.is_empty() {
            return None;
        }
        return Some((key, Vec::new()));
    };
    let root = &key[..open];
    if root.is_empty() {
        return None;
    }
    let mut segments = Vec::new();
    let mut rest = &key[open..];
    while !rest.is_empty() {
        if !rest.starts_with('[') {
            return None;
        }
        let close = rest.find(']')?;
        segments.push(&rest[1..close]);
        rest = &rest[close + 1..];
    }
    Some((root, segments))
}

/// Coerce a raw wire value into its typed form.
///
/// `true`/`false`/`null` are keywords, `[a, b]` is a string list, and
/// numeric text becomes an integer or float. Everything else stays a
/// string. Coercion never fails; ambiguous input is just a string.
fn coerce(raw: &str) -> Value {
    let trimmed = raw.trim();
    match trimmed {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        "null" => return Value::Null,
        _ => {}
    }
    if let Some(inner) = trimmed
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
    {
        if inner.trim().is_empty() {
            return Value::StrArray(Vec::new());
        }
        return Value::StrArray(
            inner
                .split(',')
                .map(|item| item.trim().to_string())
                .collect(),
        );
    }
    if let Ok(int) = trimmed.parse::<i64>() {
        return Value::Int(int);
    }
    if let Ok(float) = trimmed.parse::<f64>() {
        return Value::Float(float);
    }
    Value::Str(trimmed.to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn two_level_filter_fills_map_and_conditions() {
        let options = parse_query([("filter[status]", "active")]);
        assert_eq!(
            options.filter.get("status"),
            Some(&Value::Str("active".to_string()))
        );
        assert_eq!(options.filter_conditions.len(), 1);
        let condition = &options.filter_conditions[0];
        assert_eq!(condition.column, "status");
        assert_eq!(condition.operator, "eq");
        assert_eq!(condition.value, Value::Str("active".to_string()));
    }

    #[test]
    fn three_level_filter_keeps_operator() {
        let options = parse_query([("filter[distance][lt]", "10")]);
        assert!(options.filter.is_empty());
        let condition = &options.filter_conditions[0];
        assert_eq!(condition.operator, "lt");
        assert_eq!(condition.value, Value::Int(10));
    }

    #[test]
    fn three_level_eq_mirrors_into_filter() {
        let options = parse_query([("filter[kind][eq]", "run")]);
        assert_eq!(
            options.filter.get("kind"),
            Some(&Value::Str("run".to_string()))
        );
        assert_eq!(options.filter_conditions[0].operator, "eq");
    }

    #[test]
    fn unknown_operator_is_preserved_for_validation() {
        let options = parse_query([("filter[title][like]", "x")]);
        assert_eq!(options.filter_conditions[0].operator, "like");
        assert!(options.filter.is_empty());
    }

    #[test]
    fn deep_bracket_keys_are_dropped() {
        let options = parse_query([("filter[a][b][c]", "x")]);
        assert!(options.filter.is_empty());
        assert!(options.filter_conditions.is_empty());
    }

    #[test]
    fn malformed_keys_are_dropped() {
        let options = parse_query([
            ("filter[status", "active"),
            ("filter[a]b[c]", "x"),
            ("[status]", "active"),
            ("", "x"),
        ]);
        assert_eq!(options, QueryOptions::default());
    }

    #[test]
    fn unknown_roots_are_ignored() {
        let options = parse_query([("include[user]", "true"), ("foo", "bar")]);
        assert_eq!(options, QueryOptions::default());
    }

    #[test]
    fn page_and_limit_parse_with_fallbacks() {
        let options = parse_query([("page", "3"), ("limit", "25")]);
        assert_eq!(options.page, 3);
        assert_eq!(options.limit, 25);

        let options = parse_query([("page", "abc"), ("limit", "-5")]);
        assert_eq!(options.page, 1);
        assert_eq!(options.limit, 10);

        let options = parse_query([("page", "0"), ("limit", "0")]);
        assert_eq!(options.page, 1);
        assert_eq!(options.limit, 10);
    }

    #[test]
    fn order_direction_normalizes_to_uppercase() {
        let options = parse_query([("order[created_at]", "desc"), ("order[title]", "Asc")]);
        assert_eq!(
            options.order,
            vec![
                ("created_at".to_string(), "DESC".to_string()),
                ("title".to_string(), "ASC".to_string()),
            ]
        );
    }

    #[test]
    fn values_coerce_by_shape() {
        assert_eq!(coerce("true"), Value::Bool(true));
        assert_eq!(coerce("false"), Value::Bool(false));
        assert_eq!(coerce("null"), Value::Null);
        assert_eq!(coerce("42"), Value::Int(42));
        assert_eq!(coerce("-7"), Value::Int(-7));
        assert_eq!(coerce("4.5"), Value::Float(4.5));
        assert_eq!(coerce("running"), Value::Str("running".to_string()));
        assert_eq!(
            coerce("[a, b,c ]"),
            Value::StrArray(vec!["a".to_string(), "b".to_string(), "c".to_string()])
        );
        assert_eq!(coerce("[]"), Value::StrArray(Vec::new()));
        assert_eq!(coerce("[a, b"), Value::Str("[a, b".to_string()));
        assert_eq!(coerce("  past  "), Value::Str("past".to_string()));
    }

    #[test]
    fn repeated_map_keys_keep_last_value() {
        let options = parse_query([("filter[status]", "draft"), ("filter[status]", "active")]);
        assert_eq!(
            options.filter.get("status"),
            Some(&Value::Str("active".to_string()))
        );
        // Both comparisons are kept in wire order.
        assert_eq!(options.filter_conditions.len(), 2);
    }

    #[test]
    fn query_string_round_trip() {
        let options = parse_query_str(
            "page=2&limit=5&filter%5Bstatus%5D=active&search[title]=morning%20run&order[occurred_at]=desc",
        );
        assert_eq!(options.page, 2);
        assert_eq!(options.limit, 5);
        assert_eq!(
            options.filter.get("status"),
            Some(&Value::Str("active".to_string()))
        );
        assert_eq!(
            options.search.get("title"),
            Some(&Value::Str("morning run".to_string()))
        );
        assert_eq!(
            options.order,
            vec![("occurred_at".to_string(), "DESC".to_string())]
        );
    }

    #[test]
    fn empty_query_string_yields_defaults() {
        assert_eq!(parse_query_str(""), QueryOptions::default());
        assert_eq!(parse_query_str("&&"), QueryOptions::default());
    }

    #[test]
    fn dotted_paths_travel_inside_one_segment() {
        let options = parse_query([("filter[tags.name]", "fitness")]);
        assert_eq!(
            options.filter.get("tags.name"),
            Some(&Value::Str("fitness".to_string()))
        );
    }
}
