//! Dotted-path lookups into a source record
//!
//! A path reference is a `$`-prefixed, dot-separated field path such as
//! `$user.address.city`. Segments walk object keys; on arrays a numeric
//! segment is treated as an index. Lookups never fail: a path that walks off
//! the record (missing key, out-of-range index, descending into a scalar)
//! resolves to `None`.

use serde_json::Value;

/// Resolve a `$`-prefixed dotted path against a record.
///
/// Returns `None` when the string is not `$`-prefixed or when any step of
/// the walk has nowhere to go. The bare path `"$"` resolves to the whole
/// record.
///
/// # Examples
///
/// ```
/// use remold_blueprint::resolve_path;
/// use serde_json::json;
///
/// let record = json!({"user": {"name": "Ada"}, "tags": ["a", "b"]});
/// assert_eq!(resolve_path(&record, "$user.name"), Some(json!("Ada")));
/// assert_eq!(resolve_path(&record, "$tags.1"), Some(json!("b")));
/// assert_eq!(resolve_path(&record, "$user.missing"), None);
/// ```
pub fn resolve_path(record: &Value, path: &str) -> Option<Value> {
    let rest = path.strip_prefix('$')?;
    if rest.is_empty() {
        return Some(record.clone());
    }

    let mut cursor = record;
    for segment in rest.split('.') {
        cursor = step(cursor, segment)?;
    }
    Some(cursor.clone())
}

fn step<'a>(value: &'a Value, segment: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record() -> Value {
        json!({
            "name": "order-1",
            "customer": {
                "name": "Ada",
                "address": {"city": "London"}
            },
            "items": [
                {"sku": "A", "qty": 1},
                {"sku": "B", "qty": 2}
            ],
            "flags": {"0": "zero-key"},
            "total": null
        })
    }

    #[test]
    fn test_top_level_field() {
        assert_eq!(resolve_path(&record(), "$name"), Some(json!("order-1")));
    }

    #[test]
    fn test_nested_fields() {
        assert_eq!(
            resolve_path(&record(), "$customer.address.city"),
            Some(json!("London"))
        );
    }

    #[test]
    fn test_array_index_segment() {
        assert_eq!(resolve_path(&record(), "$items.1.sku"), Some(json!("B")));
        assert_eq!(resolve_path(&record(), "$items.5"), None);
    }

    #[test]
    fn test_numeric_object_key() {
        assert_eq!(resolve_path(&record(), "$flags.0"), Some(json!("zero-key")));
    }

    #[test]
    fn test_missing_paths_resolve_to_none() {
        assert_eq!(resolve_path(&record(), "$nope"), None);
        assert_eq!(resolve_path(&record(), "$customer.phone"), None);
        // Descending through a scalar has nowhere to go.
        assert_eq!(resolve_path(&record(), "$name.length"), None);
        // Null is a present value, but it has no children.
        assert_eq!(resolve_path(&record(), "$total"), Some(Value::Null));
        assert_eq!(resolve_path(&record(), "$total.anything"), None);
    }

    #[test]
    fn test_non_prefixed_strings_are_not_paths() {
        assert_eq!(resolve_path(&record(), "name"), None);
        assert_eq!(resolve_path(&record(), ""), None);
    }

    #[test]
    fn test_bare_dollar_resolves_whole_record() {
        assert_eq!(resolve_path(&record(), "$"), Some(record()));
    }
}
