//! Context maps threaded between stages.
//!
//! A pipeline run owns one [`ContextMap`]. Every viable stage output is
//! merged into it so later stages see earlier stages' fields.

use std::collections::HashMap;

/// The key/value context passed to nodes and returned from them.
pub type ContextMap = HashMap<String, serde_json::Value>;

/// Context key holding the query text used by the adaptive heuristic.
pub const QUERY_KEY: &str = "query";

/// Merges `update` into `context`, overwriting existing keys.
pub fn merge_into(context: &mut ContextMap, update: &ContextMap) {
    for (key, value) in update {
        context.insert(key.clone(), value.clone());
    }
}

/// Merges several updates in order; the last writer wins on shared keys.
pub fn merge_all<'a, I>(context: &mut ContextMap, updates: I)
where
    I: IntoIterator<Item = &'a ContextMap>,
{
    for update in updates {
        merge_into(context, update);
    }
}

/// Returns the length in characters of the context's query text.
///
/// A missing or non-string query counts as empty.
#[must_use]
pub fn query_len(context: &ContextMap) -> usize {
    context
        .get(QUERY_KEY)
        .and_then(serde_json::Value::as_str)
        .map_or(0, |q| q.chars().count())
}

/// Builds a context map from a JSON object value.
///
/// Non-object values produce an empty map.
#[must_use]
pub fn from_value(value: serde_json::Value) -> ContextMap {
    match value {
        serde_json::Value::Object(map) => map.into_iter().collect(),
        _ => ContextMap::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_overwrites() {
        let mut ctx = from_value(json!({"a": 1, "b": 2}));
        let update = from_value(json!({"b": 3, "c": 4}));

        merge_into(&mut ctx, &update);

        assert_eq!(ctx.get("a"), Some(&json!(1)));
        assert_eq!(ctx.get("b"), Some(&json!(3)));
        assert_eq!(ctx.get("c"), Some(&json!(4)));
    }

    #[test]
    fn test_merge_all_last_writer_wins() {
        let mut ctx = ContextMap::new();
        let first = from_value(json!({"k": "first"}));
        let second = from_value(json!({"k": "second"}));

        merge_all(&mut ctx, [&first, &second]);
        assert_eq!(ctx.get("k"), Some(&json!("second")));
    }

    #[test]
    fn test_query_len_counts_chars() {
        let ctx = from_value(json!({"query": "héllo"}));
        assert_eq!(query_len(&ctx), 5);

        assert_eq!(query_len(&ContextMap::new()), 0);
        assert_eq!(query_len(&from_value(json!({"query": 42}))), 0);
    }

    #[test]
    fn test_from_value_non_object() {
        assert!(from_value(json!([1, 2])).is_empty());
    }
}
