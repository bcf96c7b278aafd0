//! Layering of YAML configuration tiers.
//!
//! Each tier is parsed into a `serde_json::Value` and folded over the previous
//! ones: mappings merge key by key, everything else is replaced wholesale.

use serde_json::Value;

/// Deep merge two values, with `overlay` taking precedence over `base`.
///
/// A null overlay leaves the base untouched, so a tier can mention a key
/// without overriding it.
///
/// ```
/// use serde_json::json;
/// use task_board::config::deep_merge;
///
/// let defaults = json!({ "server": { "host": "127.0.0.1", "port": 8000 } });
/// let project = json!({ "server": { "port": 9000 } });
/// let merged = deep_merge(defaults, project);
/// assert_eq!(merged, json!({ "server": { "host": "127.0.0.1", "port": 9000 } }));
/// ```
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged_value = match base_map.remove(&key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => overlay_value,
                };
                base_map.insert(key, merged_value);
            }
            Value::Object(base_map)
        }
        (base, Value::Null) => base,
        (_, overlay) => overlay,
    }
}

/// Fold tiers in order, later tiers winning.
pub fn deep_merge_all(values: impl IntoIterator<Item = Value>) -> Value {
    values.into_iter().fold(Value::Null, deep_merge)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nested_sections_merge_per_key() {
        let base = json!({
            "server": {"host": "127.0.0.1", "port": 8000},
            "media": {"serve": false}
        });
        let overlay = json!({"media": {"serve": true}});
        assert_eq!(
            deep_merge(base, overlay),
            json!({
                "server": {"host": "127.0.0.1", "port": 8000},
                "media": {"serve": true}
            })
        );
    }

    #[test]
    fn null_keeps_lower_tier() {
        let base = json!({"server": {"port": 8000}});
        let overlay = json!({"server": {"port": null}});
        assert_eq!(deep_merge(base, overlay), json!({"server": {"port": 8000}}));
    }

    #[test]
    fn scalars_and_sequences_are_replaced() {
        let base = json!({"hosts": ["a", "b"], "port": {"nested": 1}});
        let overlay = json!({"hosts": ["c"], "port": 9000});
        assert_eq!(
            deep_merge(base, overlay),
            json!({"hosts": ["c"], "port": 9000})
        );
    }

    #[test]
    fn later_tiers_win() {
        let values = vec![json!({"a": 1}), json!({"b": 2}), json!({"a": 3})];
        assert_eq!(deep_merge_all(values), json!({"a": 3, "b": 2}));
    }
}
