//! Configuration merge logic
//!
//! Layers are merged with:
//! - Objects: deep-merge by key
//! - Arrays: REPLACE (last wins)
//! - Scalars: override (last wins)

use serde_json::Value;

/// Deep merge `overlay` onto `base`.
///
/// Null in the overlay replaces whatever the base held.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => overlay_value,
                };
                base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }

        // Arrays are replaced wholesale, never concatenated; scalars and
        // mismatched shapes are overridden.
        (_, overlay) => overlay,
    }
}

/// Merge layers in precedence order (first is base, last wins)
pub fn merge_layers<I>(layers: I) -> Value
where
    I: IntoIterator<Item = Value>,
{
    layers.into_iter().fold(Value::Null, deep_merge)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalar_override() {
        let base = json!({"pipeline": {"max_attempts": 10}});
        let overlay = json!({"pipeline": {"max_attempts": 3}});
        let result = deep_merge(base, overlay);
        assert_eq!(result["pipeline"]["max_attempts"], 3);
    }

    #[test]
    fn test_object_deep_merge() {
        let base = json!({
            "sandbox": {
                "interpreter": "python3",
                "timeout_seconds": 20
            }
        });
        let overlay = json!({
            "sandbox": {
                "timeout_seconds": 5
            }
        });
        let result = deep_merge(base, overlay);

        assert_eq!(result["sandbox"]["timeout_seconds"], 5);
        assert_eq!(result["sandbox"]["interpreter"], "python3");
    }

    #[test]
    fn test_array_replace() {
        let base = json!({"sandbox": {"env_allowlist": ["PATH", "HOME", "LANG"]}});
        let overlay = json!({"sandbox": {"env_allowlist": ["PATH"]}});
        let result = deep_merge(base, overlay);

        let allowlist = result["sandbox"]["env_allowlist"].as_array().unwrap();
        assert_eq!(allowlist, &vec![json!("PATH")]);
    }

    #[test]
    fn test_add_new_key() {
        let base = json!({"synthesis": {"timeout_seconds": 60}});
        let overlay = json!({"synthesis": {"command": "gen-sim"}});
        let result = deep_merge(base, overlay);

        assert_eq!(result["synthesis"]["timeout_seconds"], 60);
        assert_eq!(result["synthesis"]["command"], "gen-sim");
    }

    #[test]
    fn test_null_override() {
        let base = json!({"sandbox": {"workspace_root": "/tmp/sims"}});
        let overlay = json!({"sandbox": {"workspace_root": null}});
        let result = deep_merge(base, overlay);

        assert!(result["sandbox"]["workspace_root"].is_null());
    }

    #[test]
    fn test_merge_layers() {
        let builtin = json!({
            "pipeline": {"max_attempts": 10},
            "output": {"dir": "outputs", "artifacts": true}
        });
        let user = json!({"pipeline": {"max_attempts": 5}});
        let project = json!({"output": {"artifacts": false}});
        let cli = json!({"pipeline": {"max_attempts": 2}});

        let result = merge_layers(vec![builtin, user, project, cli]);

        assert_eq!(result["pipeline"]["max_attempts"], 2);
        assert_eq!(result["output"]["artifacts"], false);
        assert_eq!(result["output"]["dir"], "outputs");
    }
}
