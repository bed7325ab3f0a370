//! Order-preserving deep merge of JSON documents.

use serde_json::Value;

/// Merge `overlay` onto `base`: overlay wins key by key, nested objects merge recursively,
/// keys already in `base` keep their position and new keys are appended.
pub fn deep_merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn overlay_wins_and_nested_objects_merge() {
        let mut base = json!({
            "log": false,
            "table_config_path": "tables",
            "datasources": { "db1": { "url": "postgres://a/db1", "max_connections": 5 } }
        });
        deep_merge(
            &mut base,
            json!({
                "log": true,
                "datasources": { "db1": { "max_connections": 10 }, "db2": { "url": "mysql://b/db2" } }
            }),
        );
        assert_eq!(base["log"], json!(true));
        assert_eq!(base["table_config_path"], json!("tables"));
        assert_eq!(base["datasources"]["db1"]["url"], json!("postgres://a/db1"));
        assert_eq!(base["datasources"]["db1"]["max_connections"], json!(10));
        assert_eq!(base["datasources"]["db2"]["url"], json!("mysql://b/db2"));
    }

    #[test]
    fn key_order_is_preserved() {
        let mut base = json!({ "b": 1, "a": 2 });
        deep_merge(&mut base, json!({ "c": 3, "a": 4 }));
        let keys: Vec<_> = base.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["b", "a", "c"]);
    }

    #[test]
    fn non_object_overlay_replaces() {
        let mut base = json!({ "columns": { "id": {} } });
        deep_merge(&mut base, json!({ "columns": ["id"] }));
        assert_eq!(base["columns"], json!(["id"]));
    }
}
