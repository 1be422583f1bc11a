//! Path flattening over structured config values.
//!
//! The shared addressing scheme for all structured formats: a scalar leaf at
//! traversal path `p` is recorded under the slash-delimited key `p`, with
//! sequence indices stringified. Write-back is the inverse walk guided by the
//! same path syntax.

use serde_json::Value;
use std::collections::BTreeMap;

/// Flatten a structured value into path → scalar pairs.
///
/// Null leaves are skipped; only strings, numbers and booleans are
/// addressable.
pub fn flatten(value: &Value) -> BTreeMap<String, Value> {
    let mut out = BTreeMap::new();
    walk(value, None, &mut out);
    out
}

fn walk(value: &Value, prefix: Option<&str>, out: &mut BTreeMap<String, Value>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let path = match prefix {
                    Some(p) => format!("{}/{}", p, key),
                    None => key.clone(),
                };
                walk(child, Some(&path), out);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                let path = match prefix {
                    Some(p) => format!("{}/{}", p, index),
                    None => index.to_string(),
                };
                walk(child, Some(&path), out);
            }
        }
        Value::String(_) | Value::Number(_) | Value::Bool(_) => {
            if let Some(path) = prefix {
                out.insert(path.to_string(), value.clone());
            }
        }
        Value::Null => {}
    }
}

/// Write a scalar at a slash-delimited path, leaving siblings untouched.
///
/// The path must address an existing location: intermediate maps and
/// sequences are never invented. Returns an error naming the failing
/// segment otherwise.
pub fn set_path(root: &mut Value, path: &str, new_value: Value) -> Result<(), String> {
    let mut current = root;
    let segments: Vec<&str> = path.split('/').collect();
    let (last, parents) = segments
        .split_last()
        .ok_or_else(|| "empty path".to_string())?;

    for segment in parents {
        current = descend(current, segment)?;
    }

    match current {
        Value::Object(map) => {
            map.insert((*last).to_string(), new_value);
            Ok(())
        }
        Value::Array(items) => {
            let index: usize = last
                .parse()
                .map_err(|_| format!("'{}' is not a sequence index", last))?;
            let slot = items
                .get_mut(index)
                .ok_or_else(|| format!("index {} out of bounds", index))?;
            *slot = new_value;
            Ok(())
        }
        _ => Err(format!("'{}' does not address a container", path)),
    }
}

fn descend<'a>(value: &'a mut Value, segment: &str) -> Result<&'a mut Value, String> {
    match value {
        Value::Object(map) => map
            .get_mut(segment)
            .ok_or_else(|| format!("no such key '{}'", segment)),
        Value::Array(items) => {
            let index: usize = segment
                .parse()
                .map_err(|_| format!("'{}' is not a sequence index", segment))?;
            items
                .get_mut(index)
                .ok_or_else(|| format!("index {} out of bounds", index))
        }
        _ => Err(format!("'{}' is not a container", segment)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flattens_nested_maps_and_sequences() {
        let value = json!({
            "server": {
                "motd": "hello",
                "players": {"max": 20}
            },
            "worlds": ["overworld", "nether"],
            "pvp": true,
            "unused": null
        });

        let flat = flatten(&value);
        assert_eq!(flat["server/motd"], json!("hello"));
        assert_eq!(flat["server/players/max"], json!(20));
        assert_eq!(flat["worlds/0"], json!("overworld"));
        assert_eq!(flat["worlds/1"], json!("nether"));
        assert_eq!(flat["pvp"], json!(true));
        assert!(!flat.contains_key("unused"));
        assert_eq!(flat.len(), 5);
    }

    #[test]
    fn set_path_replaces_leaf_and_preserves_siblings() {
        let mut value = json!({
            "server": {"motd": "old", "port": 25565},
            "worlds": ["overworld"]
        });

        set_path(&mut value, "server/motd", json!("new")).unwrap();
        set_path(&mut value, "worlds/0", json!("end")).unwrap();

        let flat = flatten(&value);
        assert_eq!(flat["server/motd"], json!("new"));
        assert_eq!(flat["server/port"], json!(25565));
        assert_eq!(flat["worlds/0"], json!("end"));
    }

    #[test]
    fn set_path_can_add_new_map_key() {
        let mut value = json!({"server": {}});
        set_path(&mut value, "server/motd", json!("hello")).unwrap();
        assert_eq!(value, json!({"server": {"motd": "hello"}}));
    }

    #[test]
    fn set_path_rejects_missing_intermediate() {
        let mut value = json!({"server": {}});
        let err = set_path(&mut value, "nope/deeper/motd", json!("x")).unwrap_err();
        assert!(err.contains("no such key 'nope'"), "{}", err);
    }

    #[test]
    fn set_path_rejects_bad_sequence_index() {
        let mut value = json!({"worlds": ["overworld"]});
        assert!(set_path(&mut value, "worlds/5", json!("x")).is_err());
        assert!(set_path(&mut value, "worlds/abc", json!("x")).is_err());
    }

    #[test]
    fn flatten_then_set_round_trip() {
        let mut value = json!({"a": {"b": [{"c": 1}]}});
        let flat = flatten(&value);
        assert_eq!(flat["a/b/0/c"], json!(1));
        set_path(&mut value, "a/b/0/c", json!(2)).unwrap();
        assert_eq!(flatten(&value)["a/b/0/c"], json!(2));
    }
}
