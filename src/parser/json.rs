//! JSON config files, flattened through the shared path walk.

use super::flatten;
use serde_json::Value;
use std::collections::BTreeMap;

pub fn read(content: &str) -> Result<BTreeMap<String, Value>, String> {
    let value: Value = serde_json::from_str(content).map_err(|e| e.to_string())?;
    Ok(flatten::flatten(&value))
}

pub fn write(content: &str, path: &str, new_value: &Value) -> Result<String, String> {
    let mut value: Value = serde_json::from_str(content).map_err(|e| e.to_string())?;
    flatten::set_path(&mut value, path, new_value.clone())?;
    serde_json::to_string_pretty(&value).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn read_flattens_nested_structure() {
        let flat = read(r#"{"rcon": {"enabled": true, "port": 25575}}"#).unwrap();
        assert_eq!(flat["rcon/enabled"], json!(true));
        assert_eq!(flat["rcon/port"], json!(25575));
    }

    #[test]
    fn write_then_read_round_trips() {
        let content = r#"{"rcon": {"enabled": true, "port": 25575}}"#;
        let updated = write(content, "rcon/port", &json!(25580)).unwrap();
        let flat = read(&updated).unwrap();
        assert_eq!(flat["rcon/port"], json!(25580));
        assert_eq!(flat["rcon/enabled"], json!(true));
    }

    #[test]
    fn read_rejects_malformed_json() {
        assert!(read("{not json").is_err());
    }
}
