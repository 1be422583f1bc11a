//! YAML config files, flattened through the shared path walk.
//!
//! Content is deserialized straight into `serde_json::Value`, so the flatten
//! and write-back walks are shared with the JSON adapter. YAML documents with
//! non-string keys are rejected at parse time.

use super::flatten;
use serde_json::Value;
use std::collections::BTreeMap;

pub fn read(content: &str) -> Result<BTreeMap<String, Value>, String> {
    let value: Value = serde_yaml::from_str(content).map_err(|e| e.to_string())?;
    Ok(flatten::flatten(&value))
}

pub fn write(content: &str, path: &str, new_value: &Value) -> Result<String, String> {
    let mut value: Value = serde_yaml::from_str(content).map_err(|e| e.to_string())?;
    flatten::set_path(&mut value, path, new_value.clone())?;
    serde_yaml::to_string(&value).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SAMPLE: &str = "\
settings:
  allow-end: true
  spawn-limits:
    monsters: 70
worlds:
  - overworld
  - nether
";

    #[test]
    fn read_flattens_maps_and_sequences() {
        let flat = read(SAMPLE).unwrap();
        assert_eq!(flat["settings/allow-end"], json!(true));
        assert_eq!(flat["settings/spawn-limits/monsters"], json!(70));
        assert_eq!(flat["worlds/0"], json!("overworld"));
        assert_eq!(flat["worlds/1"], json!("nether"));
    }

    #[test]
    fn write_then_read_round_trips_and_preserves_siblings() {
        let updated = write(SAMPLE, "settings/spawn-limits/monsters", &json!(50)).unwrap();
        let flat = read(&updated).unwrap();
        assert_eq!(flat["settings/spawn-limits/monsters"], json!(50));
        assert_eq!(flat["settings/allow-end"], json!(true));
        assert_eq!(flat["worlds/1"], json!("nether"));
    }

    #[test]
    fn read_rejects_malformed_yaml() {
        assert!(read("key: [unclosed").is_err());
    }
}
