//! Line-oriented `key=value` ("properties") files.
//!
//! Comments (`#`/`!`) and unrecognized lines are preserved verbatim on write;
//! only the matching `key=` line is rewritten. A key that does not exist yet
//! is appended at the end of the file.

use serde_json::Value;
use std::collections::BTreeMap;

/// Parse properties file content into key → scalar pairs.
///
/// Values stay strings here; textual coercion to int/bool is the config
/// engine's job at edit time.
pub fn read(content: &str) -> BTreeMap<String, Value> {
    let mut settings = BTreeMap::new();
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
            continue;
        }
        if let Some((key, value)) = trimmed.split_once('=') {
            settings.insert(
                key.trim().to_string(),
                Value::String(value.trim().to_string()),
            );
        }
    }
    settings
}

/// Rewrite the line for `key`, preserving every other line.
pub fn write(content: &str, key: &str, value: &Value) -> String {
    let rendered = render(value);
    let mut lines: Vec<String> = Vec::new();
    let mut replaced = false;

    for line in content.lines() {
        let trimmed = line.trim();
        if !trimmed.starts_with('#') && !trimmed.starts_with('!') {
            if let Some((existing_key, _)) = trimmed.split_once('=') {
                if existing_key.trim() == key {
                    lines.push(format!("{}={}", key, rendered));
                    replaced = true;
                    continue;
                }
            }
        }
        lines.push(line.to_string());
    }

    if !replaced {
        lines.push(format!("{}={}", key, rendered));
    }

    let mut out = lines.join("\n");
    if content.ends_with('\n') || !replaced {
        out.push('\n');
    }
    out
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SAMPLE: &str = "\
#Minecraft server properties
motd=A Minecraft Server
server-port=25565
pvp=true
";

    #[test]
    fn read_skips_comments_and_blank_lines() {
        let settings = read(SAMPLE);
        assert_eq!(settings["motd"], json!("A Minecraft Server"));
        assert_eq!(settings["server-port"], json!("25565"));
        assert_eq!(settings["pvp"], json!("true"));
        assert_eq!(settings.len(), 3);
    }

    #[test]
    fn write_replaces_only_the_target_line() {
        let updated = write(SAMPLE, "motd", &json!("hello"));
        let settings = read(&updated);
        assert_eq!(settings["motd"], json!("hello"));
        assert_eq!(settings["server-port"], json!("25565"));
        assert!(updated.contains("#Minecraft server properties"));
    }

    #[test]
    fn write_does_not_touch_keys_sharing_a_prefix() {
        let content = "port=1\nserver-port=2\n";
        let updated = write(content, "port", &json!(9));
        assert_eq!(read(&updated)["port"], json!("9"));
        assert_eq!(read(&updated)["server-port"], json!("2"));
    }

    #[test]
    fn write_appends_missing_key() {
        let updated = write(SAMPLE, "level-name", &json!("world"));
        assert_eq!(read(&updated)["level-name"], json!("world"));
    }

    #[test]
    fn write_renders_scalars_without_quotes() {
        let updated = write("", "max-players", &json!(20));
        assert!(updated.contains("max-players=20"));
        let updated = write("", "pvp", &json!(false));
        assert!(updated.contains("pvp=false"));
    }
}
