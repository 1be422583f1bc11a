use serde_json::{json, Value};
use warden::parser::{read_file, write_key, Format};
use warden::Error;

fn write_fixture(dir: &tempfile::TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
fn properties_edit_preserves_siblings_and_comments() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_fixture(
        &dir,
        "server.properties",
        "#Minecraft server properties\nserver-port=25565\nmotd=A Minecraft Server\npvp=true\n",
    );

    write_key(Format::Properties, &path, "motd", &json!("Welcome!")).unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.contains("#Minecraft server properties"));
    assert!(content.contains("server-port=25565"));
    assert!(content.contains("motd=Welcome!"));
    assert!(content.contains("pvp=true"));

    let settings = read_file(Format::Properties, &path).unwrap();
    assert_eq!(settings.get("motd"), Some(&Value::from("Welcome!")));
    assert_eq!(settings.get("server-port"), Some(&Value::from("25565")));
}

#[test]
fn properties_write_appends_missing_key() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_fixture(&dir, "server.properties", "pvp=true\n");

    write_key(Format::Properties, &path, "max-players", &json!(20)).unwrap();

    let settings = read_file(Format::Properties, &path).unwrap();
    assert_eq!(settings.get("pvp"), Some(&Value::from("true")));
    assert_eq!(settings.get("max-players"), Some(&Value::from("20")));
}

#[test]
fn json_nested_edit_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_fixture(
        &dir,
        "config.json",
        r#"{"server": {"port": 19132, "name": "Bedrock"}, "debug": false}"#,
    );

    let before = read_file(Format::Json, &path).unwrap();
    assert_eq!(before.get("server/port"), Some(&Value::from(19132)));
    assert_eq!(before.get("debug"), Some(&Value::Bool(false)));

    write_key(Format::Json, &path, "server/port", &json!(19133)).unwrap();

    let after = read_file(Format::Json, &path).unwrap();
    assert_eq!(after.get("server/port"), Some(&Value::from(19133)));
    // Siblings untouched
    assert_eq!(after.get("server/name"), Some(&Value::from("Bedrock")));
    assert_eq!(after.get("debug"), Some(&Value::Bool(false)));
}

#[test]
fn json_array_index_edit() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_fixture(&dir, "ops.json", r#"{"ops": ["alice", "bob"]}"#);

    write_key(Format::Json, &path, "ops/1", &json!("carol")).unwrap();

    let after = read_file(Format::Json, &path).unwrap();
    assert_eq!(after.get("ops/0"), Some(&Value::from("alice")));
    assert_eq!(after.get("ops/1"), Some(&Value::from("carol")));

    // Out-of-bounds index is a parse-level failure, not a silent append
    assert!(matches!(
        write_key(Format::Json, &path, "ops/5", &json!("dave")).unwrap_err(),
        Error::Parse { .. }
    ));
}

#[test]
fn yaml_nested_edit_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_fixture(
        &dir,
        "config.yml",
        "settings:\n  allow-end: true\n  motd: hello\nworlds:\n  - world\n  - world_nether\n",
    );

    let before = read_file(Format::Yaml, &path).unwrap();
    assert_eq!(before.get("settings/motd"), Some(&Value::from("hello")));
    assert_eq!(before.get("worlds/0"), Some(&Value::from("world")));

    write_key(Format::Yaml, &path, "settings/motd", &json!("welcome")).unwrap();

    let after = read_file(Format::Yaml, &path).unwrap();
    assert_eq!(after.get("settings/motd"), Some(&Value::from("welcome")));
    assert_eq!(after.get("settings/allow-end"), Some(&Value::Bool(true)));
    assert_eq!(after.get("worlds/1"), Some(&Value::from("world_nether")));
}

#[test]
fn malformed_content_reports_file_context() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_fixture(&dir, "broken.json", "{not json");

    match read_file(Format::Json, &path).unwrap_err() {
        Error::Parse { file, .. } => assert!(file.ends_with("broken.json")),
        other => panic!("expected parse error, got {:?}", other),
    }
}
