use super::types::{ImageDef, IMAGE_API_VERSION};
use crate::error::{Error, Result};
use std::path::Path;
use tracing::debug;

/// In-memory catalog of validated image definitions.
///
/// Loads every `*.json` file under a directory tree. Fetching and refreshing
/// that directory from the network is someone else's job; this is the read
/// contract only.
#[derive(Debug, Clone, Default)]
pub struct ImageCatalog {
    images: Vec<ImageDef>,
}

impl ImageCatalog {
    /// Read and validate all image definitions under `dir`.
    pub fn load(dir: &Path) -> Result<Self> {
        let mut images = Vec::new();
        let mut files = Vec::new();
        collect_json_files(dir, &mut files)?;

        for path in files {
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| path.display().to_string());

            let content = std::fs::read_to_string(&path).map_err(|e| Error::Read {
                path: path.display().to_string(),
                source: e,
            })?;

            let raw: serde_json::Value =
                serde_json::from_str(&content).map_err(|e| Error::Parse {
                    file: file_name.clone(),
                    reason: e.to_string(),
                })?;

            verify(&raw, &file_name)?;

            let image: ImageDef = serde_json::from_value(raw).map_err(|e| Error::Parse {
                file: file_name.clone(),
                reason: e.to_string(),
            })?;

            debug!("Loaded image '{}' from {}", image.uid, file_name);
            images.push(image);
        }

        Ok(Self { images })
    }

    /// Build a catalog from already-validated definitions, for tests.
    pub fn from_images(images: Vec<ImageDef>) -> Self {
        Self { images }
    }

    /// Look up an image by uid.
    pub fn get(&self, uid: &str) -> Result<&ImageDef> {
        self.images
            .iter()
            .find(|img| img.uid == uid)
            .ok_or_else(|| Error::ImageNotFound(uid.to_string()))
    }

    pub fn all(&self) -> &[ImageDef] {
        &self.images
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

fn collect_json_files(dir: &Path, out: &mut Vec<std::path::PathBuf>) -> Result<()> {
    if !dir.is_dir() {
        return Ok(());
    }
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_json_files(&path, out)?;
        } else if path.extension().is_some_and(|ext| ext == "json") {
            out.push(path);
        }
    }
    Ok(())
}

/// Validate the required-key matrix of a raw image definition.
///
/// Checked against the raw JSON (not the typed struct) so every failure names
/// the exact missing key.
fn verify(image: &serde_json::Value, file: &str) -> Result<()> {
    let missing = |key: &str| Error::Parse {
        file: file.to_string(),
        reason: format!("missing key '{}'", key),
    };

    for key in [
        "meta",
        "uid",
        "name",
        "author",
        "docker_image",
        "command",
        "default_port",
        "user",
        "stop_command",
        "default_image",
        "variables",
        "installation",
        "config",
    ] {
        if image.get(key).is_none() {
            return Err(missing(key));
        }
    }

    let api_version = image["meta"]
        .get("api_version")
        .ok_or_else(|| missing("meta.api_version"))?;
    if api_version.as_i64() != Some(IMAGE_API_VERSION) {
        return Err(Error::ImageValidation(format!(
            "{}: image API level {}, warden API level {}",
            file, api_version, IMAGE_API_VERSION
        )));
    }

    let uid = image["uid"].as_str().unwrap_or_default();
    if uid != uid.to_lowercase() {
        return Err(Error::Parse {
            file: file.to_string(),
            reason: "uid must be lowercase".to_string(),
        });
    }

    for key in ["docker_image", "shell", "script"] {
        if image["installation"].get(key).is_none() {
            return Err(missing(&format!("installation.{}", key)));
        }
    }

    let files = image["config"]
        .get("files")
        .and_then(|f| f.as_array())
        .ok_or_else(|| missing("config.files"))?;

    for config_file in files {
        for key in ["filename", "parser", "environment", "action"] {
            if config_file.get(key).is_none() {
                return Err(missing(key));
            }
        }
        let links = config_file["environment"].as_array().cloned().unwrap_or_default();
        for link in &links {
            for key in ["config_variable", "environment_variable", "value_format"] {
                if link.get(key).is_none() {
                    return Err(missing(&format!(
                        "{} environment key {}",
                        config_file["filename"].as_str().unwrap_or("?"),
                        key
                    )));
                }
            }
        }
    }

    if let Some(variables) = image["variables"].as_array() {
        for variable in variables {
            for key in ["prompt", "variable", "install_only", "default", "hidden"] {
                if variable.get(key).is_none() {
                    return Err(missing(key));
                }
            }
        }
    }

    // Resolvability of environment links against the variable set is
    // deliberately not validated here; the resolver skips unresolved links.
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_image_json() -> serde_json::Value {
        serde_json::json!({
            "meta": {"api_version": 2},
            "uid": "minecraft-vanilla",
            "name": "Minecraft Vanilla",
            "author": "warden",
            "docker_image": "eclipse-temurin:17",
            "command": "java -Xmx{{SERVER_MEMORY}}M -jar server.jar --port {{SERVER_PORT}}",
            "default_port": 25565,
            "user": null,
            "stop_command": "stop",
            "default_image": true,
            "variables": [
                {
                    "prompt": "Message of the day",
                    "variable": "MOTD",
                    "install_only": false,
                    "default": "A warden server",
                    "hidden": false
                }
            ],
            "installation": {
                "docker_image": "eclipse-temurin:17",
                "shell": "/bin/bash",
                "script": ["curl -o server.jar https://example.invalid/server.jar"]
            },
            "config": {
                "files": [
                    {
                        "filename": "server.properties",
                        "parser": "properties",
                        "environment": [
                            {
                                "config_variable": "motd",
                                "environment_variable": "MOTD",
                                "value_format": null
                            }
                        ],
                        "action": {}
                    }
                ]
            }
        })
    }

    #[test]
    fn verify_accepts_complete_image() {
        assert!(verify(&minimal_image_json(), "image.json").is_ok());
    }

    #[test]
    fn verify_names_missing_top_level_key() {
        let mut image = minimal_image_json();
        image.as_object_mut().unwrap().remove("command");
        let err = verify(&image, "image.json").unwrap_err();
        assert!(err.to_string().contains("missing key 'command'"), "{}", err);
    }

    #[test]
    fn verify_names_missing_installation_key() {
        let mut image = minimal_image_json();
        image["installation"].as_object_mut().unwrap().remove("shell");
        let err = verify(&image, "image.json").unwrap_err();
        assert!(err.to_string().contains("installation.shell"), "{}", err);
    }

    #[test]
    fn verify_names_missing_environment_link_key() {
        let mut image = minimal_image_json();
        image["config"]["files"][0]["environment"][0]
            .as_object_mut()
            .unwrap()
            .remove("value_format");
        let err = verify(&image, "image.json").unwrap_err();
        assert!(err.to_string().contains("value_format"), "{}", err);
    }

    #[test]
    fn verify_rejects_uppercase_uid() {
        let mut image = minimal_image_json();
        image["uid"] = serde_json::json!("Minecraft-Vanilla");
        let err = verify(&image, "image.json").unwrap_err();
        assert!(err.to_string().contains("lowercase"), "{}", err);
    }

    #[test]
    fn verify_rejects_api_mismatch() {
        let mut image = minimal_image_json();
        image["meta"]["api_version"] = serde_json::json!(1);
        assert!(matches!(
            verify(&image, "image.json").unwrap_err(),
            Error::ImageValidation(_)
        ));
    }

    #[test]
    fn load_reads_directory_tree() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("default");
        std::fs::create_dir_all(&sub).unwrap();
        std::fs::write(
            sub.join("minecraft.json"),
            serde_json::to_string_pretty(&minimal_image_json()).unwrap(),
        )
        .unwrap();

        let catalog = ImageCatalog::load(dir.path()).unwrap();
        let image = catalog.get("minecraft-vanilla").unwrap();
        assert_eq!(image.name, "Minecraft Vanilla");
        assert_eq!(image.user_or_root(), "root");
        assert!(image.is_linked_variable("motd"));
        assert!(!image.is_linked_variable("level-name"));
        assert!(matches!(
            catalog.get("nope").unwrap_err(),
            Error::ImageNotFound(_)
        ));
    }
}
