use serde::Deserialize;
use std::collections::HashMap;

/// Image definition API level this build understands.
pub const IMAGE_API_VERSION: i64 = 2;

/// A declarative template describing how to install, start and stop one kind
/// of game server, plus which settings it exposes.
///
/// Read-only to the rest of the crate; owned by the [`ImageCatalog`].
///
/// [`ImageCatalog`]: super::ImageCatalog
#[derive(Debug, Clone, Deserialize)]
pub struct ImageDef {
    pub meta: ImageMeta,
    /// Unique identifier; must equal its own lowercase form.
    pub uid: String,
    pub name: String,
    pub author: String,
    pub docker_image: String,
    /// Startup command template. May contain `{{SERVER_MEMORY}}`,
    /// `{{SERVER_PORT}}` and `{{image.env.<variable>}}` tokens.
    pub command: String,
    pub default_port: u16,
    /// Container user; `None` means root.
    pub user: Option<String>,
    /// Command sent to the server's stdin for graceful shutdown. `None`
    /// means the engine's direct stop is used instead.
    pub stop_command: Option<String>,
    #[serde(default)]
    pub default_image: bool,
    pub variables: Vec<ImageVariable>,
    pub installation: Installation,
    pub config: ImageConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageMeta {
    pub api_version: i64,
}

/// A variable the image asks the user for at create time.
#[derive(Debug, Clone, Deserialize)]
pub struct ImageVariable {
    pub prompt: String,
    pub variable: String,
    /// Only injected into the install container, not the running server.
    pub install_only: bool,
    pub default: serde_json::Value,
    pub hidden: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Installation {
    pub docker_image: String,
    pub shell: String,
    pub script: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageConfig {
    pub files: Vec<ConfigFileDef>,
}

/// One config file the image declares inside the server's data directory.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFileDef {
    pub filename: String,
    /// Parser name: "properties", "yaml" or "json".
    pub parser: String,
    /// Keys in this file whose values are derived from environment variables.
    pub environment: Vec<EnvironmentLink>,
    /// Map of config variable to a command template sent to the running
    /// server when that variable is edited (live reload without restart).
    pub action: HashMap<String, String>,
}

/// Declares that a config key mirrors an environment variable's value.
#[derive(Debug, Clone, Deserialize)]
pub struct EnvironmentLink {
    pub config_variable: String,
    pub environment_variable: String,
    /// Optional template applied to the value before writing; `{}` is
    /// replaced by the raw value.
    pub value_format: Option<String>,
}

impl ImageDef {
    /// Whether `variable` is declared as a linked config key in any of the
    /// image's config files.
    pub fn is_linked_variable(&self, variable: &str) -> bool {
        self.config
            .files
            .iter()
            .flat_map(|f| f.environment.iter())
            .any(|link| link.config_variable == variable)
    }

    /// The container user, defaulting to root.
    pub fn user_or_root(&self) -> &str {
        self.user.as_deref().unwrap_or("root")
    }
}
