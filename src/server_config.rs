//! Config templating & linking engine.
//!
//! Flattens the config files an image declares into addressable slash paths,
//! guards keys that are linked to environment variables, and writes linked
//! values back before every server start so config-file state always
//! reflects the latest stored variable values.

use crate::error::{Error, Result};
use crate::images::{ConfigFileDef, ImageDef};
use crate::parser::{self, Format};
use crate::servers::Servers;
use crate::store::Server;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

/// One parsed config file, tagged with its originating filename.
#[derive(Debug, Clone)]
pub struct ParsedFile {
    pub filename: String,
    /// Flattened path → scalar pairs.
    pub settings: BTreeMap<String, Value>,
}

/// Read, edit and link configuration files for one server.
pub struct ServerConfig<'a> {
    servers: &'a Servers,
    server: &'a Server,
    image: &'a ImageDef,
    files: Vec<ParsedFile>,
}

impl<'a> ServerConfig<'a> {
    /// Parse every file the image declares for this server.
    ///
    /// An unrecognized parser name fails with
    /// [`Error::UnsupportedFiletype`]; parse failures carry file context.
    pub async fn parse(
        servers: &'a Servers,
        server: &'a Server,
        image: &'a ImageDef,
    ) -> Result<ServerConfig<'a>> {
        let dir = servers.data_dir(server);
        let mut files = Vec::new();

        for file in &image.config.files {
            let format = Format::from_name(&file.parser)?;
            let settings = parser::read_file(format, &dir.join(&file.filename))?;
            files.push(ParsedFile {
                filename: file.filename.clone(),
                settings,
            });
        }

        Ok(Self {
            servers,
            server,
            image,
            files,
        })
    }

    /// The flattened settings of every declared config file.
    pub fn files(&self) -> &[ParsedFile] {
        &self.files
    }

    /// All settings as `(filename, path, value)` rows.
    pub fn settings(&self) -> Vec<(&str, &str, &Value)> {
        self.files
            .iter()
            .flat_map(|file| {
                file.settings
                    .iter()
                    .map(move |(path, value)| (file.filename.as_str(), path.as_str(), value))
            })
            .collect()
    }

    /// Modify the value at a flattened path in one declared config file.
    ///
    /// The textual value is coerced to int or bool where unambiguous. A key
    /// declared as linked in any file's `environment[]` rejects the edit
    /// unless `override_linking_check` is set; the override is reserved for
    /// the internal write-back path. If the image declares an `action` for
    /// the variable, the action's command template is formatted with the new
    /// value and sent to the running server.
    pub async fn edit(
        &self,
        filename: &str,
        variable: &str,
        value: &str,
        override_linking_check: bool,
    ) -> Result<()> {
        let file = self.file_def(filename)?;

        if !override_linking_check && self.image.is_linked_variable(variable) {
            return Err(Error::LinkedVariable(variable.to_string()));
        }

        let coerced = coerce_value(value);
        let format = Format::from_name(&file.parser)?;
        let path = self.servers.data_dir(self.server).join(&file.filename);
        parser::write_key(format, &path, variable, &coerced)?;

        if let Some(template) = file.action.get(variable) {
            // A live in-process effect without a restart. The container being
            // absent is a state signal here, not an error.
            let command = template.replace("{}", value);
            if self.servers.container_alive(self.server).await {
                self.servers.command(self.server, &command).await?;
            } else {
                debug!(
                    "Server '{}' not running, skipping action for '{}'",
                    self.server.name, variable
                );
            }
        }

        Ok(())
    }

    /// Write every linked environment variable's current value into its
    /// config key.
    ///
    /// Called once at server start, before the container launches. Links
    /// naming an unresolvable environment variable are skipped.
    pub async fn write_environment_variables(&self) -> Result<()> {
        let env = self
            .servers
            .resolve_environment(self.server, self.image, false)
            .await?;

        for file in &self.image.config.files {
            for link in &file.environment {
                let Some(value) = env.get(&link.environment_variable) else {
                    continue;
                };
                let rendered = match &link.value_format {
                    Some(format) => format.replace("{}", value),
                    None => value.to_string(),
                };
                self.edit(&file.filename, &link.config_variable, &rendered, true)
                    .await?;
            }
        }
        Ok(())
    }

    fn file_def(&self, filename: &str) -> Result<&ConfigFileDef> {
        self.image
            .config
            .files
            .iter()
            .find(|f| f.filename == filename)
            .ok_or_else(|| {
                Error::Write(format!(
                    "image '{}' declares no config file named '{}'",
                    self.image.uid, filename
                ))
            })
    }
}

/// Coerce a textual value to int or bool where syntactically unambiguous,
/// leaving everything else a string.
pub fn coerce_value(raw: &str) -> Value {
    if let Ok(n) = raw.parse::<i64>() {
        return Value::from(n);
    }
    match raw.to_lowercase().as_str() {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(raw.to_string()),
    }
}
