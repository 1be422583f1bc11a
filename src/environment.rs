//! Environment variable resolution.
//!
//! Derives the full environment injected into a container (or used for
//! config-link templating) from the image's declared variables and the
//! server's stored values, plus the implicit `SERVER_MEMORY` and
//! `SERVER_PORT` pair.

use crate::images::ImageDef;
use crate::store::{EnvironmentVariable, Server};
use std::collections::HashMap;

/// The resolved environment for one server/image pair.
#[derive(Debug, Clone)]
pub struct ContainerEnvironment {
    env: HashMap<String, String>,
}

impl ContainerEnvironment {
    /// Resolve the environment from stored variable rows.
    ///
    /// Declared variables without a stored row are skipped (unresolved links
    /// are "no value", never an error). Variables flagged `install_only` are
    /// skipped unless `install_phase` is set. `SERVER_MEMORY` and
    /// `SERVER_PORT` are always present.
    pub fn resolve(
        server: &Server,
        image: &ImageDef,
        stored: &[EnvironmentVariable],
        install_phase: bool,
    ) -> Self {
        let mut env = HashMap::new();

        for declared in &image.variables {
            if declared.install_only && !install_phase {
                continue;
            }
            if let Some(row) = stored.iter().find(|v| v.variable == declared.variable) {
                env.insert(declared.variable.clone(), row.value.clone());
            }
        }

        env.insert("SERVER_MEMORY".to_string(), server.memory.to_string());
        env.insert("SERVER_PORT".to_string(), server.port.to_string());

        Self { env }
    }

    pub fn get(&self, variable: &str) -> Option<&str> {
        self.env.get(variable).map(String::as_str)
    }

    /// The environment as key/value pairs for `docker run -e`.
    pub fn to_docker_env(&self) -> Vec<(String, String)> {
        let mut pairs: Vec<(String, String)> = self
            .env
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        pairs.sort();
        pairs
    }

    /// Substitute `{{image.env.<variable>}}` tokens in a startup command
    /// template.
    ///
    /// Tokens naming a variable with no resolved value substitute as the
    /// empty string; substitution never fails.
    pub fn parse_startup_command(&self, cmd: &str) -> String {
        const OPEN: &str = "{{image.env.";
        const CLOSE: &str = "}}";

        let mut out = String::with_capacity(cmd.len());
        let mut rest = cmd;
        while let Some(start) = rest.find(OPEN) {
            out.push_str(&rest[..start]);
            let after_open = &rest[start + OPEN.len()..];
            match after_open.find(CLOSE) {
                Some(end) => {
                    let variable = &after_open[..end];
                    out.push_str(self.get(variable).unwrap_or(""));
                    rest = &after_open[end + CLOSE.len()..];
                }
                None => {
                    // Unterminated token, emit literally
                    out.push_str(&rest[start..]);
                    rest = "";
                }
            }
        }
        out.push_str(rest);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::images::{ImageConfig, ImageDef, ImageMeta, ImageVariable, Installation};
    use crate::store::ServerStatus;
    use chrono::Utc;

    fn test_image(variables: Vec<ImageVariable>) -> ImageDef {
        ImageDef {
            meta: ImageMeta { api_version: 2 },
            uid: "demo".to_string(),
            name: "Demo".to_string(),
            author: "warden".to_string(),
            docker_image: "alpine".to_string(),
            command: "run".to_string(),
            default_port: 25565,
            user: None,
            stop_command: None,
            default_image: false,
            variables,
            installation: Installation {
                docker_image: "alpine".to_string(),
                shell: "/bin/sh".to_string(),
                script: vec![],
            },
            config: ImageConfig { files: vec![] },
        }
    }

    fn variable(name: &str, install_only: bool) -> ImageVariable {
        ImageVariable {
            prompt: name.to_string(),
            variable: name.to_string(),
            install_only,
            default: serde_json::Value::Null,
            hidden: false,
        }
    }

    fn test_server() -> Server {
        Server {
            id: "ab12cd34".to_string(),
            name: "demo".to_string(),
            image_uid: "demo".to_string(),
            memory: 2048,
            port: 25565,
            custom_startup: None,
            status: ServerStatus::Stopped,
            created_at: Utc::now(),
        }
    }

    fn stored(variable: &str, value: &str) -> EnvironmentVariable {
        EnvironmentVariable {
            server_id: "ab12cd34".to_string(),
            variable: variable.to_string(),
            value: value.to_string(),
        }
    }

    #[test]
    fn always_injects_memory_and_port() {
        let env = ContainerEnvironment::resolve(&test_server(), &test_image(vec![]), &[], false);
        assert_eq!(env.get("SERVER_MEMORY"), Some("2048"));
        assert_eq!(env.get("SERVER_PORT"), Some("25565"));
    }

    #[test]
    fn install_only_variables_are_phase_gated() {
        let image = test_image(vec![variable("VERSION", true), variable("MOTD", false)]);
        let rows = [stored("VERSION", "1.20"), stored("MOTD", "hi")];

        let runtime = ContainerEnvironment::resolve(&test_server(), &image, &rows, false);
        assert_eq!(runtime.get("VERSION"), None);
        assert_eq!(runtime.get("MOTD"), Some("hi"));

        let install = ContainerEnvironment::resolve(&test_server(), &image, &rows, true);
        assert_eq!(install.get("VERSION"), Some("1.20"));
    }

    #[test]
    fn declared_variable_without_stored_row_is_skipped() {
        let image = test_image(vec![variable("MOTD", false)]);
        let env = ContainerEnvironment::resolve(&test_server(), &image, &[], false);
        assert_eq!(env.get("MOTD"), None);
    }

    #[test]
    fn startup_command_substitution() {
        let image = test_image(vec![variable("MOTD", false)]);
        let env = ContainerEnvironment::resolve(
            &test_server(),
            &image,
            &[stored("MOTD", "hello")],
            false,
        );

        assert_eq!(
            env.parse_startup_command("serve --motd {{image.env.MOTD}}"),
            "serve --motd hello"
        );
        // Missing values substitute as empty string, never fail
        assert_eq!(
            env.parse_startup_command("serve --x {{image.env.UNKNOWN}} end"),
            "serve --x  end"
        );
        // Unterminated token stays literal
        assert_eq!(
            env.parse_startup_command("serve {{image.env.MOTD"),
            "serve {{image.env.MOTD"
        );
    }
}
