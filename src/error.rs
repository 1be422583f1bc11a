use crate::docker::DockerError;
use miette::Diagnostic;
use std::io;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    #[error("Failed to read '{path}': {source}")]
    #[diagnostic(code(warden::read))]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse '{file}': {reason}")]
    #[diagnostic(
        code(warden::parse),
        help("Check the file for malformed or missing structure")
    )]
    Parse { file: String, reason: String },

    #[error("Write error: {0}")]
    #[diagnostic(code(warden::write))]
    Write(String),

    #[error("Unsupported config file type '{0}'")]
    #[diagnostic(
        code(warden::config::unsupported_filetype),
        help("Supported parsers are 'properties', 'yaml' and 'json'")
    )]
    UnsupportedFiletype(String),

    #[error("Setting '{0}' is linked to an environment variable and cannot be edited directly")]
    #[diagnostic(
        code(warden::config::linked_variable),
        help("Change the underlying environment variable with `warden edit` instead")
    )]
    LinkedVariable(String),

    #[error("Server not found: {0}")]
    #[diagnostic(
        code(warden::server::not_found),
        help("List known servers with `warden servers`")
    )]
    ServerNotFound(String),

    #[error("Server '{0}' is not running")]
    #[diagnostic(
        code(warden::server::not_running),
        help("Start the server with: warden start {0}")
    )]
    ServerNotRunning(String),

    #[error("Server '{0}' is still installing")]
    #[diagnostic(
        code(warden::server::not_ready),
        help("Run `warden sync` to pick up the state change once installation finishes")
    )]
    ServerNotReady(String),

    #[error("Server '{0}' is running")]
    #[diagnostic(
        code(warden::server::running),
        help("Stop the server first with: warden stop {0}")
    )]
    ServerRunning(String),

    #[error("Image not found: {0}")]
    #[diagnostic(
        code(warden::image::not_found),
        help("List available images with `warden images`")
    )]
    ImageNotFound(String),

    #[error("Image validation failed: {0}")]
    #[diagnostic(code(warden::image::validation))]
    ImageValidation(String),

    #[error("Server name '{0}' is already taken")]
    #[diagnostic(code(warden::server::name_taken))]
    NameTaken(String),

    #[error("Port {0} is already allocated to another server")]
    #[diagnostic(code(warden::server::port_taken))]
    PortTaken(u16),

    #[error("Invalid server name: {0}")]
    #[diagnostic(code(warden::server::invalid_name))]
    InvalidName(String),

    #[error("Invalid configuration: {0}")]
    #[diagnostic(code(warden::validation))]
    Validation(String),

    #[error("No configuration present")]
    #[diagnostic(
        code(warden::config::missing),
        help("Run `warden setup` to create the initial configuration")
    )]
    NoConfiguration,

    #[error(
        "Configuration version mismatch: file has version {found}, warden supports {expected}"
    )]
    #[diagnostic(code(warden::config::version_mismatch))]
    ConfigVersionMismatch { found: i64, expected: i64 },

    #[error("Docker error: {0}")]
    #[diagnostic(
        code(warden::docker),
        help("Check that Docker is running with `docker ps`")
    )]
    Docker(#[from] DockerError),

    #[error("Database error: {0}")]
    #[diagnostic(code(warden::database))]
    Database(#[from] tokio_rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns a helpful suggestion for resolving this error, if available.
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Error::ServerNotFound(name) => Some(format!(
                "Check `warden servers` for the exact name, or create one with `warden create {}`",
                name
            )),
            Error::ServerNotRunning(name) => {
                Some(format!("Start the server with: warden start {}", name))
            }
            Error::ServerNotReady(_) => Some(
                "Installation is still in progress. Follow it with `warden console <name>` \
                 or wait for `warden servers` to show status `stopped`."
                    .to_string(),
            ),
            Error::NameTaken(_) | Error::PortTaken(_) => Some(
                "Server names and ports must be unique. Check `warden servers` for what is in use."
                    .to_string(),
            ),
            Error::Docker(_) => Some("Check that Docker is running: docker ps".to_string()),
            Error::Database(e) => {
                // tokio_rusqlite wraps the underlying rusqlite error opaquely,
                // so string matching is the only option here.
                let err_str = e.to_string();
                if err_str.contains("database is locked") || err_str.contains("SQLITE_BUSY") {
                    Some(
                        "Another warden instance may be running against the same database."
                            .to_string(),
                    )
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Formats the error with its suggestion (if any) for user-friendly display.
    pub fn with_suggestion(&self) -> String {
        match self.suggestion() {
            Some(suggestion) => format!("{}\n\nHint: {}", self, suggestion),
            None => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_suggestion_appends_hint_when_available() {
        let err = Error::ServerNotRunning("survival".to_string());
        let text = err.with_suggestion();
        assert!(text.contains("'survival' is not running"));
        assert!(text.contains("Hint: Start the server with: warden start survival"));
    }

    #[test]
    fn with_suggestion_is_plain_message_otherwise() {
        let err = Error::InvalidName("bad name".to_string());
        assert_eq!(err.with_suggestion(), err.to_string());
        assert!(!err.with_suggestion().contains("Hint:"));
    }
}
