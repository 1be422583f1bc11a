use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Desired/observed state of a server.
///
/// Transitions are owned exclusively by the reconciler: servers are created
/// `installing`, flip to `stopped` when the install container disappears, and
/// move between `stopped` and `running` via start/stop. `installing` is never
/// re-entered once left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    Installing,
    Stopped,
    Running,
}

impl fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ServerStatus::Installing => "installing",
            ServerStatus::Stopped => "stopped",
            ServerStatus::Running => "running",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for ServerStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "installing" => Ok(ServerStatus::Installing),
            "stopped" => Ok(ServerStatus::Stopped),
            "running" => Ok(ServerStatus::Running),
            other => Err(format!("unknown server status '{}'", other)),
        }
    }
}

/// Persisted desired-state record for one managed game server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Server {
    /// Opaque unique token, immutable for the lifetime of the server.
    pub id: String,

    /// Unique, lowercased display name (max 20 characters).
    pub name: String,

    /// UID of the image this server was created from. Not a foreign key;
    /// validated against the catalog at use time.
    pub image_uid: String,

    /// Memory limit in megabytes.
    pub memory: u32,

    /// Primary network port, globally unique across servers.
    pub port: u16,

    /// Optional override of the image's startup command template.
    pub custom_startup: Option<String>,

    pub status: ServerStatus,

    pub created_at: DateTime<Utc>,
}

impl Server {
    /// Name of the server's on-disk data directory under the data path.
    ///
    /// Includes the id so a rename can never collide with another server's
    /// directory.
    pub fn data_dir_name(&self) -> String {
        format!("{}_{}", self.name, self.id)
    }
}

/// One stored environment variable instance, owned by its server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentVariable {
    pub server_id: String,
    pub variable: String,
    pub value: String,
}

/// An extra published port, independent of the server's primary port.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdditionalPort {
    pub server_id: String,
    pub port: u16,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            ServerStatus::Installing,
            ServerStatus::Stopped,
            ServerStatus::Running,
        ] {
            assert_eq!(status.to_string().parse::<ServerStatus>().unwrap(), status);
        }
        assert!("halted".parse::<ServerStatus>().is_err());
    }

    #[test]
    fn data_dir_name_contains_name_and_id() {
        let server = Server {
            id: "ab12cd34".to_string(),
            name: "survival".to_string(),
            image_uid: "minecraft-vanilla".to_string(),
            memory: 1024,
            port: 25565,
            custom_startup: None,
            status: ServerStatus::Installing,
            created_at: Utc::now(),
        };
        assert_eq!(server.data_dir_name(), "survival_ab12cd34");
    }
}
