use super::types::{AdditionalPort, EnvironmentVariable, Server, ServerStatus};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use rusqlite::OptionalExtension;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio_rusqlite::Connection;
use tracing::{debug, warn};

const DB_FILE_NAME: &str = "warden.db";
const LOCK_FILE_NAME: &str = ".lock";

/// SQLite-backed store for server, environment-variable and port records.
///
/// Uses WAL mode for crash recovery and an advisory file lock to flag
/// concurrent warden instances. The design assumes a single reconciling
/// process per store; the lock is best-effort: when it cannot be acquired a
/// warning is logged and the store proceeds.
///
/// Name and port uniqueness are enforced here, at the schema level, via
/// UNIQUE constraints. Violations surface as [`Error::NameTaken`] /
/// [`Error::PortTaken`] without mutating the store.
pub struct Store {
    conn: Connection,
    /// Advisory lock file handle, held for the lifetime of the store.
    #[allow(dead_code)]
    lock_file: Option<std::fs::File>,
}

impl Store {
    /// Open (or create) the store under the given directory.
    pub async fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;

        let lock_file = Self::try_acquire_lock(&dir.join(LOCK_FILE_NAME))?;

        let conn = Connection::open(dir.join(DB_FILE_NAME)).await?;
        conn.call(|conn: &mut rusqlite::Connection| {
            conn.pragma_update(None, "journal_mode", "WAL")?;
            conn.pragma_update(None, "synchronous", "NORMAL")?;
            conn.pragma_update(None, "foreign_keys", "ON")?;
            conn.pragma_update(None, "busy_timeout", 5000)?;
            Ok(())
        })
        .await?;

        let store = Self { conn, lock_file };
        store.create_schema().await?;
        Ok(store)
    }

    /// Create an ephemeral in-memory store, for tests.
    pub async fn open_ephemeral() -> Result<Self> {
        let conn = Connection::open(":memory:").await?;
        conn.call(|conn: &mut rusqlite::Connection| {
            conn.pragma_update(None, "foreign_keys", "ON")?;
            Ok(())
        })
        .await?;

        let store = Self {
            conn,
            lock_file: None,
        };
        store.create_schema().await?;
        Ok(store)
    }

    /// Try to acquire an advisory file lock.
    ///
    /// Returns the lock file handle if successful, or `None` (with a warning
    /// logged) if another warden instance holds it. The lock is released when
    /// the handle is dropped.
    fn try_acquire_lock(lock_path: &PathBuf) -> Result<Option<std::fs::File>> {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(lock_path)
            .map_err(|e| Error::Write(format!("failed to open lock file: {}", e)))?;

        match FileExt::try_lock_exclusive(&file) {
            Ok(()) => {
                let _ = file.set_len(0);
                let _ = writeln!(file, "{}", std::process::id());
                debug!("Acquired advisory lock on {:?}", lock_path);
                Ok(Some(file))
            }
            Err(e) => {
                warn!(
                    "Could not acquire store lock ({}). Another warden instance may be \
                     running; proceeding anyway, state conflicts are possible.",
                    e
                );
                Ok(None)
            }
        }
    }

    async fn create_schema(&self) -> Result<()> {
        self.conn
            .call(|conn: &mut rusqlite::Connection| {
                conn.execute_batch(
                    r#"
                    CREATE TABLE IF NOT EXISTS servers (
                        id TEXT PRIMARY KEY,
                        name TEXT NOT NULL UNIQUE,
                        image_uid TEXT NOT NULL,
                        memory INTEGER NOT NULL,
                        port INTEGER NOT NULL UNIQUE,
                        custom_startup TEXT,
                        status TEXT NOT NULL,
                        created_at TEXT NOT NULL
                    );

                    CREATE TABLE IF NOT EXISTS environment_variables (
                        id INTEGER PRIMARY KEY AUTOINCREMENT,
                        server_id TEXT NOT NULL REFERENCES servers(id),
                        variable TEXT NOT NULL,
                        value TEXT NOT NULL
                    );

                    CREATE TABLE IF NOT EXISTS additional_ports (
                        id INTEGER PRIMARY KEY AUTOINCREMENT,
                        server_id TEXT NOT NULL REFERENCES servers(id),
                        port INTEGER NOT NULL UNIQUE
                    );
                    "#,
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    // ========================================================================
    // Servers
    // ========================================================================

    /// Insert a new server record.
    ///
    /// UNIQUE violations are mapped to [`Error::NameTaken`] /
    /// [`Error::PortTaken`]; the store is left untouched in that case.
    pub async fn insert_server(&self, server: &Server) -> Result<()> {
        let s = server.clone();
        let result = self
            .conn
            .call(move |conn: &mut rusqlite::Connection| {
                conn.execute(
                    "INSERT INTO servers (id, name, image_uid, memory, port, custom_startup, status, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    rusqlite::params![
                        s.id,
                        s.name,
                        s.image_uid,
                        s.memory,
                        s.port,
                        s.custom_startup,
                        s.status.to_string(),
                        s.created_at.to_rfc3339(),
                    ],
                )?;
                Ok(())
            })
            .await;

        result.map_err(|e| Self::map_unique_violation(e, &server.name, server.port))
    }

    /// Map a UNIQUE constraint failure to the domain error it represents.
    fn map_unique_violation(e: tokio_rusqlite::Error, name: &str, port: u16) -> Error {
        let msg = e.to_string();
        if msg.contains("servers.name") {
            Error::NameTaken(name.to_string())
        } else if msg.contains("servers.port") || msg.contains("additional_ports.port") {
            Error::PortTaken(port)
        } else {
            Error::Database(e)
        }
    }

    pub async fn all_servers(&self) -> Result<Vec<Server>> {
        let servers = self
            .conn
            .call(|conn: &mut rusqlite::Connection| {
                let mut stmt = conn.prepare(
                    "SELECT id, name, image_uid, memory, port, custom_startup, status, created_at
                     FROM servers ORDER BY created_at",
                )?;
                let rows = stmt
                    .query_map([], row_to_server)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            })
            .await?;
        Ok(servers)
    }

    pub async fn server_by_name(&self, name: &str) -> Result<Option<Server>> {
        let name = name.to_lowercase();
        let server = self
            .conn
            .call(move |conn: &mut rusqlite::Connection| {
                let row = conn
                    .query_row(
                        "SELECT id, name, image_uid, memory, port, custom_startup, status, created_at
                         FROM servers WHERE name = ?1",
                        rusqlite::params![name],
                        row_to_server,
                    )
                    .optional()?;
                Ok(row)
            })
            .await?;
        Ok(server)
    }

    pub async fn server_by_id(&self, id: &str) -> Result<Option<Server>> {
        let id = id.to_string();
        let server = self
            .conn
            .call(move |conn: &mut rusqlite::Connection| {
                let row = conn
                    .query_row(
                        "SELECT id, name, image_uid, memory, port, custom_startup, status, created_at
                         FROM servers WHERE id = ?1",
                        rusqlite::params![id],
                        row_to_server,
                    )
                    .optional()?;
                Ok(row)
            })
            .await?;
        Ok(server)
    }

    pub async fn update_status(&self, server_id: &str, status: ServerStatus) -> Result<()> {
        let id = server_id.to_string();
        self.conn
            .call(move |conn: &mut rusqlite::Connection| {
                conn.execute(
                    "UPDATE servers SET status = ?1 WHERE id = ?2",
                    rusqlite::params![status.to_string(), id],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn update_name(&self, server_id: &str, new_name: &str) -> Result<()> {
        let id = server_id.to_string();
        let name = new_name.to_string();
        let result = self
            .conn
            .call(move |conn: &mut rusqlite::Connection| {
                conn.execute(
                    "UPDATE servers SET name = ?1 WHERE id = ?2",
                    rusqlite::params![name, id],
                )?;
                Ok(())
            })
            .await;
        result.map_err(|e| Self::map_unique_violation(e, new_name, 0))
    }

    /// Update a server's memory limit and primary port.
    ///
    /// A port collision surfaces as [`Error::PortTaken`] without mutating
    /// the store.
    pub async fn update_resources(&self, server_id: &str, memory: u32, port: u16) -> Result<()> {
        let id = server_id.to_string();
        let result = self
            .conn
            .call(move |conn: &mut rusqlite::Connection| {
                conn.execute(
                    "UPDATE servers SET memory = ?1, port = ?2 WHERE id = ?3",
                    rusqlite::params![memory, port, id],
                )?;
                Ok(())
            })
            .await;
        result.map_err(|e| Self::map_unique_violation(e, "", port))
    }

    /// Delete a server and everything it owns, in one transaction.
    pub async fn delete_server(&self, server_id: &str) -> Result<()> {
        let id = server_id.to_string();
        self.conn
            .call(move |conn: &mut rusqlite::Connection| {
                let tx = conn.transaction()?;
                tx.execute(
                    "DELETE FROM environment_variables WHERE server_id = ?1",
                    rusqlite::params![id],
                )?;
                tx.execute(
                    "DELETE FROM additional_ports WHERE server_id = ?1",
                    rusqlite::params![id],
                )?;
                tx.execute("DELETE FROM servers WHERE id = ?1", rusqlite::params![id])?;
                tx.commit()?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    // ========================================================================
    // Environment variables
    // ========================================================================

    pub async fn insert_env_var(&self, server_id: &str, variable: &str, value: &str) -> Result<()> {
        let (id, var, val) = (
            server_id.to_string(),
            variable.to_string(),
            value.to_string(),
        );
        self.conn
            .call(move |conn: &mut rusqlite::Connection| {
                conn.execute(
                    "INSERT INTO environment_variables (server_id, variable, value)
                     VALUES (?1, ?2, ?3)",
                    rusqlite::params![id, var, val],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn update_env_var(&self, server_id: &str, variable: &str, value: &str) -> Result<()> {
        let (id, var, val) = (
            server_id.to_string(),
            variable.to_string(),
            value.to_string(),
        );
        self.conn
            .call(move |conn: &mut rusqlite::Connection| {
                conn.execute(
                    "UPDATE environment_variables SET value = ?1
                     WHERE server_id = ?2 AND variable = ?3",
                    rusqlite::params![val, id, var],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn env_vars(&self, server_id: &str) -> Result<Vec<EnvironmentVariable>> {
        let id = server_id.to_string();
        let vars = self
            .conn
            .call(move |conn: &mut rusqlite::Connection| {
                let mut stmt = conn.prepare(
                    "SELECT server_id, variable, value FROM environment_variables
                     WHERE server_id = ?1",
                )?;
                let rows = stmt
                    .query_map(rusqlite::params![id], |row| {
                        Ok(EnvironmentVariable {
                            server_id: row.get(0)?,
                            variable: row.get(1)?,
                            value: row.get(2)?,
                        })
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            })
            .await?;
        Ok(vars)
    }

    // ========================================================================
    // Additional ports
    // ========================================================================

    pub async fn add_port(&self, server_id: &str, port: u16) -> Result<()> {
        let id = server_id.to_string();
        let result = self
            .conn
            .call(move |conn: &mut rusqlite::Connection| {
                conn.execute(
                    "INSERT INTO additional_ports (server_id, port) VALUES (?1, ?2)",
                    rusqlite::params![id, port],
                )?;
                Ok(())
            })
            .await;
        result.map_err(|e| Self::map_unique_violation(e, "", port))
    }

    pub async fn remove_port(&self, server_id: &str, port: u16) -> Result<()> {
        let id = server_id.to_string();
        self.conn
            .call(move |conn: &mut rusqlite::Connection| {
                conn.execute(
                    "DELETE FROM additional_ports WHERE server_id = ?1 AND port = ?2",
                    rusqlite::params![id, port],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn ports(&self, server_id: &str) -> Result<Vec<AdditionalPort>> {
        let id = server_id.to_string();
        let ports = self
            .conn
            .call(move |conn: &mut rusqlite::Connection| {
                let mut stmt = conn.prepare(
                    "SELECT server_id, port FROM additional_ports WHERE server_id = ?1",
                )?;
                let rows = stmt
                    .query_map(rusqlite::params![id], |row| {
                        Ok(AdditionalPort {
                            server_id: row.get(0)?,
                            port: row.get(1)?,
                        })
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            })
            .await?;
        Ok(ports)
    }
}

fn row_to_server(row: &rusqlite::Row<'_>) -> rusqlite::Result<Server> {
    let status_str: String = row.get(6)?;
    let created_at_str: String = row.get(7)?;
    Ok(Server {
        id: row.get(0)?,
        name: row.get(1)?,
        image_uid: row.get(2)?,
        memory: row.get(3)?,
        port: row.get(4)?,
        custom_startup: row.get(5)?,
        status: status_str.parse().unwrap_or(ServerStatus::Stopped),
        created_at: created_at_str
            .parse::<DateTime<Utc>>()
            .unwrap_or_else(|_| Utc::now()),
    })
}
