//! Server lifecycle reconciler.
//!
//! Owns the three-state machine (`installing` → `stopped` ⇄ `running`) and
//! every engine-facing side effect. All status transitions happen here;
//! nothing else mutates a server's status.

pub mod console;

use crate::docker::{container_name, ContainerRunSpec, ContainerStats, DockerClient};
use crate::environment::ContainerEnvironment;
use crate::error::{Error, Result};
use crate::images::{ImageCatalog, ImageDef};
use crate::store::{Server, ServerStatus, Store};
use chrono::Utc;
use rand::Rng;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Fixed interval for install/stop presence polls.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Where a server's data directory is mounted inside its container.
const CONTAINER_DATA_DIR: &str = "/server";

/// Name of the ephemeral install script inside the data directory.
const INSTALL_SCRIPT: &str = "install.sh";

/// Maximum length of a server name.
const MAX_NAME_LEN: usize = 20;

/// A server row optionally paired with a live resource snapshot.
#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub server: Server,
    /// `None` when stats were not requested or the container is absent.
    pub stats: Option<ContainerStats>,
}

/// The reconciler: converges live engine state toward each server's desired
/// status and drives all lifecycle transitions.
///
/// Takes its collaborators (store, engine client, image catalog) explicitly
/// at construction. A single reconciling process per store is assumed; the
/// core logic has no internal parallelism.
pub struct Servers {
    store: Store,
    docker: DockerClient,
    images: ImageCatalog,
    data_path: PathBuf,
}

impl Servers {
    pub fn new(store: Store, docker: DockerClient, images: ImageCatalog, data_path: PathBuf) -> Self {
        Self {
            store,
            docker,
            images,
            data_path,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn images(&self) -> &ImageCatalog {
        &self.images
    }

    pub(crate) fn docker(&self) -> &DockerClient {
        &self.docker
    }

    /// The server's on-disk data directory.
    pub fn data_dir(&self, server: &Server) -> PathBuf {
        self.data_path.join(server.data_dir_name())
    }

    // ========================================================================
    // Creation / lookup
    // ========================================================================

    /// Create a new server record in `installing` state.
    ///
    /// The image must exist in the catalog. One environment-variable row is
    /// inserted per declared image variable, taking the provided value or
    /// falling back to the image's default. Name and port collisions fail
    /// without mutating the store.
    pub async fn create(
        &self,
        name: &str,
        image_uid: &str,
        memory: u32,
        port: u16,
        custom_startup: Option<String>,
        variable_values: &[(String, String)],
    ) -> Result<Server> {
        let name = normalize_name(name)?;
        if memory == 0 {
            return Err(Error::Validation("memory must be a positive number of megabytes".into()));
        }
        let image = self.images.get(image_uid)?;

        let server = Server {
            id: random_id(),
            name,
            image_uid: image.uid.clone(),
            memory,
            port,
            custom_startup,
            status: ServerStatus::Installing,
            created_at: Utc::now(),
        };

        self.store.insert_server(&server).await?;

        for declared in &image.variables {
            let value = variable_values
                .iter()
                .find(|(variable, _)| variable == &declared.variable)
                .map(|(_, value)| value.clone())
                .unwrap_or_else(|| render_default(&declared.default));
            self.store
                .insert_env_var(&server.id, &declared.variable, &value)
                .await?;
        }

        info!("Created server '{}' ({})", server.name, server.id);
        Ok(server)
    }

    /// Look up a server by name.
    pub async fn query(&self, name: &str) -> Result<Server> {
        self.store
            .server_by_name(name)
            .await?
            .ok_or_else(|| Error::ServerNotFound(name.to_string()))
    }

    /// Edit a server's memory limit, primary port and stored variable values.
    ///
    /// Every named variable must be declared by the server's image; the
    /// whole edit is refused before anything is written otherwise. Changes
    /// take effect on the next start, when linked config keys are also
    /// written back.
    pub async fn edit(
        &self,
        server: &Server,
        memory: Option<u32>,
        port: Option<u16>,
        variables: &[(String, String)],
    ) -> Result<Server> {
        let image = self.images.get(&server.image_uid)?;

        if memory == Some(0) {
            return Err(Error::Validation(
                "memory must be a positive number of megabytes".into(),
            ));
        }
        for (variable, _) in variables {
            if !image.variables.iter().any(|v| &v.variable == variable) {
                return Err(Error::Validation(format!(
                    "image '{}' declares no variable '{}'",
                    image.uid, variable
                )));
            }
        }

        let memory = memory.unwrap_or(server.memory);
        let port = port.unwrap_or(server.port);
        self.store
            .update_resources(&server.id, memory, port)
            .await?;
        for (variable, value) in variables {
            self.store
                .update_env_var(&server.id, variable, value)
                .await?;
        }

        info!("Edited server '{}'", server.name);
        let mut edited = server.clone();
        edited.memory = memory;
        edited.port = port;
        Ok(edited)
    }

    /// All servers, optionally with a one-shot container resource snapshot.
    pub async fn all(&self, with_stats: bool) -> Result<Vec<ServerInfo>> {
        let mut out = Vec::new();
        for server in self.store.all_servers().await? {
            let stats = if with_stats {
                self.docker.stats(&container_name(&server.id)).await
            } else {
                None
            };
            out.push(ServerInfo { server, stats });
        }
        Ok(out)
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Reconcile every server against the live engine state.
    ///
    /// Idempotent: with no external state change, a second call performs no
    /// further container actions. The only status transition `sync` itself
    /// makes is the `installing` → `stopped` detection.
    pub async fn sync(&self) -> Result<()> {
        for server in self.store.all_servers().await? {
            match server.status {
                ServerStatus::Installing => {
                    if !self.container_alive(&server).await {
                        debug!("Install container for '{}' gone, marking stopped", server.name);
                        self.store
                            .update_status(&server.id, ServerStatus::Stopped)
                            .await?;
                    }
                }
                ServerStatus::Stopped => {
                    self._stop(&server).await?;
                }
                ServerStatus::Running => {
                    if !self.container_alive(&server).await {
                        info!("Server '{}' should be running, starting it", server.name);
                        self._start(&server).await?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Run the image's installation for a freshly created server.
    ///
    /// Materializes the data directory, writes the install script, and runs
    /// a short-lived install container that removes itself on exit. Unless
    /// `skip_wait` is set, blocks polling container presence until it exits;
    /// interrupting the wait is safe, the install continues server-side.
    ///
    /// If the install container cannot even be launched, the server record is
    /// rolled back (deleted) and a write error is surfaced.
    pub async fn install(&self, server: &Server, skip_wait: bool) -> Result<()> {
        let image = self.images.get(&server.image_uid)?;
        let path = self.data_dir(server);

        std::fs::create_dir_all(&path).map_err(|e| {
            Error::Write(format!("could not create server data directory: {}", e))
        })?;

        let script = format!(
            "cd {}\n{}\n",
            CONTAINER_DATA_DIR,
            image.installation.script.join("\n")
        );
        std::fs::write(path.join(INSTALL_SCRIPT), script)
            .map_err(|e| Error::Write(format!("could not write install script: {}", e)))?;

        let env = self.resolve_environment(server, image, true).await?;
        let spec = ContainerRunSpec {
            name: container_name(&server.id),
            image: image.installation.docker_image.clone(),
            command: vec![
                image.installation.shell.clone(),
                format!("{}/{}", CONTAINER_DATA_DIR, INSTALL_SCRIPT),
            ],
            bind: Some((
                path.display().to_string(),
                CONTAINER_DATA_DIR.to_string(),
            )),
            auto_remove: true,
            environment: env.to_docker_env(),
            ..Default::default()
        };

        if let Err(e) = self.docker.run_container(&spec).await {
            // An install that cannot even start must not leave an orphaned
            // `installing` row behind.
            warn!("Install container for '{}' failed to launch, rolling back", server.name);
            self.store.delete_server(&server.id).await?;
            return Err(Error::Write(format!(
                "could not create installation container: {}",
                e
            )));
        }

        info!("Installation container for '{}' started", server.name);

        if !skip_wait {
            while self.container_alive(server).await {
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        }
        Ok(())
    }

    /// Start a server: write back linked config variables, mark it running,
    /// and launch the main container.
    pub async fn start(&self, server: &Server) -> Result<()> {
        if server.status == ServerStatus::Installing {
            return Err(Error::ServerNotReady(server.name.clone()));
        }

        let image = self.images.get(&server.image_uid)?;
        crate::server_config::ServerConfig::parse(self, server, image)
            .await?
            .write_environment_variables()
            .await?;

        self.store
            .update_status(&server.id, ServerStatus::Running)
            .await?;
        self._start(server).await
    }

    /// Launch the main container for a server. Does not touch `status`.
    async fn _start(&self, server: &Server) -> Result<()> {
        let image = self.images.get(&server.image_uid)?;
        let path = self.data_dir(server);

        // Leftover from installation; absence is fine.
        let _ = std::fs::remove_file(path.join(INSTALL_SCRIPT));

        let env = self.resolve_environment(server, image, false).await?;
        let template = server.custom_startup.as_deref().unwrap_or(&image.command);
        let command = self.parse_startup_command(template, server, &env);

        let mut ports = vec![server.port];
        ports.extend(self.store.ports(&server.id).await?.iter().map(|p| p.port));

        let spec = ContainerRunSpec {
            name: container_name(&server.id),
            image: image.docker_image.clone(),
            command: split_command(&command),
            bind: Some((path.display().to_string(), CONTAINER_DATA_DIR.to_string())),
            working_dir: Some(CONTAINER_DATA_DIR.to_string()),
            ports,
            memory_mb: Some(server.memory),
            oom_kill_disable: true,
            // Stdin stays open for later command injection.
            stdin_open: true,
            auto_remove: true,
            environment: env.to_docker_env(),
            user: Some(image.user_or_root().to_string()),
        };

        self.docker.run_container(&spec).await?;
        info!("Server '{}' container started", server.name);
        Ok(())
    }

    /// Stop a server: mark it stopped and bring the container down.
    ///
    /// An `installing` server cannot be stopped gracefully; its container
    /// only goes away when the install finishes or via [`Servers::kill`].
    pub async fn stop(&self, server: &Server) -> Result<()> {
        if server.status == ServerStatus::Installing {
            return Err(Error::ServerNotReady(server.name.clone()));
        }
        self.store
            .update_status(&server.id, ServerStatus::Stopped)
            .await?;
        self._stop(server).await
    }

    /// Bring a server's container down. Does not touch `status`.
    ///
    /// Without a declared `stop_command` this is a direct engine stop (the
    /// engine owns the grace period). With one, the command is sent to the
    /// container's stdin and presence is polled until the container
    /// disappears. The wait has no upper bound; callers needing one should
    /// use [`Servers::kill`].
    async fn _stop(&self, server: &Server) -> Result<()> {
        let image = self.images.get(&server.image_uid)?;

        if !self.container_alive(server).await {
            return Ok(());
        }

        let Some(stop_command) = &image.stop_command else {
            self.docker.stop(&container_name(&server.id)).await?;
            info!("Server '{}' stopped", server.name);
            return Ok(());
        };

        self.command(server, stop_command).await?;
        while self.container_alive(server).await {
            tokio::time::sleep(POLL_INTERVAL).await;
        }
        info!("Server '{}' shut down gracefully", server.name);
        Ok(())
    }

    /// Immediately terminate a server's container. No grace period.
    ///
    /// Marks the server stopped so the next `sync` does not relaunch it.
    pub async fn kill(&self, server: &Server) -> Result<()> {
        if !self.container_alive(server).await {
            return Err(Error::ServerNotRunning(server.name.clone()));
        }
        self.docker.kill(&container_name(&server.id)).await?;
        self.store
            .update_status(&server.id, ServerStatus::Stopped)
            .await?;
        info!("Server '{}' killed", server.name);
        Ok(())
    }

    /// Remove a server: cascade-delete its rows, best-effort kill any live
    /// container, and recursively delete its data directory.
    pub async fn remove(&self, server: &Server) -> Result<()> {
        let path = self.data_dir(server);

        self.store.delete_server(&server.id).await?;

        // Absence is not an error here.
        if let Err(e) = self.docker.rm_force(&container_name(&server.id)).await {
            debug!("Ignoring container removal failure during remove: {}", e);
        }

        if let Err(e) = std::fs::remove_dir_all(&path) {
            debug!("Ignoring data directory removal failure: {}", e);
        }

        info!("Removed server '{}'", server.name);
        Ok(())
    }

    /// Rename a server and move its data directory.
    ///
    /// Refused while the container is alive. The record is only updated
    /// after the directory move succeeds, so a move failure never leaves the
    /// record pointing at a directory that doesn't exist.
    pub async fn rename(&self, server: &Server, new_name: &str) -> Result<Server> {
        let new_name = normalize_name(new_name)?;

        if self.container_alive(server).await {
            return Err(Error::ServerRunning(server.name.clone()));
        }
        if self.store.server_by_name(&new_name).await?.is_some() {
            return Err(Error::NameTaken(new_name));
        }

        let old_path = self.data_dir(server);
        let new_path = self.data_path.join(format!("{}_{}", new_name, server.id));
        std::fs::rename(&old_path, &new_path)
            .map_err(|e| Error::Write(format!("could not move server directory: {}", e)))?;

        self.store.update_name(&server.id, &new_name).await?;

        let mut renamed = server.clone();
        renamed.name = new_name;
        Ok(renamed)
    }

    /// A snapshot of the server's recent log output.
    pub async fn logs(&self, server: &Server, tail: usize) -> Result<String> {
        let output = match self.docker.logs(&container_name(&server.id), tail).await {
            Ok(output) => output,
            Err(e) if e.is_not_found() => {
                return Err(Error::ServerNotRunning(server.name.clone()))
            }
            Err(e) => return Err(e.into()),
        };
        let mut text = String::from_utf8_lossy(&output.stdout).to_string();
        // Game servers commonly log to stderr; present both streams.
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok(text)
    }

    /// Send a command line to the server's standard input.
    pub async fn command(&self, server: &Server, command: &str) -> Result<()> {
        if !self.container_alive(server).await {
            return Err(Error::ServerNotRunning(server.name.clone()));
        }
        self.docker
            .write_stdin(&container_name(&server.id), format!("{}\n", command).as_bytes())
            .await?;
        Ok(())
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    pub(crate) async fn container_alive(&self, server: &Server) -> bool {
        self.docker.exists(&container_name(&server.id)).await
    }

    /// Resolve the full environment for a server from its stored rows.
    pub async fn resolve_environment(
        &self,
        server: &Server,
        image: &ImageDef,
        install_phase: bool,
    ) -> Result<ContainerEnvironment> {
        let stored = self.store.env_vars(&server.id).await?;
        Ok(ContainerEnvironment::resolve(
            server,
            image,
            &stored,
            install_phase,
        ))
    }

    /// Substitute `{{SERVER_MEMORY}}`, `{{SERVER_PORT}}` and
    /// `{{image.env.<k>}}` tokens in a startup command template.
    fn parse_startup_command(
        &self,
        template: &str,
        server: &Server,
        env: &ContainerEnvironment,
    ) -> String {
        let cmd = template
            .replace("{{SERVER_MEMORY}}", &server.memory.to_string())
            .replace("{{SERVER_PORT}}", &server.port.to_string());
        env.parse_startup_command(&cmd)
    }
}

/// Lowercase and validate a server name.
fn normalize_name(name: &str) -> Result<String> {
    let name = name.trim().to_lowercase();
    if name.is_empty() {
        return Err(Error::InvalidName("name must not be empty".to_string()));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(Error::InvalidName(format!(
            "name is too long (max {} characters)",
            MAX_NAME_LEN
        )));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(Error::InvalidName(
            "name may only contain letters, digits, '-' and '_'".to_string(),
        ));
    }
    Ok(name)
}

/// Generate an 8-character lowercase alphanumeric server id.
fn random_id() -> String {
    const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    (0..8)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect()
}

/// Render an image variable's declared default as a stored string value.
fn render_default(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Split a startup command string into argv, honoring single and double
/// quotes. Mirrors how the Docker SDKs shlex-split command strings
/// client-side before handing them to the engine.
fn split_command(cmd: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_single = false;
    let mut in_double = false;

    for c in cmd.chars() {
        match c {
            '\'' if !in_double => in_single = !in_single,
            '"' if !in_single => in_double = !in_double,
            c if c.is_whitespace() && !in_single && !in_double => {
                if !current.is_empty() {
                    args.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        args.push(current);
    }
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_name_lowercases_and_bounds_length() {
        assert_eq!(normalize_name("Survival").unwrap(), "survival");
        assert_eq!(normalize_name("  my-server ").unwrap(), "my-server");
        assert!(normalize_name("").is_err());
        assert!(normalize_name("a-name-that-is-way-too-long").is_err());
        assert!(normalize_name("has space").is_err());
        assert!(normalize_name("slash/name").is_err());
    }

    #[test]
    fn random_id_shape() {
        let id = random_id();
        assert_eq!(id.len(), 8);
        assert!(id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
        // Two draws colliding would be astronomically unlikely
        assert_ne!(random_id(), random_id());
    }

    #[test]
    fn split_command_honors_quotes() {
        assert_eq!(
            split_command("java -Xmx1024M -jar server.jar"),
            vec!["java", "-Xmx1024M", "-jar", "server.jar"]
        );
        assert_eq!(
            split_command(r#"serve --motd "hello world" --pvp"#),
            vec!["serve", "--motd", "hello world", "--pvp"]
        );
        assert_eq!(
            split_command("echo 'single quoted arg'"),
            vec!["echo", "single quoted arg"]
        );
        assert!(split_command("   ").is_empty());
    }

    #[test]
    fn render_default_variants() {
        assert_eq!(render_default(&serde_json::json!("latest")), "latest");
        assert_eq!(render_default(&serde_json::json!(25565)), "25565");
        assert_eq!(render_default(&serde_json::json!(true)), "true");
        assert_eq!(render_default(&serde_json::Value::Null), "");
    }
}
