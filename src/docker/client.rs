//! Centralized Docker CLI client.
//!
//! All Docker CLI interactions go through `DockerClient`, which provides
//! consistent timeout handling, error mapping to [`DockerError`], and a single
//! point where `Command::new("docker")` is constructed.

use super::DockerError;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::io::AsyncWriteExt;

/// Timeout for quick inspection commands.
pub const INSPECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Timeout for stop/kill/rm operations.
pub const LIFECYCLE_TIMEOUT: Duration = Duration::from_secs(60);
/// Timeout for `docker run`, sized to cover an image pull on first use.
pub const RUN_TIMEOUT: Duration = Duration::from_secs(600);

/// One-shot resource usage snapshot for a running container.
#[derive(Debug, Clone)]
pub struct ContainerStats {
    /// CPU load as reported by `docker stats`, e.g. "2.35%".
    pub cpu_percent: String,
    /// Memory usage, e.g. "210MiB / 1GiB".
    pub memory_usage: String,
    /// Memory usage as a percentage of the limit, e.g. "20.5%".
    pub memory_percent: String,
}

/// Everything needed to launch a warden-managed container.
///
/// Built by the reconciler; the client turns it into a `docker run` argument
/// vector. `command` is already split into argv form.
#[derive(Debug, Clone, Default)]
pub struct ContainerRunSpec {
    pub name: String,
    pub image: String,
    pub command: Vec<String>,
    /// Host path bind-mounted at `working_dir`.
    pub bind: Option<(String, String)>,
    pub working_dir: Option<String>,
    /// Ports published 1:1 on the host, each for both tcp and udp.
    pub ports: Vec<u16>,
    /// Memory limit in megabytes.
    pub memory_mb: Option<u32>,
    pub oom_kill_disable: bool,
    pub stdin_open: bool,
    pub auto_remove: bool,
    pub environment: Vec<(String, String)>,
    pub user: Option<String>,
}

impl ContainerRunSpec {
    /// Build the argument vector after `docker` (i.e. `run -d ...`).
    fn to_args(&self) -> Vec<String> {
        let mut args = vec!["run".to_string(), "-d".to_string()];
        args.push("--name".to_string());
        args.push(self.name.clone());
        if self.auto_remove {
            args.push("--rm".to_string());
        }
        if self.stdin_open {
            args.push("-i".to_string());
        }
        if let Some((host, container)) = &self.bind {
            args.push("-v".to_string());
            args.push(format!("{}:{}", host, container));
        }
        if let Some(dir) = &self.working_dir {
            args.push("-w".to_string());
            args.push(dir.clone());
        }
        for port in &self.ports {
            args.push("-p".to_string());
            args.push(format!("{}:{}/tcp", port, port));
            args.push("-p".to_string());
            args.push(format!("{}:{}/udp", port, port));
        }
        if let Some(mb) = self.memory_mb {
            args.push("--memory".to_string());
            args.push(format!("{}m", mb));
        }
        if self.oom_kill_disable {
            args.push("--oom-kill-disable".to_string());
        }
        for (key, value) in &self.environment {
            args.push("-e".to_string());
            args.push(format!("{}={}", key, value));
        }
        if let Some(user) = &self.user {
            args.push("--user".to_string());
            args.push(user.clone());
        }
        args.push(self.image.clone());
        args.extend(self.command.iter().cloned());
        args
    }
}

/// Centralized client for Docker CLI operations.
///
/// Wraps all `docker` subprocess invocations with consistent timeout handling
/// and structured [`DockerError`] returns. Construct once and thread through
/// the application; the struct is cheap (zero-sized today).
#[derive(Debug, Clone, Default)]
pub struct DockerClient;

impl DockerClient {
    pub fn new() -> Self {
        DockerClient
    }

    /// Run a docker command with a timeout, returning raw Output.
    async fn run(&self, args: &[&str], timeout: Duration) -> Result<Output, DockerError> {
        let result = tokio::time::timeout(
            timeout,
            tokio::process::Command::new("docker").args(args).output(),
        )
        .await;

        let cmd_str = format!("docker {}", args.join(" "));

        match result {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(DockerError::exec_failed(cmd_str, e)),
            Err(_) => Err(DockerError::timeout(cmd_str, timeout)),
        }
    }

    /// Run a docker command with a timeout, returning Output only if exit 0.
    async fn run_success(&self, args: &[&str], timeout: Duration) -> Result<Output, DockerError> {
        let output = self.run(args, timeout).await?;
        if output.status.success() {
            Ok(output)
        } else {
            let cmd_str = format!("docker {}", args.join(" "));
            Err(DockerError::failed(&cmd_str, &output))
        }
    }

    // ========================================================================
    // Container lifecycle
    // ========================================================================

    /// Launch a container. Returns the container ID on success.
    pub async fn run_container(&self, spec: &ContainerRunSpec) -> Result<String, DockerError> {
        let args = spec.to_args();
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = self.run_success(&arg_refs, RUN_TIMEOUT).await?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Stop a container gracefully. The engine owns the grace period.
    pub async fn stop(&self, container: &str) -> Result<(), DockerError> {
        self.run_success(&["stop", container], LIFECYCLE_TIMEOUT)
            .await?;
        Ok(())
    }

    /// Kill a container (SIGKILL). Absence is not an error.
    pub async fn kill(&self, container: &str) -> Result<(), DockerError> {
        let output = self.run(&["kill", container], LIFECYCLE_TIMEOUT).await?;
        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        // Container already stopped or doesn't exist, not an error
        if stderr.contains("No such container") || stderr.contains("is not running") {
            return Ok(());
        }
        Err(DockerError::failed("docker kill", &output))
    }

    /// Force-remove a container. Returns `Ok(())` if container doesn't exist.
    pub async fn rm_force(&self, container: &str) -> Result<(), DockerError> {
        let output = self.run(&["rm", "-f", container], LIFECYCLE_TIMEOUT).await?;
        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("No such container") {
            return Ok(());
        }
        Err(DockerError::failed("docker rm -f", &output))
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    /// Check if a container exists (running or not).
    ///
    /// Warden containers run with `--rm`, so for managed containers existence
    /// and aliveness coincide.
    pub async fn exists(&self, container: &str) -> bool {
        match self
            .run(
                &["inspect", "--type=container", container],
                INSPECT_TIMEOUT,
            )
            .await
        {
            Ok(o) => o.status.success(),
            Err(_) => false,
        }
    }

    /// One-shot resource usage snapshot for a container.
    ///
    /// Returns `None` if the container is gone or stats are unavailable on
    /// this host.
    pub async fn stats(&self, container: &str) -> Option<ContainerStats> {
        let output = self
            .run(
                &[
                    "stats",
                    "--no-stream",
                    "--format",
                    "{{.CPUPerc}}\t{{.MemUsage}}\t{{.MemPerc}}",
                    container,
                ],
                Duration::from_secs(15),
            )
            .await
            .ok()?;
        if !output.status.success() {
            return None;
        }
        let line = String::from_utf8_lossy(&output.stdout);
        let mut fields = line.trim().split('\t');
        Some(ContainerStats {
            cpu_percent: fields.next()?.to_string(),
            memory_usage: fields.next()?.to_string(),
            memory_percent: fields.next()?.to_string(),
        })
    }

    // ========================================================================
    // Logs / stdin
    // ========================================================================

    /// Fetch container logs.
    pub async fn logs(&self, container: &str, tail: usize) -> Result<Output, DockerError> {
        let tail_str = tail.to_string();
        self.run_success(
            &["logs", "--tail", &tail_str, container],
            INSPECT_TIMEOUT,
        )
        .await
    }

    /// Spawn `docker logs -f`, inheriting stdout/stderr.
    ///
    /// The returned child streams until the container exits or the caller
    /// kills it.
    pub fn logs_follow(
        &self,
        container: &str,
        tail: usize,
    ) -> Result<tokio::process::Child, DockerError> {
        tokio::process::Command::new("docker")
            .args(["logs", "--tail", &tail.to_string(), "-f", container])
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| DockerError::exec_failed(format!("docker logs -f {}", container), e))
    }

    /// Write bytes to a container's attached standard input.
    ///
    /// Spawns `docker attach`, writes the payload, then kills the attach
    /// client. Killing the client detaches without signalling the container;
    /// closing its stdin instead would be forwarded as EOF.
    pub async fn write_stdin(&self, container: &str, data: &[u8]) -> Result<(), DockerError> {
        let cmd_str = format!("docker attach {}", container);
        let mut child = tokio::process::Command::new("docker")
            .args(["attach", container])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| DockerError::exec_failed(&cmd_str, e))?;

        let mut stdin = child.stdin.take().ok_or_else(|| {
            DockerError::exec_failed(
                &cmd_str,
                std::io::Error::new(std::io::ErrorKind::BrokenPipe, "no stdin handle"),
            )
        })?;
        stdin
            .write_all(data)
            .await
            .map_err(|e| DockerError::exec_failed(&cmd_str, e))?;
        stdin
            .flush()
            .await
            .map_err(|e| DockerError::exec_failed(&cmd_str, e))?;

        // Give the daemon a moment to forward the payload before detaching.
        tokio::time::sleep(Duration::from_millis(100)).await;
        let _ = child.kill().await;
        Ok(())
    }

    // ========================================================================
    // Daemon health
    // ========================================================================

    /// Check if the Docker daemon is healthy.
    pub async fn daemon_healthy(&self, timeout: Duration) -> bool {
        match self
            .run(&["info", "--format", "{{.ServerVersion}}"], timeout)
            .await
        {
            Ok(o) => o.status.success(),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_spec_builds_full_argument_vector() {
        let spec = ContainerRunSpec {
            name: "warden_abc123".to_string(),
            image: "eclipse-temurin:17".to_string(),
            command: vec!["java".to_string(), "-jar".to_string(), "server.jar".to_string()],
            bind: Some(("/data/mc_abc123".to_string(), "/server".to_string())),
            working_dir: Some("/server".to_string()),
            ports: vec![25565, 25575],
            memory_mb: Some(1024),
            oom_kill_disable: true,
            stdin_open: true,
            auto_remove: true,
            environment: vec![("SERVER_PORT".to_string(), "25565".to_string())],
            user: Some("root".to_string()),
        };

        let args = spec.to_args();
        assert_eq!(args[0], "run");
        assert_eq!(args[1], "-d");
        assert!(args.contains(&"--rm".to_string()));
        assert!(args.contains(&"-i".to_string()));
        assert!(args.contains(&"/data/mc_abc123:/server".to_string()));
        assert!(args.contains(&"25565:25565/tcp".to_string()));
        assert!(args.contains(&"25565:25565/udp".to_string()));
        assert!(args.contains(&"25575:25575/tcp".to_string()));
        assert!(args.contains(&"1024m".to_string()));
        assert!(args.contains(&"--oom-kill-disable".to_string()));
        assert!(args.contains(&"SERVER_PORT=25565".to_string()));
        // Image comes before the command argv
        let image_pos = args.iter().position(|a| a == "eclipse-temurin:17").unwrap();
        assert_eq!(&args[image_pos + 1..], ["java", "-jar", "server.jar"]);
    }

    #[test]
    fn run_spec_minimal() {
        let spec = ContainerRunSpec {
            name: "warden_x".to_string(),
            image: "alpine".to_string(),
            ..Default::default()
        };
        let args = spec.to_args();
        assert_eq!(
            args,
            vec!["run", "-d", "--name", "warden_x", "alpine"]
        );
    }

    #[tokio::test]
    async fn nonexistent_container_does_not_exist() {
        assert!(!DockerClient::new().exists("warden-no-such-container-xyz").await);
    }
}
