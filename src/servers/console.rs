//! Interactive console attachment.
//!
//! Streams container logs to the caller and relays caller input lines to the
//! server's stdin through a detached background task. The relay task is the
//! only background concurrency in the system: it terminates silently on any
//! input-stream error and never touches reconciliation state.

use super::Servers;
use crate::docker::container_name;
use crate::error::{Error, Result};
use crate::store::Server;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

/// How many historical log lines to replay on attach.
const LOG_TAIL: usize = 200;

impl Servers {
    /// Attach to a server's console: stream its logs and, unless
    /// `disable_user_input` is set, forward each line of caller input to the
    /// server's stdin.
    ///
    /// Returns when the container exits or the log stream ends. Fails with
    /// [`Error::ServerNotRunning`] if no container exists.
    pub async fn console(&self, server: &Server, disable_user_input: bool) -> Result<()> {
        if !self.container_alive(server).await {
            return Err(Error::ServerNotRunning(server.name.clone()));
        }

        let relay = if disable_user_input {
            None
        } else {
            Some(self.spawn_input_relay(server))
        };

        let name = container_name(&server.id);
        let mut child = self.docker().logs_follow(&name, LOG_TAIL)?;
        let _ = child.wait().await;

        if let Some(task) = relay {
            task.abort();
        }
        Ok(())
    }

    /// Spawn the input-relay task: read caller stdin line by line and forward
    /// each to [`Servers::command`]'s transport. Exits silently when the
    /// input stream errors or closes, or when a forward fails (the container
    /// is gone).
    fn spawn_input_relay(&self, server: &Server) -> tokio::task::JoinHandle<()> {
        let docker = self.docker().clone();
        let name = container_name(&server.id);

        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if let Err(e) = docker
                            .write_stdin(&name, format!("{}\n", line).as_bytes())
                            .await
                        {
                            debug!("Console input relay stopping: {}", e);
                            break;
                        }
                    }
                    Ok(None) | Err(_) => break,
                }
            }
        })
    }
}
