//! Docker engine client.
//!
//! All interactions with the container engine go through [`DockerClient`],
//! a thin wrapper over the `docker` CLI. Container absence is modelled as
//! [`DockerError::ContainerNotFound`] and treated as expected control flow by
//! the reconciler.

pub mod client;
pub mod error;

pub use client::{ContainerRunSpec, ContainerStats, DockerClient};
pub use error::DockerError;

use std::time::Duration;

/// Deterministic container name for a server id.
///
/// Exactly one container may exist per server at any time; this name is the
/// key that enforces it at the engine level.
pub fn container_name(server_id: &str) -> String {
    format!("warden_{}", server_id)
}

/// Check if the Docker daemon is healthy and responsive.
///
/// Uses `docker info` with a short timeout. Call this before attributing
/// container lookups failures to the containers themselves.
pub async fn is_daemon_healthy() -> bool {
    DockerClient::new()
        .daemon_healthy(Duration::from_secs(2))
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_name_is_deterministic() {
        assert_eq!(container_name("ab12cd34"), "warden_ab12cd34");
        assert_eq!(container_name("ab12cd34"), container_name("ab12cd34"));
    }
}
