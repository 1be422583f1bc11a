//! Kill semantics against a live-looking container.
//!
//! A stand-in `docker` executable that reports success for every subcommand
//! is placed first on PATH, so container probes see the container as present.
//! This file holds a single test; the PATH change is process-wide and every
//! integration test file runs as its own process.

use std::os::unix::fs::PermissionsExt;
use warden::images::{
    ImageCatalog, ImageConfig, ImageDef, ImageMeta, Installation,
};
use warden::store::ServerStatus;
use warden::{DockerClient, Servers, Store};

fn install_stub_docker(dir: &tempfile::TempDir) {
    let path = dir.path().join("docker");
    std::fs::write(&path, "#!/bin/sh\nexit 0\n").unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();

    let old = std::env::var("PATH").unwrap_or_default();
    std::env::set_var("PATH", format!("{}:{}", dir.path().display(), old));
}

fn test_image() -> ImageDef {
    ImageDef {
        meta: ImageMeta { api_version: 2 },
        uid: "minecraft-vanilla".to_string(),
        name: "Minecraft Vanilla".to_string(),
        author: "warden".to_string(),
        docker_image: "eclipse-temurin:17".to_string(),
        command: "java -jar server.jar".to_string(),
        default_port: 25565,
        user: None,
        stop_command: None,
        default_image: true,
        variables: vec![],
        installation: Installation {
            docker_image: "eclipse-temurin:17".to_string(),
            shell: "/bin/bash".to_string(),
            script: vec!["echo installed".to_string()],
        },
        config: ImageConfig { files: vec![] },
    }
}

#[tokio::test]
async fn kill_marks_server_stopped() {
    let stub = tempfile::tempdir().unwrap();
    install_stub_docker(&stub);

    let data = tempfile::tempdir().unwrap();
    let store = Store::open_ephemeral().await.unwrap();
    let catalog = ImageCatalog::from_images(vec![test_image()]);
    let servers = Servers::new(store, DockerClient::new(), catalog, data.path().to_path_buf());

    let server = servers
        .create("survival", "minecraft-vanilla", 1024, 25565, None, &[])
        .await
        .unwrap();
    servers
        .store()
        .update_status(&server.id, ServerStatus::Running)
        .await
        .unwrap();
    let server = servers.query("survival").await.unwrap();

    servers.kill(&server).await.unwrap();
    assert_eq!(
        servers.query("survival").await.unwrap().status,
        ServerStatus::Stopped
    );

    // The killed server stays down across the next reconciliation pass
    servers.sync().await.unwrap();
    assert_eq!(
        servers.query("survival").await.unwrap().status,
        ServerStatus::Stopped
    );
}
