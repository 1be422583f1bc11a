//! Command handlers for the `warden` binary. Glue only: argument shaping,
//! prompting and output formatting around the library's boundary operations.

use crate::cli::{ConfigCommands, PortCommands};
use std::io::{BufRead, Write as _};
use std::path::PathBuf;
use warden::{AppConfig, DockerClient, Error, ImageCatalog, ServerConfig, Servers, Store};

/// Load the configuration record and wire up the reconciler.
pub async fn build_servers(config_path: Option<&PathBuf>) -> anyhow::Result<Servers> {
    let config = match config_path {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };

    let store = Store::open(&AppConfig::config_dir()).await?;
    let images = ImageCatalog::load(&AppConfig::image_dir())?;
    Ok(Servers::new(
        store,
        DockerClient::new(),
        images,
        config.data_path,
    ))
}

pub fn run_setup(config_path: Option<&PathBuf>, data_path: PathBuf) -> anyhow::Result<()> {
    let path = config_path
        .cloned()
        .unwrap_or_else(AppConfig::default_path);
    let config = AppConfig::write(&path, data_path)?;
    println!("Wrote configuration to {}", path.display());
    println!("Server data will live under {}", config.data_path.display());
    println!(
        "Place image definitions under {}",
        AppConfig::image_dir().display()
    );
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub async fn run_create(
    servers: &Servers,
    name: String,
    image_uid: String,
    memory: u32,
    port: Option<u16>,
    custom_startup: Option<String>,
    env: Vec<String>,
    detach: bool,
) -> anyhow::Result<()> {
    let image = servers.images().get(&image_uid)?;
    let port = port.unwrap_or(image.default_port);

    let mut values = parse_env_args(&env)?;
    prompt_missing_variables(image, &mut values)?;

    let server = servers
        .create(&name, &image_uid, memory, port, custom_startup, &values)
        .await?;
    println!("Created server '{}' ({})", server.name, server.id);

    println!("Installing...");
    servers.install(&server, detach).await?;
    if detach {
        println!("Installation running in the background; `warden sync` will pick up the result.");
    } else {
        servers.sync().await?;
        println!("Installation finished. Start the server with: warden start {}", server.name);
    }
    Ok(())
}

pub async fn run_edit(
    servers: &Servers,
    name: &str,
    memory: Option<u32>,
    port: Option<u16>,
    env: Vec<String>,
) -> anyhow::Result<()> {
    let server = servers.query(name).await?;
    let variables = parse_env_args(&env)?;
    let edited = servers.edit(&server, memory, port, &variables).await?;
    println!(
        "Updated '{}' ({} MB, port {}). Restart the server for the changes to take effect.",
        edited.name, edited.memory, edited.port
    );
    Ok(())
}

pub async fn run_start(servers: &Servers, name: &str, console: bool) -> anyhow::Result<()> {
    let server = servers.query(name).await?;
    servers.start(&server).await?;
    println!("Server '{}' started", server.name);
    if console {
        servers.console(&server, false).await?;
    }
    Ok(())
}

pub async fn run_stop(servers: &Servers, name: &str) -> anyhow::Result<()> {
    let server = servers.query(name).await?;
    println!("Stopping '{}'...", server.name);
    servers.stop(&server).await?;
    println!("Server '{}' stopped", server.name);
    Ok(())
}

pub async fn run_restart(servers: &Servers, name: &str) -> anyhow::Result<()> {
    let server = servers.query(name).await?;
    println!("Restarting '{}'...", server.name);
    servers.stop(&server).await?;
    servers.start(&server).await?;
    println!("Server '{}' restarted", server.name);
    Ok(())
}

pub async fn run_kill(servers: &Servers, name: &str) -> anyhow::Result<()> {
    let server = servers.query(name).await?;
    servers.kill(&server).await?;
    println!("Server '{}' killed", server.name);
    Ok(())
}

pub async fn run_remove(servers: &Servers, name: &str, force: bool) -> anyhow::Result<()> {
    let server = servers.query(name).await?;
    if !force && !confirm(&format!(
        "Remove server '{}' and delete all of its data?",
        server.name
    ))? {
        println!("Aborted");
        return Ok(());
    }
    servers.remove(&server).await?;
    println!("Removed server '{}'", server.name);
    Ok(())
}

pub async fn run_rename(servers: &Servers, name: &str, new_name: &str) -> anyhow::Result<()> {
    let server = servers.query(name).await?;
    let renamed = servers.rename(&server, new_name).await?;
    println!("Renamed '{}' to '{}'", name, renamed.name);
    Ok(())
}

pub async fn run_command(servers: &Servers, name: &str, line: &str) -> anyhow::Result<()> {
    let server = servers.query(name).await?;
    servers.command(&server, line).await?;
    Ok(())
}

pub async fn run_logs(servers: &Servers, name: &str, tail: usize) -> anyhow::Result<()> {
    let server = servers.query(name).await?;
    print!("{}", servers.logs(&server, tail).await?);
    Ok(())
}

pub async fn run_console(servers: &Servers, name: &str, no_input: bool) -> anyhow::Result<()> {
    let server = servers.query(name).await?;
    servers.console(&server, no_input).await?;
    Ok(())
}

pub async fn run_sync(servers: &Servers) -> anyhow::Result<()> {
    servers.sync().await?;
    println!("All servers reconciled");
    Ok(())
}

pub async fn run_servers(servers: &Servers, with_stats: bool) -> anyhow::Result<()> {
    let infos = servers.all(with_stats).await?;
    if infos.is_empty() {
        println!("No servers. Create one with `warden create`.");
        return Ok(());
    }

    if with_stats {
        println!(
            "{:<20} {:<10} {:<20} {:<7} {:<9} {:<8} {}",
            "NAME", "STATUS", "IMAGE", "PORT", "MEMORY", "CPU", "MEM USAGE"
        );
    } else {
        println!(
            "{:<20} {:<10} {:<20} {:<7} {}",
            "NAME", "STATUS", "IMAGE", "PORT", "MEMORY"
        );
    }

    for info in infos {
        let s = &info.server;
        if with_stats {
            let (cpu, mem) = match &info.stats {
                Some(stats) => (stats.cpu_percent.clone(), stats.memory_usage.clone()),
                None => ("-".to_string(), "-".to_string()),
            };
            println!(
                "{:<20} {:<10} {:<20} {:<7} {:<9} {:<8} {}",
                s.name,
                s.status.to_string(),
                s.image_uid,
                s.port,
                format!("{} MB", s.memory),
                cpu,
                mem
            );
        } else {
            println!(
                "{:<20} {:<10} {:<20} {:<7} {} MB",
                s.name,
                s.status.to_string(),
                s.image_uid,
                s.port,
                s.memory
            );
        }
    }
    Ok(())
}

pub fn run_images(servers: &Servers) -> anyhow::Result<()> {
    let images = servers.images().all();
    if images.is_empty() {
        println!(
            "No images found under {}",
            AppConfig::image_dir().display()
        );
        return Ok(());
    }

    println!("{:<25} {:<25} {:<20} {}", "UID", "NAME", "AUTHOR", "DEFAULT PORT");
    for image in images {
        println!(
            "{:<25} {:<25} {:<20} {}",
            image.uid, image.name, image.author, image.default_port
        );
    }
    Ok(())
}

pub async fn run_config(servers: &Servers, command: ConfigCommands) -> anyhow::Result<()> {
    match command {
        ConfigCommands::Get { name } => {
            let server = servers.query(&name).await?;
            let image = servers.images().get(&server.image_uid)?;
            let config = ServerConfig::parse(servers, &server, image).await?;

            let settings = config.settings();
            if settings.is_empty() {
                println!("Image '{}' declares no configurable files", image.uid);
                return Ok(());
            }
            println!("{:<25} {:<30} {}", "FILE", "SETTING", "VALUE");
            for (file, path, value) in settings {
                println!("{:<25} {:<30} {}", file, path, render_value(value));
            }
        }
        ConfigCommands::Set {
            name,
            file,
            variable,
            value,
        } => {
            let server = servers.query(&name).await?;
            let image = servers.images().get(&server.image_uid)?;
            let config = ServerConfig::parse(servers, &server, image).await?;
            config.edit(&file, &variable, &value, false).await?;
            println!("Set {}:{} = {}", file, variable, value);
        }
    }
    Ok(())
}

pub async fn run_port(servers: &Servers, command: PortCommands) -> anyhow::Result<()> {
    match command {
        PortCommands::Add { name, port } => {
            let server = servers.query(&name).await?;
            servers.store().add_port(&server.id, port).await?;
            println!("Port {} will be published on the next start of '{}'", port, server.name);
        }
        PortCommands::Remove { name, port } => {
            let server = servers.query(&name).await?;
            servers.store().remove_port(&server.id, port).await?;
            println!("Port {} removed from '{}'", port, server.name);
        }
        PortCommands::List { name } => {
            let server = servers.query(&name).await?;
            println!("{} (primary)", server.port);
            for port in servers.store().ports(&server.id).await? {
                println!("{}", port.port);
            }
        }
    }
    Ok(())
}

fn render_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn parse_env_args(env: &[String]) -> anyhow::Result<Vec<(String, String)>> {
    env.iter()
        .map(|pair| {
            pair.split_once('=')
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .ok_or_else(|| {
                    anyhow::anyhow!("invalid --env '{}', expected KEY=VALUE", pair)
                })
        })
        .collect()
}

/// Interactively ask for every declared image variable not already provided.
fn prompt_missing_variables(
    image: &warden::ImageDef,
    values: &mut Vec<(String, String)>,
) -> anyhow::Result<()> {
    for declared in &image.variables {
        if declared.hidden || values.iter().any(|(k, _)| k == &declared.variable) {
            continue;
        }
        let default = match &declared.default {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Null => String::new(),
            other => other.to_string(),
        };
        print!("{} [{}]: ", declared.prompt, default);
        std::io::stdout().flush()?;
        let mut line = String::new();
        std::io::stdin().lock().read_line(&mut line)?;
        let answer = line.trim();
        if !answer.is_empty() {
            values.push((declared.variable.clone(), answer.to_string()));
        }
    }
    Ok(())
}

fn confirm(question: &str) -> anyhow::Result<bool> {
    print!("{} [y/N]: ", question);
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(matches!(line.trim().to_lowercase().as_str(), "y" | "yes"))
}

/// Map command names to whether they require a reachable Docker daemon.
pub fn needs_daemon(command: &crate::cli::Commands) -> bool {
    use crate::cli::Commands;
    !matches!(
        command,
        Commands::Setup { .. } | Commands::Images | Commands::Port(_) | Commands::Edit { .. }
    )
}

/// Print a library error the way the binary presents failures, including the
/// suggestion when one exists.
pub fn print_error(error: &Error) {
    eprintln!("Error: {}", error.with_suggestion());
}
