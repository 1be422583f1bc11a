mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use warden::Error as WardenError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        if let Some(warden_error) = e.downcast_ref::<WardenError>() {
            commands::print_error(warden_error);
        } else {
            eprintln!("Error: {:#}", e);
        }
        std::process::exit(1);
    }
}

fn init_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warden=warn",
        1 => "warden=info",
        2 => "warden=debug",
        _ => "warden=trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // Setup runs before any configuration record exists.
    if let Commands::Setup { data_path } = &cli.command {
        return commands::run_setup(cli.config.as_ref(), data_path.clone());
    }

    let servers = commands::build_servers(cli.config.as_ref()).await?;

    if commands::needs_daemon(&cli.command) && !warden::docker::is_daemon_healthy().await {
        anyhow::bail!("Docker daemon unreachable. Check that Docker is running with `docker ps`.");
    }

    match cli.command {
        Commands::Setup { .. } => unreachable!("handled above"),
        Commands::Create {
            name,
            image,
            memory,
            port,
            custom_startup,
            env,
            detach,
        } => {
            commands::run_create(
                &servers,
                name,
                image,
                memory,
                port,
                custom_startup,
                env,
                detach,
            )
            .await
        }
        Commands::Edit {
            name,
            memory,
            port,
            env,
        } => commands::run_edit(&servers, &name, memory, port, env).await,
        Commands::Start { name, console } => commands::run_start(&servers, &name, console).await,
        Commands::Stop { name } => commands::run_stop(&servers, &name).await,
        Commands::Restart { name } => commands::run_restart(&servers, &name).await,
        Commands::Kill { name } => commands::run_kill(&servers, &name).await,
        Commands::Remove { name, force } => commands::run_remove(&servers, &name, force).await,
        Commands::Rename { name, new_name } => {
            commands::run_rename(&servers, &name, &new_name).await
        }
        Commands::Command { name, line } => commands::run_command(&servers, &name, &line).await,
        Commands::Logs { name, tail } => commands::run_logs(&servers, &name, tail).await,
        Commands::Console { name, no_input } => {
            commands::run_console(&servers, &name, no_input).await
        }
        Commands::Sync => commands::run_sync(&servers).await,
        Commands::Servers { stats } => commands::run_servers(&servers, stats).await,
        Commands::Images => commands::run_images(&servers),
        Commands::Config(command) => commands::run_config(&servers, command).await,
        Commands::Port(command) => commands::run_port(&servers, command).await,
    }
}
