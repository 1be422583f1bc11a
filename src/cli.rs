use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "warden")]
#[command(about = "Warden - Manage containerized game servers")]
#[command(version)]
pub struct Cli {
    /// Path to the configuration record (defaults to the per-user location)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (repeatable)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the initial configuration record
    Setup {
        /// Root directory for server data directories
        data_path: PathBuf,
    },
    /// Create a new server and run its installation
    Create {
        /// Server name (lowercased, max 20 characters)
        name: String,
        /// Image uid to create the server from
        image: String,
        /// Memory limit in megabytes
        #[arg(short, long)]
        memory: u32,
        /// Primary port to expose
        #[arg(short, long)]
        port: Option<u16>,
        /// Startup command overriding the image default
        #[arg(long)]
        custom_startup: Option<String>,
        /// Image variable value as KEY=VALUE (repeatable; missing ones are prompted for)
        #[arg(short = 'e', long = "env", value_name = "KEY=VALUE")]
        env: Vec<String>,
        /// Return immediately instead of waiting for installation to finish
        #[arg(long)]
        detach: bool,
    },
    /// Change a server's memory, port or variable values
    Edit {
        /// Server name
        name: String,
        /// New memory limit in megabytes
        #[arg(short, long)]
        memory: Option<u32>,
        /// New primary port
        #[arg(short, long)]
        port: Option<u16>,
        /// Image variable value as KEY=VALUE (repeatable)
        #[arg(short = 'e', long = "env", value_name = "KEY=VALUE")]
        env: Vec<String>,
    },
    /// Start a server
    Start {
        /// Server name
        name: String,
        /// Attach to the console after starting
        #[arg(long)]
        console: bool,
    },
    /// Gracefully stop a server
    Stop {
        /// Server name
        name: String,
    },
    /// Stop and start a server
    Restart {
        /// Server name
        name: String,
    },
    /// Terminate a server's container immediately, without grace
    Kill {
        /// Server name
        name: String,
    },
    /// Delete a server, its records and its data directory
    Remove {
        /// Server name
        name: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
    /// Rename a server and move its data directory
    Rename {
        /// Current server name
        name: String,
        /// New server name
        new_name: String,
    },
    /// Send a command line to a running server's stdin
    Command {
        /// Server name
        name: String,
        /// Command line to send
        line: String,
    },
    /// Print a snapshot of a server's recent log output
    Logs {
        /// Server name
        name: String,
        /// Number of lines to show
        #[arg(short = 'n', long, default_value_t = 200)]
        tail: usize,
    },
    /// Attach to a server's console
    Console {
        /// Server name
        name: String,
        /// Stream logs only, without forwarding input
        #[arg(long)]
        no_input: bool,
    },
    /// Reconcile all servers against live container state
    Sync,
    /// List all servers
    Servers {
        /// Include a live CPU/memory snapshot per running server
        #[arg(long)]
        stats: bool,
    },
    /// List available images
    Images,
    /// Inspect or edit a server's configuration files
    #[command(subcommand)]
    Config(ConfigCommands),
    /// Manage a server's additional published ports
    #[command(subcommand)]
    Port(PortCommands),
}

#[derive(Subcommand)]
pub enum PortCommands {
    /// Publish an extra port (takes effect on next start)
    Add {
        /// Server name
        name: String,
        /// Port to publish
        port: u16,
    },
    /// Stop publishing an extra port (takes effect on next start)
    Remove {
        /// Server name
        name: String,
        /// Port to remove
        port: u16,
    },
    /// List a server's additional ports
    List {
        /// Server name
        name: String,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show every configurable setting of a server
    Get {
        /// Server name
        name: String,
    },
    /// Change one setting in one of the server's config files
    Set {
        /// Server name
        name: String,
        /// Config file the setting lives in
        file: String,
        /// Flattened setting path (e.g. `server-port` or `settings/motd`)
        variable: String,
        /// New value
        value: String,
    },
}
