//! # Warden
//!
//! A lifecycle manager for containerized game servers.
//!
//! ## Features
//!
//! - **Lifecycle Reconciliation**: A three-state machine per server
//!   (`installing`, `stopped`, `running`) converged against live Docker
//!   state with `sync`
//! - **Image Catalog**: Validated JSON templates describing how to install,
//!   start, stop and configure each kind of server
//! - **Config Templating**: Flatten `properties`/`yaml`/`json` config files
//!   into addressable paths, edit single keys in place, and link keys to
//!   environment variables written back on every start
//! - **Persisted State**: SQLite-backed desired-state records with name and
//!   port uniqueness enforced on write
//! - **Console Attachment**: Stream a server's logs and relay input lines to
//!   its stdin
//!
//! ## Quick Start
//!
//! ```no_run
//! use warden::{DockerClient, ImageCatalog, Servers, Store};
//!
//! # async fn example() -> Result<(), warden::Error> {
//! let store = Store::open(std::path::Path::new("/var/lib/warden")).await?;
//! let images = ImageCatalog::load(std::path::Path::new("/etc/warden/images"))?;
//! let servers = Servers::new(
//!     store,
//!     DockerClient::new(),
//!     images,
//!     std::path::PathBuf::from("/srv/warden"),
//! );
//!
//! let server = servers
//!     .create("survival", "minecraft-vanilla", 2048, 25565, None, &[])
//!     .await?;
//! servers.install(&server, false).await?;
//! servers.sync().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Concurrency Model
//!
//! A single control path: every lifecycle method takes `&self` and runs to
//! completion before the next. The only background concurrency is the console
//! input-relay task. One managing process per store is assumed and guarded by
//! an advisory file lock.

pub mod config;
pub mod docker;
pub mod environment;
pub mod error;
pub mod images;
pub mod parser;
pub mod server_config;
pub mod servers;
pub mod store;

pub use config::AppConfig;
pub use docker::{DockerClient, DockerError};
pub use environment::ContainerEnvironment;
pub use error::{Error, Result};
pub use images::{ImageCatalog, ImageDef};
pub use server_config::ServerConfig;
pub use servers::{ServerInfo, Servers};
pub use store::{Server, ServerStatus, Store};
