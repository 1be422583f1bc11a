//! Persisted store for server desired state.
//!
//! A small SQLite database holds one row per server plus its owned
//! environment-variable and additional-port rows. Name and port uniqueness
//! are the only cross-entity invariants and are enforced here on write.

pub mod sqlite;
pub mod types;

pub use sqlite::Store;
pub use types::{AdditionalPort, EnvironmentVariable, Server, ServerStatus};
