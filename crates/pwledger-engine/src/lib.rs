//! pwledger engine - session orchestration over the core
//!
//! Owns one open vault at a time: its store, transaction log, configuration,
//! clock and backends. Every public operation emits boundary logs, and slow
//! I/O is staged on tokio's blocking pool before anything is committed.
//!
//! ```no_run
//! use pwledger_core::logging_facility;
//! use pwledger_core_types::Sensitive;
//! use pwledger_engine::{EngineConfig, JsonFileBackend, Session};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # fn main() -> pwledger_core::Result<()> {
//! let config = EngineConfig::load(Path::new("pwledger.toml"))?;
//! logging_facility::init(config.logging_profile);
//!
//! let mut session = Session::new(config, Arc::new(JsonFileBackend::new()));
//! session.open(Path::new("vault.json"), &Sensitive::new("passphrase".to_string()))?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod persistence;
pub mod session;
pub mod staging;

pub use config::EngineConfig;
pub use persistence::JsonFileBackend;
pub use session::Session;
pub use staging::Staged;
