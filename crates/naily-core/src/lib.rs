//! Naily Core Components
//!
//! This crate provides the fact store behind the Naily agent, together with
//! its configuration and the process-wide logger.

mod config;
mod error;
pub mod logging;
pub mod store;

pub use config::{AgentConfig, FACT_FILE_ENV};
pub use error::{ConfigError, StoreError};
pub use logging::{LogBuffer, Logger};
pub use naily_ipc::FactSet;
pub use store::FactStore;
