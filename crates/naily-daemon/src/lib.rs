//! Naily Fact Agent
//!
//! The `get`/`post` fact agent and the process that serves it over IPC.

pub mod agent;
mod daemon;
mod signals;

pub use agent::FactAgent;
pub use daemon::Daemon;
