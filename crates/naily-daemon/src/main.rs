//! Naily Agent
//!
//! Background process serving the fact agent on a Unix socket.

use anyhow::Result;
use naily_core::{AgentConfig, Logger};
use naily_daemon::Daemon;

/// Run the agent
async fn run(config: AgentConfig) -> Result<()> {
    let daemon = Daemon::new(config);
    daemon.run().await
}

fn main() -> Result<()> {
    let config = AgentConfig::load();

    // One sink for the agent, the host layer and bare tracing calls
    let logger = Logger::stdout(&config.log_level);
    naily_core::logging::set_logger(logger.clone());
    tracing::dispatcher::set_global_default(logger.dispatch().clone())?;

    tracing::info!("Starting Naily agent v{}", env!("CARGO_PKG_VERSION"));

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run(config))
}
