//! Agent process lifecycle management.

use anyhow::{Context, Result};
use naily_core::{AgentConfig, FactStore};
use naily_ipc::IpcServer;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::agent::{self, FactAgent};
use crate::signals;

/// The agent process: one fact agent served over one socket
pub struct Daemon {
    config: AgentConfig,
    shutdown_tx: broadcast::Sender<()>,
    is_running: Arc<AtomicBool>,
}

impl Daemon {
    pub fn new(config: AgentConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            shutdown_tx,
            is_running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Build the agent wired to the process logger
    pub fn fact_agent(&self) -> FactAgent {
        let logger = naily_core::logging::logger();
        let store = FactStore::new(&self.config.fact_file, logger.clone());

        FactAgent::new(
            store,
            logger,
            agent::metadata(self.config.action_timeout()),
            self.shutdown_tx.clone(),
        )
    }

    /// Run until a signal or a `shutdown` request arrives
    pub async fn run(&self) -> Result<()> {
        self.acquire_pid_lock()?;

        self.is_running.store(true, Ordering::SeqCst);

        tracing::info!(
            socket = %self.config.socket_path.display(),
            fact_file = %self.config.fact_file.display(),
            "Agent starting"
        );

        let handler = Arc::new(self.fact_agent());

        let ipc_server = IpcServer::new(&self.config.socket_path, handler)
            .await
            .context("Failed to create IPC server")?
            .with_action_timeout(self.config.action_timeout());

        let shutdown_rx = self.shutdown_tx.subscribe();

        tokio::select! {
            result = ipc_server.run() => {
                if let Err(e) = result {
                    tracing::error!("IPC server error: {}", e);
                }
            }
            _ = signals::wait_for_shutdown(shutdown_rx) => {
                tracing::info!("Shutdown signal received");
            }
        }

        self.cleanup();

        Ok(())
    }

    /// Acquire PID lock to ensure single instance
    fn acquire_pid_lock(&self) -> Result<()> {
        let pid_file = &self.config.pid_file;

        if pid_file.exists() {
            if let Ok(pid_str) = std::fs::read_to_string(pid_file) {
                if let Ok(pid) = pid_str.trim().parse::<u32>() {
                    if is_process_running(pid) {
                        anyhow::bail!("Agent already running (PID: {})", pid);
                    }
                }
            }
            // Stale PID file
            std::fs::remove_file(pid_file)
                .with_context(|| format!("Failed to remove {}", pid_file.display()))?;
        }

        std::fs::write(pid_file, std::process::id().to_string())
            .with_context(|| format!("Failed to write {}", pid_file.display()))?;

        tracing::debug!(pid = std::process::id(), "PID lock acquired");

        Ok(())
    }

    /// Remove socket and PID file
    fn cleanup(&self) {
        tracing::info!("Cleaning up...");

        if self.config.socket_path.exists() {
            let _ = std::fs::remove_file(&self.config.socket_path);
        }

        if self.config.pid_file.exists() {
            let _ = std::fs::remove_file(&self.config.pid_file);
        }

        self.is_running.store(false, Ordering::SeqCst);

        tracing::info!("Cleanup complete");
    }
}

impl Drop for Daemon {
    fn drop(&mut self) {
        if self.is_running.load(Ordering::SeqCst) && self.config.pid_file.exists() {
            let _ = std::fs::remove_file(&self.config.pid_file);
        }
    }
}

/// Check if a process is running by PID
fn is_process_running(pid: u32) -> bool {
    // kill(pid, 0) only checks for existence
    unsafe { libc::kill(pid as i32, 0) == 0 }
}
