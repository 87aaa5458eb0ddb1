//! Naily CLI
//!
//! Command-line interface for running and querying the Naily fact agent.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use naily_ipc::{FactSet, IpcClient, IpcError, Request, Response, ResponseData};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "naily")]
#[command(about = "Naily - key/value facts in a text file")]
#[command(version)]
struct Cli {
    /// Agent socket path
    #[arg(long, global = true, default_value = naily_ipc::DEFAULT_SOCKET_PATH)]
    socket: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the agent
    Start {
        /// Run in foreground (for debugging)
        #[arg(short, long)]
        foreground: bool,
    },

    /// Stop the agent
    Stop,

    /// Check if the agent is running
    Ping,

    /// Show agent metadata
    Describe,

    /// Look up one fact
    Get {
        /// Fact key
        key: String,
    },

    /// Replace the whole fact set
    Post {
        /// Facts as key=value; keys absent here are removed
        #[arg(value_parser = parse_fact)]
        facts: Vec<(String, String)>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Simple logging for CLI
    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::fmt().with_target(false).init();
    }

    let cli = Cli::parse();
    let client = IpcClient::with_socket_path(&cli.socket);

    match cli.command {
        Commands::Start { foreground } => cmd_start(&client, foreground),
        Commands::Stop => cmd_stop(&client).await,
        Commands::Ping => cmd_ping(&client).await,
        Commands::Describe => cmd_describe(&client).await,
        Commands::Get { key } => cmd_get(&client, &key).await,
        Commands::Post { facts } => cmd_post(&client, facts.into_iter().collect()).await,
    }
}

/// Split a `key=value` argument on its first `=`
fn parse_fact(arg: &str) -> Result<(String, String), String> {
    match arg.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!("expected key=value, got '{}'", arg)),
    }
}

fn cmd_start(client: &IpcClient, foreground: bool) -> Result<()> {
    if foreground {
        println!("Starting Naily agent in foreground...");
        println!("Press Ctrl+C to stop.");

        let status = std::process::Command::new("naily-agent")
            .status()
            .context("Failed to start agent. Is naily-agent in PATH?")?;

        if !status.success() {
            anyhow::bail!("Agent exited with error");
        }
    } else {
        if client.is_agent_running() {
            println!("Naily agent is already running.");
            return Ok(());
        }

        let child = std::process::Command::new("naily-agent")
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn()
            .context("Failed to start agent")?;

        println!("✓ Naily agent started (PID: {})", child.id());
    }

    Ok(())
}

async fn cmd_stop(client: &IpcClient) -> Result<()> {
    if !client.is_agent_running() {
        println!("Naily agent is not running.");
        return Ok(());
    }

    match client.request(Request::Shutdown).await {
        Ok(Response::Ack) => {
            println!("✓ Naily agent stopping...");

            // Wait a moment for cleanup
            tokio::time::sleep(std::time::Duration::from_millis(500)).await;

            if !client.is_agent_running() {
                println!("✓ Agent stopped.");
            }
        }
        Ok(resp) => {
            println!("Unexpected response: {:?}", resp);
        }
        Err(e) => {
            println!("Failed to stop agent: {}", e);
        }
    }

    Ok(())
}

async fn cmd_ping(client: &IpcClient) -> Result<()> {
    if !client.is_agent_running() {
        println!("✗ Agent not running");
        return Ok(());
    }

    let start = std::time::Instant::now();
    match client.request(Request::Ping).await {
        Ok(Response::Ok {
            data: Some(ResponseData::Pong { .. }),
        }) => {
            let elapsed = start.elapsed();
            println!("✓ Pong! ({:.2}ms)", elapsed.as_secs_f64() * 1000.0);
        }
        Ok(_) => {
            println!("✗ Unexpected response");
        }
        Err(e) => {
            println!("✗ Error: {}", e);
        }
    }

    Ok(())
}

async fn cmd_describe(client: &IpcClient) -> Result<()> {
    let metadata = client.describe().await.context("Failed to describe agent")?;

    println!("{}", metadata.name);
    println!();
    println!("  Description: {}", metadata.description);
    println!("  Author:      {}", metadata.author);
    println!("  License:     {}", metadata.license);
    println!("  Version:     {}", metadata.version);
    println!("  URL:         {}", metadata.url);
    println!("  Timeout:     {}s", metadata.timeout);

    Ok(())
}

async fn cmd_get(client: &IpcClient, key: &str) -> Result<()> {
    match client.get_fact(key).await {
        Ok(Some(value)) => println!("{}", value),
        Ok(None) => {
            // Absent keys are not an error for the agent; signal via exit code
            eprintln!("No fact named '{}'", key);
            std::process::exit(1);
        }
        Err(IpcError::AgentNotRunning) => {
            anyhow::bail!("Agent not running. Start with: naily start")
        }
        Err(e) => return Err(e).context("Failed to get fact"),
    }

    Ok(())
}

async fn cmd_post(client: &IpcClient, facts: FactSet) -> Result<()> {
    let count = facts.len();
    match client.post_facts(facts).await {
        Ok(msg) => {
            println!("✓ {} ({} facts)", msg, count);
            Ok(())
        }
        Err(IpcError::ActionFailed(message)) => anyhow::bail!("✗ {}", message),
        Err(e) => Err(e).context("Failed to post facts"),
    }
}
