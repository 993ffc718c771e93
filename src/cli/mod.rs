//! CLI commands for Agent Matrix using clap.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{get_settings_path, load_settings_from, save_settings, AgentConfig, Settings};
use crate::core::routing::run_router;
use crate::logging::{LogFormat, LogOptions};
use crate::matrix::Matrix;
use crate::web::{run_server, AppState, WebServerConfig};

/// Agent Matrix - connection hub for multi-agent platforms.
#[derive(Parser)]
#[command(name = "agent-matrix")]
#[command(version)]
#[command(about = "Agent Matrix - relay between remote agents and their proxies", long_about = None)]
pub struct Commands {
    /// Settings file (defaults to ~/.agent-matrix/settings.json)
    #[arg(long, global = true, env = "AGENT_MATRIX_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log directory (defaults to the per-user data directory)
    #[arg(long, global = true, env = "AGENT_MATRIX_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    /// Log file format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the hub
    Serve {
        /// Address to bind (overrides server.host)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind (overrides server.port)
        #[arg(long, short)]
        port: Option<u16>,

        /// Do not forward messages between agents
        #[arg(long)]
        no_routing: bool,
    },

    /// List configured agents
    Agents,

    /// Write a default settings file
    Init {
        /// Agent ids to pre-register
        agents: Vec<String>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Show the resolved settings
    Config,
}

impl Commands {
    pub fn log_options(&self) -> LogOptions {
        LogOptions {
            dir: self.log_dir.clone(),
            format: self.log_format,
        }
    }

    /// Run the selected command.
    pub async fn run(self) -> Result<()> {
        let path = match self.config {
            Some(path) => path,
            None => get_settings_path()?,
        };

        match self.command {
            Command::Serve {
                host,
                port,
                no_routing,
            } => cmd_serve(&path, host, port, no_routing).await,
            Command::Agents => cmd_agents(&path),
            Command::Init { agents, force } => cmd_init(&path, agents, force),
            Command::Config => cmd_config(&path),
        }
    }
}

async fn cmd_serve(
    path: &std::path::Path,
    host: Option<String>,
    port: Option<u16>,
    no_routing: bool,
) -> Result<()> {
    let settings = load_settings_from(path)?;
    let registry = Arc::new(settings.build_registry()?);
    if registry.is_empty() {
        tracing::warn!("No agents configured; every connection will be rejected");
    } else {
        tracing::info!("Registered agents: {}", registry.agent_ids().join(", "));
    }

    let matrix = Arc::new(Matrix::new(registry.clone(), settings.matrix_config()));
    let shutdown = matrix.shutdown_token().clone();

    {
        let matrix = matrix.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Received Ctrl+C");
            }
            matrix.shutdown();
        });
    }

    let router = if settings.routing.enabled && !no_routing {
        Some(tokio::spawn(run_router(registry.clone(), shutdown.child_token())))
    } else {
        tracing::info!("Message routing disabled");
        None
    };

    let config = WebServerConfig {
        host: host.unwrap_or(settings.server.host),
        port: port.unwrap_or(settings.server.port),
    };
    let served = run_server(config, AppState::new(matrix.clone()), shutdown).await;

    matrix.shutdown();
    if let Some(router) = router {
        let _ = router.await;
    }

    served.context("Web server error")
}

fn cmd_agents(path: &std::path::Path) -> Result<()> {
    let settings = load_settings_from(path)?;
    if settings.agents.is_empty() {
        println!("No agents configured.");
        return Ok(());
    }

    println!("Agents:");
    for (id, agent) in &settings.agents {
        let name = agent.name.as_deref().unwrap_or(id);
        match &agent.description {
            Some(description) => println!("  {} ({}) - {}", id, name, description),
            None => println!("  {} ({})", id, name),
        }
    }
    Ok(())
}

fn cmd_init(path: &std::path::Path, agents: Vec<String>, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "Settings already exist at {} (use --force to overwrite)",
            path.display()
        );
    }

    let mut settings = Settings::default();
    for agent_id in agents {
        settings.agents.insert(agent_id, AgentConfig::default());
    }
    save_settings(path, &settings)?;

    println!("Wrote settings to {}", path.display());
    Ok(())
}

fn cmd_config(path: &std::path::Path) -> Result<()> {
    println!("Settings file: {}", path.display());
    let settings = load_settings_from(path)?;
    println!("{}", serde_json::to_string_pretty(&settings)?);
    Ok(())
}
