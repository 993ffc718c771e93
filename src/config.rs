//! Configuration loading for Agent Matrix.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::registry::validate_agent_id;
use crate::core::Registry;
use crate::error::Error;
use crate::matrix::{ControlPolicy, MatrixConfig};

pub type Result<T> = std::result::Result<T, Error>;

/// Get the Agent Matrix home directory (~/.agent-matrix).
pub fn get_home_dir() -> Result<PathBuf> {
    let home = directories::UserDirs::new()
        .ok_or_else(|| Error::Config("Could not determine home directory".to_string()))?;

    Ok(home.home_dir().join(".agent-matrix"))
}

/// Get the settings file path.
pub fn get_settings_path() -> Result<PathBuf> {
    Ok(get_home_dir()?.join("settings.json"))
}

/// Load settings from ~/.agent-matrix/settings.json
pub fn load_settings() -> Result<Settings> {
    load_settings_from(&get_settings_path()?)
}

/// Load settings from an explicit path.
pub fn load_settings_from(path: &Path) -> Result<Settings> {
    if !path.exists() {
        return Err(Error::Config(format!(
            "Settings file not found at {}. Run 'agent-matrix init' first.",
            path.display()
        )));
    }

    let content = std::fs::read_to_string(path)?;
    let settings: Settings = serde_json::from_str(&content)?;
    validate_settings(&settings)?;

    tracing::debug!("Loaded settings from {}", path.display());
    Ok(settings)
}

/// Load settings or return default if not found.
pub fn load_settings_or_default(path: &Path) -> Settings {
    load_settings_from(path).unwrap_or_else(|e| {
        tracing::warn!("Failed to load settings: {}, using defaults", e);
        Settings::default()
    })
}

/// Write settings as pretty JSON, creating the parent directory.
pub fn save_settings(path: &Path, settings: &Settings) -> Result<()> {
    validate_settings(settings)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(settings)?)?;
    Ok(())
}

fn validate_settings(settings: &Settings) -> Result<()> {
    for agent_id in settings.agents.keys() {
        validate_agent_id(agent_id)
            .map_err(|e| Error::Config(format!("agents.{}: {}", agent_id, e)))?;
    }
    if settings.handshake.timeout_secs == 0 {
        return Err(Error::Config(
            "handshake.timeout_secs must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

/// Server configuration.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8666
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Agent configuration. The map key is the agent id.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct AgentConfig {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// Handshake configuration.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct HandshakeConfig {
    #[serde(default = "default_handshake_timeout")]
    pub timeout_secs: u64,
}

fn default_handshake_timeout() -> u64 {
    30
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_handshake_timeout(),
        }
    }
}

/// Control-plane configuration.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct ControlConfig {
    #[serde(default)]
    pub policy: ControlPolicy,
}

/// Routing configuration.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Routing {
    #[serde(default = "default_routing_enabled")]
    pub enabled: bool,
}

fn default_routing_enabled() -> bool {
    true
}

impl Default for Routing {
    fn default() -> Self {
        Self {
            enabled: default_routing_enabled(),
        }
    }
}

/// Agent Matrix settings.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub agents: BTreeMap<String, AgentConfig>,

    #[serde(default)]
    pub handshake: HandshakeConfig,

    #[serde(default)]
    pub control: ControlConfig,

    #[serde(default)]
    pub routing: Routing,
}

impl Settings {
    /// Hub tunables derived from these settings.
    pub fn matrix_config(&self) -> MatrixConfig {
        MatrixConfig {
            handshake_timeout: Duration::from_secs(self.handshake.timeout_secs),
            control_policy: self.control.policy,
        }
    }

    /// A registry holding every configured agent.
    pub fn build_registry(&self) -> Result<Registry> {
        Registry::with_agents(self.agents.keys())
    }
}
