//! Engine configuration loaded from TOML, and the agent card derived from it.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::autopilot::LiteModeConfig;
use crate::core::phases::Phase;
use crate::stream::MIN_FLUSH_PADDING;

/// Engine configuration (TOML).
///
/// Every field is optional in the file; missing fields take the defaults
/// below.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Stamped into plan previews and reported by `/health`.
    pub agent_id: String,
    pub name: String,
    pub description: String,
    pub version: String,
    /// Public base URL advertised in the agent card.
    pub url: Option<String>,

    /// Interactive phases this agent uses. `None` disables phase checks.
    pub supported_phases: Option<Vec<Phase>>,

    /// Default label for discovered items.
    pub discovery_type: String,

    /// Size of the comment frame sent ahead of the first SSE event.
    pub flush_padding_bytes: usize,

    pub lite_mode: LiteModeConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            agent_id: "planflow-agent".to_string(),
            name: "Planflow Agent".to_string(),
            description: "Interactive plan-mode agent".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            url: None,
            supported_phases: Some(vec![
                Phase::Clarification,
                Phase::Discovery,
                Phase::Selection,
                Phase::Preview,
            ]),
            discovery_type: "items".to_string(),
            flush_padding_bytes: MIN_FLUSH_PADDING,
            lite_mode: LiteModeConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.agent_id.trim().is_empty() {
            return Err(anyhow!("agent_id must be non-empty"));
        }
        if self.flush_padding_bytes < MIN_FLUSH_PADDING {
            return Err(anyhow!(
                "flush_padding_bytes must be >= {MIN_FLUSH_PADDING}, got {}",
                self.flush_padding_bytes
            ));
        }
        if self.lite_mode.max_select == 0 {
            return Err(anyhow!("lite_mode.max_select must be > 0"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `EngineConfig::default()`.
pub fn load_config(path: &Path) -> Result<EngineConfig> {
    if !path.exists() {
        let cfg = EngineConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: EngineConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    pub streaming: bool,
    pub push_notifications: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PlanModeCard {
    pub supported: bool,
    pub phases: Vec<Phase>,
    pub discovery_type: String,
}

/// Discovery document served at `/.well-known/agent.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AgentCard {
    pub name: String,
    pub description: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub capabilities: Capabilities,
    pub plan_mode: PlanModeCard,
}

impl AgentCard {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            name: config.name.clone(),
            description: config.description.clone(),
            version: config.version.clone(),
            url: config.url.clone(),
            capabilities: Capabilities {
                streaming: true,
                push_notifications: false,
            },
            plan_mode: PlanModeCard {
                supported: true,
                phases: config.supported_phases.clone().unwrap_or_default(),
                discovery_type: config.discovery_type.clone(),
            },
        }
    }
}
