//! Configuration loading

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File name looked up by [`FoundryFileConfig::load`]
pub const CONFIG_FILE_NAME: &str = ".foundry.toml";

/// Find a config file by walking up the directory tree, then checking global config.
///
/// Search order:
/// 1. Current directory and parent directories (walking up to root)
/// 2. Global config at ~/.config/foundry/
///
/// Returns the path if found, None otherwise.
fn find_config_file(filename: &str) -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let candidate = current.join(filename);
        if candidate.exists() {
            return Some(candidate);
        }

        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => break,
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global_path = config_dir.join("foundry").join(filename);
        if global_path.exists() {
            return Some(global_path);
        }
    }

    None
}

/// Top-level configuration (from .foundry.toml)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FoundryFileConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub agents: AgentsSection,
    /// Per-role overrides keyed by role name (drafter, safety, clinical, supervisor)
    #[serde(default)]
    pub roles: HashMap<String, RoleSection>,
    #[serde(default)]
    pub engine: EngineSection,
    #[serde(default)]
    pub router: RouterSection,
}

/// LLM configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_ollama_url")]
    pub url: String,
    #[serde(default = "default_model")]
    pub model: String,
}

/// Call budget shared by every agent
#[derive(Debug, Clone, Deserialize)]
pub struct AgentsSection {
    /// Attempts per agent call before the call is reported as failed
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Timeout for a single attempt, in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Per-role override
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoleSection {
    pub model: Option<String>,
}

/// Workflow engine section
#[derive(Debug, Clone, Deserialize)]
pub struct EngineSection {
    /// Checkpoint database path (supports ~ and $VARS)
    pub db_path: Option<String>,
    #[serde(default = "default_checkpoint_retries")]
    pub checkpoint_retries: u32,
    #[serde(default = "default_checkpoint_backoff_ms")]
    pub checkpoint_backoff_ms: u64,
}

/// Router thresholds
#[derive(Debug, Clone, Deserialize)]
pub struct RouterSection {
    #[serde(default = "default_approve_safety")]
    pub approve_safety: u8,
    #[serde(default = "default_approve_clinical")]
    pub approve_clinical: u8,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    #[serde(default = "default_unsafe_below")]
    pub unsafe_below: u8,
    #[serde(default = "default_revise_safety_below")]
    pub revise_safety_below: u8,
    #[serde(default = "default_revise_clinical_below")]
    pub revise_clinical_below: u8,
}

// Default value functions
fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_model() -> String {
    "qwen2.5:7b-instruct".to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_checkpoint_retries() -> u32 {
    3
}

fn default_checkpoint_backoff_ms() -> u64 {
    200
}

fn default_approve_safety() -> u8 {
    9
}

fn default_approve_clinical() -> u8 {
    8
}

fn default_max_iterations() -> u32 {
    3
}

fn default_unsafe_below() -> u8 {
    6
}

fn default_revise_safety_below() -> u8 {
    8
}

fn default_revise_clinical_below() -> u8 {
    7
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            url: default_ollama_url(),
            model: default_model(),
        }
    }
}

impl Default for AgentsSection {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl AgentsSection {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            db_path: None,
            checkpoint_retries: default_checkpoint_retries(),
            checkpoint_backoff_ms: default_checkpoint_backoff_ms(),
        }
    }
}

impl EngineSection {
    /// Resolve the configured database path, expanding ~ and environment variables
    pub fn db_path(&self) -> Result<Option<PathBuf>> {
        match &self.db_path {
            Some(raw) => {
                let expanded = shellexpand::full(raw)
                    .with_context(|| format!("Failed to expand db_path: {}", raw))?;
                Ok(Some(PathBuf::from(expanded.as_ref())))
            }
            None => Ok(None),
        }
    }
}

impl Default for RouterSection {
    fn default() -> Self {
        Self {
            approve_safety: default_approve_safety(),
            approve_clinical: default_approve_clinical(),
            max_iterations: default_max_iterations(),
            unsafe_below: default_unsafe_below(),
            revise_safety_below: default_revise_safety_below(),
            revise_clinical_below: default_revise_clinical_below(),
        }
    }
}

impl FoundryFileConfig {
    /// Load config from .foundry.toml
    ///
    /// Search order:
    /// 1. Walk up directory tree from cwd looking for .foundry.toml
    /// 2. Check ~/.config/foundry/.foundry.toml (global fallback)
    /// 3. Fall back to defaults
    pub fn load() -> Result<Self> {
        if let Some(config_path) = find_config_file(CONFIG_FILE_NAME) {
            tracing::debug!("Loading config from: {}", config_path.display());
            return Self::load_from_path(&config_path);
        }

        tracing::debug!("No {} found, using defaults", CONFIG_FILE_NAME);
        Ok(Self::default())
    }

    /// Load from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("Invalid config in {}", path.display()))
    }

    /// Parse from a TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Model override for a role, if configured
    pub fn role_model(&self, role: &str) -> Option<&str> {
        self.roles.get(role).and_then(|r| r.model.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_empty() {
        let config = FoundryFileConfig::from_toml("").unwrap();

        assert_eq!(config.llm.url, "http://localhost:11434");
        assert_eq!(config.agents.max_attempts, 3);
        assert_eq!(config.agents.timeout(), Duration::from_secs(120));
        assert_eq!(config.engine.checkpoint_retries, 3);
        assert_eq!(config.router.approve_safety, 9);
        assert_eq!(config.router.approve_clinical, 8);
        assert_eq!(config.router.max_iterations, 3);
        assert_eq!(config.router.unsafe_below, 6);
        assert_eq!(config.router.revise_safety_below, 8);
        assert_eq!(config.router.revise_clinical_below, 7);
    }

    #[test]
    fn test_partial_sections() {
        let config = FoundryFileConfig::from_toml(
            r#"
            [llm]
            model = "llama3.1:8b"

            [agents]
            timeout_secs = 30

            [roles.safety]
            model = "llama3.1:70b"

            [router]
            max_iterations = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.llm.model, "llama3.1:8b");
        assert_eq!(config.llm.url, "http://localhost:11434");
        assert_eq!(config.agents.timeout_secs, 30);
        assert_eq!(config.agents.max_attempts, 3);
        assert_eq!(config.role_model("safety"), Some("llama3.1:70b"));
        assert_eq!(config.role_model("drafter"), None);
        assert_eq!(config.router.max_iterations, 5);
        assert_eq!(config.router.unsafe_below, 6);
    }

    #[test]
    fn test_load_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[engine]\ndb_path = \"/tmp/foundry-test.db\"\n").unwrap();

        let config = FoundryFileConfig::load_from_path(&path).unwrap();
        assert_eq!(
            config.engine.db_path().unwrap(),
            Some(PathBuf::from("/tmp/foundry-test.db"))
        );
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        assert!(FoundryFileConfig::from_toml("[llm\nurl = 1").is_err());
    }
}
