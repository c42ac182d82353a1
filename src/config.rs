use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{WalkError, WalkResult};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub llm: LlmConfig,
    #[serde(default)]
    pub predictor: PredictorConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LlmConfig {
    pub active_provider: String,
    pub providers: HashMap<String, ProviderEntry>,
    /// Role-to-model mapping. If a role is absent, falls back to active_provider defaults.
    #[serde(default)]
    pub roles: RolesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEntry {
    pub display_name: String,
    /// Full chat-completions endpoint URL.
    pub api_base: String,
    /// Default model for this provider (used when no role config exists).
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Optional API key stored in config.toml (env var STEPWALK_<ID>_API_KEY wins).
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RolesConfig {
    /// Model that proposes the next step of the walk.
    pub step: Option<RoleEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleEntry {
    /// Must match a key under [llm.providers.*].
    pub provider: String,
    pub model: String,
    #[serde(default = "default_true")]
    pub stream: bool,
    /// Overrides the provider-level temperature for this role.
    pub temperature: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictorConfig {
    /// Number of trailing points rendered into the prompt.
    #[serde(default = "default_history_window")]
    pub history_window: usize,
    /// Deadline for the whole backend stream. Elapsing counts as a backend failure.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Seeds the fallback RNG when set.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            history_window: default_history_window(),
            timeout_secs: default_timeout_secs(),
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_trajectory_file")]
    pub trajectory_file: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            trajectory_file: default_trajectory_file(),
        }
    }
}

pub(crate) fn default_temperature() -> f64 {
    0.7
}

pub(crate) fn default_max_tokens() -> u32 {
    1000
}

fn default_history_window() -> usize {
    5
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_trajectory_file() -> PathBuf {
    PathBuf::from("data/trajectories/trajectory.json")
}

fn default_true() -> bool {
    true
}

fn resolve_config_path() -> WalkResult<PathBuf> {
    if let Ok(exe) = std::env::current_exe() {
        if let Some(parent) = exe.parent() {
            let candidate = parent.join("config.toml");
            if candidate.exists() {
                tracing::debug!(path = %candidate.display(), "config found next to executable");
                return Ok(candidate);
            }
        }
    }

    let cwd = std::env::current_dir()?;
    let candidate = cwd.join("config.toml");
    if candidate.exists() {
        tracing::debug!(path = %candidate.display(), "config found in working directory");
        return Ok(candidate);
    }

    Err(WalkError::Config(
        "config.toml not found next to executable or in working directory".into(),
    ))
}

pub fn load_config() -> WalkResult<AppConfig> {
    let path = resolve_config_path()?;
    load_config_from(&path)
}

pub fn load_config_from(path: &Path) -> WalkResult<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = toml::from_str(&content)?;
    tracing::info!(path = %path.display(), provider = %config.llm.active_provider, "config loaded");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[llm]
active_provider = "dashscope"

[llm.providers.dashscope]
display_name = "DashScope"
api_base = "https://dashscope.aliyuncs.com/compatible-mode/v1/chat/completions"
model = "deepseek-r1"
"#;

    #[test]
    fn optional_sections_take_defaults() {
        let cfg: AppConfig = toml::from_str(MINIMAL).unwrap();
        let provider = &cfg.llm.providers["dashscope"];
        assert_eq!(provider.temperature, 0.7);
        assert_eq!(provider.max_tokens, 1000);
        assert!(cfg.llm.roles.step.is_none());
        assert_eq!(cfg.predictor.history_window, 5);
        assert_eq!(cfg.predictor.timeout_secs, 120);
        assert_eq!(cfg.predictor.seed, None);
        assert_eq!(
            cfg.storage.trajectory_file,
            PathBuf::from("data/trajectories/trajectory.json")
        );
    }

    #[test]
    fn step_role_and_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let step = r#"
[llm.roles.step]
provider = "dashscope"
model = "qwen-max"
stream = false
"#;
        let content = format!("{MINIMAL}\n{step}\n[predictor]\nseed = 7\n");
        std::fs::write(&path, content).unwrap();

        let cfg = load_config_from(&path).unwrap();
        let step = cfg.llm.roles.step.unwrap();
        assert_eq!(step.model, "qwen-max");
        assert!(!step.stream);
        assert_eq!(step.temperature, None);
        assert_eq!(cfg.predictor.seed, Some(7));
    }

    #[test]
    fn missing_llm_section_is_an_error() {
        assert!(toml::from_str::<AppConfig>("[storage]\n").is_err());
    }
}
