use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{default_max_tokens, default_temperature, AppConfig, LlmConfig};
use crate::errors::{WalkError, WalkResult};
use crate::llm::provider::LlmProvider;
use crate::llm::providers::openai_compatible::OpenAiCompatibleProvider;
use crate::llm::types::CallConfig;

/// Registry of all available LLM providers, keyed by their config.toml identifier.
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn LlmProvider>>,
    active: String,
    llm_config: LlmConfig,
}

impl ProviderRegistry {
    pub fn register(&mut self, provider: Arc<dyn LlmProvider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    pub fn get_active(&self) -> WalkResult<Arc<dyn LlmProvider>> {
        self.providers.get(&self.active).cloned().ok_or_else(|| {
            WalkError::Config(format!("Active provider '{}' not found in registry", self.active))
        })
    }

    /// Return the provider and call configuration for a named role.
    ///
    /// Role resolution order:
    /// 1. `[llm.roles.<role>]` in config.toml
    /// 2. Fallback: active provider with its default model / temperature and `stream = true`
    pub fn call_config_for_role(
        &self,
        role: &str,
    ) -> WalkResult<(Arc<dyn LlmProvider>, CallConfig)> {
        let role_entry = match role {
            "step" => self.llm_config.roles.step.as_ref(),
            other => {
                tracing::warn!(role = other, "unknown role, falling back to active provider");
                None
            }
        };

        if let Some(entry) = role_entry {
            let provider = self.providers.get(&entry.provider).cloned().ok_or_else(|| {
                WalkError::Config(format!(
                    "Role '{}' references unknown provider '{}'",
                    role, entry.provider
                ))
            })?;
            let provider_entry = self.llm_config.providers.get(&entry.provider);
            let temperature = entry
                .temperature
                .or_else(|| provider_entry.map(|p| p.temperature))
                .unwrap_or_else(default_temperature);
            let max_tokens = provider_entry
                .map(|p| p.max_tokens)
                .unwrap_or_else(default_max_tokens);
            tracing::debug!(
                role = role,
                provider = %entry.provider,
                model = %entry.model,
                stream = entry.stream,
                temperature = temperature,
                "resolved role config"
            );
            return Ok((
                provider,
                CallConfig {
                    model: entry.model.clone(),
                    stream: entry.stream,
                    temperature,
                    max_tokens,
                },
            ));
        }

        let provider = self.get_active()?;
        let (model, temperature, max_tokens) = self
            .llm_config
            .providers
            .get(&self.active)
            .map(|p| (p.model.clone(), p.temperature, p.max_tokens))
            .unwrap_or_else(|| (String::new(), default_temperature(), default_max_tokens()));
        tracing::debug!(
            role = role,
            provider = %self.active,
            model = %model,
            "role not configured, using active provider fallback"
        );
        Ok((
            provider,
            CallConfig {
                model,
                stream: true,
                temperature,
                max_tokens,
            },
        ))
    }

    /// Build a registry from the loaded app config.
    /// API keys are read from environment variables named `STEPWALK_<ID>_API_KEY`.
    pub fn from_config(config: &AppConfig) -> Self {
        let mut registry = Self {
            providers: HashMap::new(),
            active: config.llm.active_provider.clone(),
            llm_config: config.llm.clone(),
        };
        for (id, entry) in &config.llm.providers {
            let api_key = std::env::var(format!("STEPWALK_{}_API_KEY", id.to_uppercase()))
                .unwrap_or_else(|_| entry.api_key.clone().unwrap_or_default());
            let provider =
                OpenAiCompatibleProvider::new(id.clone(), entry.api_base.clone(), api_key);
            registry.register(Arc::new(provider));
        }
        registry
    }
}
