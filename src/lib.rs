pub mod analysis;
pub mod config;
pub mod errors;
pub mod llm;
pub mod predictor;
pub mod session;
pub mod trajectory;

use crate::config::AppConfig;
use crate::errors::WalkResult;
use crate::llm::registry::ProviderRegistry;
use crate::predictor::StepPredictor;
use crate::session::WalkSession;

/// Installs the global fmt subscriber. `RUST_LOG` overrides the `info` default.
/// Safe to call more than once.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();
}

/// Logging, `.env`, `config.toml` and the persisted walk, wired into a session.
///
/// A missing or broken config is logged and leaves the predictor offline;
/// a corrupt trajectory file is returned as an error.
pub fn bootstrap() -> WalkResult<WalkSession> {
    init_tracing();

    // Load .env file if present (ignore error if not found)
    let _ = dotenvy::dotenv();

    let config = match config::load_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load config; starting without an LLM provider");
            AppConfig::default()
        }
    };
    bootstrap_from(&config)
}

pub fn bootstrap_from(config: &AppConfig) -> WalkResult<WalkSession> {
    let registry = ProviderRegistry::from_config(config);
    let predictor = StepPredictor::from_config(config, &registry);
    WalkSession::open(config.storage.trajectory_file.clone(), predictor)
}
