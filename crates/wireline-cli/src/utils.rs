//! Utility functions for the wireline CLI.

use anyhow::Result;
use std::time::Duration;
use wireline_config::Config;
use wireline_providers::{CompatProvider, EmbeddingModels, HttpTransport, ProviderSettings};

use crate::cli_args::Cli;

/// Load configuration with CLI argument overrides applied.
pub fn load_config_with_cli_overrides(cli: &Cli) -> Result<Config> {
    Config::load_with_overrides(cli.config.as_deref(), cli.model.clone())
}

/// Adapter settings from the config, falling back to built-in defaults for
/// anything the config leaves out.
pub fn provider_settings(config: &Config) -> ProviderSettings {
    let defaults = ProviderSettings::default();
    let provider = &config.provider;

    let embeddings = {
        let builtin = EmbeddingModels::default();
        let default_model = config
            .embeddings
            .default_model
            .clone()
            .unwrap_or_else(|| builtin.default_model().to_string());
        let mut dimensions = builtin.dimensions().clone();
        dimensions.extend(config.embeddings.dimensions.clone());
        EmbeddingModels::new(default_model, dimensions)
    };

    ProviderSettings {
        name: provider.name.clone().unwrap_or(defaults.name),
        default_model: provider.default_model.clone().unwrap_or(defaults.default_model),
        legacy_models: provider.legacy_models.clone().unwrap_or(defaults.legacy_models),
        embeddings,
    }
}

pub fn build_provider(config: &Config) -> Result<CompatProvider<HttpTransport>> {
    let transport = HttpTransport::new(
        config.api_key().unwrap_or_default(),
        config.provider.base_url.clone(),
        config.provider.timeout_seconds.map(Duration::from_secs),
    )?;
    Ok(CompatProvider::new(provider_settings(config), transport))
}

/// Initialize logging based on CLI verbosity settings.
pub fn initialize_logging(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let level = if verbose { "debug" } else { "warn" };
    let directives = [
        format!("{}={}", env!("CARGO_PKG_NAME").replace('-', "_"), level),
        format!("wireline={}", level),
        format!("wireline_providers={}", level),
        format!("wireline_config={}", level),
    ];

    let mut filter = EnvFilter::from_default_env();
    for directive in directives {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }

    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_gives_default_settings() {
        let settings = provider_settings(&Config::default());
        let defaults = ProviderSettings::default();

        assert_eq!(settings.name, defaults.name);
        assert_eq!(settings.default_model, defaults.default_model);
        assert_eq!(settings.legacy_models, defaults.legacy_models);
        assert_eq!(settings.embeddings.dimensions_for("embed-large-v3"), Some(3072));
    }

    #[test]
    fn test_config_values_win() {
        let mut config = Config::default();
        config.provider.name = Some("Acme".to_string());
        config.provider.default_model = Some("chat-medium".to_string());
        config.provider.legacy_models = Some(vec![]);
        config.embeddings.default_model = Some("embed-large-v3".to_string());
        config.embeddings.dimensions.insert("embed-huge-v4".to_string(), 4096);

        let settings = provider_settings(&config);

        assert_eq!(settings.name, "Acme");
        assert_eq!(settings.default_model, "chat-medium");
        assert!(settings.legacy_models.is_empty());
        assert_eq!(settings.embeddings.default_model(), "embed-large-v3");
        // The configured default model never sends a width
        assert_eq!(settings.embeddings.dimensions_for("embed-large-v3"), None);
        assert_eq!(settings.embeddings.dimensions_for("embed-huge-v4"), Some(4096));
        assert_eq!(settings.embeddings.dimensions_for("embed-small-v3"), Some(1536));
    }

    #[test]
    fn test_build_provider_uses_configured_base_url() {
        let mut config = Config::default();
        config.provider.api_key = Some("k".to_string());
        config.provider.base_url = Some("http://127.0.0.1:9/v1/".to_string());

        let provider = build_provider(&config).unwrap();
        assert_eq!(provider.transport().base_url(), "http://127.0.0.1:9/v1");
    }
}
