use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub provider: ProviderConfig,
    pub embeddings: EmbeddingsConfig,
}

/// Connection and model settings for the vendor API.
///
/// Every field is optional; anything left out falls back to the adapter's
/// built-in default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Display name used in error messages
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
    /// Models that `complete` replaces with `default_model`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub legacy_models: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
    /// Extra model → vector width entries, merged over the built-in table
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub dimensions: HashMap<String, u32>,
}

const CONFIG_FILE_NAMES: [&str; 3] = ["wireline.toml", ".config/wireline/config.toml", ".wireline.toml"];

impl Config {
    /// Load from `config_path`, or from the first default location that
    /// exists. No file at all yields the defaults.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let path = match config_path {
            Some(path) => {
                let expanded = shellexpand::full(path)
                    .with_context(|| format!("Could not expand config path '{}'", path))?;
                let path = PathBuf::from(expanded.as_ref());
                if !path.exists() {
                    anyhow::bail!("Config file not found: {}", path.display());
                }
                Some(path)
            }
            None => Self::default_paths().into_iter().find(|p| p.exists()),
        };

        let Some(path) = path else {
            return Ok(Self::default());
        };

        let config = Self::load_file(&path)?;
        config.validate()?;
        Ok(config)
    }

    fn load_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Candidate locations, in lookup order: the working directory, then
    /// `~/.config/wireline/config.toml`, then `~/.wireline.toml`.
    pub fn default_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(".").join(CONFIG_FILE_NAMES[0])];
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(CONFIG_FILE_NAMES[1]));
            paths.push(home.join(CONFIG_FILE_NAMES[2]));
        }
        paths
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let toml_string = toml::to_string_pretty(self)?;
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, toml_string)?;
        Ok(())
    }

    pub fn load_with_overrides(
        config_path: Option<&str>,
        model_override: Option<String>,
    ) -> Result<Self> {
        let mut config = Self::load(config_path)?;

        if let Some(model) = model_override {
            config.provider.default_model = Some(model);
            config.validate()?;
        }

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(base_url) = &self.provider.base_url {
            if base_url.trim().is_empty() {
                anyhow::bail!("provider.base_url must not be empty");
            }
        }

        if self.provider.timeout_seconds == Some(0) {
            anyhow::bail!("provider.timeout_seconds must be greater than zero");
        }

        if let (Some(model), Some(legacy)) =
            (&self.provider.default_model, &self.provider.legacy_models)
        {
            if legacy.iter().any(|m| m == model) {
                anyhow::bail!(
                    "provider.default_model '{}' is listed in provider.legacy_models",
                    model
                );
            }
        }

        Ok(())
    }

    /// API key from the file, else from `WIRELINE_API_KEY`.
    pub fn api_key(&self) -> Option<String> {
        self.provider
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var("WIRELINE_API_KEY").ok())
    }
}
