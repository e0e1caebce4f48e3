use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub store: StoreConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub scrape: ScrapeConfig,
    #[serde(default)]
    pub assistant: AssistantConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// Path of the persisted issue document blob.
    pub path: PathBuf,
    /// Optional seed document substituted for an absent/empty blob.
    /// The bundled seed is used when unset.
    #[serde(default)]
    pub seed: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScrapeConfig {
    #[serde(default = "default_scrape_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_urls")]
    pub max_urls: usize,
    #[serde(default = "default_max_text_bytes")]
    pub max_text_bytes: usize,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_scrape_timeout_secs(),
            max_urls: default_max_urls(),
            max_text_bytes: default_max_text_bytes(),
        }
    }
}

fn default_scrape_timeout_secs() -> u64 {
    15
}
fn default_max_urls() -> usize {
    10
}
fn default_max_text_bytes() -> usize {
    20_000
}

#[derive(Debug, Deserialize, Clone)]
pub struct AssistantConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_assistant_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_source_bytes")]
    pub max_source_bytes: usize,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            timeout_secs: default_assistant_timeout_secs(),
            max_source_bytes: default_max_source_bytes(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_assistant_timeout_secs() -> u64 {
    20
}
fn default_max_source_bytes() -> usize {
    6_000
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate scrape
    if config.scrape.timeout_secs == 0 {
        anyhow::bail!("scrape.timeout_secs must be >= 1");
    }
    if config.scrape.max_urls == 0 {
        anyhow::bail!("scrape.max_urls must be >= 1");
    }

    // Validate assistant
    if config.assistant.timeout_secs == 0 {
        anyhow::bail!("assistant.timeout_secs must be >= 1");
    }
    if config.assistant.model.trim().is_empty() {
        anyhow::bail!("assistant.model must not be empty");
    }
    if config.assistant.base_url.trim().is_empty() {
        anyhow::bail!("assistant.base_url must not be empty");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str) -> Result<Config> {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), content).unwrap();
        load_config(tmp.path())
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = parse(
            r#"
[store]
path = "data/issues.json"

[server]
bind = "127.0.0.1:7870"
"#,
        )
        .unwrap();

        assert_eq!(config.scrape.timeout_secs, 15);
        assert_eq!(config.scrape.max_urls, 10);
        assert_eq!(config.assistant.model, "gpt-4o-mini");
        assert_eq!(config.assistant.base_url, "https://api.openai.com/v1");
        assert!(config.store.seed.is_none());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err = parse(
            r#"
[store]
path = "data/issues.json"

[server]
bind = "127.0.0.1:7870"

[scrape]
timeout_secs = 0
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("timeout_secs"));
    }

    #[test]
    fn test_empty_model_rejected() {
        let err = parse(
            r#"
[store]
path = "data/issues.json"

[server]
bind = "127.0.0.1:7870"

[assistant]
model = "  "
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("assistant.model"));
    }
}
