use loco_core::config::load_section;
use serde::Deserialize;
use std::{env, time::Duration};
use url::Url;

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// `[ollama]` table of the config file.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct OllamaFileConfig {
    pub base_url: Option<String>,
    pub connect_timeout_ms: Option<u64>,
    pub proxy: Option<String>,
}

#[derive(Clone, Debug)]
pub struct OllamaConfig {
    pub base_url: Url,
    pub connect_timeout: Duration,
    pub proxy: Option<String>,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_BASE_URL).expect("default ollama url"),
            connect_timeout: Duration::from_millis(5_000),
            proxy: None,
        }
    }
}

impl OllamaConfig {
    /// File values first, then `OLLAMA_BASE_URL` on top.
    pub fn from_env_and_file() -> anyhow::Result<Self> {
        let file_cfg = load_section::<OllamaFileConfig>("ollama").unwrap_or_default();
        Self::resolve(file_cfg, env::var("OLLAMA_BASE_URL").ok())
    }

    pub fn resolve(file_cfg: OllamaFileConfig, env_url: Option<String>) -> anyhow::Result<Self> {
        let mut cfg = Self::default();
        if let Some(url) = env_url.or(file_cfg.base_url) {
            cfg.base_url = Url::parse(&url)
                .map_err(|e| anyhow::anyhow!("invalid ollama base url {:?}: {}", url, e))?;
        }
        if let Some(ms) = file_cfg.connect_timeout_ms {
            cfg.connect_timeout = Duration::from_millis(ms);
        }
        cfg.proxy = file_cfg.proxy;
        Ok(cfg)
    }

    pub fn with_base_url(base_url: &str) -> anyhow::Result<Self> {
        Self::resolve(OllamaFileConfig::default(), Some(base_url.to_string()))
    }

    /// `<base>/<path>` regardless of a trailing slash on the base.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}
