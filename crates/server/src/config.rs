use loco_core::config::load_section;
use serde::Deserialize;
use std::{env, net::SocketAddr};

pub const DEFAULT_BIND: &str = "127.0.0.1:3000";

/// `[server]` table of the config file.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    pub bind: Option<String>,
    pub allowed_origins: Option<Vec<String>>,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    /// Empty means any origin.
    pub allowed_origins: Vec<String>,
}

impl ServerConfig {
    pub fn from_env_and_file() -> anyhow::Result<Self> {
        let file_cfg = load_section::<ServerFileConfig>("server").unwrap_or_default();
        Self::resolve(file_cfg, env::var("LOCOLAMA_BIND").ok())
    }

    pub fn resolve(file_cfg: ServerFileConfig, env_bind: Option<String>) -> anyhow::Result<Self> {
        let bind = env_bind
            .or(file_cfg.bind)
            .unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind = bind
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid bind address {:?}: {}", bind, e))?;
        Ok(Self {
            bind,
            allowed_origins: file_cfg.allowed_origins.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_bind_wins() {
        let file = ServerFileConfig {
            bind: Some("0.0.0.0:8080".into()),
            allowed_origins: Some(vec!["http://localhost:5173".into()]),
        };
        let cfg = ServerConfig::resolve(file, Some("127.0.0.1:4000".into())).unwrap();
        assert_eq!(cfg.bind.port(), 4000);
        assert_eq!(cfg.allowed_origins, vec!["http://localhost:5173"]);
    }

    #[test]
    fn default_bind_is_loopback() {
        let cfg = ServerConfig::resolve(ServerFileConfig::default(), None).unwrap();
        assert_eq!(cfg.bind.to_string(), DEFAULT_BIND);
        assert!(ServerConfig::resolve(ServerFileConfig::default(), Some("nope".into())).is_err());
    }
}
