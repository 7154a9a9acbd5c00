use directories::BaseDirs;
use serde::de::DeserializeOwned;
use std::{fs, path::PathBuf};
use tracing::warn;

pub const APP_DIR: &str = "locolama";

/// `~/.config/locolama/config.toml` (or the platform equivalent).
pub fn config_path() -> Option<PathBuf> {
    let base = BaseDirs::new()?;
    let p = if cfg!(target_os = "windows") {
        base.home_dir().join(".locolama").join("config.toml")
    } else {
        base.config_dir().join(APP_DIR).join("config.toml")
    };
    Some(p)
}

/// Directory for conversation history and client logs.
pub fn data_dir() -> Option<PathBuf> {
    let base = BaseDirs::new()?;
    Some(base.data_dir().join(APP_DIR))
}

/// Reads one table (`[ollama]`, `[server]`, `[client]`) from the config file.
/// A missing file, table or parse error yields `None`; callers fall back to
/// defaults.
pub fn load_section<T: DeserializeOwned>(table: &str) -> Option<T> {
    let path = config_path()?;
    if !path.exists() {
        return None;
    }
    let text = fs::read_to_string(&path).ok()?;
    parse_section(&text, table)
}

pub fn parse_section<T: DeserializeOwned>(text: &str, table: &str) -> Option<T> {
    let doc: toml::Table = match toml::from_str(text) {
        Ok(t) => t,
        Err(e) => {
            warn!(target: "core::config", "ignoring unparsable config: {}", e);
            return None;
        }
    };
    let section = doc.get(table)?.clone();
    match section.try_into() {
        Ok(v) => Some(v),
        Err(e) => {
            warn!(target: "core::config", "ignoring [{}] section: {}", table, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Sample {
        base_url: Option<String>,
        timeout_ms: Option<u64>,
    }

    #[test]
    fn reads_named_table() {
        let text = "[ollama]\nbase_url = \"http://gpu-box:11434\"\n\n[client]\nmodel = \"mistral\"\n";
        let s: Sample = parse_section(text, "ollama").unwrap();
        assert_eq!(
            s,
            Sample {
                base_url: Some("http://gpu-box:11434".into()),
                timeout_ms: None
            }
        );
    }

    #[test]
    fn missing_table_or_bad_toml_is_none() {
        assert!(parse_section::<Sample>("[client]\n", "ollama").is_none());
        assert!(parse_section::<Sample>("this is = = not toml", "ollama").is_none());
        assert!(parse_section::<Sample>("[ollama]\ntimeout_ms = \"x\"\n", "ollama").is_none());
    }
}
