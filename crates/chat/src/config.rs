use loco_core::config::load_section;
use loco_core::llm::ChatOpts;
use serde::{Deserialize, Serialize};
use std::env;

/// Client settings, the `[client]` table of the config file.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub default_model: String,
    pub temperature: f32,
    pub max_tokens: i32,
    pub streaming: bool,
    pub relay_url: String,
    /// Send prior turns along with a streamed request instead of the new
    /// user turn alone.
    pub stream_history: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_model: "llama2".to_string(),
            temperature: 0.7,
            max_tokens: 2048,
            streaming: false,
            relay_url: "http://127.0.0.1:3000".to_string(),
            stream_history: false,
        }
    }
}

impl Settings {
    pub fn from_env_and_file() -> Self {
        Self::resolve(
            load_section::<Settings>("client"),
            env::var("LOCOLAMA_RELAY_URL").ok(),
            env::var("LOCOLAMA_MODEL").ok(),
        )
    }

    pub fn resolve(file: Option<Settings>, relay_url: Option<String>, model: Option<String>) -> Self {
        let mut s = file.unwrap_or_default();
        if let Some(url) = relay_url.filter(|u| !u.trim().is_empty()) {
            s.relay_url = url;
        }
        if let Some(m) = model.filter(|m| !m.trim().is_empty()) {
            s.default_model = m;
        }
        s
    }

    pub fn chat_options(&self) -> ChatOpts {
        ChatOpts {
            temperature: Some(self.temperature),
            num_predict: Some(self.max_tokens),
            ..ChatOpts::default()
        }
    }
}
