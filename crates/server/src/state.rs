use std::sync::Arc;

use providers::ollama::OllamaClient;

#[derive(Clone)]
pub struct AppState {
    pub client: Arc<OllamaClient>,
}

impl AppState {
    pub fn new(client: OllamaClient) -> Self {
        Self {
            client: Arc::new(client),
        }
    }
}
