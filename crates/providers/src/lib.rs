pub mod http;
pub mod ollama;
