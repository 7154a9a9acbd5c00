//! Client for a local Ollama server (`/api/tags`, `/api/chat`).

pub mod client;
pub mod config;
pub mod lines;

pub use client::OllamaClient;
pub use config::OllamaConfig;
