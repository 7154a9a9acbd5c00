pub mod api;
pub mod config;
pub mod relay;
pub mod state;

pub use api::router;
pub use config::ServerConfig;
pub use state::AppState;
