use anyhow::{Context, Result};
use clap::Parser;
use providers::ollama::{OllamaClient, OllamaConfig};
use server::{router, AppState, ServerConfig};
use tracing::info;

/// Relay between a browser chat UI and a local Ollama server.
#[derive(Debug, Parser)]
#[command(name = "locolama-server", version)]
struct Args {
    /// Address to listen on (overrides LOCOLAMA_BIND and the config file).
    #[arg(long)]
    bind: Option<String>,
    /// Ollama base URL (overrides OLLAMA_BASE_URL and the config file).
    #[arg(long)]
    ollama_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,server=debug,providers=debug,tower_http=info".into()),
        )
        .with_target(false)
        .with_line_number(true)
        .init();

    let args = Args::parse();
    let mut cfg = ServerConfig::from_env_and_file()?;
    if let Some(bind) = &args.bind {
        cfg.bind = bind
            .parse()
            .with_context(|| format!("invalid --bind {:?}", bind))?;
    }
    let ollama = match &args.ollama_url {
        Some(url) => OllamaConfig::with_base_url(url)?,
        None => OllamaConfig::from_env_and_file()?,
    };
    info!(target:"server","ollama backend {}", ollama.base_url);

    let state = AppState::new(OllamaClient::new(ollama).context("build ollama client")?);
    let app = router(state, &cfg.allowed_origins);
    let listener = tokio::net::TcpListener::bind(cfg.bind)
        .await
        .with_context(|| format!("bind {}", cfg.bind))?;
    info!(target:"server","listening on http://{}", cfg.bind);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serve")?;
    info!(target:"server","shut down");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // No signal handler available; run until killed.
        std::future::pending::<()>().await;
    }
}
