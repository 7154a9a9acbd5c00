mod repl;

use anyhow::{Context, Result};
use chat::config::Settings;
use chat::store::{JsonFileStore, MemoryStore};
use chat::strings::{info_line, FALLBACK_MODELS};
use chat::{Orchestrator, RelayClient};
use clap::{Parser, Subcommand};
use loco_core::conversation::ConversationStore;

/// Terminal chat client for the LocoLama relay.
#[derive(Debug, Parser)]
#[command(name = "locolama", version)]
struct Cli {
    /// Relay base URL (overrides LOCOLAMA_RELAY_URL and the config file).
    #[arg(long, global = true)]
    relay_url: Option<String>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Interactive chat (the default).
    Chat {
        #[arg(long)]
        model: Option<String>,
        /// Stream replies as they are generated.
        #[arg(long)]
        stream: bool,
        /// Keep the conversation in memory only.
        #[arg(long)]
        ephemeral: bool,
    },
    /// List the models the backend has installed.
    Models,
    /// List saved conversations.
    History,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to a file so they never interleave with the conversation.
    let _guard = match loco_core::config::data_dir() {
        Some(dir) => {
            let log_dir = dir.join("logs");
            std::fs::create_dir_all(&log_dir).ok();
            let file_appender = tracing_appender::rolling::daily(log_dir, "locolama.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            tracing_subscriber::fmt()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_env_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| "info,chat=debug".into()),
                )
                .init();
            Some(guard)
        }
        None => None,
    };

    let mut settings = Settings::from_env_and_file();
    if let Some(url) = cli.relay_url {
        settings.relay_url = url;
    }
    let relay = RelayClient::new(&settings.relay_url).context("build relay client")?;
    tracing::info!(target:"chat","relay {}", relay.base_url());

    match cli.command.unwrap_or(Commands::Chat {
        model: None,
        stream: false,
        ephemeral: false,
    }) {
        Commands::Chat {
            model,
            stream,
            ephemeral,
        } => {
            if stream {
                settings.streaming = true;
            }
            if ephemeral {
                let mut orch = Orchestrator::new(relay, MemoryStore::new(), settings);
                apply_model(&mut orch, model);
                repl::run(&mut orch).await
            } else {
                let store = JsonFileStore::default_location().context("no data directory for conversations")?;
                let mut orch = Orchestrator::new(relay, store, settings);
                apply_model(&mut orch, model);
                repl::run(&mut orch).await
            }
        }
        Commands::Models => {
            match relay.models().await {
                Ok(models) if !models.is_empty() => {
                    for m in models {
                        println!("{}", m);
                    }
                }
                Ok(_) => print_fallback("no models installed"),
                Err(e) => {
                    tracing::warn!(target:"chat","listing models failed: {}", e);
                    print_fallback(&format!("could not list models ({})", e));
                }
            }
            Ok(())
        }
        Commands::History => {
            let store = JsonFileStore::default_location().context("no data directory for conversations")?;
            let all = store
                .list()
                .with_context(|| format!("read {}", store.path().display()))?;
            if all.is_empty() {
                println!("{}", info_line("no saved conversations"));
            }
            for c in all.iter().rev() {
                println!(
                    "{}  {:<12} {:>3} msgs  {}",
                    c.updated_at.format("%Y-%m-%d %H:%M"),
                    c.model,
                    c.messages.len(),
                    c.title()
                );
            }
            Ok(())
        }
    }
}

fn apply_model<S: ConversationStore>(orch: &mut Orchestrator<S>, model: Option<String>) {
    if let Some(m) = model.filter(|m| !m.trim().is_empty()) {
        orch.set_model(m);
    }
}

fn print_fallback(reason: &str) {
    println!("{}", info_line(&format!("{}; common models:", reason)));
    for m in FALLBACK_MODELS {
        println!("{}", m);
    }
}
