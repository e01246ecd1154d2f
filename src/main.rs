mod advisor;
mod config;
mod history;
mod ledger;
mod logging;
mod session;
mod shell;
mod store;

use clap::{Parser, Subcommand};
use config::{load_or_initialize_config, AppConfig};
use session::AssistantSession;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use store::{HistoryStore, JsonFileStore, MemoryStore};
use tracing::{error, info};

/// Farming advice and break-even pricing for smallholders.
#[derive(Debug, Parser)]
#[command(name = "ngira", version, about)]
struct Cli {
    /// Settings file to use instead of the platform default.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Directory holding the chat history and logs.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    /// Keep the conversation in memory only.
    #[arg(long, global = true)]
    ephemeral: bool,
    #[command(subcommand)]
    action: Option<Action>,
}

#[derive(Debug, Subcommand)]
enum Action {
    /// Ask the assistant a single question.
    Ask {
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
    },
    /// Print the conversation history.
    History {
        /// Print the stored JSON instead of formatted lines.
        #[arg(long)]
        json: bool,
    },
    /// Delete the conversation history.
    Clear,
    /// List suggested questions.
    Suggestions,
    /// Interactive assistant and expense ledger (default).
    Shell,
}

fn load_config(cli: &Cli) -> Result<AppConfig, config::ConfigError> {
    let path = match &cli.config {
        Some(path) => path.clone(),
        None => config::default_config_path()?,
    };
    let mut config = load_or_initialize_config(&path)?;
    if let Some(dir) = &cli.data_dir {
        config.data_dir = Some(dir.clone());
    }
    Ok(config)
}

/// Cancels the pending reply on Ctrl-C.
fn watch_ctrl_c(session: &AssistantSession) {
    let handle = session.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, shutting down session");
            handle.shutdown();
        }
    });
}

async fn run(cli: Cli, config: AppConfig, data_dir: PathBuf) -> Result<(), String> {
    let store: Arc<dyn HistoryStore> = if cli.ephemeral {
        Arc::new(MemoryStore::new())
    } else {
        let store = JsonFileStore::new(&data_dir);
        info!(path = %store.path().display(), "Using history file");
        Arc::new(store)
    };
    let mut session =
        AssistantSession::new(store, Duration::from_millis(config.response_delay_ms));

    match cli.action.unwrap_or(Action::Shell) {
        Action::Ask { query } => {
            watch_ctrl_c(&session);
            session.load_history().await;
            let query = query.join(" ");
            let log = session.submit(&query).await;
            match log.last().filter(|m| !m.from_user) {
                Some(reply) => println!("{}", reply.content),
                None if query.trim().is_empty() => {}
                None => return Err("cancelled before the assistant replied".to_string()),
            }
        }
        Action::History { json } => {
            let log = session.load_history().await;
            if json {
                let content = serde_json::to_string_pretty(&log).map_err(|e| e.to_string())?;
                println!("{content}");
            } else {
                shell::print_history(&log);
            }
        }
        Action::Clear => {
            session.clear_history().await;
            println!("Conversation history cleared.");
        }
        Action::Suggestions => shell::print_suggestions(),
        Action::Shell => {
            watch_ctrl_c(&session);
            shell::run(session, &config.currency)
                .await
                .map_err(|e| format!("terminal I/O failed: {e}"))?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            logging::init_stderr();
            error!(error = %e, "Failed to load settings");
            return ExitCode::FAILURE;
        }
    };
    let data_dir = match config.resolve_data_dir() {
        Ok(dir) => dir,
        Err(e) => {
            logging::init_stderr();
            error!(error = %e, "Failed to resolve the data directory");
            return ExitCode::FAILURE;
        }
    };
    let _log_guard = logging::init(&config.log, &data_dir);
    info!(data_dir = %data_dir.display(), "Starting ngira");

    match run(cli, config, data_dir).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
