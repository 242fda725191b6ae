use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use tracing::info;

use cortex_core::{Config, ConnectedSessions, ConnectionManager, SnowflakeAuthenticator, TurnTrigger};

mod app;
mod cli;
mod handler;
mod logging;
mod tui;
mod ui;

use app::App;
use logging::LogTarget;

#[derive(Parser)]
#[command(name = "cortex-chat", version)]
#[command(about = "Ask Snowflake Cortex Analyst about consultant utilization data")]
struct Cli {
    /// Path to config.json (defaults to the user config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive chat (default)
    Tui,
    /// Ask one question and print the answer
    Ask {
        /// Your question
        question: String,
        /// Write every result table to a CSV file
        #[arg(short, long)]
        export: bool,
    },
    /// Pick a sample question and ask it
    Samples,
    /// Connect and send a greeting to Cortex Analyst
    Check,
    /// Show the effective configuration
    Config {
        /// Write a default config file
        #[arg(long)]
        init: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Tui);

    let log_target = match command {
        Commands::Tui => LogTarget::File,
        _ => LogTarget::Stderr,
    };
    logging::init(log_target, cli.verbose)?;

    let config_path = match cli.config {
        Some(path) => path,
        None => Config::get_config_path()?,
    };

    if let Commands::Config { init } = command {
        return if init {
            cli::init_config(&config_path)
        } else {
            cli::show_config(&load_config(&config_path)?, &config_path)
        };
    }

    let config = load_config(&config_path)?;
    info!(path = %config_path.display(), "Configuration loaded");

    let sessions = match connect(&config).await {
        Ok(sessions) => sessions,
        Err(err) => {
            eprintln!("{} {:#}", "Failed to connect to Snowflake:".bold().red(), err);
            eprintln!("Check your settings with {}", "cortex-chat config".bold());
            return Err(err);
        }
    };

    match command {
        Commands::Tui => run_tui(config, sessions).await,
        Commands::Ask { question, export } => {
            cli::ask(&config, &sessions, TurnTrigger::Typed(question), export).await
        }
        Commands::Samples => {
            let trigger = cli::pick_sample()?;
            cli::ask(&config, &sessions, trigger, false).await
        }
        Commands::Check => cli::check(&config, &sessions).await,
        Commands::Config { .. } => Ok(()),
    }
}

fn load_config(path: &Path) -> Result<Config> {
    Config::load_from(path).with_context(|| format!("loading config from {}", path.display()))
}

/// Open both sessions. Failure here is fatal for every command that talks to Snowflake.
async fn connect(config: &Config) -> Result<ConnectedSessions> {
    let authenticator = SnowflakeAuthenticator::from_config(config)?;
    let mut manager = ConnectionManager::from_config(authenticator, config);
    let sessions = manager.ensure_connections().await?;
    Ok(sessions)
}

async fn run_tui(config: Config, sessions: ConnectedSessions) -> Result<()> {
    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = tui::EventHandler::new();
    let mut app = App::new(config, sessions);

    let result = async {
        while !app.should_quit {
            terminal.draw(|frame| ui::render(&mut app, frame))?;
            app.drain_pending();

            if let Some(event) = events.next().await {
                handler::handle_event(&mut app, event).await?;
            }
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;

    tui::restore()?;
    result
}
