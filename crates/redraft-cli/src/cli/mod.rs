//! CLI entry and dispatch.

use anyhow::{Context, Result};
use clap::Parser;
use redraft_core::config::Config;

mod commands;
mod logging;

#[derive(Parser)]
#[command(name = "redraft")]
#[command(version)]
#[command(about = "Fix grammar and improve clarity of text with a local LLM")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Text to edit in one-shot mode (omit to launch the TUI)
    #[arg(value_name = "TEXT")]
    text: Option<String>,

    /// Model to serve, as a HuggingFace repo id (persisted to config)
    #[arg(short, long)]
    model: Option<String>,

    /// Instruction for the model (overrides config for this run)
    #[arg(short, long)]
    instruction: Option<String>,

    /// Port for the local llama-server
    #[arg(long)]
    port: Option<u16>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Show the path to the config file
    Path,
    /// Initialize a default config file (if not present)
    Init,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Some(Commands::Config { command }) = cli.command {
        return match command {
            ConfigCommands::Path => {
                commands::config::path();
                Ok(())
            }
            ConfigCommands::Init => commands::config::init(),
        };
    }

    let mut config = Config::load().context("load config")?;
    if let Some(model) = cli.model {
        // The original persists the model choice so the next run uses it too.
        Config::save_model(&model).context("persist model")?;
        config.model = model;
    }
    if let Some(instruction) = cli.instruction {
        config.instruction = instruction;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }

    logging::init().context("init logging")?;
    tracing::info!(model = %config.model, port = config.port, "Starting redraft");

    // one tokio runtime for everything
    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;
    rt.block_on(async move {
        match cli.text {
            Some(text) => commands::oneshot::run(&config, &text).await,
            None => redraft_tui::run(config).await,
        }
    })
}
