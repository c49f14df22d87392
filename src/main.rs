use anyhow::Result;
use clap::{Parser, Subcommand};
use mnemosyne::commands::{ask, run_chat, show_status};
use mnemosyne::config::{get_config_dir, run_interactive_config, show_config};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mnemosyne")]
#[command(about = "A chat client that remembers earlier conversations")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml and the local vector store
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive chat
    Chat {
        /// Keep memories in memory only, for this session
        #[arg(long)]
        ephemeral: bool,
    },
    /// Send one message and print the reply
    Ask {
        /// Message text
        text: String,
        /// Keep memories in memory only, for this message
        #[arg(long)]
        ephemeral: bool,
    },
    /// Configure the model API and vector store
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Show configuration and stored memory counts
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_dir = match cli.config_dir {
        Some(dir) => dir,
        None => get_config_dir()?,
    };

    match cli.command {
        Commands::Chat { ephemeral } => {
            run_chat(&config_dir, ephemeral).await?;
        }
        Commands::Ask { text, ephemeral } => {
            ask(&config_dir, &text, ephemeral).await?;
        }
        Commands::Config { show } => {
            if show {
                show_config(&config_dir)?;
            } else {
                run_interactive_config(&config_dir)?;
            }
        }
        Commands::Status => {
            show_status(&config_dir).await?;
        }
    }

    Ok(())
}
