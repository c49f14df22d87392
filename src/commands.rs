use anyhow::{Context, Result};
use console::style;
use dialoguer::Input;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::completion::{Completer, OpenAiChat};
use crate::config::{API_KEY_ENV_VAR, Config};
use crate::conversation::{ConversationPipeline, Message, PipelineSettings, TurnState};
use crate::database::{LanceVectorStore, MemoryVectorStore, VectorIndex};
use crate::embeddings::{Embedder, OpenAiEmbedder};
use crate::retry::Retrying;

const EXIT_COMMANDS: [&str; 2] = ["/exit", "/quit"];

/// Wire the configured model API and vector store into a conversation
///
/// # Arguments
/// * `config` - Loaded application configuration
/// * `ephemeral` - Keep memories in process instead of the configured store
#[inline]
pub async fn open_conversation(config: &Config, ephemeral: bool) -> Result<ConversationPipeline> {
    let attempts = config.openai.retry_attempts;

    let embedder: Arc<dyn Embedder> = Arc::new(Retrying::new(
        OpenAiEmbedder::new(config).context("Failed to create embedding client")?,
        attempts,
    ));
    let completer: Arc<dyn Completer> = Arc::new(Retrying::new(
        OpenAiChat::new(config).context("Failed to create chat client")?,
        attempts,
    ));

    let index: Arc<dyn VectorIndex> = if ephemeral {
        info!("Using an in-memory vector store; nothing will be kept after exit");
        Arc::new(MemoryVectorStore::new())
    } else {
        Arc::new(
            LanceVectorStore::new(config)
                .await
                .context("Failed to open vector store")?,
        )
    };

    ConversationPipeline::open(
        embedder,
        index,
        completer,
        PipelineSettings::from_config(config),
    )
    .await
    .context("Failed to prepare conversation collections")
}

fn load_config(config_dir: &Path) -> Result<Config> {
    let config = Config::load(config_dir).context("Failed to load configuration")?;
    if config.api_key().is_none() {
        warn!("No API key configured");
        eprintln!(
            "{}",
            style(format!(
                "⚠ No API key found. Run 'mnemosyne config' or set {API_KEY_ENV_VAR}."
            ))
            .yellow()
        );
    }
    Ok(config)
}

fn describe_state(state: &TurnState) -> &'static str {
    match state {
        TurnState::Idle => "Done",
        TurnState::Embedding => "Reading your message",
        TurnState::Retrieving => "Recalling earlier conversations",
        TurnState::Composing => "Composing prompt",
        TurnState::AwaitingCompletion => "Waiting for the model",
        TurnState::Persisting => "Remembering this exchange",
        TurnState::Failed { .. } => "Failed",
    }
}

/// Run a turn while a spinner follows its state on stderr
async fn send_with_progress(
    pipeline: &ConversationPipeline,
    text: &str,
) -> crate::Result<Message> {
    let bar = if console::user_attended_stderr() {
        ProgressBar::new_spinner().with_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        )
    } else {
        ProgressBar::hidden()
    };
    bar.enable_steady_tick(Duration::from_millis(100));

    let mut states = pipeline.subscribe_state();
    let progress = {
        let bar = bar.clone();
        tokio::spawn(async move {
            while states.changed().await.is_ok() {
                let label = describe_state(&states.borrow_and_update());
                bar.set_message(label);
            }
        })
    };

    let result = pipeline.send_message(text).await;
    progress.abort();
    bar.finish_and_clear();
    result
}

/// Interactive chat session
#[inline]
pub async fn run_chat(config_dir: &Path, ephemeral: bool) -> Result<()> {
    let config = load_config(config_dir)?;
    let pipeline = open_conversation(&config, ephemeral).await?;

    eprintln!("{}", style("💬 Mnemosyne").bold().cyan());
    eprintln!(
        "Type a message and press Enter. {} or {} leaves the chat.",
        style(EXIT_COMMANDS[0]).cyan(),
        style(EXIT_COMMANDS[1]).cyan()
    );
    eprintln!();

    loop {
        let line: String = match Input::new()
            .with_prompt("You")
            .allow_empty(true)
            .interact_text()
        {
            Ok(line) => line,
            Err(e) => {
                debug!("Input closed: {}", e);
                break;
            }
        };

        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if EXIT_COMMANDS.contains(&text) {
            break;
        }

        match send_with_progress(&pipeline, text).await {
            Ok(reply) => {
                println!("{} {}", style("Assistant:").bold().green(), reply.content);
                println!();
            }
            Err(e) => {
                eprintln!("{} {}", style("✗").red(), e);
                eprintln!();
            }
        }
    }

    let exchanged = pipeline.messages().len().await;
    info!("Chat ended after {} messages", exchanged);
    Ok(())
}

/// Send a single message and print the reply
#[inline]
pub async fn ask(config_dir: &Path, text: &str, ephemeral: bool) -> Result<()> {
    let config = load_config(config_dir)?;
    let pipeline = open_conversation(&config, ephemeral).await?;

    let reply = send_with_progress(&pipeline, text).await?;
    println!("{}", reply.content);
    Ok(())
}

/// Report configuration and the state of the stored memories
#[inline]
pub async fn show_status(config_dir: &Path) -> Result<()> {
    let config = Config::load(config_dir).context("Failed to load configuration")?;

    println!("📊 Mnemosyne Status Report");
    println!("{}", "=".repeat(50));
    println!();

    println!("🤖 Model API:");
    match config.openai.api_url() {
        Ok(url) => println!("   🌐 Endpoint: {}", url),
        Err(e) => println!("   ❌ Endpoint: invalid - {}", e),
    }
    println!("   📋 Embedding model: {}", config.openai.embedding_model);
    println!("   📋 Chat model: {}", config.openai.chat_model);
    if config.api_key().is_some() {
        println!("   ✅ API key: configured");
    } else {
        println!("   ❌ API key: missing (set {})", API_KEY_ENV_VAR);
    }

    println!();
    println!("🔍 Vector Store:");
    let uri = config.vector_store_uri();
    let store = match LanceVectorStore::new(&config).await {
        Ok(store) => {
            println!("   ✅ LanceDB: Connected ({})", uri);
            store
        }
        Err(e) => {
            println!("   ❌ LanceDB: Failed to connect - {}", e);
            return Ok(());
        }
    };

    let collections = [
        ("Queries", &config.vector_store.queries_collection),
        ("Replies", &config.vector_store.replies_collection),
    ];
    for (label, name) in collections {
        match store.count(name).await {
            Ok(count) => println!("   🧠 {} ({}): {} remembered", label, name, count),
            Err(crate::MnemosyneError::Schema(_)) => {
                println!("   💤 {} ({}): not created yet", label, name);
            }
            Err(e) => println!("   ⚠️  {} ({}): unavailable - {}", label, name, e),
        }
    }
    println!(
        "   🔢 Dimension: {}, neighbors per lookup: {}",
        config.vector_store.dimension, config.vector_store.top_k
    );

    println!();
    println!("📝 Prompt:");
    println!(
        "   📏 Character limit: {}",
        config.prompt.character_limit
    );

    Ok(())
}
