#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Password};
use std::path::Path;

use super::{Config, ConfigError, OpenAiConfig, VectorStoreConfig};

#[inline]
pub fn run_interactive_config(config_dir: &Path) -> Result<()> {
    eprintln!("{}", style("🔧 Mnemosyne Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config(config_dir);

    eprintln!("{}", style("Model API").bold().yellow());
    eprintln!("Any OpenAI-compatible endpoint serving embeddings and chat completions.");
    eprintln!();

    configure_openai(&mut config.openai)?;

    eprintln!();
    eprintln!("{}", style("Vector Store").bold().yellow());
    configure_vector_store(&mut config.vector_store)?;

    eprintln!();
    eprintln!("{}", style("Testing configuration...").yellow());

    if test_api_connection(&config.openai, config.api_key().as_deref()) {
        eprintln!("{}", style("✓ API connection successful!").green());
    } else {
        eprintln!(
            "{}",
            style("⚠ Warning: Could not reach the model API").yellow()
        );
        eprintln!("You can continue, but chatting will fail until the API is reachable.");
    }

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config(config_dir: &Path) -> Result<()> {
    let config = Config::load(config_dir).context("Failed to load configuration")?;

    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Model API:").bold().yellow());
    match config.openai.api_url() {
        Ok(url) => eprintln!("  Base URL: {}", style(url).cyan()),
        Err(e) => eprintln!("  Base URL: {} ({})", style("Invalid").red(), e),
    }
    eprintln!(
        "  Embedding Model: {}",
        style(&config.openai.embedding_model).cyan()
    );
    eprintln!("  Chat Model: {}", style(&config.openai.chat_model).cyan());
    eprintln!(
        "  Timeout: {}",
        style(format!("{}s", config.openai.timeout_seconds)).cyan()
    );
    eprintln!(
        "  Retry Attempts: {}",
        style(config.openai.retry_attempts).cyan()
    );
    eprintln!("  API Key: {}", describe_api_key(&config));

    eprintln!();
    eprintln!("{}", style("Vector Store:").bold().yellow());
    eprintln!("  URI: {}", style(config.vector_store_uri()).cyan());
    eprintln!(
        "  Collections: {} / {}",
        style(&config.vector_store.queries_collection).cyan(),
        style(&config.vector_store.replies_collection).cyan()
    );
    eprintln!(
        "  Dimension: {}",
        style(config.vector_store.dimension).cyan()
    );
    eprintln!("  Top K: {}", style(config.vector_store.top_k).cyan());

    eprintln!();
    eprintln!("{}", style("Prompt:").bold().yellow());
    eprintln!(
        "  Character Limit: {}",
        style(config.prompt.character_limit).cyan()
    );

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}

fn describe_api_key(config: &Config) -> String {
    let from_file = config
        .openai
        .api_key
        .as_deref()
        .is_some_and(|key| !key.trim().is_empty());
    if from_file {
        style("set in config file").green().to_string()
    } else if config.api_key().is_some() {
        style(format!("from {}", super::API_KEY_ENV_VAR))
            .green()
            .to_string()
    } else {
        style("not set").red().to_string()
    }
}

fn load_existing_config(config_dir: &Path) -> Config {
    Config::load(config_dir).unwrap_or_else(|_| {
        eprintln!(
            "{}",
            style("No usable configuration found. Using defaults.").yellow()
        );
        Config {
            openai: OpenAiConfig::default(),
            vector_store: VectorStoreConfig::default(),
            prompt: super::PromptConfig::default(),
            base_dir: config_dir.to_path_buf(),
        }
    })
}

fn configure_openai(openai: &mut OpenAiConfig) -> Result<()> {
    let base_url: String = Input::new()
        .with_prompt("API base URL")
        .default(openai.base_url.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            let temp_config = OpenAiConfig {
                base_url: input.clone(),
                ..OpenAiConfig::default()
            };
            temp_config.api_url()?;
            Ok(())
        })
        .interact_text()?;

    let embedding_model: String = Input::new()
        .with_prompt("Embedding model")
        .default(openai.embedding_model.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Model name cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let chat_model: String = Input::new()
        .with_prompt("Chat model")
        .default(openai.chat_model.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Model name cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let timeout_seconds: u64 = Input::new()
        .with_prompt("Request timeout in seconds")
        .default(openai.timeout_seconds)
        .validate_with(|input: &u64| -> Result<(), &str> {
            if (1..=600).contains(input) {
                Ok(())
            } else {
                Err("Timeout must be between 1 and 600 seconds")
            }
        })
        .interact_text()?;

    let api_key = Password::new()
        .with_prompt(format!(
            "API key (leave empty to use {})",
            super::API_KEY_ENV_VAR
        ))
        .allow_empty_password(true)
        .interact()?;

    openai.set_base_url(base_url)?;
    openai.set_embedding_model(embedding_model)?;
    openai.set_chat_model(chat_model)?;
    openai.set_timeout_seconds(timeout_seconds)?;
    if !api_key.trim().is_empty() {
        openai.api_key = Some(api_key);
    }

    Ok(())
}

fn configure_vector_store(store: &mut VectorStoreConfig) -> Result<()> {
    let dimension: u32 = Input::new()
        .with_prompt("Embedding dimension")
        .default(store.dimension)
        .validate_with(|input: &u32| -> Result<(), &str> {
            if (1..=8192).contains(input) {
                Ok(())
            } else {
                Err("Dimension must be between 1 and 8192")
            }
        })
        .interact_text()?;

    let top_k: usize = Input::new()
        .with_prompt("Prior exchanges to recall per collection")
        .default(store.top_k)
        .validate_with(|input: &usize| -> Result<(), &str> {
            if (1..=100).contains(input) {
                Ok(())
            } else {
                Err("Must be between 1 and 100")
            }
        })
        .interact_text()?;

    store.set_dimension(dimension)?;
    store.set_top_k(top_k)?;

    Ok(())
}

fn test_api_connection(openai: &OpenAiConfig, api_key: Option<&str>) -> bool {
    let Ok(url) = openai.api_url().and_then(|base| {
        base.join("models")
            .map_err(|_| ConfigError::InvalidUrl(openai.base_url.clone()))
    }) else {
        return false;
    };

    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_global(Some(std::time::Duration::from_secs(5)))
        .build()
        .into();

    let mut request = agent.get(url.as_str());
    if let Some(key) = api_key {
        request = request.header("Authorization", &format!("Bearer {key}"));
    }

    match request.call() {
        Ok(_) => true,
        Err(ureq::Error::StatusCode(code)) => code != 401 && code != 403 && code < 500,
        Err(_) => false,
    }
}
