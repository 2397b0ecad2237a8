use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Select};

use super::{Config, EmbeddingConfig, StoreBackend, default_base_dir};

#[inline]
pub fn run_interactive_config() -> Result<()> {
    eprintln!("{}", style("🔧 qagen Configuration Setup").bold().cyan());
    eprintln!();

    let base_dir = default_base_dir()?;
    let mut config = load_existing_config(Config::load(&base_dir));
    config.base_dir = base_dir;

    eprintln!("{}", style("Embedding Server").bold().yellow());
    eprintln!("Configure the Ollama-compatible server used for embedding generation.");
    eprintln!();

    configure_embedding(&mut config.embedding)?;

    eprintln!();
    eprintln!("{}", style("Chunking").bold().yellow());

    config.chunking.chunk_size = Input::new()
        .with_prompt("Chunk size (characters)")
        .default(config.chunking.chunk_size)
        .validate_with(|input: &usize| -> Result<(), &str> {
            if *input == 0 || *input > 8192 {
                Err("Chunk size must be between 1 and 8192")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let chunk_size = config.chunking.chunk_size;
    config.chunking.chunk_overlap = Input::new()
        .with_prompt("Chunk overlap (characters)")
        .default(config.chunking.chunk_overlap.min(chunk_size - 1))
        .validate_with(move |input: &usize| -> Result<(), String> {
            if *input >= chunk_size {
                Err(format!("Overlap must be smaller than chunk size ({chunk_size})"))
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    eprintln!();
    eprintln!("{}", style("Retrieval and Storage").bold().yellow());

    config.retrieval.top_k = Input::new()
        .with_prompt("Default number of retrieved chunks (top_k)")
        .default(config.retrieval.top_k)
        .validate_with(|input: &usize| -> Result<(), &str> {
            if *input == 0 || *input > 100 {
                Err("top_k must be between 1 and 100")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let backends = &[StoreBackend::Lance, StoreBackend::Memory];
    let backend_labels = &["lance (on-disk)", "memory (JSON snapshot)"];
    let default_index = backends
        .iter()
        .position(|b| *b == config.store.backend)
        .unwrap_or(0);
    let backend_index = Select::new()
        .with_prompt("Vector store backend")
        .default(default_index)
        .items(backend_labels)
        .interact()?;
    config.store.backend = backends[backend_index];

    eprintln!();
    eprintln!("{}", style("Generation").bold().yellow());

    config.generation.api_url = Input::new()
        .with_prompt("Completion API base URL")
        .default(config.generation.api_url.clone())
        .interact_text()?;
    config.generation.model = Input::new()
        .with_prompt("Completion model")
        .default(config.generation.model.clone())
        .interact_text()?;

    eprintln!();
    eprintln!("{}", style("Testing configuration...").yellow());

    if test_embedding_connection(&config.embedding) {
        eprintln!("{}", style("✓ Embedding server reachable!").green());
    } else {
        eprintln!(
            "{}",
            style("⚠ Warning: Could not reach the embedding server").yellow()
        );
        eprintln!("You can continue, but make sure it is running before building.");
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
pub fn show_config() -> Result<()> {
    let base_dir = default_base_dir()?;
    let config = Config::load(&base_dir).context("Failed to load configuration")?;

    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Embedding Server:").bold().yellow());
    eprintln!("  Host: {}", style(&config.embedding.host).cyan());
    eprintln!("  Port: {}", style(config.embedding.port).cyan());
    eprintln!("  Model: {}", style(&config.embedding.model).cyan());
    eprintln!(
        "  Batch Size: {}",
        style(config.embedding.batch_size).cyan()
    );

    eprintln!();
    eprintln!("{}", style("Chunking:").bold().yellow());
    eprintln!(
        "  Chunk Size: {}",
        style(config.chunking.chunk_size).cyan()
    );
    eprintln!(
        "  Chunk Overlap: {}",
        style(config.chunking.chunk_overlap).cyan()
    );

    eprintln!();
    eprintln!("{}", style("Retrieval and Storage:").bold().yellow());
    eprintln!("  top_k: {}", style(config.retrieval.top_k).cyan());
    eprintln!("  Backend: {}", style(config.store.backend).cyan());

    eprintln!();
    eprintln!("{}", style("Generation:").bold().yellow());
    eprintln!("  API URL: {}", style(&config.generation.api_url).cyan());
    eprintln!("  Model: {}", style(&config.generation.model).cyan());

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}

fn load_existing_config(loaded: Result<Config>) -> Config {
    match loaded {
        Ok(config) => {
            eprintln!("{}", style("Found existing configuration.").green());
            config
        }
        Err(_) => {
            eprintln!(
                "{}",
                style("No existing configuration found. Using defaults.").yellow()
            );
            Config::default()
        }
    }
}

fn configure_embedding(embedding: &mut EmbeddingConfig) -> Result<()> {
    let protocols = &["http", "https"];
    let default_index = protocols
        .iter()
        .position(|&p| p == embedding.protocol)
        .unwrap_or(0);

    let protocol_index = Select::new()
        .with_prompt("Embedding server protocol")
        .default(default_index)
        .items(protocols)
        .interact()?;
    embedding.protocol = protocols[protocol_index].to_string();

    embedding.host = Input::new()
        .with_prompt("Embedding server host")
        .default(embedding.host.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Host cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    embedding.port = Input::new()
        .with_prompt("Embedding server port")
        .default(embedding.port)
        .validate_with(|input: &u16| -> Result<(), &str> {
            if *input == 0 {
                Err("Port must be greater than 0")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    embedding.model = Input::new()
        .with_prompt("Embedding model")
        .default(embedding.model.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Model name cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    embedding.batch_size = Input::new()
        .with_prompt("Batch size for embedding generation")
        .default(embedding.batch_size)
        .validate_with(|input: &u32| -> Result<(), &str> {
            if *input == 0 {
                Err("Batch size must be greater than 0")
            } else if *input > 1000 {
                Err("Batch size must be 1000 or less")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    Ok(())
}

fn test_embedding_connection(embedding: &EmbeddingConfig) -> bool {
    let url = format!(
        "{}://{}:{}/api/version",
        embedding.protocol, embedding.host, embedding.port
    );

    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_global(Some(std::time::Duration::from_secs(5)))
        .build()
        .into();

    match agent.get(&url).call() {
        Ok(_) => true,
        Err(ureq::Error::StatusCode(code)) if (400..500).contains(&code) => true,
        Err(_) => false,
    }
}
