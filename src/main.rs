//! Main module for the sitechat CLI application.
//!
//! This module provides the main function and auxiliary functionalities for
//! the CLI application. It handles command parsing, configuration loading, and
//! initialization, as well as invoking the appropriate functionalities based on
//! the provided command-line arguments.
//!
//! # Examples
//!
//! Ingesting a page and asking about it:
//!
//! ```sh
//! sitechat ingest https://en.wikipedia.org/wiki/Rust_(programming_language)
//! sitechat ask "Who created Rust?"
//! sitechat ask -u https://en.wikipedia.org/wiki/Rust_(programming_language) "Who created Rust?"
//! ```
//!
//! Initializing the application's configuration and default template:
//!
//! ```sh
//! sitechat init
//! ```

use clap::Parser;
use console::style;
use once_cell::sync::OnceCell;
use sitechat::{
    api, commands,
    config::{self, SiteChatConfig},
    embeddings::{EMBEDDING_DIM, Embedder},
    storage::FileStore,
    template,
    vector_store::VectorStore,
};
use std::{error::Error, fs, sync::RwLock};
use tracing::{debug, info};

static TRACING: OnceCell<()> = OnceCell::new();

fn main() -> Result<(), Box<dyn Error>> {
    TRACING.get_or_init(|| {
        tracing_subscriber::fmt::init();
    });
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run())
}

/// Main asynchronous function of the sitechat CLI application.
///
/// Parses the command-line arguments, loads configuration, and executes the
/// appropriate command.
///
/// # Errors
///
/// Returns an error if there is an issue loading the configuration, opening
/// the vector store, or executing the specified command.
async fn run() -> Result<(), Box<dyn Error>> {
    let cli = commands::Cli::parse();

    match cli.command {
        commands::Commands::Init => {
            debug!("Initializing configuration");
            init()
        }
        commands::Commands::Ingest { url } => {
            let config = app_config()?;
            let embedder = Embedder::load()?;
            let store = open_store(&config)?;

            let added = api::ingest(&config, &store, &embedder, &url).await?;
            println!(
                "{} {} {}",
                style("Stored").green().bold(),
                style(added).cyan(),
                style(format!("chunks from {url}")).green()
            );
            Ok(())
        }
        commands::Commands::Ask {
            question,
            url,
            template,
        } => {
            let config = app_config()?;
            let question = question.unwrap_or_else(|| "What is this page about?".to_string());
            debug!("Asking question: {question:?}");

            let template = match template {
                Some(name) => template::load_template(&name).await?,
                None => template::default_template(),
            };
            let embedder = Embedder::load()?;
            let store = open_store(&config)?;

            let answer =
                api::ask(&config, &store, &embedder, &template, &question, url.as_deref()).await?;

            // Streamed answers were already printed token by token; the
            // no-context fallback (empty sources) never streams.
            let streamed = config.should_stream == Some(true) && !answer.sources.is_empty();
            if !streamed {
                println!("{}", style(&answer.text).cyan());
            }
            if !answer.sources.is_empty() {
                println!("{}", style("Sources:").dim());
                for source in &answer.sources {
                    println!("  {}", style(source).dim().underlined());
                }
            }
            Ok(())
        }
        commands::Commands::Reset => {
            let config = app_config()?;
            let store = open_store(&config)?;
            store.write().expect("store lock poisoned").clear()?;
            println!("{}", style("Vector store cleared.").green());
            Ok(())
        }
    }
}

/// Load the application's configuration from the user's config directory.
fn app_config() -> Result<SiteChatConfig, Box<dyn Error>> {
    let config_path = sitechat::config_dir()?.join("config.yaml");
    debug!("Loading config from: {}", config_path.display());
    let config = config::load_config(
        config_path
            .to_str()
            .ok_or("Config path is not valid UTF-8")?,
    )?;
    debug!("Config loaded: {config:?}");
    Ok(config)
}

/// Open the persistent vector store at its configured location.
fn open_store(config: &SiteChatConfig) -> Result<RwLock<VectorStore>, Box<dyn Error>> {
    let path = sitechat::store_path(config)?;
    debug!("Opening vector store at {}", path.display());
    let store = VectorStore::open(EMBEDDING_DIM, Box::new(FileStore::new(path)))?;
    Ok(RwLock::new(store))
}

/// Initializes the application's configuration and default template.
///
/// Creates the necessary directories and files for the application's
/// configuration and default chat template. Both are stored in YAML format.
///
/// # Errors
///
/// Returns an error if there is an issue creating the directories or files, or
/// serializing the configuration and template to YAML.
fn init() -> Result<(), Box<dyn Error>> {
    let config_dir = sitechat::config_dir()?;
    let templates_dir = config_dir.join("templates");
    info!("Creating template config directory: {}", templates_dir.display());
    fs::create_dir_all(&templates_dir)?;

    let template_path = templates_dir.join("default.yaml");
    info!("Creating template file: {}", template_path.display());
    let template_yaml = serde_yaml::to_string(&template::default_template())?;
    fs::write(template_path, template_yaml)?;

    let config_path = config_dir.join("config.yaml");
    info!("Creating config file: {}", config_path.display());
    let config = SiteChatConfig {
        api_base: "http://localhost:5001/v1".to_string(),
        api_key: "CHANGEME".to_string(),
        model: "mistral-7b-openorca".to_string(),
        context_max_tokens: 2048,
        context_token_budget: 2048,
        chunk_size: 1000,
        top_k: 3,
        stop_words: Vec::new(),
        should_stream: Some(true),
        store_path: None,
    };
    let config_yaml = serde_yaml::to_string(&config)?;
    fs::write(config_path, config_yaml)?;

    Ok(())
}
